use crate::models::{DbEarning, DbWithdrawal};
use crate::repositories::{
    AgentRepository, BalanceRepository, EarningRepository, ReferralRepository,
    WithdrawalRepository,
};
use crate::{DatabaseError, DatabasePool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::error::{LedgerError, RejectionReason, Result};
use ledger_core::storage::{CreditOutcome, LedgerStore, NewEarning, WeeklyCap, WithdrawalOutcome};
use ledger_core::types::{
    Balance, EarningEntry, EarningKind, ReferralChain, WithdrawalRequest, WithdrawalStatus,
};
use uuid::Uuid;

fn persistence(err: DatabaseError) -> LedgerError {
    LedgerError::Persistence(err.to_string())
}

fn sqlx_persistence(err: sqlx::Error) -> LedgerError {
    LedgerError::Persistence(err.to_string())
}

/// Postgres-backed [`LedgerStore`]. The entry insert and the balance
/// increment commit as one transaction; the unique constraint on
/// `idempotency_key` is the duplicate detector, and balance rows only move
/// through atomic increment/decrement statements.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: DatabasePool,
    currency: String,
}

impl PgLedgerStore {
    /// `currency` stamps the zeroed balance rows returned for users without
    /// a persisted row yet.
    pub fn new(pool: DatabasePool, currency: impl Into<String>) -> Self {
        Self {
            pool,
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn credit_earning(&self, earning: NewEarning) -> Result<CreditOutcome> {
        let row = DbEarning {
            id: Uuid::new_v4(),
            user_id: earning.user_id.clone(),
            kind: earning.kind.as_str().to_string(),
            amount: earning.amount,
            currency: earning.currency.clone(),
            description: earning.description,
            metadata: earning.metadata,
            idempotency_key: earning.idempotency_key.canonical(),
            created_at: Utc::now(),
        };

        let mut tx = self.pool.inner().begin().await.map_err(sqlx_persistence)?;
        let inserted = EarningRepository::insert(&mut *tx, &row)
            .await
            .map_err(persistence)?;
        if inserted {
            BalanceRepository::credit(&mut *tx, &row.user_id, row.amount, &row.currency)
                .await
                .map_err(persistence)?;
            tx.commit().await.map_err(sqlx_persistence)?;
            let entry: EarningEntry = row.try_into().map_err(persistence)?;
            return Ok(CreditOutcome::Applied(entry));
        }
        drop(tx);

        let existing = EarningRepository::get_by_key(self.pool.inner(), &row.idempotency_key)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                LedgerError::Persistence(format!(
                    "duplicate idempotency key {} has no row",
                    row.idempotency_key
                ))
            })?;
        let entry: EarningEntry = existing.try_into().map_err(persistence)?;
        Ok(CreditOutcome::Duplicate(entry))
    }

    async fn balance(&self, user_id: &str) -> Result<Balance> {
        let row = BalanceRepository::get(self.pool.inner(), user_id)
            .await
            .map_err(persistence)?;
        Ok(row
            .map(Balance::from)
            .unwrap_or_else(|| Balance::zeroed(user_id, &self.currency)))
    }

    async fn list_earnings(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EarningEntry>> {
        let rows = EarningRepository::list_by_user(self.pool.inner(), user_id, limit, offset)
            .await
            .map_err(persistence)?;
        rows.into_iter()
            .map(|row| row.try_into().map_err(persistence))
            .collect()
    }

    async fn sum_earnings_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        exclude: &[EarningKind],
    ) -> Result<i64> {
        let exclude: Vec<String> = exclude.iter().map(|k| k.as_str().to_string()).collect();
        EarningRepository::sum_since(self.pool.inner(), user_id, since, &exclude)
            .await
            .map_err(persistence)
    }

    async fn referral_chain(&self, user_id: &str) -> Result<ReferralChain> {
        let level1 = ReferralRepository::referrer_of(self.pool.inner(), user_id)
            .await
            .map_err(persistence)?;
        let level2 = match &level1 {
            Some(user) => ReferralRepository::referrer_of(self.pool.inner(), user)
                .await
                .map_err(persistence)?,
            None => None,
        };
        let level3 = match &level2 {
            Some(user) => ReferralRepository::referrer_of(self.pool.inner(), user)
                .await
                .map_err(persistence)?,
            None => None,
        };
        Ok(ReferralChain {
            level1,
            level2,
            level3,
        })
    }

    async fn record_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()> {
        ReferralRepository::upsert(self.pool.inner(), referrer_id, referred_id)
            .await
            .map_err(persistence)
    }

    async fn direct_referral_count(&self, user_id: &str) -> Result<i64> {
        ReferralRepository::direct_count(self.pool.inner(), user_id)
            .await
            .map_err(persistence)
    }

    async fn is_agent(&self, user_id: &str) -> Result<bool> {
        AgentRepository::is_agent(self.pool.inner(), user_id)
            .await
            .map_err(persistence)
    }

    async fn set_agent(&self, user_id: &str, agent: bool) -> Result<()> {
        AgentRepository::set_agent(self.pool.inner(), user_id, agent)
            .await
            .map_err(persistence)
    }

    async fn update_agent_tier(&self, user_id: &str, tier_id: &str) -> Result<()> {
        AgentRepository::set_tier(self.pool.inner(), user_id, tier_id)
            .await
            .map_err(persistence)
    }

    async fn list_agents(&self) -> Result<Vec<String>> {
        AgentRepository::list(self.pool.inner())
            .await
            .map_err(persistence)
    }

    async fn reserve_withdrawal(
        &self,
        request: &WithdrawalRequest,
        cap: Option<WeeklyCap>,
    ) -> Result<()> {
        let mut tx = self.pool.inner().begin().await.map_err(sqlx_persistence)?;
        let reserved = BalanceRepository::try_reserve(&mut *tx, &request.user_id, request.amount)
            .await
            .map_err(persistence)?;
        if !reserved {
            drop(tx);
            let available = BalanceRepository::get(self.pool.inner(), &request.user_id)
                .await
                .map_err(persistence)?
                .map(|b| b.available)
                .unwrap_or(0);
            return Err(LedgerError::Rejected(RejectionReason::InsufficientBalance {
                available,
                requested: request.amount,
            }));
        }

        // The reserve update holds the user's balance row lock until commit,
        // which serializes per-user submissions: the cap re-check below
        // cannot race another reserve for the same user.
        if let Some(cap) = cap {
            let used =
                WithdrawalRepository::weekly_total(&mut *tx, &request.user_id, cap.week_start)
                    .await
                    .map_err(persistence)?;
            if used + request.amount > cap.limit {
                drop(tx);
                return Err(LedgerError::Rejected(RejectionReason::WeeklyLimitExceeded {
                    limit: cap.limit,
                    used,
                    requested: request.amount,
                }));
            }
        }

        let row = DbWithdrawal {
            id: request.id,
            user_id: request.user_id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            payment_method: request.payment_method.as_str().to_string(),
            payment_details: request.payment_details.clone(),
            fee_amount: request.fee_amount,
            status: request.status.as_str().to_string(),
            gateway_reference: request.gateway_reference.clone(),
            failure_reason: request.failure_reason.clone(),
            created_at: request.created_at,
            processed_at: request.processed_at,
        };
        WithdrawalRepository::insert(&mut *tx, &row)
            .await
            .map_err(persistence)?;
        tx.commit().await.map_err(sqlx_persistence)
    }

    async fn weekly_withdrawn(&self, user_id: &str, week_start: DateTime<Utc>) -> Result<i64> {
        WithdrawalRepository::weekly_total(self.pool.inner(), user_id, week_start)
            .await
            .map_err(persistence)
    }

    async fn withdrawal(&self, id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let row = WithdrawalRepository::get(self.pool.inner(), id)
            .await
            .map_err(persistence)?;
        row.map(|r| r.try_into().map_err(persistence)).transpose()
    }

    async fn begin_processing(&self, id: Uuid) -> Result<WithdrawalRequest> {
        let mut tx = self.pool.inner().begin().await.map_err(sqlx_persistence)?;
        let row = WithdrawalRepository::get_for_update(&mut tx, id)
            .await
            .map_err(persistence)?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        let mut request: WithdrawalRequest = row.try_into().map_err(persistence)?;
        if !request.status.can_transition_to(WithdrawalStatus::Processing) {
            return Err(LedgerError::InvalidTransition {
                id,
                from: request.status,
                to: WithdrawalStatus::Processing,
            });
        }
        WithdrawalRepository::update_status(
            &mut *tx,
            id,
            WithdrawalStatus::Processing.as_str(),
            request.gateway_reference.as_deref(),
            request.failure_reason.as_deref(),
            request.processed_at,
        )
        .await
        .map_err(persistence)?;
        tx.commit().await.map_err(sqlx_persistence)?;
        request.status = WithdrawalStatus::Processing;
        Ok(request)
    }

    async fn finalize_withdrawal(
        &self,
        id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<WithdrawalRequest> {
        let (next, completed) = match &outcome {
            WithdrawalOutcome::Completed { .. } => (WithdrawalStatus::Completed, true),
            WithdrawalOutcome::Failed { .. } => (WithdrawalStatus::Failed, false),
        };

        let mut tx = self.pool.inner().begin().await.map_err(sqlx_persistence)?;
        let row = WithdrawalRepository::get_for_update(&mut tx, id)
            .await
            .map_err(persistence)?
            .ok_or(LedgerError::WithdrawalNotFound(id))?;
        let mut request: WithdrawalRequest = row.try_into().map_err(persistence)?;
        if !request.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                id,
                from: request.status,
                to: next,
            });
        }

        request.status = next;
        request.processed_at = Some(Utc::now());
        match &outcome {
            WithdrawalOutcome::Completed { gateway_reference } => {
                request.gateway_reference = Some(gateway_reference.clone());
            }
            WithdrawalOutcome::Failed { reason } => {
                request.failure_reason = Some(reason.clone());
            }
        }

        WithdrawalRepository::update_status(
            &mut *tx,
            id,
            request.status.as_str(),
            request.gateway_reference.as_deref(),
            request.failure_reason.as_deref(),
            request.processed_at,
        )
        .await
        .map_err(persistence)?;
        BalanceRepository::settle(&mut *tx, &request.user_id, request.amount, completed)
            .await
            .map_err(persistence)?;
        tx.commit().await.map_err(sqlx_persistence)?;
        Ok(request)
    }
}
