use crate::{AgentRegistry, BalanceTable, EarningTable, ReferralGraph, WithdrawalTable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::error::{LedgerError, RejectionReason, Result};
use ledger_core::storage::{CreditOutcome, LedgerStore, NewEarning, WeeklyCap, WithdrawalOutcome};
use ledger_core::types::{
    Balance, EarningEntry, EarningKind, ReferralChain, WithdrawalRequest, WithdrawalStatus,
};
use tracing::debug;
use uuid::Uuid;

/// In-memory [`LedgerStore`] used when no database is configured and in
/// tests. Idempotency is decided by the earning table's key lock; balance
/// rows only move through [`BalanceTable`]'s atomic primitives. The two are
/// never locked at the same time, so a duplicate key can only be observed
/// after its balance increment has landed.
#[derive(Debug)]
pub struct MemoryLedgerStore {
    currency: String,
    balances: BalanceTable,
    earnings: EarningTable,
    referrals: ReferralGraph,
    agents: AgentRegistry,
    withdrawals: WithdrawalTable,
}

impl MemoryLedgerStore {
    /// `currency` stamps the zeroed balance rows this store materializes.
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            balances: BalanceTable::new(),
            earnings: EarningTable::new(),
            referrals: ReferralGraph::new(),
            agents: AgentRegistry::new(),
            withdrawals: WithdrawalTable::new(),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn credit_earning(&self, earning: NewEarning) -> Result<CreditOutcome> {
        let entry = EarningEntry {
            id: Uuid::new_v4(),
            user_id: earning.user_id.clone(),
            kind: earning.kind,
            amount: earning.amount,
            currency: earning.currency.clone(),
            description: earning.description,
            metadata: earning.metadata,
            idempotency_key: earning.idempotency_key.canonical(),
            created_at: Utc::now(),
        };
        match self.earnings.insert(entry) {
            Ok(inserted) => {
                self.balances
                    .credit(&earning.user_id, earning.amount, &earning.currency);
                Ok(CreditOutcome::Applied(inserted))
            }
            Err(existing) => {
                debug!(key = %existing.idempotency_key, "duplicate earning skipped");
                Ok(CreditOutcome::Duplicate(existing))
            }
        }
    }

    async fn balance(&self, user_id: &str) -> Result<Balance> {
        Ok(self.balances.get_or_create(user_id, &self.currency))
    }

    async fn list_earnings(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EarningEntry>> {
        Ok(self.earnings.list(user_id, limit, offset))
    }

    async fn sum_earnings_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        exclude: &[EarningKind],
    ) -> Result<i64> {
        Ok(self.earnings.sum_since(user_id, since, exclude))
    }

    async fn referral_chain(&self, user_id: &str) -> Result<ReferralChain> {
        Ok(self.referrals.chain(user_id))
    }

    async fn record_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()> {
        self.referrals.record(referrer_id, referred_id);
        Ok(())
    }

    async fn direct_referral_count(&self, user_id: &str) -> Result<i64> {
        Ok(self.referrals.direct_count(user_id))
    }

    async fn is_agent(&self, user_id: &str) -> Result<bool> {
        Ok(self.agents.is_agent(user_id))
    }

    async fn set_agent(&self, user_id: &str, agent: bool) -> Result<()> {
        self.agents.set_agent(user_id, agent);
        Ok(())
    }

    async fn update_agent_tier(&self, user_id: &str, tier_id: &str) -> Result<()> {
        self.agents.set_tier(user_id, tier_id);
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<String>> {
        Ok(self.agents.all())
    }

    async fn reserve_withdrawal(
        &self,
        request: &WithdrawalRequest,
        cap: Option<WeeklyCap>,
    ) -> Result<()> {
        if let Err(available) = self
            .balances
            .reserve(&request.user_id, request.amount, &request.currency)
        {
            return Err(LedgerError::Rejected(RejectionReason::InsufficientBalance {
                available,
                requested: request.amount,
            }));
        }
        let Some(cap) = cap else {
            self.withdrawals.insert(request.clone());
            return Ok(());
        };
        match self
            .withdrawals
            .try_insert_capped(request.clone(), cap.limit, cap.week_start)
        {
            Ok(()) => Ok(()),
            Err(used) => {
                // Lost the cap race: hand the reserved amount straight back.
                self.balances
                    .settle(&request.user_id, request.amount, false, &request.currency);
                Err(LedgerError::Rejected(RejectionReason::WeeklyLimitExceeded {
                    limit: cap.limit,
                    used,
                    requested: request.amount,
                }))
            }
        }
    }

    async fn weekly_withdrawn(&self, user_id: &str, week_start: DateTime<Utc>) -> Result<i64> {
        Ok(self.withdrawals.weekly_total(user_id, week_start))
    }

    async fn withdrawal(&self, id: Uuid) -> Result<Option<WithdrawalRequest>> {
        Ok(self.withdrawals.get(id))
    }

    async fn begin_processing(&self, id: Uuid) -> Result<WithdrawalRequest> {
        match self
            .withdrawals
            .transition(id, WithdrawalStatus::Processing, |_| {})
        {
            None => Err(LedgerError::WithdrawalNotFound(id)),
            Some(Err(from)) => Err(LedgerError::InvalidTransition {
                id,
                from,
                to: WithdrawalStatus::Processing,
            }),
            Some(Ok(request)) => Ok(request),
        }
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
        // The transition decides the single winner under the request's entry
        // lock; the balance move happens exactly once, after it is released.
        let result = self.withdrawals.transition(id, next, |request| {
            request.processed_at = Some(Utc::now());
            match &outcome {
                WithdrawalOutcome::Completed { gateway_reference } => {
                    request.gateway_reference = Some(gateway_reference.clone());
                }
                WithdrawalOutcome::Failed { reason } => {
                    request.failure_reason = Some(reason.clone());
                }
            }
        });
        match result {
            None => Err(LedgerError::WithdrawalNotFound(id)),
            Some(Err(from)) => Err(LedgerError::InvalidTransition { id, from, to: next }),
            Some(Ok(request)) => {
                self.balances
                    .settle(&request.user_id, request.amount, completed, &request.currency);
                Ok(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::types::{IdempotencyKey, PaymentMethod};

    fn earning(user: &str, amount: i64, key: IdempotencyKey) -> NewEarning {
        NewEarning {
            user_id: user.to_string(),
            kind: EarningKind::Task,
            amount,
            currency: "USD".to_string(),
            description: "task completion".to_string(),
            metadata: serde_json::json!({}),
            idempotency_key: key,
        }
    }

    fn task_key(task: &str, user: &str) -> IdempotencyKey {
        IdempotencyKey::Task {
            task_id: task.to_string(),
            user: user.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_key_credits_once() {
        let store = MemoryLedgerStore::new("USD");
        let first = store
            .credit_earning(earning("u1", 100, task_key("t1", "u1")))
            .await
            .unwrap();
        assert!(matches!(first, CreditOutcome::Applied(_)));

        let second = store
            .credit_earning(earning("u1", 100, task_key("t1", "u1")))
            .await
            .unwrap();
        assert!(matches!(second, CreditOutcome::Duplicate(_)));

        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 100);
        assert_eq!(balance.total_earned, 100);
        assert_eq!(store.list_earnings("u1", 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn balance_invariant_holds_across_withdrawal_lifecycle() {
        let store = MemoryLedgerStore::new("USD");
        store
            .credit_earning(earning("u1", 10_000, task_key("t1", "u1")))
            .await
            .unwrap();

        let request = WithdrawalRequest::new(
            "u1",
            4_000,
            "USD",
            PaymentMethod::Paypal,
            serde_json::json!({"email": "u1@example.com"}),
            100,
        );
        store.reserve_withdrawal(&request, None).await.unwrap();

        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 6_000);
        assert_eq!(balance.pending, 4_000);
        assert_eq!(
            balance.available + balance.pending,
            balance.total_earned - balance.total_withdrawn
        );

        store.begin_processing(request.id).await.unwrap();
        let finalized = store
            .finalize_withdrawal(
                request.id,
                WithdrawalOutcome::Completed {
                    gateway_reference: "gw-1".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(finalized.status, WithdrawalStatus::Completed);
        assert_eq!(finalized.gateway_reference.as_deref(), Some("gw-1"));

        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.pending, 0);
        assert_eq!(balance.total_withdrawn, 4_000);
        assert_eq!(
            balance.available + balance.pending,
            balance.total_earned - balance.total_withdrawn
        );
    }

    #[tokio::test]
    async fn failed_withdrawal_restores_available() {
        let store = MemoryLedgerStore::new("USD");
        store
            .credit_earning(earning("u1", 5_000, task_key("t1", "u1")))
            .await
            .unwrap();

        let request = WithdrawalRequest::new(
            "u1",
            2_000,
            "USD",
            PaymentMethod::Crypto,
            serde_json::json!({"address": "0xabc"}),
            20,
        );
        store.reserve_withdrawal(&request, None).await.unwrap();
        store
            .finalize_withdrawal(
                request.id,
                WithdrawalOutcome::Failed {
                    reason: "gateway timeout".to_string(),
                },
            )
            .await
            .unwrap();

        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 5_000);
        assert_eq!(balance.pending, 0);
        assert_eq!(balance.total_withdrawn, 0);
    }

    #[tokio::test]
    async fn reserve_rejects_insufficient_balance_without_side_effects() {
        let store = MemoryLedgerStore::new("USD");
        store
            .credit_earning(earning("u1", 1_000, task_key("t1", "u1")))
            .await
            .unwrap();

        let request = WithdrawalRequest::new(
            "u1",
            2_000,
            "USD",
            PaymentMethod::Paypal,
            serde_json::json!({}),
            50,
        );
        let err = store.reserve_withdrawal(&request, None).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(RejectionReason::InsufficientBalance {
                available: 1_000,
                requested: 2_000,
            })
        ));
        assert!(store.withdrawal(request.id).await.unwrap().is_none());
        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 1_000);
        assert_eq!(balance.pending, 0);
    }

    #[tokio::test]
    async fn finalize_is_single_winner() {
        let store = MemoryLedgerStore::new("USD");
        store
            .credit_earning(earning("u1", 5_000, task_key("t1", "u1")))
            .await
            .unwrap();

        let request = WithdrawalRequest::new(
            "u1",
            1_000,
            "USD",
            PaymentMethod::MobileMoney,
            serde_json::json!({}),
            20,
        );
        store.reserve_withdrawal(&request, None).await.unwrap();
        store
            .finalize_withdrawal(
                request.id,
                WithdrawalOutcome::Completed {
                    gateway_reference: "gw-1".to_string(),
                },
            )
            .await
            .unwrap();

        let err = store
            .finalize_withdrawal(
                request.id,
                WithdrawalOutcome::Failed {
                    reason: "late retry".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));

        // The losing finalize must not touch the balance.
        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.total_withdrawn, 1_000);
        assert_eq!(balance.pending, 0);
    }

    #[tokio::test]
    async fn referral_chain_walks_three_levels_and_truncates() {
        let store = MemoryLedgerStore::new("USD");
        // d referred c, c referred b, b referred a.
        store.record_referral("d", "c").await.unwrap();
        store.record_referral("c", "b").await.unwrap();
        store.record_referral("b", "a").await.unwrap();

        let chain = store.referral_chain("a").await.unwrap();
        assert_eq!(chain.level1.as_deref(), Some("b"));
        assert_eq!(chain.level2.as_deref(), Some("c"));
        assert_eq!(chain.level3.as_deref(), Some("d"));

        let short = store.referral_chain("b").await.unwrap();
        assert_eq!(short.level1.as_deref(), Some("c"));
        assert_eq!(short.level2.as_deref(), Some("d"));
        assert_eq!(short.level3, None);

        assert!(store.referral_chain("d").await.unwrap().is_empty());
        assert_eq!(store.direct_referral_count("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cyclic_referral_graph_is_bounded() {
        let store = MemoryLedgerStore::new("USD");
        store.record_referral("a", "b").await.unwrap();
        store.record_referral("b", "a").await.unwrap();

        let chain = store.referral_chain("a").await.unwrap();
        assert_eq!(chain.level1.as_deref(), Some("b"));
        assert_eq!(chain.level2.as_deref(), Some("a"));
        assert_eq!(chain.level3.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn weekly_withdrawn_excludes_failed_requests() {
        let store = MemoryLedgerStore::new("USD");
        store
            .credit_earning(earning("u1", 20_000, task_key("t1", "u1")))
            .await
            .unwrap();
        let week_start = Utc::now() - chrono::Duration::days(1);

        let ok = WithdrawalRequest::new(
            "u1",
            3_000,
            "USD",
            PaymentMethod::Paypal,
            serde_json::json!({}),
            75,
        );
        store.reserve_withdrawal(&ok, None).await.unwrap();

        let failed = WithdrawalRequest::new(
            "u1",
            2_000,
            "USD",
            PaymentMethod::Paypal,
            serde_json::json!({}),
            50,
        );
        store.reserve_withdrawal(&failed, None).await.unwrap();
        store
            .finalize_withdrawal(
                failed.id,
                WithdrawalOutcome::Failed {
                    reason: "declined".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(store.weekly_withdrawn("u1", week_start).await.unwrap(), 3_000);
    }

    #[tokio::test]
    async fn zeroed_balance_rows_carry_the_store_currency() {
        let store = MemoryLedgerStore::new("KES");
        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.currency, "KES");
        assert_eq!(balance.available, 0);
    }

    #[tokio::test]
    async fn capped_reserve_rejects_and_releases_the_reservation() {
        let store = MemoryLedgerStore::new("USD");
        store
            .credit_earning(earning("u1", 20_000, task_key("t1", "u1")))
            .await
            .unwrap();
        let cap = WeeklyCap {
            limit: 10_000,
            week_start: Utc::now() - chrono::Duration::days(1),
        };

        let first = WithdrawalRequest::new(
            "u1",
            8_000,
            "USD",
            PaymentMethod::Paypal,
            serde_json::json!({}),
            200,
        );
        store.reserve_withdrawal(&first, Some(cap)).await.unwrap();

        let second = WithdrawalRequest::new(
            "u1",
            3_000,
            "USD",
            PaymentMethod::Paypal,
            serde_json::json!({}),
            75,
        );
        let err = store
            .reserve_withdrawal(&second, Some(cap))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(RejectionReason::WeeklyLimitExceeded {
                limit: 10_000,
                used: 8_000,
                requested: 3_000,
            })
        ));
        assert!(store.withdrawal(second.id).await.unwrap().is_none());
        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 12_000);
        assert_eq!(balance.pending, 8_000);
    }

    #[tokio::test]
    async fn racing_capped_reserves_cannot_jointly_exceed_the_limit() {
        let store = std::sync::Arc::new(MemoryLedgerStore::new("USD"));
        store
            .credit_earning(earning("u1", 20_000, task_key("t1", "u1")))
            .await
            .unwrap();
        let cap = WeeklyCap {
            limit: 10_000,
            week_start: Utc::now() - chrono::Duration::days(1),
        };

        // Either request alone fits the cap; together they would breach it.
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let request = WithdrawalRequest::new(
                        "u1",
                        6_000,
                        "USD",
                        PaymentMethod::Crypto,
                        serde_json::json!({}),
                        60,
                    );
                    store.reserve_withdrawal(&request, Some(cap)).await
                })
            })
            .collect();
        let mut reserved = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                reserved += 1;
            }
        }
        assert_eq!(reserved, 1);
        assert_eq!(
            store.weekly_withdrawn("u1", cap.week_start).await.unwrap(),
            6_000
        );
        let balance = store.balance("u1").await.unwrap();
        assert_eq!(balance.available + balance.pending, 20_000);
    }

    #[tokio::test]
    async fn agent_registry_round_trip() {
        let store = MemoryLedgerStore::new("USD");
        assert!(!store.is_agent("u1").await.unwrap());
        store.set_agent("u1", true).await.unwrap();
        store.update_agent_tier("u1", "bronze").await.unwrap();
        assert!(store.is_agent("u1").await.unwrap());
        assert_eq!(store.list_agents().await.unwrap(), vec!["u1".to_string()]);
        store.set_agent("u1", false).await.unwrap();
        assert!(!store.is_agent("u1").await.unwrap());
    }
}
