use crate::{AgentTierEngine, EarningsLedger, Eligibility, WithdrawalEligibilityGuard};
use chrono::Utc;
use ledger_core::config::RewardsConfig;
use ledger_core::error::{LedgerError, Result};
use ledger_core::storage::{NewEarning, WeeklyCap, WithdrawalOutcome};
use ledger_core::types::{week_start, EarningKind, IdempotencyKey, PaymentMethod, WithdrawalRequest};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Submission and lifecycle of withdrawal requests. The eligibility guard
/// runs before any mutation; the reserve itself is a single atomic store
/// operation, so a request either exists fully reserved or not at all.
#[derive(Clone)]
pub struct WithdrawalProcessor {
    ledger: Arc<EarningsLedger>,
    guard: WithdrawalEligibilityGuard,
    tiers: AgentTierEngine,
    config: Arc<RewardsConfig>,
}

impl WithdrawalProcessor {
    pub fn new(
        ledger: Arc<EarningsLedger>,
        guard: WithdrawalEligibilityGuard,
        tiers: AgentTierEngine,
        config: Arc<RewardsConfig>,
    ) -> Self {
        Self {
            ledger,
            guard,
            tiers,
            config,
        }
    }

    /// Submit a withdrawal. The fee is computed exactly once, here. Eligible
    /// agents additionally receive their commission as a separate additive
    /// earning keyed by the request id, so a rail retry cannot double-pay it.
    pub async fn submit(
        &self,
        user_id: &str,
        amount: i64,
        method: PaymentMethod,
        details: serde_json::Value,
    ) -> Result<WithdrawalRequest> {
        if amount <= 0 {
            return Err(LedgerError::Validation(format!(
                "withdrawal amount must be positive, got {amount}"
            )));
        }

        let now = Utc::now();
        match self.guard.check(user_id, amount, now).await? {
            Eligibility::Eligible => {}
            Eligibility::Rejected(reason) => return Err(LedgerError::Rejected(reason)),
        }

        let fee = self.config.fee_schedule.fee_for(method, amount);
        let request = WithdrawalRequest::new(
            user_id,
            amount,
            self.config.currency.clone(),
            method,
            details,
            fee,
        );
        // The guard's weekly verdict can go stale under concurrent submits,
        // so the store re-checks the cap atomically with the reserve.
        let cap = WeeklyCap {
            limit: self.config.withdrawal_limits.weekly,
            week_start: week_start(now),
        };
        self.ledger
            .store()
            .reserve_withdrawal(&request, Some(cap))
            .await?;
        info!(
            user = %user_id,
            id = %request.id,
            amount,
            fee,
            method = method.as_str(),
            "withdrawal reserved"
        );
        self.ledger.announce(user_id, "withdrawal".to_string()).await;

        self.credit_agent_commission(&request).await;
        Ok(request)
    }

    /// Payment rail picked the request up.
    pub async fn begin_processing(&self, id: Uuid) -> Result<WithdrawalRequest> {
        let request = self.ledger.store().begin_processing(id).await?;
        info!(id = %id, user = %request.user_id, "withdrawal processing");
        Ok(request)
    }

    /// Terminal rail callback: completed moves the reserved amount into
    /// `total_withdrawn`, failed restores it to `available`.
    pub async fn finalize(&self, id: Uuid, outcome: WithdrawalOutcome) -> Result<WithdrawalRequest> {
        let request = self.ledger.store().finalize_withdrawal(id, outcome).await?;
        info!(
            id = %id,
            user = %request.user_id,
            status = request.status.as_str(),
            "withdrawal finalized"
        );
        self.ledger
            .announce(&request.user_id, "withdrawal".to_string())
            .await;
        Ok(request)
    }

    /// Best effort: a failed commission credit is logged and never blocks
    /// the withdrawal it rides on.
    async fn credit_agent_commission(&self, request: &WithdrawalRequest) {
        let commission = match self
            .tiers
            .calculate_withdrawal_commission(&request.user_id, request.amount)
            .await
        {
            Ok(commission) => commission,
            Err(err) => {
                warn!(user = %request.user_id, error = %err, "commission calculation failed");
                return;
            }
        };
        if commission.amount <= 0 {
            return;
        }

        let tier_id = commission.tier_id.unwrap_or_default();
        let earning = NewEarning {
            user_id: request.user_id.clone(),
            kind: EarningKind::AgentWithdrawalCommission,
            amount: commission.amount,
            currency: request.currency.clone(),
            description: format!("{tier_id} agent withdrawal commission"),
            metadata: serde_json::json!({
                "withdrawal_id": request.id,
                "withdrawal_amount": request.amount,
                "rate": commission.rate,
            }),
            idempotency_key: IdempotencyKey::AgentWithdrawalCommission {
                withdrawal_id: request.id,
            },
        };
        if let Err(err) = self.ledger.add_earnings(earning).await {
            warn!(
                user = %request.user_id,
                id = %request.id,
                error = %err,
                "agent withdrawal commission credit failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::error::RejectionReason;
    use ledger_core::notify::NoopNotifier;
    use ledger_core::storage::{CreditOutcome, LedgerStore};
    use ledger_core::types::WithdrawalStatus;
    use ledger_store::MemoryLedgerStore;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        processor: WithdrawalProcessor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        // Room above the default weekly cap so the larger scenarios exercise
        // fees and commissions rather than the cap.
        let mut config = RewardsConfig::default();
        config.withdrawal_limits.weekly = 100_000;
        let config = Arc::new(config);
        let ledger = Arc::new(EarningsLedger::new(
            store.clone(),
            Arc::new(NoopNotifier),
        ));
        let guard = WithdrawalEligibilityGuard::new(store.clone(), config.clone());
        let tiers = AgentTierEngine::new(store.clone(), config.clone());
        let processor = WithdrawalProcessor::new(ledger, guard, tiers, config);
        Fixture { store, processor }
    }

    async fn fund(store: &MemoryLedgerStore, user: &str, amount: i64) {
        store
            .credit_earning(NewEarning {
                user_id: user.to_string(),
                kind: EarningKind::Task,
                amount,
                currency: "USD".to_string(),
                description: String::new(),
                metadata: serde_json::json!({}),
                idempotency_key: IdempotencyKey::External(format!("seed:{user}:{amount}")),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn submit_reserves_and_computes_fee_once() {
        let f = fixture();
        fund(&f.store, "u1", 30_000).await;

        let request = f
            .processor
            .submit("u1", 20_000, PaymentMethod::Paypal, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(request.fee_amount, 500);
        assert_eq!(request.status, WithdrawalStatus::Pending);

        let balance = f.store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 10_000);
        assert_eq!(balance.pending, 20_000);
    }

    #[tokio::test]
    async fn rejection_propagates_and_leaves_no_trace() {
        let f = fixture();
        fund(&f.store, "u1", 400).await;

        let err = f
            .processor
            .submit("u1", 400, PaymentMethod::Paypal, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(RejectionReason::BelowMinimum { .. })
        ));
        let balance = f.store.balance("u1").await.unwrap();
        assert_eq!(balance.available, 400);
        assert_eq!(balance.pending, 0);
    }

    #[tokio::test]
    async fn eligible_agent_gets_additive_commission() {
        let f = fixture();
        // Silver agent: 20% withdrawal commission.
        f.store.set_agent("agent", true).await.unwrap();
        for i in 0..1_000 {
            f.store
                .record_referral("agent", &format!("r{i}"))
                .await
                .unwrap();
        }
        fund(&f.store, "agent", 50_000).await;

        let request = f
            .processor
            .submit("agent", 20_000, PaymentMethod::Crypto, serde_json::json!({}))
            .await
            .unwrap();

        // The withdrawal itself reserves 20_000; the commission lands as a
        // fresh earning on top (total = amount + commission).
        let balance = f.store.balance("agent").await.unwrap();
        assert_eq!(balance.pending, 20_000);
        assert_eq!(balance.available, 50_000 - 20_000 + 4_000);

        let history = f.store.list_earnings("agent", 10, 0).await.unwrap();
        let commission = history
            .iter()
            .find(|e| e.kind == EarningKind::AgentWithdrawalCommission)
            .unwrap();
        assert_eq!(commission.amount, 4_000);
        assert_eq!(
            commission.idempotency_key,
            format!("agent-withdrawal:{}", request.id)
        );
    }

    #[tokio::test]
    async fn five_percent_commission_on_200_dollars_is_10_dollars() {
        let f = fixture();
        // A custom tier table places this agent at a 5% withdrawal rate.
        let mut config = RewardsConfig::default();
        config.withdrawal_limits.weekly = 100_000;
        config.agent_tiers = vec![ledger_core::types::AgentTier::new(
            "partner", "Partner", 10, 0.0, 0.05, false, true,
        )];
        let config = Arc::new(config);
        let ledger = Arc::new(EarningsLedger::new(
            f.store.clone(),
            Arc::new(NoopNotifier),
        ));
        let guard = WithdrawalEligibilityGuard::new(f.store.clone(), config.clone());
        let tiers = AgentTierEngine::new(f.store.clone(), config.clone());
        let processor = WithdrawalProcessor::new(ledger, guard, tiers, config);

        f.store.set_agent("agent", true).await.unwrap();
        for i in 0..10 {
            f.store
                .record_referral("agent", &format!("r{i}"))
                .await
                .unwrap();
        }
        fund(&f.store, "agent", 50_000).await;

        processor
            .submit("agent", 20_000, PaymentMethod::BankTransfer, serde_json::json!({}))
            .await
            .unwrap();

        let history = f.store.list_earnings("agent", 10, 0).await.unwrap();
        let commission = history
            .iter()
            .find(|e| e.kind == EarningKind::AgentWithdrawalCommission)
            .unwrap();
        assert_eq!(commission.amount, 1_000);
    }

    #[tokio::test]
    async fn non_agent_gets_no_commission() {
        let f = fixture();
        fund(&f.store, "u1", 30_000).await;
        f.processor
            .submit("u1", 10_000, PaymentMethod::Paypal, serde_json::json!({}))
            .await
            .unwrap();
        let history = f.store.list_earnings("u1", 10, 0).await.unwrap();
        assert!(history
            .iter()
            .all(|e| e.kind != EarningKind::AgentWithdrawalCommission));
    }

    #[tokio::test]
    async fn finalize_completes_the_lifecycle() {
        let f = fixture();
        fund(&f.store, "u1", 30_000).await;
        let request = f
            .processor
            .submit("u1", 10_000, PaymentMethod::Paypal, serde_json::json!({}))
            .await
            .unwrap();

        f.processor.begin_processing(request.id).await.unwrap();
        let done = f
            .processor
            .finalize(
                request.id,
                WithdrawalOutcome::Completed {
                    gateway_reference: "pp-123".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, WithdrawalStatus::Completed);

        let balance = f.store.balance("u1").await.unwrap();
        assert_eq!(balance.total_withdrawn, 10_000);
        assert_eq!(
            balance.available + balance.pending,
            balance.total_earned - balance.total_withdrawn
        );

        // A second terminal callback is rejected, not re-applied.
        let err = f
            .processor
            .finalize(
                request.id,
                WithdrawalOutcome::Failed {
                    reason: "late".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn zero_amount_is_validation_not_rejection() {
        let f = fixture();
        let err = f
            .processor
            .submit("u1", 0, PaymentMethod::Paypal, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_commission_key_cannot_double_pay() {
        let f = fixture();
        f.store.set_agent("agent", true).await.unwrap();
        for i in 0..1_000 {
            f.store
                .record_referral("agent", &format!("r{i}"))
                .await
                .unwrap();
        }
        fund(&f.store, "agent", 50_000).await;

        let request = f
            .processor
            .submit("agent", 10_000, PaymentMethod::Paypal, serde_json::json!({}))
            .await
            .unwrap();

        // Simulate an internal retry of the commission credit.
        let ledger = EarningsLedger::new(f.store.clone(), Arc::new(NoopNotifier));
        let retry = ledger
            .add_earnings(NewEarning {
                user_id: "agent".to_string(),
                kind: EarningKind::AgentWithdrawalCommission,
                amount: 2_000,
                currency: "USD".to_string(),
                description: String::new(),
                metadata: serde_json::json!({}),
                idempotency_key: IdempotencyKey::AgentWithdrawalCommission {
                    withdrawal_id: request.id,
                },
            })
            .await
            .unwrap();
        assert!(matches!(retry, CreditOutcome::Duplicate(_)));
    }
}
