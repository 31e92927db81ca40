use crate::{AgentTierEngine, EarningsLedger};
use ledger_core::config::RewardsConfig;
use ledger_core::error::Result;
use ledger_core::storage::{CreditOutcome, NewEarning};
use ledger_core::types::{IdempotencyKey, ReferralLevel};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One commission actually credited by an activation cascade.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommissionPayout {
    pub level: ReferralLevel,
    pub payee: String,
    pub amount: i64,
}

/// Walks a new user's referral chain on activation and credits each present
/// level its flat commission. Levels are isolated: one failed credit is
/// logged and the rest of the cascade still runs. The walk is bounded to
/// three hops by the chain view itself.
#[derive(Clone)]
pub struct CommissionCascadeProcessor {
    ledger: Arc<EarningsLedger>,
    tiers: AgentTierEngine,
    config: Arc<RewardsConfig>,
}

impl CommissionCascadeProcessor {
    pub fn new(
        ledger: Arc<EarningsLedger>,
        tiers: AgentTierEngine,
        config: Arc<RewardsConfig>,
    ) -> Self {
        Self {
            ledger,
            tiers,
            config,
        }
    }

    /// Credit referral commissions for an activated user. Returns the
    /// payouts that were newly applied; duplicates and failed levels are
    /// absent from the result.
    pub async fn process_activation(
        &self,
        new_user_id: &str,
        activation_amount: i64,
    ) -> Result<Vec<CommissionPayout>> {
        let chain = self.ledger.store().referral_chain(new_user_id).await?;
        if chain.is_empty() {
            debug!(user = %new_user_id, "activation without referrers");
            return Ok(Vec::new());
        }

        let mut payouts = Vec::new();
        for (level, payee) in chain.levels() {
            let amount = self.config.referral_rates.amount(level);
            let earning = NewEarning {
                user_id: payee.to_string(),
                kind: level.kind(),
                amount,
                currency: self.config.currency.clone(),
                description: format!("level {} referral commission", level.depth()),
                metadata: serde_json::json!({
                    "referred_user": new_user_id,
                    "activation_amount": activation_amount,
                }),
                idempotency_key: IdempotencyKey::Referral {
                    level,
                    referred_user: new_user_id.to_string(),
                },
            };

            match self.ledger.add_earnings(earning).await {
                Ok(CreditOutcome::Applied(entry)) => {
                    payouts.push(CommissionPayout {
                        level,
                        payee: payee.to_string(),
                        amount: entry.amount,
                    });
                    if level == ReferralLevel::L1 {
                        self.record_growth(payee).await;
                    }
                }
                Ok(CreditOutcome::Duplicate(_)) => {
                    debug!(
                        payee = %payee,
                        level = level.depth(),
                        "referral commission already credited"
                    );
                }
                // One bad level must not starve the others.
                Err(err) => {
                    warn!(
                        payee = %payee,
                        level = level.depth(),
                        error = %err,
                        "referral commission failed, continuing cascade"
                    );
                }
            }
        }

        info!(
            user = %new_user_id,
            payouts = payouts.len(),
            total = payouts.iter().map(|p| p.amount).sum::<i64>(),
            "activation cascade processed"
        );
        Ok(payouts)
    }

    /// Direct-referral growth for the L1 payee; a tier change never moves
    /// money and never fails the cascade.
    async fn record_growth(&self, payee: &str) {
        let count = match self.ledger.store().direct_referral_count(payee).await {
            Ok(count) => count,
            Err(err) => {
                warn!(payee = %payee, error = %err, "referral count unavailable");
                return;
            }
        };
        if let Err(err) = self.tiers.record_direct_referral_growth(payee, count).await {
            warn!(payee = %payee, error = %err, "agent tier update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use ledger_core::error::LedgerError;
    use ledger_core::notify::NoopNotifier;
    use ledger_core::storage::{LedgerStore, WeeklyCap, WithdrawalOutcome};
    use ledger_core::types::{
        Balance, EarningEntry, EarningKind, ReferralChain, WithdrawalRequest,
    };
    use ledger_store::MemoryLedgerStore;
    use uuid::Uuid;

    /// Delegates to the in-memory store but refuses credits for one user.
    struct FailingStore {
        inner: MemoryLedgerStore,
        poisoned_user: String,
    }

    #[async_trait]
    impl LedgerStore for FailingStore {
        async fn credit_earning(
            &self,
            earning: NewEarning,
        ) -> ledger_core::error::Result<CreditOutcome> {
            if earning.user_id == self.poisoned_user {
                return Err(LedgerError::Persistence("row lock timeout".to_string()));
            }
            self.inner.credit_earning(earning).await
        }

        async fn balance(&self, user_id: &str) -> ledger_core::error::Result<Balance> {
            self.inner.balance(user_id).await
        }

        async fn list_earnings(
            &self,
            user_id: &str,
            limit: i64,
            offset: i64,
        ) -> ledger_core::error::Result<Vec<EarningEntry>> {
            self.inner.list_earnings(user_id, limit, offset).await
        }

        async fn sum_earnings_since(
            &self,
            user_id: &str,
            since: DateTime<Utc>,
            exclude: &[EarningKind],
        ) -> ledger_core::error::Result<i64> {
            self.inner.sum_earnings_since(user_id, since, exclude).await
        }

        async fn referral_chain(
            &self,
            user_id: &str,
        ) -> ledger_core::error::Result<ReferralChain> {
            self.inner.referral_chain(user_id).await
        }

        async fn record_referral(
            &self,
            referrer_id: &str,
            referred_id: &str,
        ) -> ledger_core::error::Result<()> {
            self.inner.record_referral(referrer_id, referred_id).await
        }

        async fn direct_referral_count(&self, user_id: &str) -> ledger_core::error::Result<i64> {
            self.inner.direct_referral_count(user_id).await
        }

        async fn is_agent(&self, user_id: &str) -> ledger_core::error::Result<bool> {
            self.inner.is_agent(user_id).await
        }

        async fn set_agent(&self, user_id: &str, agent: bool) -> ledger_core::error::Result<()> {
            self.inner.set_agent(user_id, agent).await
        }

        async fn update_agent_tier(
            &self,
            user_id: &str,
            tier_id: &str,
        ) -> ledger_core::error::Result<()> {
            self.inner.update_agent_tier(user_id, tier_id).await
        }

        async fn list_agents(&self) -> ledger_core::error::Result<Vec<String>> {
            self.inner.list_agents().await
        }

        async fn reserve_withdrawal(
            &self,
            request: &WithdrawalRequest,
            cap: Option<WeeklyCap>,
        ) -> ledger_core::error::Result<()> {
            self.inner.reserve_withdrawal(request, cap).await
        }

        async fn weekly_withdrawn(
            &self,
            user_id: &str,
            week_start: DateTime<Utc>,
        ) -> ledger_core::error::Result<i64> {
            self.inner.weekly_withdrawn(user_id, week_start).await
        }

        async fn withdrawal(
            &self,
            id: Uuid,
        ) -> ledger_core::error::Result<Option<WithdrawalRequest>> {
            self.inner.withdrawal(id).await
        }

        async fn begin_processing(
            &self,
            id: Uuid,
        ) -> ledger_core::error::Result<WithdrawalRequest> {
            self.inner.begin_processing(id).await
        }

        async fn finalize_withdrawal(
            &self,
            id: Uuid,
            outcome: WithdrawalOutcome,
        ) -> ledger_core::error::Result<WithdrawalRequest> {
            self.inner.finalize_withdrawal(id, outcome).await
        }
    }

    fn cascade(store: Arc<dyn LedgerStore>) -> CommissionCascadeProcessor {
        let config = Arc::new(RewardsConfig::default());
        let ledger = Arc::new(EarningsLedger::new(store.clone(), Arc::new(NoopNotifier)));
        let tiers = AgentTierEngine::new(store, config.clone());
        CommissionCascadeProcessor::new(ledger, tiers, config)
    }

    async fn seed_chain(store: &dyn LedgerStore) {
        // d referred c, c referred b, b referred a.
        store.record_referral("d", "c").await.unwrap();
        store.record_referral("c", "b").await.unwrap();
        store.record_referral("b", "a").await.unwrap();
    }

    #[tokio::test]
    async fn activation_credits_three_flat_levels() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        seed_chain(store.as_ref()).await;
        let cascade = cascade(store.clone());

        let payouts = cascade.process_activation("a", 999).await.unwrap();
        assert_eq!(payouts.len(), 3);
        assert_eq!(
            payouts[0],
            CommissionPayout {
                level: ReferralLevel::L1,
                payee: "b".to_string(),
                amount: 150,
            }
        );
        assert_eq!(payouts[1].amount, 100);
        assert_eq!(payouts[2].amount, 50);

        assert_eq!(store.balance("b").await.unwrap().available, 150);
        assert_eq!(store.balance("c").await.unwrap().available, 100);
        assert_eq!(store.balance("d").await.unwrap().available, 50);
        // The activation amount itself never moves through the cascade.
        assert_eq!(store.balance("a").await.unwrap().available, 0);
        assert_eq!(store.balance("d").await.unwrap().total_earned, 50);
    }

    #[tokio::test]
    async fn redelivered_activation_is_a_no_op() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        seed_chain(store.as_ref()).await;
        let cascade = cascade(store.clone());

        cascade.process_activation("a", 999).await.unwrap();
        let second = cascade.process_activation("a", 999).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.balance("b").await.unwrap().available, 150);
    }

    #[tokio::test]
    async fn failed_level_does_not_starve_the_others() {
        let store = Arc::new(FailingStore {
            inner: MemoryLedgerStore::new("USD"),
            poisoned_user: "c".to_string(),
        });
        seed_chain(store.as_ref()).await;
        let cascade = cascade(store.clone());

        let payouts = cascade.process_activation("a", 999).await.unwrap();
        let levels: Vec<ReferralLevel> = payouts.iter().map(|p| p.level).collect();
        assert_eq!(levels, vec![ReferralLevel::L1, ReferralLevel::L3]);
        assert_eq!(store.balance("b").await.unwrap().available, 150);
        assert_eq!(store.balance("c").await.unwrap().available, 0);
        assert_eq!(store.balance("d").await.unwrap().available, 50);
    }

    #[tokio::test]
    async fn cyclic_graph_is_bounded_to_three_hops() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        store.record_referral("a", "b").await.unwrap();
        store.record_referral("b", "a").await.unwrap();
        let cascade = cascade(store.clone());

        let payouts = cascade.process_activation("a", 0).await.unwrap();
        assert_eq!(payouts.len(), 3);
        // b is paid L1 and L3, a pays itself the L2 slot; nothing recurses.
        assert_eq!(store.balance("b").await.unwrap().available, 200);
        assert_eq!(store.balance("a").await.unwrap().available, 100);
    }

    #[tokio::test]
    async fn activation_without_referrers_pays_nobody() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        let cascade = cascade(store.clone());
        let payouts = cascade.process_activation("orphan", 100).await.unwrap();
        assert!(payouts.is_empty());
    }

    #[tokio::test]
    async fn l1_agent_growth_updates_tier() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        store.set_agent("b", true).await.unwrap();
        // 49 previous referrals; the activating one crosses the rookie line.
        for i in 0..49 {
            store
                .record_referral("b", &format!("prior-{i}"))
                .await
                .unwrap();
        }
        store.record_referral("b", "a").await.unwrap();
        let cascade = cascade(store.clone());

        cascade.process_activation("a", 0).await.unwrap();
        assert!(store.is_agent("b").await.unwrap());
        assert_eq!(store.direct_referral_count("b").await.unwrap(), 50);
    }
}
