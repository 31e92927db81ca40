use ledger_core::config::RewardsConfig;
use ledger_core::error::Result;
use ledger_core::storage::LedgerStore;
use ledger_core::types::AgentTier;
use std::sync::Arc;
use tracing::info;

/// A weekly performance bonus for an eligible agent.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyCommission {
    pub tier_id: String,
    pub rate: f64,
    pub amount: i64,
}

/// Additive withdrawal commission. `amount` is zero when the user is not an
/// eligible agent; ineligibility is not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalCommission {
    pub tier_id: Option<String>,
    pub rate: f64,
    pub amount: i64,
}

impl WithdrawalCommission {
    pub fn none() -> Self {
        Self {
            tier_id: None,
            rate: 0.0,
            amount: 0,
        }
    }
}

/// Rate applied to a cent amount, rounded to the nearest cent.
fn apply_rate(base: i64, rate: f64) -> i64 {
    (base as f64 * rate).round() as i64
}

/// Tier classification and the two tier-dependent commission calculations.
/// The calculations are side-effect free; callers move the money.
#[derive(Clone)]
pub struct AgentTierEngine {
    store: Arc<dyn LedgerStore>,
    config: Arc<RewardsConfig>,
}

impl AgentTierEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<RewardsConfig>) -> Self {
        Self { store, config }
    }

    /// Highest tier whose direct-referral threshold is met; `None` below the
    /// lowest. Relies on the validated ascending tier order.
    pub fn classify(&self, direct_referrals: i64) -> Option<&AgentTier> {
        self.config
            .agent_tiers
            .iter()
            .rev()
            .find(|tier| direct_referrals >= tier.min_direct_referrals)
    }

    /// Reclassify after direct-referral growth and persist the tier id.
    /// No money moves here.
    pub async fn record_direct_referral_growth(
        &self,
        user_id: &str,
        direct_referrals: i64,
    ) -> Result<Option<AgentTier>> {
        if !self.store.is_agent(user_id).await? {
            return Ok(None);
        }
        let Some(tier) = self.classify(direct_referrals).cloned() else {
            return Ok(None);
        };
        self.store.update_agent_tier(user_id, &tier.tier_id).await?;
        info!(
            user = %user_id,
            tier = %tier.tier_id,
            direct_referrals,
            "agent tier recorded"
        );
        Ok(Some(tier))
    }

    /// Weekly bonus for an agent: `None` unless the user is an agent in a
    /// weekly-bonus-eligible tier with positive earnings for the week.
    pub async fn calculate_weekly_commission(
        &self,
        user_id: &str,
        weekly_earnings: i64,
    ) -> Result<Option<WeeklyCommission>> {
        if weekly_earnings <= 0 || !self.store.is_agent(user_id).await? {
            return Ok(None);
        }
        let count = self.store.direct_referral_count(user_id).await?;
        let Some(tier) = self.classify(count) else {
            return Ok(None);
        };
        if !tier.weekly_bonus_eligible {
            return Ok(None);
        }
        Ok(Some(WeeklyCommission {
            tier_id: tier.tier_id.clone(),
            rate: tier.weekly_bonus_rate,
            amount: apply_rate(weekly_earnings, tier.weekly_bonus_rate),
        }))
    }

    /// Additive commission on a withdrawal amount. Zero for non-agents and
    /// ineligible tiers.
    pub async fn calculate_withdrawal_commission(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<WithdrawalCommission> {
        if !self.store.is_agent(user_id).await? {
            return Ok(WithdrawalCommission::none());
        }
        let count = self.store.direct_referral_count(user_id).await?;
        let Some(tier) = self.classify(count) else {
            return Ok(WithdrawalCommission::none());
        };
        if !tier.withdrawal_commission_eligible {
            return Ok(WithdrawalCommission::none());
        }
        Ok(WithdrawalCommission {
            tier_id: Some(tier.tier_id.clone()),
            rate: tier.withdrawal_commission_rate,
            amount: apply_rate(amount, tier.withdrawal_commission_rate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::MemoryLedgerStore;

    fn engine(store: Arc<MemoryLedgerStore>) -> AgentTierEngine {
        AgentTierEngine::new(store, Arc::new(RewardsConfig::default()))
    }

    async fn refer(store: &MemoryLedgerStore, referrer: &str, count: usize) {
        for i in 0..count {
            store
                .record_referral(referrer, &format!("{referrer}-ref-{i}"))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn classification_boundaries() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        let tiers = engine(store);

        assert!(tiers.classify(49).is_none());
        assert_eq!(tiers.classify(50).unwrap().tier_id, "rookie");
        assert_eq!(tiers.classify(199).unwrap().tier_id, "bronze");
        assert_eq!(tiers.classify(400).unwrap().tier_id, "steel");
        assert_eq!(tiers.classify(1_000_000).unwrap().tier_id, "diamond");
    }

    #[tokio::test]
    async fn weekly_commission_requires_eligible_tier() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        store.set_agent("iron-agent", true).await.unwrap();
        refer(&store, "iron-agent", 200).await;
        store.set_agent("steel-agent", true).await.unwrap();
        refer(&store, "steel-agent", 400).await;

        let tiers = engine(store);
        let iron = tiers
            .calculate_weekly_commission("iron-agent", 10_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(iron.tier_id, "iron");
        assert_eq!(iron.amount, 1_000);

        // Steel is in the gap: no weekly bonus, no withdrawal commission.
        assert!(tiers
            .calculate_weekly_commission("steel-agent", 10_000)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            tiers
                .calculate_withdrawal_commission("steel-agent", 10_000)
                .await
                .unwrap(),
            WithdrawalCommission::none()
        );
    }

    #[tokio::test]
    async fn weekly_commission_skips_non_agents_and_zero_weeks() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        refer(&store, "big-referrer", 200).await;
        let tiers = engine(store);

        assert!(tiers
            .calculate_weekly_commission("big-referrer", 10_000)
            .await
            .unwrap()
            .is_none());

        // Agent, but nothing earned this week.
        tiers.store.set_agent("quiet", true).await.unwrap();
        assert!(tiers
            .calculate_weekly_commission("quiet", 0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn withdrawal_commission_for_silver_agent() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        store.set_agent("silver-agent", true).await.unwrap();
        refer(&store, "silver-agent", 1_000).await;

        let tiers = engine(store);
        let commission = tiers
            .calculate_withdrawal_commission("silver-agent", 20_000)
            .await
            .unwrap();
        assert_eq!(commission.tier_id.as_deref(), Some("silver"));
        assert_eq!(commission.amount, 4_000);
    }

    #[tokio::test]
    async fn growth_persists_tier_for_agents_only() {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        store.set_agent("a1", true).await.unwrap();
        let tiers = engine(store);

        let tier = tiers
            .record_direct_referral_growth("a1", 120)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tier.tier_id, "bronze");

        assert!(tiers
            .record_direct_referral_growth("not-agent", 120)
            .await
            .unwrap()
            .is_none());
    }
}
