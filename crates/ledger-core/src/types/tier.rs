use serde::{Deserialize, Serialize};

/// One row of the ordered agent tier table (externally configured data).
///
/// A user's tier is the highest row whose `min_direct_referrals` threshold
/// their direct-referral count meets. Rates are fractions, not percents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTier {
    pub tier_id: String,
    pub display_name: String,
    pub min_direct_referrals: i64,
    pub weekly_bonus_rate: f64,
    pub withdrawal_commission_rate: f64,
    /// Lowest tiers only: rewards ramp-up agents on their weekly earnings.
    pub weekly_bonus_eligible: bool,
    /// Higher tiers only: additive bonus on each withdrawal.
    pub withdrawal_commission_eligible: bool,
}

impl AgentTier {
    pub fn new(
        tier_id: &str,
        display_name: &str,
        min_direct_referrals: i64,
        weekly_bonus_rate: f64,
        withdrawal_commission_rate: f64,
        weekly_bonus_eligible: bool,
        withdrawal_commission_eligible: bool,
    ) -> Self {
        Self {
            tier_id: tier_id.to_string(),
            display_name: display_name.to_string(),
            min_direct_referrals,
            weekly_bonus_rate,
            withdrawal_commission_rate,
            weekly_bonus_eligible,
            withdrawal_commission_eligible,
        }
    }
}
