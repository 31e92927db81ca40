mod cascade;
mod eligibility;
mod ledger;
mod rewards;
mod tiers;
mod weekly;
mod withdrawal;

pub use cascade::{CommissionCascadeProcessor, CommissionPayout};
pub use eligibility::{Eligibility, WithdrawalEligibilityGuard};
pub use ledger::EarningsLedger;
pub use rewards::{AdEngagement, RewardEngine};
pub use tiers::{AgentTierEngine, WeeklyCommission, WithdrawalCommission};
pub use weekly::{WeeklyBonusRunner, WeeklySweepReport};
pub use withdrawal::WithdrawalProcessor;
