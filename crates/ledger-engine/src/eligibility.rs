use chrono::{DateTime, Utc};
use ledger_core::config::RewardsConfig;
use ledger_core::error::{RejectionReason, Result};
use ledger_core::storage::LedgerStore;
use ledger_core::types::week_start;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a withdrawal eligibility check. A rejection is data, not an
/// error: the caller decides whether to surface it as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Rejected(RejectionReason),
}

/// Ordered, short-circuiting withdrawal rules: minimum, maximum, available
/// balance, rolling weekly cap. The week starts Sunday 00:00 UTC.
#[derive(Clone)]
pub struct WithdrawalEligibilityGuard {
    store: Arc<dyn LedgerStore>,
    config: Arc<RewardsConfig>,
}

impl WithdrawalEligibilityGuard {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<RewardsConfig>) -> Self {
        Self { store, config }
    }

    pub async fn check(
        &self,
        user_id: &str,
        requested: i64,
        now: DateTime<Utc>,
    ) -> Result<Eligibility> {
        let limits = &self.config.withdrawal_limits;

        if requested < limits.min {
            return Ok(Eligibility::Rejected(RejectionReason::BelowMinimum {
                minimum: limits.min,
                requested,
            }));
        }
        if requested > limits.max {
            return Ok(Eligibility::Rejected(RejectionReason::AboveMaximum {
                maximum: limits.max,
                requested,
            }));
        }

        let balance = self.store.balance(user_id).await?;
        if balance.available < requested {
            return Ok(Eligibility::Rejected(RejectionReason::InsufficientBalance {
                available: balance.available,
                requested,
            }));
        }

        let used = self.store.weekly_withdrawn(user_id, week_start(now)).await?;
        if used + requested > limits.weekly {
            return Ok(Eligibility::Rejected(RejectionReason::WeeklyLimitExceeded {
                limit: limits.weekly,
                used,
                requested,
            }));
        }

        debug!(user = %user_id, requested, used, "withdrawal eligible");
        Ok(Eligibility::Eligible)
    }
}
