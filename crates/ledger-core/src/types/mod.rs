mod balance;
mod earning;
mod referral;
mod tier;
mod withdrawal;

pub use balance::Balance;
pub use earning::{
    ActivityKind, AdKind, EarningEntry, EarningKind, IdempotencyKey, SocialPlatform, TaskKind,
};
pub use referral::{ReferralChain, ReferralLevel};
pub use tier::AgentTier;
pub use withdrawal::{FeeRule, PaymentMethod, WithdrawalRequest, WithdrawalStatus};

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Start of the current calendar week (Sunday 00:00) in UTC, the fixed
/// reference timezone for the rolling withdrawal limit.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_into_week = now.weekday().num_days_from_sunday() as i64;
    let sunday = now.date_naive() - Duration::days(days_into_week);
    Utc.from_utc_datetime(&sunday.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}
