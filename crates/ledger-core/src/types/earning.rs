use crate::types::ReferralLevel;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of earning sources. Each entry in the ledger carries exactly
/// one of these; the reward-rate mapping matches on them exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningKind {
    ReferralL1,
    ReferralL2,
    ReferralL3,
    Task,
    AdView,
    AdClick,
    AdComplete,
    SocialBonus,
    ActivityBonus,
    AgentWeeklyBonus,
    AgentWithdrawalCommission,
}

impl EarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReferralL1 => "referral_l1",
            Self::ReferralL2 => "referral_l2",
            Self::ReferralL3 => "referral_l3",
            Self::Task => "task",
            Self::AdView => "ad_view",
            Self::AdClick => "ad_click",
            Self::AdComplete => "ad_complete",
            Self::SocialBonus => "social_bonus",
            Self::ActivityBonus => "activity_bonus",
            Self::AgentWeeklyBonus => "agent_weekly_bonus",
            Self::AgentWithdrawalCommission => "agent_withdrawal_commission",
        }
    }
}

impl std::str::FromStr for EarningKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referral_l1" => Ok(Self::ReferralL1),
            "referral_l2" => Ok(Self::ReferralL2),
            "referral_l3" => Ok(Self::ReferralL3),
            "task" => Ok(Self::Task),
            "ad_view" => Ok(Self::AdView),
            "ad_click" => Ok(Self::AdClick),
            "ad_complete" => Ok(Self::AdComplete),
            "social_bonus" => Ok(Self::SocialBonus),
            "activity_bonus" => Ok(Self::ActivityBonus),
            "agent_weekly_bonus" => Ok(Self::AgentWeeklyBonus),
            "agent_withdrawal_commission" => Ok(Self::AgentWithdrawalCommission),
            other => Err(format!("unknown earning kind: {other}")),
        }
    }
}

impl std::fmt::Display for EarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task difficulty classes and their configured rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Basic,
    Premium,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdKind {
    Basic,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Telegram,
    Youtube,
}

impl SocialPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Youtube => "youtube",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    DailyLogin,
    WeeklyStreak,
    MonthlyGoal,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLogin => "daily_login",
            Self::WeeklyStreak => "weekly_streak",
            Self::MonthlyGoal => "monthly_goal",
        }
    }
}

/// Structurally-typed idempotency key: event type plus the stable identifiers
/// of the logical event. Rendered to a canonical string for the store's
/// unique constraint. Keys deliberately contain no timestamps, so an
/// at-least-once redelivery of the same event maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdempotencyKey {
    Referral {
        level: ReferralLevel,
        referred_user: String,
    },
    Task {
        task_id: String,
        user: String,
    },
    AdView {
        ad_id: String,
        user: String,
    },
    Social {
        platform: SocialPlatform,
        user: String,
    },
    Activity {
        kind: ActivityKind,
        user: String,
        date: NaiveDate,
    },
    AgentWeeklyBonus {
        user: String,
        week_start: NaiveDate,
    },
    AgentWithdrawalCommission {
        withdrawal_id: Uuid,
    },
    /// Caller-supplied key for event sources outside the built-in set.
    External(String),
}

impl IdempotencyKey {
    pub fn canonical(&self) -> String {
        match self {
            Self::Referral { level, referred_user } => {
                format!("ref:{}:{}", level.as_str(), referred_user)
            }
            Self::Task { task_id, user } => format!("task:{}:{}", task_id, user),
            Self::AdView { ad_id, user } => format!("ad:{}:{}", ad_id, user),
            Self::Social { platform, user } => {
                format!("social:{}:{}", platform.as_str(), user)
            }
            Self::Activity { kind, user, date } => {
                format!("activity:{}:{}:{}", kind.as_str(), user, date)
            }
            Self::AgentWeeklyBonus { user, week_start } => {
                format!("agent-weekly:{}:{}", user, week_start)
            }
            Self::AgentWithdrawalCommission { withdrawal_id } => {
                format!("agent-withdrawal:{}", withdrawal_id)
            }
            Self::External(key) => key.clone(),
        }
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// One append-only ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningEntry {
    pub id: Uuid,
    pub user_id: String,
    pub kind: EarningKind,
    /// Minor currency units, always positive.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: serde_json::Value,
    /// Canonical form of the [`IdempotencyKey`]; globally unique.
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            EarningKind::ReferralL1,
            EarningKind::Task,
            EarningKind::AdComplete,
            EarningKind::AgentWithdrawalCommission,
        ] {
            assert_eq!(kind.as_str().parse::<EarningKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<EarningKind>().is_err());
    }

    #[test]
    fn referral_keys_depend_only_on_level_and_referred_user() {
        let a = IdempotencyKey::Referral {
            level: ReferralLevel::L1,
            referred_user: "user-9".into(),
        };
        let b = IdempotencyKey::Referral {
            level: ReferralLevel::L1,
            referred_user: "user-9".into(),
        };
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), "ref:l1:user-9");

        let other_level = IdempotencyKey::Referral {
            level: ReferralLevel::L2,
            referred_user: "user-9".into(),
        };
        assert_ne!(a.canonical(), other_level.canonical());
    }
}
