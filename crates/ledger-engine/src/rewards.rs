use crate::EarningsLedger;
use chrono::{DateTime, Utc};
use ledger_core::config::RewardsConfig;
use ledger_core::error::Result;
use ledger_core::storage::{CreditOutcome, NewEarning};
use ledger_core::types::{
    ActivityKind, AdKind, EarningKind, IdempotencyKey, SocialPlatform, TaskKind,
};
use std::sync::Arc;

/// How far the user engaged with an ad. The reward rate is the ad class's;
/// the engagement only picks the recorded kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdEngagement {
    View,
    Click,
    Complete,
}

impl AdEngagement {
    fn kind(&self) -> EarningKind {
        match self {
            Self::View => EarningKind::AdView,
            Self::Click => EarningKind::AdClick,
            Self::Complete => EarningKind::AdComplete,
        }
    }
}

/// Maps reward events to configured amounts and structural idempotency keys,
/// then hands them to the ledger. The only place rate tables are consulted
/// for non-commission earnings.
#[derive(Clone)]
pub struct RewardEngine {
    ledger: Arc<EarningsLedger>,
    config: Arc<RewardsConfig>,
}

/// Weekly streak bonuses scale with the streak length, capped here.
const MAX_STREAK_MULTIPLIER: u32 = 10;

impl RewardEngine {
    pub fn new(ledger: Arc<EarningsLedger>, config: Arc<RewardsConfig>) -> Self {
        Self { ledger, config }
    }

    pub async fn process_task_reward(
        &self,
        user_id: &str,
        task_id: &str,
        kind: TaskKind,
    ) -> Result<CreditOutcome> {
        let amount = self.config.task_rewards.amount(kind);
        self.ledger
            .add_earnings(NewEarning {
                user_id: user_id.to_string(),
                kind: EarningKind::Task,
                amount,
                currency: self.config.currency.clone(),
                description: format!("{kind:?} task completed"),
                metadata: serde_json::json!({ "task_id": task_id }),
                idempotency_key: IdempotencyKey::Task {
                    task_id: task_id.to_string(),
                    user: user_id.to_string(),
                },
            })
            .await
    }

    pub async fn process_ad_reward(
        &self,
        user_id: &str,
        ad_id: &str,
        ad: AdKind,
        engagement: AdEngagement,
    ) -> Result<CreditOutcome> {
        let amount = self.config.ad_rates.amount(ad);
        self.ledger
            .add_earnings(NewEarning {
                user_id: user_id.to_string(),
                kind: engagement.kind(),
                amount,
                currency: self.config.currency.clone(),
                description: format!("{ad:?} ad engagement"),
                metadata: serde_json::json!({ "ad_id": ad_id }),
                idempotency_key: IdempotencyKey::AdView {
                    ad_id: ad_id.to_string(),
                    user: user_id.to_string(),
                },
            })
            .await
    }

    pub async fn process_social_reward(
        &self,
        user_id: &str,
        platform: SocialPlatform,
    ) -> Result<CreditOutcome> {
        let amount = self.config.social_rewards.amount(platform);
        self.ledger
            .add_earnings(NewEarning {
                user_id: user_id.to_string(),
                kind: EarningKind::SocialBonus,
                amount,
                currency: self.config.currency.clone(),
                description: format!("{} follow bonus", platform.as_str()),
                metadata: serde_json::json!({ "platform": platform.as_str() }),
                idempotency_key: IdempotencyKey::Social {
                    platform,
                    user: user_id.to_string(),
                },
            })
            .await
    }

    /// Activity bonuses are daily-keyed. The weekly streak bonus scales with
    /// the streak length, capped at 10x.
    pub async fn process_activity_bonus(
        &self,
        user_id: &str,
        kind: ActivityKind,
        streak: u32,
        now: DateTime<Utc>,
    ) -> Result<CreditOutcome> {
        let base = self.config.activity_bonuses.amount(kind);
        let amount = match kind {
            ActivityKind::WeeklyStreak => {
                base * i64::from(streak.clamp(1, MAX_STREAK_MULTIPLIER))
            }
            ActivityKind::DailyLogin | ActivityKind::MonthlyGoal => base,
        };
        self.ledger
            .add_earnings(NewEarning {
                user_id: user_id.to_string(),
                kind: EarningKind::ActivityBonus,
                amount,
                currency: self.config.currency.clone(),
                description: format!("{} bonus", kind.as_str()),
                metadata: serde_json::json!({ "activity": kind.as_str(), "streak": streak }),
                idempotency_key: IdempotencyKey::Activity {
                    kind,
                    user: user_id.to_string(),
                    date: now.date_naive(),
                },
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::notify::NoopNotifier;
    use ledger_store::MemoryLedgerStore;

    fn engine() -> RewardEngine {
        let store = Arc::new(MemoryLedgerStore::new("USD"));
        let ledger = Arc::new(EarningsLedger::new(store, Arc::new(NoopNotifier)));
        RewardEngine::new(ledger, Arc::new(RewardsConfig::default()))
    }

    #[tokio::test]
    async fn task_rewards_follow_the_rate_table() {
        let engine = engine();
        let outcome = engine
            .process_task_reward("u1", "t1", TaskKind::Expert)
            .await
            .unwrap();
        assert_eq!(outcome.entry().amount, 250);
        assert_eq!(outcome.entry().kind, EarningKind::Task);
    }

    #[tokio::test]
    async fn repeated_task_event_credits_once() {
        let engine = engine();
        engine
            .process_task_reward("u1", "t1", TaskKind::Basic)
            .await
            .unwrap();
        let second = engine
            .process_task_reward("u1", "t1", TaskKind::Basic)
            .await
            .unwrap();
        assert!(matches!(second, CreditOutcome::Duplicate(_)));

        let balance = engine.ledger.balance("u1").await.unwrap();
        assert_eq!(balance.available, 50);
    }

    #[tokio::test]
    async fn weekly_streak_scales_and_caps() {
        let engine = engine();
        let now = Utc::now();
        let outcome = engine
            .process_activity_bonus("u1", ActivityKind::WeeklyStreak, 4, now)
            .await
            .unwrap();
        assert_eq!(outcome.entry().amount, 100);

        let capped = engine
            .process_activity_bonus("u2", ActivityKind::WeeklyStreak, 25, now)
            .await
            .unwrap();
        assert_eq!(capped.entry().amount, 250);
    }

    #[tokio::test]
    async fn daily_login_is_keyed_per_day() {
        let engine = engine();
        let now = Utc::now();
        engine
            .process_activity_bonus("u1", ActivityKind::DailyLogin, 1, now)
            .await
            .unwrap();
        let same_day = engine
            .process_activity_bonus("u1", ActivityKind::DailyLogin, 1, now)
            .await
            .unwrap();
        assert!(matches!(same_day, CreditOutcome::Duplicate(_)));

        let next_day = engine
            .process_activity_bonus("u1", ActivityKind::DailyLogin, 1, now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert!(matches!(next_day, CreditOutcome::Applied(_)));
    }
}
