use crate::error::{LedgerError, Result};
use crate::types::{
    ActivityKind, AdKind, AgentTier, FeeRule, PaymentMethod, ReferralLevel, SocialPlatform,
    TaskKind,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Flat per-activation commission for each referral level, in cents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReferralRates {
    pub l1: i64,
    pub l2: i64,
    pub l3: i64,
}

impl ReferralRates {
    pub fn amount(&self, level: ReferralLevel) -> i64 {
        match level {
            ReferralLevel::L1 => self.l1,
            ReferralLevel::L2 => self.l2,
            ReferralLevel::L3 => self.l3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskRewards {
    pub basic: i64,
    pub premium: i64,
    pub expert: i64,
}

impl TaskRewards {
    pub fn amount(&self, kind: TaskKind) -> i64 {
        match kind {
            TaskKind::Basic => self.basic,
            TaskKind::Premium => self.premium,
            TaskKind::Expert => self.expert,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdRates {
    pub basic: i64,
    pub premium: i64,
}

impl AdRates {
    pub fn amount(&self, kind: AdKind) -> i64 {
        match kind {
            AdKind::Basic => self.basic,
            AdKind::Premium => self.premium,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SocialRewards {
    pub telegram: i64,
    pub youtube: i64,
}

impl SocialRewards {
    pub fn amount(&self, platform: SocialPlatform) -> i64 {
        match platform {
            SocialPlatform::Telegram => self.telegram,
            SocialPlatform::Youtube => self.youtube,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivityBonuses {
    pub daily_login: i64,
    pub weekly_streak: i64,
    pub monthly_goal: i64,
}

impl ActivityBonuses {
    pub fn amount(&self, kind: ActivityKind) -> i64 {
        match kind {
            ActivityKind::DailyLogin => self.daily_login,
            ActivityKind::WeeklyStreak => self.weekly_streak,
            ActivityKind::MonthlyGoal => self.monthly_goal,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WithdrawalLimits {
    /// Minimum single withdrawal, cents.
    pub min: i64,
    /// Maximum single withdrawal, cents.
    pub max: i64,
    /// Rolling calendar-week cap, cents.
    pub weekly: i64,
}

/// Per-payment-method fee table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rules: HashMap<PaymentMethod, FeeRule>,
    /// Applied when a method has no explicit rule.
    pub default_rule: FeeRule,
}

impl FeeSchedule {
    pub fn fee_for(&self, method: PaymentMethod, amount: i64) -> i64 {
        self.rules
            .get(&method)
            .unwrap_or(&self.default_rule)
            .apply(amount)
    }
}

/// Immutable rate/limit configuration injected into each component at
/// construction. Hot reload means building components against a new value,
/// never mutating this one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_referral_rates")]
    pub referral_rates: ReferralRates,
    #[serde(default = "default_task_rewards")]
    pub task_rewards: TaskRewards,
    #[serde(default = "default_ad_rates")]
    pub ad_rates: AdRates,
    #[serde(default = "default_social_rewards")]
    pub social_rewards: SocialRewards,
    #[serde(default = "default_activity_bonuses")]
    pub activity_bonuses: ActivityBonuses,
    #[serde(default = "default_withdrawal_limits")]
    pub withdrawal_limits: WithdrawalLimits,
    #[serde(default = "default_fee_schedule")]
    pub fee_schedule: FeeSchedule,
    /// Ordered ascending by `min_direct_referrals`.
    #[serde(default = "default_agent_tiers")]
    pub agent_tiers: Vec<AgentTier>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_referral_rates() -> ReferralRates {
    ReferralRates {
        l1: 150,
        l2: 100,
        l3: 50,
    }
}

fn default_task_rewards() -> TaskRewards {
    TaskRewards {
        basic: 50,
        premium: 100,
        expert: 250,
    }
}

fn default_ad_rates() -> AdRates {
    AdRates { basic: 2, premium: 5 }
}

fn default_social_rewards() -> SocialRewards {
    SocialRewards {
        telegram: 25,
        youtube: 25,
    }
}

fn default_activity_bonuses() -> ActivityBonuses {
    ActivityBonuses {
        daily_login: 5,
        weekly_streak: 25,
        monthly_goal: 200,
    }
}

fn default_withdrawal_limits() -> WithdrawalLimits {
    WithdrawalLimits {
        min: 500,
        max: 50_000,
        weekly: 10_000,
    }
}

fn default_fee_schedule() -> FeeSchedule {
    let mut rules = HashMap::new();
    rules.insert(PaymentMethod::Paypal, FeeRule::Percent(0.025));
    rules.insert(PaymentMethod::BankTransfer, FeeRule::Flat(100));
    rules.insert(PaymentMethod::Crypto, FeeRule::Percent(0.01));
    rules.insert(PaymentMethod::MobileMoney, FeeRule::Percent(0.02));
    FeeSchedule {
        rules,
        default_rule: FeeRule::Percent(0.025),
    }
}

fn default_agent_tiers() -> Vec<AgentTier> {
    vec![
        AgentTier::new("rookie", "Rookie Agent", 50, 0.05, 0.0, true, false),
        AgentTier::new("bronze", "Bronze Agent", 100, 0.07, 0.0, true, false),
        AgentTier::new("iron", "Iron Agent", 200, 0.10, 0.0, true, false),
        AgentTier::new("steel", "Steel Agent", 400, 0.15, 0.15, false, false),
        AgentTier::new("silver", "Silver Agent", 1_000, 0.0, 0.20, false, true),
        AgentTier::new("gold", "Gold Agent", 5_000, 0.0, 0.25, false, true),
        AgentTier::new("platinum", "Platinum Agent", 10_000, 0.0, 0.30, false, true),
        AgentTier::new("diamond", "Diamond Agent", 25_000, 0.0, 0.35, false, true),
    ]
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            referral_rates: default_referral_rates(),
            task_rewards: default_task_rewards(),
            ad_rates: default_ad_rates(),
            social_rewards: default_social_rewards(),
            activity_bonuses: default_activity_bonuses(),
            withdrawal_limits: default_withdrawal_limits(),
            fee_schedule: default_fee_schedule(),
            agent_tiers: default_agent_tiers(),
        }
    }
}

impl RewardsConfig {
    /// Load rate tables from a JSON file. Missing sections fall back to the
    /// built-in defaults, so a partial override file is fine.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("cannot read rates file {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            LedgerError::Config(format!("cannot parse rates file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the `RATES_FILE` env var, or defaults when unset.
    pub fn load() -> Result<Self> {
        match env::var("RATES_FILE") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.withdrawal_limits.min <= 0
            || self.withdrawal_limits.max < self.withdrawal_limits.min
            || self.withdrawal_limits.weekly <= 0
        {
            return Err(LedgerError::Config(
                "withdrawal limits must satisfy 0 < min <= max and weekly > 0".to_string(),
            ));
        }
        let thresholds: Vec<i64> = self
            .agent_tiers
            .iter()
            .map(|t| t.min_direct_referrals)
            .collect();
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LedgerError::Config(
                "agent tiers must be strictly ascending by min_direct_referrals".to_string(),
            ));
        }
        Ok(())
    }
}
