use crate::{AgentTierEngine, EarningsLedger};
use chrono::{DateTime, Utc};
use ledger_core::config::RewardsConfig;
use ledger_core::error::Result;
use ledger_core::storage::{CreditOutcome, NewEarning};
use ledger_core::types::{week_start, EarningKind, IdempotencyKey};
use std::sync::Arc;
use tracing::{info, warn};

/// What a sweep did. `bonuses_credited` counts fresh credits only; re-running
/// the sweep in the same week leaves it at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WeeklySweepReport {
    pub agents_processed: usize,
    pub bonuses_credited: usize,
    pub total_amount: i64,
}

/// The scheduled weekly bonus sweep: for each agent, sum the current week's
/// earnings net of previous bonuses and commissions, and credit the
/// tier-rated bonus once per calendar week.
#[derive(Clone)]
pub struct WeeklyBonusRunner {
    ledger: Arc<EarningsLedger>,
    tiers: AgentTierEngine,
    config: Arc<RewardsConfig>,
}

/// Bonus kinds never compound into the next bonus.
const SWEEP_EXCLUDED: [EarningKind; 2] = [
    EarningKind::AgentWeeklyBonus,
    EarningKind::AgentWithdrawalCommission,
];

impl WeeklyBonusRunner {
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

    /// Run the sweep for the week containing `now`. Per-agent failures are
    /// logged and skipped; the sweep always completes.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<WeeklySweepReport> {
        let week = week_start(now);
        let agents = self.ledger.store().list_agents().await?;
        let mut report = WeeklySweepReport {
            agents_processed: agents.len(),
            ..Default::default()
        };

        for user_id in &agents {
            match self.sweep_agent(user_id, week).await {
                Ok(Some(amount)) => {
                    report.bonuses_credited += 1;
                    report.total_amount += amount;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(user = %user_id, error = %err, "weekly bonus skipped");
                }
            }
        }

        info!(
            agents = report.agents_processed,
            credited = report.bonuses_credited,
            total = report.total_amount,
            "weekly bonus sweep finished"
        );
        Ok(report)
    }

    async fn sweep_agent(&self, user_id: &str, week: DateTime<Utc>) -> Result<Option<i64>> {
        let earnings = self
            .ledger
            .store()
            .sum_earnings_since(user_id, week, &SWEEP_EXCLUDED)
            .await?;
        let Some(commission) = self
            .tiers
            .calculate_weekly_commission(user_id, earnings)
            .await?
        else {
            return Ok(None);
        };

        let outcome = self
            .ledger
            .add_earnings(NewEarning {
                user_id: user_id.to_string(),
                kind: EarningKind::AgentWeeklyBonus,
                amount: commission.amount,
                currency: self.config.currency.clone(),
                description: format!("{} weekly performance bonus", commission.tier_id),
                metadata: serde_json::json!({
                    "tier": commission.tier_id,
                    "rate": commission.rate,
                    "weekly_earnings": earnings,
                }),
                idempotency_key: IdempotencyKey::AgentWeeklyBonus {
                    user: user_id.to_string(),
                    week_start: week.date_naive(),
                },
            })
            .await?;

        match outcome {
            CreditOutcome::Applied(entry) => Ok(Some(entry.amount)),
            CreditOutcome::Duplicate(_) => Ok(None),
        }
    }
}
