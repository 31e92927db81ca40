use crate::types::{Balance, EarningKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbound balance-changed notification for dashboards. Published after the
/// store operation commits, never inside it; delivery is fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChangedEvent {
    pub user_id: String,
    pub available: i64,
    pub pending: i64,
    pub total_earned: i64,
    pub total_withdrawn: i64,
    pub currency: String,
    /// What triggered the change ("task", "withdrawal", ...).
    pub trigger: String,
    pub timestamp: DateTime<Utc>,
}

impl BalanceChangedEvent {
    pub fn from_balance(balance: &Balance, trigger: impl Into<String>) -> Self {
        Self {
            user_id: balance.user_id.clone(),
            available: balance.available,
            pending: balance.pending,
            total_earned: balance.total_earned,
            total_withdrawn: balance.total_withdrawn,
            currency: balance.currency.clone(),
            trigger: trigger.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn earning_trigger(kind: EarningKind) -> String {
        kind.as_str().to_string()
    }
}

/// Downstream consumer seam for balance-changed events. Implementations must
/// not block the caller on delivery; errors are theirs to log and swallow.
#[async_trait]
pub trait BalanceNotifier: Send + Sync {
    async fn balance_changed(&self, event: BalanceChangedEvent);
}

/// Drops every event. Used when no Redis is configured and in tests.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl BalanceNotifier for NoopNotifier {
    async fn balance_changed(&self, _event: BalanceChangedEvent) {}
}
