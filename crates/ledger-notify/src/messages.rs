use chrono::Utc;
use ledger_core::notify::BalanceChangedEvent;
use serde::{Deserialize, Serialize};

/// Balance update message published to a user's balance channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceMessage {
    pub user_id: String,
    pub available: i64,
    pub pending: i64,
    pub total_earned: i64,
    pub total_withdrawn: i64,
    pub currency: String,
    pub trigger: String,
    pub timestamp: i64,
}

impl From<&BalanceChangedEvent> for BalanceMessage {
    fn from(event: &BalanceChangedEvent) -> Self {
        Self {
            user_id: event.user_id.clone(),
            available: event.available,
            pending: event.pending,
            total_earned: event.total_earned,
            total_withdrawn: event.total_withdrawn,
            currency: event.currency.clone(),
            trigger: event.trigger.clone(),
            timestamp: event.timestamp.timestamp_millis(),
        }
    }
}

/// Stream message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessage {
    pub channel: String,
    pub data: String, // JSON stringified payload
    pub source: String,
    pub timestamp: i64,
}

impl StreamMessage {
    pub fn new(channel: String, data: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            channel,
            data: serde_json::to_string(&data)?,
            source: "rewards-ledger".to_string(),
            timestamp: Utc::now().timestamp_millis(),
        })
    }
}
