use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user balance record. All amounts are minor currency units (cents).
///
/// Invariant: `available + pending == total_earned - total_withdrawn` at
/// every observable point; both `available` and `pending` stay non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: String,
    pub available: i64,
    pub pending: i64,
    pub total_earned: i64,
    pub total_withdrawn: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Zeroed record, materialized lazily on a user's first earning or read.
    pub fn zeroed(user_id: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            available: 0,
            pending: 0,
            total_earned: 0,
            total_withdrawn: 0,
            currency: currency.into(),
            updated_at: Utc::now(),
        }
    }
}
