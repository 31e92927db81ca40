use chrono::{DateTime, Utc};
use ledger_core::types::Balance;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the balances table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbBalance {
    pub user_id: String,
    pub available: i64,
    pub pending: i64,
    pub total_earned: i64,
    pub total_withdrawn: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl From<DbBalance> for Balance {
    fn from(row: DbBalance) -> Self {
        Balance {
            user_id: row.user_id,
            available: row.available,
            pending: row.pending,
            total_earned: row.total_earned,
            total_withdrawn: row.total_withdrawn,
            currency: row.currency,
            updated_at: row.updated_at,
        }
    }
}
