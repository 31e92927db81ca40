use crate::DatabaseError;
use chrono::{DateTime, Utc};
use ledger_core::types::{EarningEntry, EarningKind};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for the earnings table. `kind` is stored as its canonical
/// string; decoding rejects unknown values rather than guessing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbEarning {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbEarning> for EarningEntry {
    type Error = DatabaseError;

    fn try_from(row: DbEarning) -> Result<Self, Self::Error> {
        let kind: EarningKind = row
            .kind
            .parse()
            .map_err(DatabaseError::Serialization)?;
        Ok(EarningEntry {
            id: row.id,
            user_id: row.user_id,
            kind,
            amount: row.amount,
            currency: row.currency,
            description: row.description,
            metadata: row.metadata,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}
