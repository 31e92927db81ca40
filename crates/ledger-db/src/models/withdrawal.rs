use crate::DatabaseError;
use chrono::{DateTime, Utc};
use ledger_core::types::{PaymentMethod, WithdrawalRequest, WithdrawalStatus};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for the withdrawal_requests table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWithdrawal {
    pub id: Uuid,
    pub user_id: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub payment_details: serde_json::Value,
    pub fee_amount: i64,
    pub status: String,
    pub gateway_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbWithdrawal> for WithdrawalRequest {
    type Error = DatabaseError;

    fn try_from(row: DbWithdrawal) -> Result<Self, Self::Error> {
        let payment_method: PaymentMethod = row
            .payment_method
            .parse()
            .map_err(DatabaseError::Serialization)?;
        let status: WithdrawalStatus = row
            .status
            .parse()
            .map_err(DatabaseError::Serialization)?;
        Ok(WithdrawalRequest {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            currency: row.currency,
            payment_method,
            payment_details: row.payment_details,
            fee_amount: row.fee_amount,
            status,
            gateway_reference: row.gateway_reference,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}
