use crate::types::WithdrawalStatus;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Machine-readable withdrawal rejection. Amounts are minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    BelowMinimum { minimum: i64, requested: i64 },
    AboveMaximum { maximum: i64, requested: i64 },
    InsufficientBalance { available: i64, requested: i64 },
    WeeklyLimitExceeded { limit: i64, used: i64, requested: i64 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowMinimum { minimum, requested } => {
                write!(f, "requested {} is below the minimum of {}", requested, minimum)
            }
            Self::AboveMaximum { maximum, requested } => {
                write!(f, "requested {} is above the maximum of {}", requested, maximum)
            }
            Self::InsufficientBalance { available, requested } => {
                write!(f, "requested {} exceeds available balance of {}", requested, available)
            }
            Self::WeeklyLimitExceeded { limit, used, requested } => {
                write!(
                    f,
                    "requested {} exceeds the weekly limit of {} ({} already used)",
                    requested, limit, used
                )
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Withdrawal rejected: {0}")]
    Rejected(RejectionReason),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(Uuid),

    #[error("Invalid status transition for withdrawal {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
