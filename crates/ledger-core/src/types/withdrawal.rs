use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment rails a withdrawal can target. The fee table is keyed by these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paypal,
    BankTransfer,
    Crypto,
    MobileMoney,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
            Self::Crypto => "crypto",
            Self::MobileMoney => "mobile_money",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paypal" => Ok(Self::Paypal),
            "bank_transfer" => Ok(Self::BankTransfer),
            "crypto" => Ok(Self::Crypto),
            "mobile_money" => Ok(Self::MobileMoney),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Fee schedule entry: electronic rails charge a percentage, bank transfer a
/// flat amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRule {
    Percent(f64),
    Flat(i64),
}

impl FeeRule {
    pub fn apply(&self, amount: i64) -> i64 {
        match self {
            Self::Percent(rate) => (amount as f64 * rate).round() as i64,
            Self::Flat(fee) => *fee,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Transitions are monotonic: pending may advance, terminal states never
    /// regress.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Processing | Self::Completed | Self::Failed),
            Self::Processing => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown withdrawal status: {other}")),
        }
    }
}

/// A withdrawal request record. The fee is computed exactly once, at
/// submission; the payment rail later finalizes the terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_details: serde_json::Value,
    pub fee_amount: i64,
    pub status: WithdrawalStatus,
    pub gateway_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    pub fn new(
        user_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
        payment_method: PaymentMethod,
        payment_details: serde_json::Value,
        fee_amount: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            payment_method,
            payment_details,
            fee_amount,
            status: WithdrawalStatus::Pending,
            gateway_reference: None,
            failure_reason: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}
