use crate::error::Result;
use crate::types::{
    Balance, EarningEntry, EarningKind, IdempotencyKey, ReferralChain, WithdrawalRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A not-yet-persisted earning event.
#[derive(Debug, Clone)]
pub struct NewEarning {
    pub user_id: String,
    pub kind: EarningKind,
    /// Minor currency units; must be positive.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub idempotency_key: IdempotencyKey,
}

/// Result of an atomic credit attempt.
#[derive(Debug, Clone)]
pub enum CreditOutcome {
    /// The entry was inserted and the balance incremented.
    Applied(EarningEntry),
    /// An entry with the same idempotency key already exists; nothing was
    /// re-applied.
    Duplicate(EarningEntry),
}

impl CreditOutcome {
    pub fn entry(&self) -> &EarningEntry {
        match self {
            Self::Applied(entry) | Self::Duplicate(entry) => entry,
        }
    }
}

/// Terminal outcome reported by the payment rail.
#[derive(Debug, Clone)]
pub enum WithdrawalOutcome {
    Completed { gateway_reference: String },
    Failed { reason: String },
}

/// Weekly withdrawal cap, re-checked atomically with the reserve so two
/// racing submissions cannot jointly exceed it.
#[derive(Debug, Clone, Copy)]
pub struct WeeklyCap {
    pub limit: i64,
    pub week_start: DateTime<Utc>,
}

/// The transactional data store behind the ledger. Both implementations
/// (Postgres, in-memory) guarantee per-user atomicity: balance rows are only
/// ever mutated through atomic increment/decrement primitives, and
/// `credit_earning` applies the entry insert and the balance increment as one
/// unit. Operations on different users carry no ordering guarantees.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically insert the earning entry and credit `available` and
    /// `total_earned`, creating the balance row if absent. A duplicate
    /// idempotency key is detected, not re-applied.
    async fn credit_earning(&self, earning: NewEarning) -> Result<CreditOutcome>;

    /// Current balance, materializing a zeroed record on first access.
    async fn balance(&self, user_id: &str) -> Result<Balance>;

    /// Earning history, newest first.
    async fn list_earnings(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EarningEntry>>;

    /// Sum of earnings at/after `since`, excluding the given kinds.
    async fn sum_earnings_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        exclude: &[EarningKind],
    ) -> Result<i64>;

    /// Up to three ancestor referrers for a user.
    async fn referral_chain(&self, user_id: &str) -> Result<ReferralChain>;

    /// Record a direct referral edge (referrer -> referred).
    async fn record_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()>;

    async fn direct_referral_count(&self, user_id: &str) -> Result<i64>;

    async fn is_agent(&self, user_id: &str) -> Result<bool>;

    async fn set_agent(&self, user_id: &str, agent: bool) -> Result<()>;

    async fn update_agent_tier(&self, user_id: &str, tier_id: &str) -> Result<()>;

    /// User ids of all flagged agents (weekly sweep input).
    async fn list_agents(&self) -> Result<Vec<String>>;

    /// Atomically persist a pending withdrawal request and move its amount
    /// from `available` to `pending`. Fails with the insufficient-balance
    /// rejection if a concurrent spend won the race, or with the weekly-limit
    /// rejection if `cap` is given and the request would breach it; nothing
    /// is persisted in either case.
    async fn reserve_withdrawal(
        &self,
        request: &WithdrawalRequest,
        cap: Option<WeeklyCap>,
    ) -> Result<()>;

    /// Sum of withdrawal amounts with status in {pending, processing,
    /// completed} created at/after `week_start`.
    async fn weekly_withdrawn(&self, user_id: &str, week_start: DateTime<Utc>) -> Result<i64>;

    async fn withdrawal(&self, id: Uuid) -> Result<Option<WithdrawalRequest>>;

    /// Pending -> processing, rejecting non-monotonic transitions.
    async fn begin_processing(&self, id: Uuid) -> Result<WithdrawalRequest>;

    /// Apply the terminal outcome and the matching balance move: completed
    /// shifts pending into `total_withdrawn`, failed restores pending to
    /// `available`. Rejects transitions out of a terminal status.
    async fn finalize_withdrawal(
        &self,
        id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<WithdrawalRequest>;
}
