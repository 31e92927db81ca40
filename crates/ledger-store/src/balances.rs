use chrono::Utc;
use dashmap::DashMap;
use ledger_core::types::Balance;
use tracing::debug;

/// Thread-safe per-user balance table. All mutations go through the entry
/// API, which serializes concurrent updates to the same user's row.
#[derive(Debug, Default)]
pub struct BalanceTable {
    balances: DashMap<String, Balance>,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    /// Current balance, materializing a zeroed row on first access.
    pub fn get_or_create(&self, user_id: &str, currency: &str) -> Balance {
        self.balances
            .entry(user_id.to_string())
            .or_insert_with(|| Balance::zeroed(user_id, currency))
            .clone()
    }

    /// Atomic earning credit: available += amount, total_earned += amount.
    pub fn credit(&self, user_id: &str, amount: i64, currency: &str) -> Balance {
        let mut balance = self
            .balances
            .entry(user_id.to_string())
            .or_insert_with(|| Balance::zeroed(user_id, currency));
        balance.available += amount;
        balance.total_earned += amount;
        balance.updated_at = Utc::now();
        debug!(
            user = user_id,
            amount,
            available = balance.available,
            total_earned = balance.total_earned,
            "balance credited"
        );
        balance.clone()
    }

    /// Atomic available -> pending move for a withdrawal reservation.
    /// Returns `Err(available)` without mutating when funds are short.
    pub fn reserve(&self, user_id: &str, amount: i64, currency: &str) -> Result<Balance, i64> {
        let mut balance = self
            .balances
            .entry(user_id.to_string())
            .or_insert_with(|| Balance::zeroed(user_id, currency));
        if balance.available < amount {
            return Err(balance.available);
        }
        balance.available -= amount;
        balance.pending += amount;
        balance.updated_at = Utc::now();
        Ok(balance.clone())
    }

    /// Settle a reserved amount: completed moves pending into
    /// `total_withdrawn`, failed restores it to `available`.
    pub fn settle(&self, user_id: &str, amount: i64, completed: bool, currency: &str) -> Balance {
        let mut balance = self
            .balances
            .entry(user_id.to_string())
            .or_insert_with(|| Balance::zeroed(user_id, currency));
        balance.pending -= amount;
        if completed {
            balance.total_withdrawn += amount;
        } else {
            balance.available += amount;
        }
        balance.updated_at = Utc::now();
        balance.clone()
    }
}
