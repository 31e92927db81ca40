use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ledger_core::types::{EarningEntry, EarningKind};

/// Append-only earning log with a unique-key index. `by_key` is the
/// idempotency constraint: insertion goes through its entry lock, so exactly
/// one of two racing writers with the same key wins.
#[derive(Debug, Default)]
pub struct EarningTable {
    by_key: DashMap<String, EarningEntry>,
    by_user: DashMap<String, Vec<EarningEntry>>,
}

impl EarningTable {
    pub fn new() -> Self {
        Self {
            by_key: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    /// Insert unless the idempotency key is already taken. Returns the
    /// existing entry on a duplicate.
    pub fn insert(&self, entry: EarningEntry) -> Result<EarningEntry, EarningEntry> {
        match self.by_key.entry(entry.idempotency_key.clone()) {
            Entry::Occupied(existing) => Err(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                self.by_user
                    .entry(entry.user_id.clone())
                    .or_default()
                    .push(entry.clone());
                Ok(entry)
            }
        }
    }

    /// Newest-first page of a user's history.
    pub fn list(&self, user_id: &str, limit: i64, offset: i64) -> Vec<EarningEntry> {
        let Some(entries) = self.by_user.get(user_id) else {
            return Vec::new();
        };
        let mut page: Vec<EarningEntry> = entries.clone();
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()
    }

    pub fn sum_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        exclude: &[EarningKind],
    ) -> i64 {
        let Some(entries) = self.by_user.get(user_id) else {
            return 0;
        };
        entries
            .iter()
            .filter(|e| e.created_at >= since && !exclude.contains(&e.kind))
            .map(|e| e.amount)
            .sum()
    }
}
