use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ledger_core::types::{WithdrawalRequest, WithdrawalStatus};
use uuid::Uuid;

/// Withdrawal request table. Status transitions are decided under the
/// per-request entry lock, so two racing finalizers see a single winner.
#[derive(Debug, Default)]
pub struct WithdrawalTable {
    by_id: DashMap<Uuid, WithdrawalRequest>,
    by_user: DashMap<String, Vec<Uuid>>,
}

impl WithdrawalTable {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    pub fn insert(&self, request: WithdrawalRequest) {
        self.by_user
            .entry(request.user_id.clone())
            .or_default()
            .push(request.id);
        self.by_id.insert(request.id, request);
    }

    /// Insert unless the request would push the user's weekly total over
    /// `limit`. The check and the insert happen under the user's id-list
    /// entry lock, so racing inserts for the same user serialize. Returns
    /// `Err(used)` without inserting when the cap would be breached.
    pub fn try_insert_capped(
        &self,
        request: WithdrawalRequest,
        limit: i64,
        week_start: DateTime<Utc>,
    ) -> Result<(), i64> {
        let mut ids = self.by_user.entry(request.user_id.clone()).or_default();
        let used: i64 = ids
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .filter(|r| counts_against_cap(r, week_start))
            .map(|r| r.amount)
            .sum();
        if used + request.amount > limit {
            return Err(used);
        }
        ids.push(request.id);
        self.by_id.insert(request.id, request);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<WithdrawalRequest> {
        self.by_id.get(&id).map(|r| r.clone())
    }

    /// Advance a request to `next` if the transition is monotonic. Returns
    /// the updated record, or `Err` with the current status.
    pub fn transition(
        &self,
        id: Uuid,
        next: WithdrawalStatus,
        apply: impl FnOnce(&mut WithdrawalRequest),
    ) -> Option<Result<WithdrawalRequest, WithdrawalStatus>> {
        let mut request = self.by_id.get_mut(&id)?;
        if !request.status.can_transition_to(next) {
            return Some(Err(request.status));
        }
        request.status = next;
        apply(&mut request);
        Some(Ok(request.clone()))
    }

    /// Sum of amounts counted against the weekly cap: pending, processing and
    /// completed requests created at/after `week_start`. Failed requests
    /// release their allowance.
    pub fn weekly_total(&self, user_id: &str, week_start: DateTime<Utc>) -> i64 {
        let Some(ids) = self.by_user.get(user_id) else {
            return 0;
        };
        ids.iter()
            .filter_map(|id| self.by_id.get(id))
            .filter(|r| counts_against_cap(r, week_start))
            .map(|r| r.amount)
            .sum()
    }
}

fn counts_against_cap(request: &WithdrawalRequest, week_start: DateTime<Utc>) -> bool {
    request.created_at >= week_start
        && matches!(
            request.status,
            WithdrawalStatus::Pending | WithdrawalStatus::Processing | WithdrawalStatus::Completed
        )
}
