use dashmap::DashMap;
use ledger_core::types::ReferralChain;

/// Direct referral edges (referred -> referrer) plus per-referrer counts.
/// The chain view walks at most three hops, so cyclic edges are harmless.
#[derive(Debug, Default)]
pub struct ReferralGraph {
    referrer_of: DashMap<String, String>,
    direct_counts: DashMap<String, i64>,
}

impl ReferralGraph {
    pub fn new() -> Self {
        Self {
            referrer_of: DashMap::new(),
            direct_counts: DashMap::new(),
        }
    }

    /// Record a direct edge. Re-recording the same referred user replaces the
    /// edge without double counting.
    pub fn record(&self, referrer_id: &str, referred_id: &str) {
        let previous = self
            .referrer_of
            .insert(referred_id.to_string(), referrer_id.to_string());
        if previous.as_deref() == Some(referrer_id) {
            return;
        }
        if let Some(old) = previous {
            if let Some(mut count) = self.direct_counts.get_mut(&old) {
                *count -= 1;
            }
        }
        *self
            .direct_counts
            .entry(referrer_id.to_string())
            .or_insert(0) += 1;
    }

    pub fn direct_count(&self, user_id: &str) -> i64 {
        self.direct_counts.get(user_id).map(|c| *c).unwrap_or(0)
    }

    /// Up to three ancestors of a user, truncated at the first gap.
    pub fn chain(&self, user_id: &str) -> ReferralChain {
        let level1 = self.referrer_of.get(user_id).map(|r| r.clone());
        let level2 = level1
            .as_deref()
            .and_then(|u| self.referrer_of.get(u).map(|r| r.clone()));
        let level3 = level2
            .as_deref()
            .and_then(|u| self.referrer_of.get(u).map(|r| r.clone()));
        ReferralChain {
            level1,
            level2,
            level3,
        }
    }
}

/// Flagged agents and their current tier.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    tiers: DashMap<String, Option<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            tiers: DashMap::new(),
        }
    }

    pub fn set_agent(&self, user_id: &str, agent: bool) {
        if agent {
            self.tiers.entry(user_id.to_string()).or_insert(None);
        } else {
            self.tiers.remove(user_id);
        }
    }

    pub fn is_agent(&self, user_id: &str) -> bool {
        self.tiers.contains_key(user_id)
    }

    pub fn set_tier(&self, user_id: &str, tier_id: &str) {
        self.tiers
            .insert(user_id.to_string(), Some(tier_id.to_string()));
    }

    pub fn all(&self) -> Vec<String> {
        self.tiers.iter().map(|e| e.key().clone()).collect()
    }
}
