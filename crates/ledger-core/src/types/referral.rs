use crate::types::EarningKind;
use serde::{Deserialize, Serialize};

/// Referral depth relative to the activating user. The cascade never walks
/// further than L3, which also bounds cyclic referral graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralLevel {
    L1,
    L2,
    L3,
}

impl ReferralLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::L3 => "l3",
        }
    }

    pub fn kind(&self) -> EarningKind {
        match self {
            Self::L1 => EarningKind::ReferralL1,
            Self::L2 => EarningKind::ReferralL2,
            Self::L3 => EarningKind::ReferralL3,
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            Self::L1 => 1,
            Self::L2 => 2,
            Self::L3 => 3,
        }
    }
}

/// Up to three ancestor referrers for a user. Absence at any level truncates
/// the chain; the view never errors on a short or cyclic graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralChain {
    pub level1: Option<String>,
    pub level2: Option<String>,
    pub level3: Option<String>,
}

impl ReferralChain {
    /// Present levels in ascending depth order.
    pub fn levels(&self) -> impl Iterator<Item = (ReferralLevel, &str)> {
        [
            (ReferralLevel::L1, self.level1.as_deref()),
            (ReferralLevel::L2, self.level2.as_deref()),
            (ReferralLevel::L3, self.level3.as_deref()),
        ]
        .into_iter()
        .filter_map(|(level, user)| user.map(|u| (level, u)))
    }

    pub fn is_empty(&self) -> bool {
        self.level1.is_none() && self.level2.is_none() && self.level3.is_none()
    }
}
