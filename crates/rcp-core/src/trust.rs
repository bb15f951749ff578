//! Trust records (§3.1, §6.4). The store itself (persistence, locking)
//! lives in `rcp-source`; this is just the record shape shared with the
//! error taxonomy and reports.

use serde::{Deserialize, Serialize};

/// The three trust levels a creator identity can hold (§3.1, §6.4).
/// Transitions are restricted: `prompted -> trusted|blocked`, `trusted <->
/// blocked` (explicit), never `trusted -> prompted` (§6.4). Enforcing the
/// transition graph is the store's job (`rcp-source`); this type only
/// names the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Trusted,
    Blocked,
    Prompted,
}

impl TrustLevel {
    /// Whether moving from `self` to `next` is an allowed transition per
    /// §6.4's transition table.
    pub fn can_transition_to(self, next: TrustLevel) -> bool {
        use TrustLevel::*;
        matches!(
            (self, next),
            (Prompted, Trusted)
                | (Prompted, Blocked)
                | (Trusted, Blocked)
                | (Blocked, Trusted)
                | (Trusted, Trusted)
                | (Blocked, Blocked)
                | (Prompted, Prompted)
        )
    }
}

/// `(creator_id, trust_level, timestamp)` (§3.1), extended with
/// `last_updated` to match the persisted shape of §6.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    pub creator_id: String,
    pub level: TrustLevel,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl TrustRecord {
    pub fn new(creator_id: impl Into<String>, level: TrustLevel, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            creator_id: creator_id.into(),
            level,
            first_seen: now,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompted_can_resolve_to_trusted_or_blocked() {
        assert!(TrustLevel::Prompted.can_transition_to(TrustLevel::Trusted));
        assert!(TrustLevel::Prompted.can_transition_to(TrustLevel::Blocked));
    }

    #[test]
    fn trusted_never_reverts_to_prompted() {
        assert!(!TrustLevel::Trusted.can_transition_to(TrustLevel::Prompted));
        assert!(!TrustLevel::Blocked.can_transition_to(TrustLevel::Prompted));
    }

    #[test]
    fn trusted_and_blocked_are_explicitly_interchangeable() {
        assert!(TrustLevel::Trusted.can_transition_to(TrustLevel::Blocked));
        assert!(TrustLevel::Blocked.can_transition_to(TrustLevel::Trusted));
    }
}
