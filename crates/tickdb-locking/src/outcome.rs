//! Lock request outcomes

use tickdb_primitives::{Timestamp, TxId};

/// Transaction asking for a lock
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    /// Transaction id
    pub id: TxId,
    /// Age used by wait-die
    pub timestamp: Timestamp,
}

impl Requester {
    /// Create a requester
    pub fn new(id: TxId, timestamp: Timestamp) -> Self {
        Self { id, timestamp }
    }
}

/// Answer of one site to one lock request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// The site is down
    SiteDown,
    /// The site does not host the variable
    VariableNotFound,
    /// The copy is not readable yet (recovering replica)
    VariableUnavailable,
    /// The requester already holds a sufficient lock
    AlreadyHeld,
    /// The lock can be installed
    Granted,
    /// Requester is younger than a conflicting holder and must die
    Abort {
        /// Conflicting holders older than the requester
        older: Vec<TxId>,
    },
    /// Requester is older than every conflicting holder and may wait
    Block {
        /// Conflicting holders, all younger than the requester
        younger: Vec<TxId>,
    },
}

impl LockOutcome {
    /// Routing outcomes: the caller should try the next replica
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            LockOutcome::SiteDown | LockOutcome::VariableNotFound | LockOutcome::VariableUnavailable
        )
    }

    /// The requester may proceed at this site
    pub fn is_grant(&self) -> bool {
        matches!(self, LockOutcome::AlreadyHeld | LockOutcome::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classes() {
        assert!(LockOutcome::SiteDown.is_skip());
        assert!(LockOutcome::VariableNotFound.is_skip());
        assert!(LockOutcome::VariableUnavailable.is_skip());
        assert!(LockOutcome::Granted.is_grant());
        assert!(LockOutcome::AlreadyHeld.is_grant());

        let abort = LockOutcome::Abort { older: vec![] };
        let block = LockOutcome::Block { younger: vec![] };
        for decisive in [abort, block] {
            assert!(!decisive.is_skip());
            assert!(!decisive.is_grant());
        }
    }
}
