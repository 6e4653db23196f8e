//! Error types for site lock authorities

use thiserror::Error;
use tickdb_primitives::{SiteId, VarId};

/// Lock authority errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// `fail` on a site that is already down
    #[error("site {0} is already down")]
    SiteAlreadyDown(SiteId),

    /// `recover` on a site that is already up
    #[error("site {0} is already up")]
    SiteAlreadyUp(SiteId),

    /// Lock installation for a variable the site does not host
    #[error("variable {var} is not hosted at site {site}")]
    VariableNotHosted {
        /// Site asked
        site: SiteId,
        /// Variable requested
        var: VarId,
    },
}

/// Result type for lock authority operations
pub type LockResult<T> = Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let site = SiteId::new(3).unwrap();
        assert_eq!(LockError::SiteAlreadyDown(site).to_string(), "site 3 is already down");
        assert_eq!(LockError::SiteAlreadyUp(site).to_string(), "site 3 is already up");

        let err = LockError::VariableNotHosted {
            site,
            var: VarId::indexed(1),
        };
        assert!(err.to_string().contains("x1"));
    }
}
