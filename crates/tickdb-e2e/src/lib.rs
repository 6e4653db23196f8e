//! # tickdb-e2e
//!
//! End-to-end testing framework for TickDB.
//!
//! ## Design Philosophy
//!
//! 1. **Simple**: Scripts are written the way the binary reads them
//! 2. **Declarative**: Tests describe outcomes, not event plumbing
//! 3. **Isolated**: Each simulation owns a fresh coordinator
//!
//! ## Usage
//!
//! ```ignore
//! cargo test -p tickdb-e2e
//! ```

mod harness;

pub use harness::{EventAssertions, Simulation};

/// Test result
pub type E2EResult<T> = Result<T, E2EError>;

/// E2E test errors
#[derive(Debug, thiserror::Error)]
pub enum E2EError {
    /// Script line the parser refused
    #[error("script error: {0}")]
    Script(#[from] tickdb_types::ScriptError),

    /// Bad site or variable name in a query
    #[error("invalid name: {0}")]
    Name(#[from] tickdb_primitives::PrimitiveError),

    /// Site does not hold a copy of the variable
    #[error("site {site} does not host {var}")]
    NotHosted {
        /// Queried site
        site: tickdb_primitives::SiteId,
        /// Queried variable
        var: tickdb_primitives::VarId,
    },
}
