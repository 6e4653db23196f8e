//! # tickdb-locking
//!
//! Lock arbitration for TickDB sites.
//!
//! Every site owns a [`SiteLockAuthority`] that answers read/write lock
//! requests against its variable ledgers and performs the site-local half
//! of commit, abort, failure and recovery.
//!
//! Features:
//! - Shared read locks, exclusive write locks, read-to-write upgrade
//! - Wait-die deadlock avoidance: younger requesters die, older ones wait
//! - Routing outcomes (site down, not hosted, unavailable) for replica selection
//! - Fail clears every holder and reports what was released
//! - Recover marks replicated copies stale until their next commit

#![warn(missing_docs)]
#![warn(clippy::all)]

mod authority;
mod error;
mod outcome;
mod wait_die;

pub use authority::{LockEntry, ReleasedLock, SiteLockAuthority};
pub use error::{LockError, LockResult};
pub use outcome::{LockOutcome, Requester};
pub use wait_die::arbitrate;
