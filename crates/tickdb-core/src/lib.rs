//! # tickdb-core
//!
//! Concurrency control and recovery for TickDB.
//!
//! The [`Coordinator`] runs a script of transactional operations over ten
//! replicated sites, one tick per line, and reports what happened as a
//! stream of [`Event`]s.
//!
//! Features:
//! - Wait-die locking per variable copy
//! - Available-copies reads, writes to every up replica
//! - Read-only transactions served from a birth-time snapshot
//! - Site failure and recovery, with replicated copies unreadable after
//!   recovery until their next commit
//! - Blocked operations queued per transaction and retried every tick
//! - Commit only if every accessed site stayed up since its first access
//!
//! ## Architecture
//!
//! ```text
//! script line ──parse──▶ Operation ──submit──▶ Coordinator ──emit──▶ EventSink
//!                                                  │
//!                              ┌───────────────────┼───────────────────┐
//!                              ▼                   ▼                   ▼
//!                      SiteLockAuthority   SiteLockAuthority   ... (ten sites)
//!                              │
//!                       VariableLedger (committed value, holders)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod coordinator;
mod error;
mod event;
mod sink;
mod transaction;

pub use coordinator::Coordinator;
pub use error::Rejection;
pub use event::{AbortReason, BlockReason, Event, LockRow, ReadSource, SiteCheck};
pub use sink::EventSink;
pub use transaction::{Transaction, TxStatus};
