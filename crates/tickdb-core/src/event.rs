//! Events emitted by the coordinator
//!
//! Event kinds are the output contract; their text rendering is what the
//! transcript shows and their JSON form is what tooling consumes.

use crate::error::Rejection;
use serde::Serialize;
use std::fmt;
use tickdb_locking::LockEntry;
use tickdb_primitives::{SiteId, Tick, Timestamp, TxId, Value, VarId};
use tickdb_storage::LockMode;

/// Something the coordinator did or refused to do
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Echo of an operation about to run
    Operation {
        /// Tick it runs at
        tick: Tick,
        /// Literal text
        text: String,
    },
    /// Operation dropped with a diagnostic
    Rejected {
        /// Why
        reason: Rejection,
    },
    /// Transaction registered
    TransactionBegun {
        /// Transaction
        tx: TxId,
        /// Birth time
        timestamp: Timestamp,
        /// Read-only flag
        read_only: bool,
    },
    /// Replica skipped because its site is down
    SiteDown {
        /// Site
        site: SiteId,
        /// Variable being routed
        var: VarId,
    },
    /// Replica skipped because the site does not host the variable
    VariableNotFound {
        /// Site
        site: SiteId,
        /// Variable being routed
        var: VarId,
    },
    /// Replica skipped because the copy is not readable yet
    VariableUnavailable {
        /// Site
        site: SiteId,
        /// Variable being routed
        var: VarId,
    },
    /// The transaction already held a sufficient lock
    LockAlreadyHeld {
        /// Transaction
        tx: TxId,
        /// Variable
        var: VarId,
        /// Site
        site: SiteId,
        /// Lock direction
        mode: LockMode,
        /// Value read (read) or buffered (write)
        value: Value,
    },
    /// A new lock was installed
    LockGranted {
        /// Transaction
        tx: TxId,
        /// Variable
        var: VarId,
        /// Site
        site: SiteId,
        /// Lock direction
        mode: LockMode,
        /// Value read (read) or buffered (write)
        value: Value,
    },
    /// A replicated write could not lock this extra copy
    ReplicaSkipped {
        /// Transaction
        tx: TxId,
        /// Variable
        var: VarId,
        /// Site
        site: SiteId,
    },
    /// Read served without touching a site
    ValueRead {
        /// Transaction
        tx: TxId,
        /// Variable
        var: VarId,
        /// Value returned
        value: Value,
        /// Where it came from
        source: ReadSource,
    },
    /// Read-only read of a variable missing from the snapshot
    SnapshotMiss {
        /// Transaction
        tx: TxId,
        /// Variable
        var: VarId,
    },
    /// Transaction must wait
    Blocked {
        /// Transaction
        tx: TxId,
        /// Operation that blocked
        op: String,
        /// What it waits for
        reason: BlockReason,
    },
    /// Operation appended behind a blocked one
    Queued {
        /// Transaction
        tx: TxId,
        /// Operation text
        op: String,
    },
    /// Queued operation of a kind that cannot be retried
    QueuedOperationDropped {
        /// Transaction
        tx: TxId,
        /// Operation text
        op: String,
    },
    /// Transaction aborted and removed
    Aborted {
        /// Transaction
        tx: TxId,
        /// Why
        reason: AbortReason,
    },
    /// Status of every site the transaction touched, checked before commit
    CommitCheck {
        /// Transaction
        tx: TxId,
        /// One entry per accessed site
        sites: Vec<SiteCheck>,
    },
    /// Transaction committed and removed
    Committed {
        /// Transaction
        tx: TxId,
        /// Sites where writes were applied
        sites: Vec<SiteId>,
    },
    /// Site went down
    SiteFailed {
        /// Site
        site: SiteId,
        /// Tick of the failure
        tick: Tick,
        /// Locks dropped
        released: usize,
    },
    /// Site came back
    SiteRecovered {
        /// Site
        site: SiteId,
    },
    /// `fail` of a down site
    SiteAlreadyDown {
        /// Site
        site: SiteId,
    },
    /// `recover` of an up site
    SiteAlreadyUp {
        /// Site
        site: SiteId,
    },
    /// Lock holders at one up site
    LockTable {
        /// Site
        site: SiteId,
        /// Locked variables in dump order
        entries: Vec<LockRow>,
    },
    /// Committed values at one up site
    Dump {
        /// Site
        site: SiteId,
        /// `(variable, value)` in dump order
        values: Vec<(VarId, Value)>,
    },
    /// `dump(i)` of a down site
    DumpUnavailable {
        /// Site
        site: SiteId,
    },
}

/// Source of a read that did not take a lock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    /// The transaction's own uncommitted write
    Buffered,
    /// Read-only snapshot taken at birth
    Snapshot,
}

/// What a blocked transaction waits for
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// Younger holders at the first decisive site
    Conflict {
        /// Site
        site: SiteId,
        /// Variable
        var: VarId,
        /// Holders it waits for
        younger: Vec<TxId>,
    },
    /// No up site hosts a usable copy
    NoAvailableCopy {
        /// Variable
        var: VarId,
    },
    /// Snapshot value exists but no up site can serve the variable yet
    SnapshotUnavailable {
        /// Variable
        var: VarId,
    },
}

/// Why a transaction was aborted
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Requester younger than a conflicting holder
    WaitDie {
        /// Site of the conflict
        site: SiteId,
        /// Variable
        var: VarId,
        /// Older holders
        older: Vec<TxId>,
    },
    /// An accessed site failed after the first access
    SiteFailure {
        /// Invalid sites
        sites: Vec<SiteId>,
    },
}

/// One accessed site as seen by the commit-validity check
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteCheck {
    /// Site
    pub site: SiteId,
    /// Currently up
    pub up: bool,
    /// Most recent failure, if any
    pub failed_at: Option<Tick>,
    /// First access by the transaction
    pub first_access: Tick,
    /// Up and not failed since `first_access`
    pub valid: bool,
}

/// Holders of one locked variable
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockRow {
    /// Variable
    pub var: VarId,
    /// Read holders
    pub readers: Vec<TxId>,
    /// Write holders
    pub writers: Vec<TxId>,
}

impl From<LockEntry> for LockRow {
    fn from(entry: LockEntry) -> Self {
        Self {
            var: entry.var,
            readers: entry.readers,
            writers: entry.writers,
        }
    }
}

// ============================================================================
// Text rendering
// ============================================================================

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn site_header(f: &mut fmt::Formatter<'_>, site: SiteId) -> fmt::Result {
    write!(f, "----------\nSite {site}\n----------")
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Operation { text, .. } => f.write_str(text),
            Event::Rejected { reason } => write!(f, "Rejected: {reason}"),
            Event::TransactionBegun {
                tx,
                timestamp,
                read_only,
            } => {
                if *read_only {
                    write!(f, "Read-only transaction {tx} created at tick {timestamp}")
                } else {
                    write!(f, "Transaction {tx} created at tick {timestamp}")
                }
            }
            Event::SiteDown { site, var } => write!(f, "Site {site} is down, skipping {var}"),
            Event::VariableNotFound { site, var } => {
                write!(f, "Variable {var} not found at site {site}")
            }
            Event::VariableUnavailable { site, var } => {
                write!(f, "Variable {var} at site {site} is not available for reads")
            }
            Event::LockAlreadyHeld {
                tx,
                var,
                site,
                mode,
                value,
            } => match mode {
                LockMode::Read => write!(
                    f,
                    "{tx} already holds a read lock on {var} at site {site}, value {value}"
                ),
                LockMode::Write => write!(
                    f,
                    "{tx} already holds the write lock on {var} at site {site}, buffering {value}"
                ),
            },
            Event::LockGranted {
                tx,
                var,
                site,
                mode,
                value,
            } => match mode {
                LockMode::Read => write!(f, "{tx} read-locked {var} at site {site}, value {value}"),
                LockMode::Write => {
                    write!(f, "{tx} write-locked {var} at site {site}, buffering {value}")
                }
            },
            Event::ReplicaSkipped { tx, var, site } => {
                write!(f, "{tx} skipped conflicting copy of {var} at site {site}")
            }
            Event::ValueRead {
                tx,
                var,
                value,
                source,
            } => match source {
                ReadSource::Buffered => {
                    write!(f, "{tx} read {var} = {value} from its own uncommitted write")
                }
                ReadSource::Snapshot => write!(f, "{tx} read {var} = {value} from its snapshot"),
            },
            Event::SnapshotMiss { tx, var } => write!(
                f,
                "{var} was not readable anywhere when read-only transaction {tx} began"
            ),
            Event::Blocked { tx, op, reason } => write!(f, "{tx} blocked on {op}: {reason}"),
            Event::Queued { tx, op } => write!(f, "{tx} is blocked, queued {op}"),
            Event::QueuedOperationDropped { tx, op } => {
                write!(f, "Dropped unsupported queued operation {op} of {tx}")
            }
            Event::Aborted { tx, reason } => write!(f, "{tx} aborted: {reason}"),
            Event::CommitCheck { tx, sites } => {
                write!(f, "Sites accessed by {tx}: ")?;
                let checks: Vec<String> = sites.iter().map(|c| c.to_string()).collect();
                f.write_str(&checks.join("; "))
            }
            Event::Committed { tx, sites } => {
                if sites.is_empty() {
                    write!(f, "{tx} committed (no writes applied)")
                } else {
                    write!(f, "{tx} committed at sites {}", join(sites))
                }
            }
            Event::SiteFailed {
                site,
                tick,
                released,
            } => write!(
                f,
                "Site {site} failed at tick {tick}, {released} lock(s) released"
            ),
            Event::SiteRecovered { site } => write!(f, "Site {site} recovered"),
            Event::SiteAlreadyDown { site } => write!(f, "Site {site} is already down"),
            Event::SiteAlreadyUp { site } => write!(f, "Site {site} is already up"),
            Event::LockTable { site, entries } => {
                site_header(f, *site)?;
                if entries.is_empty() {
                    return f.write_str("\nno locks held");
                }
                for row in entries {
                    write!(
                        f,
                        "\n{}: read-locked by [{}], write-locked by [{}]",
                        row.var,
                        join(&row.readers),
                        join(&row.writers)
                    )?;
                }
                Ok(())
            }
            Event::Dump { site, values } => {
                site_header(f, *site)?;
                for (var, value) in values {
                    write!(f, "\n{var}={value}")?;
                }
                Ok(())
            }
            Event::DumpUnavailable { site } => write!(f, "Site {site} is down, nothing to dump"),
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Conflict { site, var, younger } => write!(
                f,
                "waiting for younger {} on {var} at site {site}",
                join(younger)
            ),
            BlockReason::NoAvailableCopy { var } => write!(f, "no up site can serve {var}"),
            BlockReason::SnapshotUnavailable { var } => {
                write!(f, "no up site can serve {var} yet")
            }
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::WaitDie { site, var, older } => write!(
                f,
                "younger than {} holding {var} at site {site}",
                join(older)
            ),
            AbortReason::SiteFailure { sites } => {
                write!(f, "site(s) {} failed after first access", join(sites))
            }
        }
    }
}

impl fmt::Display for SiteCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.up, self.failed_at) {
            (false, _) => write!(f, "Site {} - DOWN", self.site),
            (true, Some(failed)) if !self.valid => write!(
                f,
                "Site {} - UP, FAILED AT TICK = {failed}, FIRST ACCESSED AT TICK = {}",
                self.site, self.first_access
            ),
            (true, _) => write!(f, "Site {} - UP", self.site),
        }
    }
}
