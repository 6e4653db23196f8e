//! Metric names recorded by the engine

/// Transactions started
pub const TX_BEGUN: &str = "tx.begun";
/// Transactions committed
pub const TX_COMMITTED: &str = "tx.committed";
/// Transactions aborted
pub const TX_ABORTED: &str = "tx.aborted";
/// Locks installed
pub const LOCK_GRANTED: &str = "lock.granted";
/// Requests that left a transaction blocked
pub const LOCK_BLOCKED: &str = "lock.blocked";
/// Operations dispatched fresh from the script
pub const OPS_DISPATCHED: &str = "ops.dispatched";
/// Operations appended behind a blocked one
pub const OPS_QUEUED: &str = "ops.queued";
/// Queued operations retried
pub const OPS_RETRIED: &str = "ops.retried";
/// Operations rejected with a diagnostic
pub const OPS_REJECTED: &str = "ops.rejected";
/// Site failures
pub const SITE_FAILURES: &str = "site.failures";
/// Site recoveries
pub const SITE_RECOVERIES: &str = "site.recoveries";

/// Live transactions (gauge)
pub const TX_LIVE: &str = "tx.live";
/// Blocked transactions (gauge)
pub const TX_BLOCKED: &str = "tx.blocked";

/// Ticks from begin to commit (histogram)
pub const TX_LIFETIME_TICKS: &str = "tx.lifetime_ticks";
