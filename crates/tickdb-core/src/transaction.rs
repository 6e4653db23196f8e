//! Transaction bookkeeping
//!
//! A transaction never owns locks directly: site ledgers hold its id, and the
//! sets here record which variable names it locked so the coordinator can
//! purge them without walking every site.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tickdb_locking::{ReleasedLock, Requester};
use tickdb_primitives::{SiteId, Tick, Timestamp, TxId, Value, VarId};
use tickdb_storage::LockMode;
use tickdb_types::Operation;

/// Scheduling status of a live transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Free to dispatch new operations
    Active,
    /// Waiting on the head of its queue
    Blocked,
}

/// A live transaction
#[derive(Clone, Debug)]
pub struct Transaction {
    id: TxId,
    timestamp: Timestamp,
    read_only: bool,
    status: TxStatus,
    snapshot: BTreeMap<VarId, Value>,
    first_access: BTreeMap<SiteId, Tick>,
    read_locked: BTreeSet<VarId>,
    write_locked: BTreeSet<VarId>,
    pending_writes: BTreeMap<VarId, Value>,
    blocked_queue: VecDeque<Operation>,
}

impl Transaction {
    /// Read-write transaction born at `timestamp`
    pub fn new(id: TxId, timestamp: Timestamp) -> Self {
        Self {
            id,
            timestamp,
            read_only: false,
            status: TxStatus::Active,
            snapshot: BTreeMap::new(),
            first_access: BTreeMap::new(),
            read_locked: BTreeSet::new(),
            write_locked: BTreeSet::new(),
            pending_writes: BTreeMap::new(),
            blocked_queue: VecDeque::new(),
        }
    }

    /// Read-only transaction reading from `snapshot`
    pub fn read_only(id: TxId, timestamp: Timestamp, snapshot: BTreeMap<VarId, Value>) -> Self {
        Self {
            read_only: true,
            snapshot,
            ..Self::new(id, timestamp)
        }
    }

    /// Transaction id
    pub fn id(&self) -> &TxId {
        &self.id
    }

    /// Birth time
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Check if the transaction is read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Scheduling status
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Set scheduling status
    pub fn set_status(&mut self, status: TxStatus) {
        self.status = status;
    }

    /// Identity presented to lock arbitration
    pub fn requester(&self) -> Requester {
        Requester::new(self.id.clone(), self.timestamp)
    }

    // ==================== Snapshot ====================

    /// Value captured at birth, if the variable was readable then
    pub fn snapshot_value(&self, var: &VarId) -> Option<Value> {
        self.snapshot.get(var).copied()
    }

    /// Whole snapshot
    pub fn snapshot(&self) -> &BTreeMap<VarId, Value> {
        &self.snapshot
    }

    // ==================== Site Access ====================

    /// Remember the first tick `site` was touched; later calls keep the first
    pub fn record_access(&mut self, site: SiteId, tick: Tick) {
        self.first_access.entry(site).or_insert(tick);
    }

    /// First access tick per site
    pub fn first_access(&self) -> &BTreeMap<SiteId, Tick> {
        &self.first_access
    }

    // ==================== Locks / Writes ====================

    /// Record a read lock on `var`
    pub fn lock_read(&mut self, var: VarId) {
        self.read_locked.insert(var);
    }

    /// Record a write lock on `var` and buffer `value` for commit
    pub fn lock_write(&mut self, var: VarId, value: Value) {
        self.write_locked.insert(var.clone());
        self.pending_writes.insert(var, value);
    }

    /// Buffered uncommitted write of `var`
    pub fn pending_write(&self, var: &VarId) -> Option<Value> {
        self.pending_writes.get(var).copied()
    }

    /// Buffered writes
    pub fn pending_writes(&self) -> &BTreeMap<VarId, Value> {
        &self.pending_writes
    }

    /// Variables read-locked somewhere
    pub fn read_locked(&self) -> &BTreeSet<VarId> {
        &self.read_locked
    }

    /// Variables write-locked somewhere
    pub fn write_locked(&self) -> &BTreeSet<VarId> {
        &self.write_locked
    }

    /// Drop a lock a failed site took away.
    ///
    /// A replicated lock may still be held at another site, so only the read
    /// set is touched for it; a single-site write loses its buffered value.
    pub fn forget_lock(&mut self, released: &ReleasedLock) {
        match released.mode {
            LockMode::Read => {
                self.read_locked.remove(&released.var);
            }
            LockMode::Write if !released.replicated => {
                self.write_locked.remove(&released.var);
                self.pending_writes.remove(&released.var);
            }
            LockMode::Write => {}
        }
    }

    /// Forget every lock, access and buffered write
    pub fn clear(&mut self) {
        self.first_access.clear();
        self.read_locked.clear();
        self.write_locked.clear();
        self.pending_writes.clear();
        self.blocked_queue.clear();
    }

    // ==================== Blocked Queue ====================

    /// Append `op` unless an operation with the same text is already queued.
    /// Returns whether it was added.
    pub fn enqueue(&mut self, op: Operation) -> bool {
        if self.blocked_queue.iter().any(|queued| queued.text == op.text) {
            return false;
        }
        self.blocked_queue.push_back(op);
        true
    }

    /// Head of the queue
    pub fn peek_queued(&self) -> Option<&Operation> {
        self.blocked_queue.front()
    }

    /// Remove the head of the queue
    pub fn pop_queued(&mut self) -> Option<Operation> {
        self.blocked_queue.pop_front()
    }

    /// Drop every queued operation
    pub fn clear_queue(&mut self) {
        self.blocked_queue.clear();
    }

    /// Queued operations, head first
    pub fn queued(&self) -> impl Iterator<Item = &Operation> {
        self.blocked_queue.iter()
    }

    /// Number of queued operations
    pub fn queue_len(&self) -> usize {
        self.blocked_queue.len()
    }
}
