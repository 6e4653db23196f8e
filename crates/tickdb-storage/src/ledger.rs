//! Per-site copy of one variable: committed value and lock holders

use crate::catalog::VariableSpec;
use std::collections::BTreeMap;
use std::fmt;
use tickdb_primitives::{Timestamp, TxId, Value, VarId};

/// Lock direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum LockMode {
    /// Shared
    Read,
    /// Exclusive
    Write,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => f.write_str("read"),
            LockMode::Write => f.write_str("write"),
        }
    }
}

/// One copy of a variable at one site
///
/// Holders are kept by transaction id together with the holder's timestamp,
/// so arbitration never needs to reach back into the transaction registry.
#[derive(Clone, Debug)]
pub struct VariableLedger {
    id: VarId,
    order: u32,
    replicated: bool,
    committed: Value,
    /// False after recovery for replicated copies until the next commit
    read_available: bool,
    read_holders: BTreeMap<TxId, Timestamp>,
    write_holders: BTreeMap<TxId, Timestamp>,
}

impl VariableLedger {
    /// Fresh copy at its initial value
    pub fn new(spec: &VariableSpec) -> Self {
        Self {
            id: spec.id.clone(),
            order: spec.order,
            replicated: spec.is_replicated(),
            committed: spec.initial_value,
            read_available: true,
            read_holders: BTreeMap::new(),
            write_holders: BTreeMap::new(),
        }
    }

    /// Variable name
    pub fn id(&self) -> &VarId {
        &self.id
    }

    /// Dump ordering key
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Whether the variable has copies at every site
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    /// Last committed value
    pub fn committed_value(&self) -> Value {
        self.committed
    }

    /// Whether reads may be served from this copy
    pub fn is_read_available(&self) -> bool {
        self.read_available
    }

    /// Install a committed value. A replicated copy becomes readable again.
    pub fn apply_commit(&mut self, value: Value) {
        self.committed = value;
        if self.replicated {
            self.read_available = true;
        }
    }

    /// Post-recovery reset: replicated copies stop serving reads
    pub fn mark_stale(&mut self) {
        if self.replicated {
            self.read_available = false;
        }
    }

    // ==================== Holders ====================

    /// Current read holders
    pub fn read_holders(&self) -> impl Iterator<Item = (&TxId, Timestamp)> {
        self.read_holders.iter().map(|(tx, ts)| (tx, *ts))
    }

    /// Current write holders
    pub fn write_holders(&self) -> impl Iterator<Item = (&TxId, Timestamp)> {
        self.write_holders.iter().map(|(tx, ts)| (tx, *ts))
    }

    /// Check if `tx` holds a read lock
    pub fn holds_read(&self, tx: &TxId) -> bool {
        self.read_holders.contains_key(tx)
    }

    /// Check if `tx` holds the write lock
    pub fn holds_write(&self, tx: &TxId) -> bool {
        self.write_holders.contains_key(tx)
    }

    /// Whether every read holder is `tx`
    pub fn readers_only(&self, tx: &TxId) -> bool {
        self.read_holders.keys().all(|holder| holder == tx)
    }

    /// Whether every write holder is `tx`
    pub fn writers_only(&self, tx: &TxId) -> bool {
        self.write_holders.keys().all(|holder| holder == tx)
    }

    /// Holders in either direction other than `tx`, with timestamps
    pub fn other_holders(&self, tx: &TxId) -> BTreeMap<TxId, Timestamp> {
        self.read_holders
            .iter()
            .chain(self.write_holders.iter())
            .filter(|(holder, _)| *holder != tx)
            .map(|(holder, ts)| (holder.clone(), *ts))
            .collect()
    }

    /// Record a lock. Other holders are never displaced.
    pub fn add_holder(&mut self, tx: &TxId, timestamp: Timestamp, mode: LockMode) {
        let holders = match mode {
            LockMode::Read => &mut self.read_holders,
            LockMode::Write => &mut self.write_holders,
        };
        holders.insert(tx.clone(), timestamp);
    }

    /// Drop every lock held by `tx`. Returns true if anything was held.
    pub fn release(&mut self, tx: &TxId) -> bool {
        let read = self.read_holders.remove(tx).is_some();
        let write = self.write_holders.remove(tx).is_some();
        read || write
    }

    /// Drop all holders, returning who held what
    pub fn clear_holders(&mut self) -> Vec<(TxId, LockMode)> {
        let readers = std::mem::take(&mut self.read_holders)
            .into_keys()
            .map(|tx| (tx, LockMode::Read));
        let writers = std::mem::take(&mut self.write_holders)
            .into_keys()
            .map(|tx| (tx, LockMode::Write));
        readers.chain(writers).collect()
    }

    /// Check if any lock is held
    pub fn is_locked(&self) -> bool {
        !self.read_holders.is_empty() || !self.write_holders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Catalog;

    fn ledger(index: u32) -> VariableLedger {
        let catalog = Catalog::standard();
        VariableLedger::new(catalog.get(&VarId::indexed(index)).unwrap())
    }

    fn tx(name: &str) -> TxId {
        TxId::from(name)
    }

    #[test]
    fn test_new_ledger() {
        let l = ledger(4);
        assert_eq!(l.committed_value(), 40);
        assert!(l.is_replicated());
        assert!(l.is_read_available());
        assert!(!l.is_locked());
    }

    #[test]
    fn test_add_and_release_holders() {
        let mut l = ledger(2);
        l.add_holder(&tx("T1"), Timestamp::from(1), LockMode::Read);
        l.add_holder(&tx("T2"), Timestamp::from(2), LockMode::Read);
        assert!(l.holds_read(&tx("T1")));
        assert!(!l.readers_only(&tx("T1")));

        assert!(l.release(&tx("T2")));
        assert!(l.readers_only(&tx("T1")));
        assert!(!l.release(&tx("T2")));
    }

    #[test]
    fn test_other_holders_excludes_self() {
        let mut l = ledger(2);
        l.add_holder(&tx("T1"), Timestamp::from(1), LockMode::Read);
        l.add_holder(&tx("T1"), Timestamp::from(1), LockMode::Write);
        l.add_holder(&tx("T3"), Timestamp::from(3), LockMode::Read);
        let others = l.other_holders(&tx("T1"));
        assert_eq!(others.len(), 1);
        assert_eq!(others.get(&tx("T3")), Some(&Timestamp::from(3)));
    }

    #[test]
    fn test_clear_holders_reports_both_directions() {
        let mut l = ledger(1);
        l.add_holder(&tx("T1"), Timestamp::from(1), LockMode::Read);
        l.add_holder(&tx("T2"), Timestamp::from(2), LockMode::Write);
        let released = l.clear_holders();
        assert_eq!(
            released,
            vec![(tx("T1"), LockMode::Read), (tx("T2"), LockMode::Write)]
        );
        assert!(!l.is_locked());
    }

    // ==================== Availability ====================

    #[test]
    fn test_stale_replicated_copy_until_commit() {
        let mut l = ledger(6);
        l.mark_stale();
        assert!(!l.is_read_available());
        l.apply_commit(66);
        assert!(l.is_read_available());
        assert_eq!(l.committed_value(), 66);
    }

    #[test]
    fn test_single_copy_never_stale() {
        let mut l = ledger(3);
        l.mark_stale();
        assert!(l.is_read_available());
    }
}
