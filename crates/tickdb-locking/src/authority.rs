//! Site Lock Authority - arbitrates lock requests for one site

use crate::error::{LockError, LockResult};
use crate::outcome::{LockOutcome, Requester};
use crate::wait_die::arbitrate;
use std::collections::BTreeMap;
use tickdb_primitives::{SiteId, Tick, TxId, Value, VarId};
use tickdb_storage::{LockMode, Site};

/// A lock dropped by a site failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleasedLock {
    /// Former holder
    pub tx: TxId,
    /// Variable the lock was on
    pub var: VarId,
    /// Lock direction
    pub mode: LockMode,
    /// Whether other sites may still hold copies of the same lock
    pub replicated: bool,
}

/// Current holders of one variable copy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockEntry {
    /// Variable
    pub var: VarId,
    /// Read holders
    pub readers: Vec<TxId>,
    /// Write holders
    pub writers: Vec<TxId>,
}

/// Lock authority for a single site
///
/// Owns the site's ledgers. Arbitration (`try_*`) is read-only; installing a
/// lock is a separate `acquire` so the caller can pick one replica among
/// several before touching any of them.
#[derive(Clone, Debug)]
pub struct SiteLockAuthority {
    site: Site,
}

impl SiteLockAuthority {
    /// Wrap a site
    pub fn new(site: Site) -> Self {
        Self { site }
    }

    /// Site id
    pub fn id(&self) -> SiteId {
        self.site.id()
    }

    /// Underlying site
    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Check if the site is up
    pub fn is_up(&self) -> bool {
        self.site.is_up()
    }

    // ==================== Arbitration ====================

    /// Evaluate a read lock request without installing it
    pub fn try_read_lock(&self, requester: &Requester, var: &VarId) -> LockOutcome {
        if !self.site.is_up() {
            return LockOutcome::SiteDown;
        }
        let Some(ledger) = self.site.variable(var) else {
            return LockOutcome::VariableNotFound;
        };
        if !ledger.is_read_available() {
            return LockOutcome::VariableUnavailable;
        }
        if ledger.holds_read(&requester.id) {
            return LockOutcome::AlreadyHeld;
        }
        if ledger.writers_only(&requester.id) {
            return LockOutcome::Granted;
        }
        arbitrate(requester, &ledger.other_holders(&requester.id))
    }

    /// Evaluate a write lock request without installing it
    ///
    /// Stale replicated copies accept writes; only reads wait for a commit.
    pub fn try_write_lock(&self, requester: &Requester, var: &VarId) -> LockOutcome {
        if !self.site.is_up() {
            return LockOutcome::SiteDown;
        }
        let Some(ledger) = self.site.variable(var) else {
            return LockOutcome::VariableNotFound;
        };
        if ledger.holds_write(&requester.id) {
            return LockOutcome::AlreadyHeld;
        }
        if ledger.readers_only(&requester.id) && ledger.writers_only(&requester.id) {
            return LockOutcome::Granted;
        }
        arbitrate(requester, &ledger.other_holders(&requester.id))
    }

    /// Install a lock previously cleared by `try_read_lock`/`try_write_lock`.
    /// Returns the committed value of the locked copy.
    pub fn acquire(
        &mut self,
        requester: &Requester,
        var: &VarId,
        mode: LockMode,
    ) -> LockResult<Value> {
        let site = self.site.id();
        let ledger = self
            .site
            .variable_mut(var)
            .ok_or_else(|| LockError::VariableNotHosted {
                site,
                var: var.clone(),
            })?;
        ledger.add_holder(&requester.id, requester.timestamp, mode);
        tracing::debug!(site = %site, tx = %requester.id, var = %var, %mode, "lock installed");
        Ok(ledger.committed_value())
    }

    // ==================== Values ====================

    /// Committed value of `var`, regardless of availability
    pub fn committed_value(&self, var: &VarId) -> Option<Value> {
        self.site.variable(var).map(|ledger| ledger.committed_value())
    }

    /// Committed value of `var` if the site is up and the copy is readable
    pub fn readable_value(&self, var: &VarId) -> Option<Value> {
        if !self.site.is_up() {
            return None;
        }
        self.site
            .variable(var)
            .filter(|ledger| ledger.is_read_available())
            .map(|ledger| ledger.committed_value())
    }

    /// Every readable copy at this site, in dump order
    pub fn readable_values(&self) -> Vec<(VarId, Value)> {
        if !self.site.is_up() {
            return Vec::new();
        }
        self.site
            .variables()
            .filter(|ledger| ledger.is_read_available())
            .map(|ledger| (ledger.id().clone(), ledger.committed_value()))
            .collect()
    }

    /// Every committed value at this site, in dump order
    pub fn committed_values(&self) -> Vec<(VarId, Value)> {
        self.site
            .variables()
            .map(|ledger| (ledger.id().clone(), ledger.committed_value()))
            .collect()
    }

    /// Variables currently locked here, in dump order
    pub fn lock_table(&self) -> Vec<LockEntry> {
        self.site
            .variables()
            .filter(|ledger| ledger.is_locked())
            .map(|ledger| LockEntry {
                var: ledger.id().clone(),
                readers: ledger.read_holders().map(|(tx, _)| tx.clone()).collect(),
                writers: ledger.write_holders().map(|(tx, _)| tx.clone()).collect(),
            })
            .collect()
    }

    // ==================== Commit / Abort ====================

    /// Install `writes` for every variable hosted here, then release `tx`.
    ///
    /// A down site applies nothing. Returns the variables written here.
    pub fn commit(&mut self, tx: &TxId, writes: &BTreeMap<VarId, Value>) -> Vec<VarId> {
        let mut applied = Vec::new();
        if self.site.is_up() {
            for (var, value) in writes {
                if let Some(ledger) = self.site.variable_mut(var) {
                    ledger.apply_commit(*value);
                    applied.push(var.clone());
                }
            }
        }
        self.site.release_all(tx);
        if !applied.is_empty() {
            tracing::debug!(site = %self.site.id(), %tx, count = applied.len(), "writes applied");
        }
        applied
    }

    /// Release every lock `tx` holds here. Returns how many copies it held.
    pub fn abort(&mut self, tx: &TxId) -> usize {
        self.site.release_all(tx)
    }

    // ==================== Failure / Recovery ====================

    /// Drop every holder of every variable here
    pub fn force_release_all(&mut self) -> Vec<ReleasedLock> {
        let mut released = Vec::new();
        for ledger in self.site.variables_mut() {
            let replicated = ledger.is_replicated();
            let var = ledger.id().clone();
            for (tx, mode) in ledger.clear_holders() {
                released.push(ReleasedLock {
                    tx,
                    var: var.clone(),
                    mode,
                    replicated,
                });
            }
        }
        released
    }

    /// Take the site down at `tick`, clearing its lock table.
    ///
    /// The returned list lets the caller purge the same locks from the
    /// holders' own bookkeeping.
    pub fn fail(&mut self, tick: Tick) -> LockResult<Vec<ReleasedLock>> {
        if !self.site.is_up() {
            return Err(LockError::SiteAlreadyDown(self.site.id()));
        }
        let released = self.force_release_all();
        self.site.mark_down(tick);
        tracing::info!(site = %self.site.id(), tick, released = released.len(), "site failed");
        Ok(released)
    }

    /// Bring the site back up; replicated copies stay unreadable until their
    /// next commit here
    pub fn recover(&mut self) -> LockResult<()> {
        if self.site.is_up() {
            return Err(LockError::SiteAlreadyUp(self.site.id()));
        }
        let leftover = self.force_release_all();
        if !leftover.is_empty() {
            tracing::warn!(site = %self.site.id(), count = leftover.len(), "locks survived failure");
        }
        self.site.mark_up();
        for ledger in self.site.variables_mut() {
            ledger.mark_stale();
        }
        tracing::info!(site = %self.site.id(), "site recovered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickdb_primitives::Timestamp;
    use tickdb_storage::Catalog;

    fn authority(n: i64) -> SiteLockAuthority {
        SiteLockAuthority::new(Site::new(SiteId::new(n).unwrap(), &Catalog::standard()))
    }

    fn req(name: &str, tick: u64) -> Requester {
        Requester::new(TxId::from(name), Timestamp::from(tick))
    }

    fn x(i: u32) -> VarId {
        VarId::indexed(i)
    }

    // ==================== Read Locks ====================

    #[test]
    fn test_read_routing_outcomes() {
        let mut a = authority(1);
        assert_eq!(a.try_read_lock(&req("T1", 1), &x(1)), LockOutcome::VariableNotFound);

        a.fail(3).unwrap();
        assert_eq!(a.try_read_lock(&req("T1", 1), &x(2)), LockOutcome::SiteDown);

        a.recover().unwrap();
        assert_eq!(a.try_read_lock(&req("T1", 1), &x(2)), LockOutcome::VariableUnavailable);
    }

    #[test]
    fn test_shared_read_locks() {
        let mut a = authority(1);
        let t1 = req("T1", 1);
        let t2 = req("T2", 2);
        assert_eq!(a.try_read_lock(&t1, &x(2)), LockOutcome::Granted);
        assert_eq!(a.acquire(&t1, &x(2), LockMode::Read).unwrap(), 20);

        assert_eq!(a.try_read_lock(&t1, &x(2)), LockOutcome::AlreadyHeld);
        assert_eq!(a.try_read_lock(&t2, &x(2)), LockOutcome::Granted);
        a.acquire(&t2, &x(2), LockMode::Read).unwrap();
        assert_eq!(a.lock_table()[0].readers.len(), 2);
    }

    #[test]
    fn test_read_against_writer() {
        let mut a = authority(1);
        a.acquire(&req("T2", 2), &x(2), LockMode::Write).unwrap();
        assert_eq!(
            a.try_read_lock(&req("T1", 1), &x(2)),
            LockOutcome::Block {
                younger: vec![TxId::from("T2")]
            }
        );
        assert_eq!(
            a.try_read_lock(&req("T3", 3), &x(2)),
            LockOutcome::Abort {
                older: vec![TxId::from("T2")]
            }
        );
    }

    #[test]
    fn test_read_under_own_write_is_granted() {
        let mut a = authority(1);
        let t1 = req("T1", 1);
        a.acquire(&t1, &x(4), LockMode::Write).unwrap();
        assert_eq!(a.try_read_lock(&t1, &x(4)), LockOutcome::Granted);
    }

    // ==================== Write Locks ====================

    #[test]
    fn test_write_conflicts_follow_wait_die() {
        let mut a = authority(2);
        let t1 = req("T1", 1);
        let t2 = req("T2", 2);
        a.acquire(&t2, &x(1), LockMode::Read).unwrap();

        assert_eq!(
            a.try_write_lock(&t1, &x(1)),
            LockOutcome::Block {
                younger: vec![TxId::from("T2")]
            }
        );

        let mut a = authority(2);
        a.acquire(&t1, &x(1), LockMode::Read).unwrap();
        assert_eq!(
            a.try_write_lock(&t2, &x(1)),
            LockOutcome::Abort {
                older: vec![TxId::from("T1")]
            }
        );
    }

    #[test]
    fn test_sole_reader_upgrades() {
        let mut a = authority(2);
        let t1 = req("T1", 1);
        a.acquire(&t1, &x(1), LockMode::Read).unwrap();
        assert_eq!(a.try_write_lock(&t1, &x(1)), LockOutcome::Granted);
        a.acquire(&t1, &x(1), LockMode::Write).unwrap();
        assert_eq!(a.try_write_lock(&t1, &x(1)), LockOutcome::AlreadyHeld);
    }

    #[test]
    fn test_upgrade_with_other_reader_conflicts() {
        let mut a = authority(2);
        let t1 = req("T1", 1);
        let t2 = req("T2", 2);
        a.acquire(&t1, &x(1), LockMode::Read).unwrap();
        a.acquire(&t2, &x(1), LockMode::Read).unwrap();
        assert!(matches!(a.try_write_lock(&t1, &x(1)), LockOutcome::Block { .. }));
        assert!(matches!(a.try_write_lock(&t2, &x(1)), LockOutcome::Abort { .. }));
    }

    #[test]
    fn test_stale_replica_accepts_writes() {
        let mut a = authority(3);
        a.fail(1).unwrap();
        a.recover().unwrap();
        assert_eq!(a.try_write_lock(&req("T1", 2), &x(2)), LockOutcome::Granted);
    }

    #[test]
    fn test_acquire_unhosted_variable() {
        let mut a = authority(1);
        let err = a.acquire(&req("T1", 1), &x(1), LockMode::Read).unwrap_err();
        assert!(matches!(err, LockError::VariableNotHosted { .. }));
    }

    // ==================== Commit / Abort ====================

    #[test]
    fn test_commit_applies_hosted_writes_and_releases() {
        let mut a = authority(2);
        let t1 = req("T1", 1);
        a.acquire(&t1, &x(1), LockMode::Write).unwrap();
        a.acquire(&t1, &x(2), LockMode::Write).unwrap();

        let mut writes = BTreeMap::new();
        writes.insert(x(1), 101);
        writes.insert(x(2), 202);
        writes.insert(x(3), 303);

        let applied = a.commit(&t1.id, &writes);
        assert_eq!(applied, vec![x(1), x(2)]);
        assert_eq!(a.committed_value(&x(1)), Some(101));
        assert_eq!(a.committed_value(&x(2)), Some(202));
        assert!(a.lock_table().is_empty());
    }

    #[test]
    fn test_commit_restores_availability() {
        let mut a = authority(5);
        a.fail(2).unwrap();
        a.recover().unwrap();
        assert_eq!(a.readable_value(&x(2)), None);

        let mut writes = BTreeMap::new();
        writes.insert(x(2), 7);
        a.commit(&TxId::from("T1"), &writes);
        assert_eq!(a.readable_value(&x(2)), Some(7));
        assert_eq!(a.readable_value(&x(4)), None);
    }

    #[test]
    fn test_commit_on_down_site_applies_nothing() {
        let mut a = authority(1);
        a.fail(2).unwrap();
        let mut writes = BTreeMap::new();
        writes.insert(x(2), 99);
        assert!(a.commit(&TxId::from("T1"), &writes).is_empty());
        assert_eq!(a.committed_value(&x(2)), Some(20));
    }

    #[test]
    fn test_abort_releases_only_that_transaction() {
        let mut a = authority(1);
        let t1 = req("T1", 1);
        let t2 = req("T2", 2);
        a.acquire(&t1, &x(2), LockMode::Read).unwrap();
        a.acquire(&t2, &x(4), LockMode::Write).unwrap();
        assert_eq!(a.abort(&t1.id), 1);
        assert_eq!(a.abort(&t1.id), 0);
        let table = a.lock_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].writers, vec![TxId::from("T2")]);
    }

    // ==================== Failure / Recovery ====================

    #[test]
    fn test_fail_reports_released_locks() {
        let mut a = authority(2);
        let t1 = req("T1", 1);
        a.acquire(&t1, &x(1), LockMode::Write).unwrap();
        a.acquire(&t1, &x(2), LockMode::Read).unwrap();

        let released = a.fail(4).unwrap();
        assert_eq!(released.len(), 2);
        assert!(released.iter().any(|r| r.var == x(1) && !r.replicated && r.mode == LockMode::Write));
        assert!(released.iter().any(|r| r.var == x(2) && r.replicated && r.mode == LockMode::Read));
        assert!(a.lock_table().is_empty());
        assert_eq!(a.site().failed_at(), Some(4));
    }

    #[test]
    fn test_fail_and_recover_are_not_repeatable() {
        let mut a = authority(6);
        assert_eq!(a.recover(), Err(LockError::SiteAlreadyUp(a.id())));
        a.fail(1).unwrap();
        assert_eq!(a.fail(2), Err(LockError::SiteAlreadyDown(a.id())));
        assert_eq!(a.site().failed_at(), Some(1));
    }

    #[test]
    fn test_recover_keeps_single_copies_readable() {
        let mut a = authority(4);
        a.fail(1).unwrap();
        a.recover().unwrap();
        assert_eq!(a.readable_value(&x(3)), Some(30));
        assert_eq!(a.readable_value(&x(4)), None);
        let readable: Vec<VarId> = a.readable_values().into_iter().map(|(v, _)| v).collect();
        assert_eq!(readable, vec![x(3), x(13)]);
    }

    #[test]
    fn test_down_site_has_no_readable_values() {
        let mut a = authority(1);
        a.fail(1).unwrap();
        assert!(a.readable_values().is_empty());
        assert_eq!(a.committed_values().len(), 10);
    }
}
