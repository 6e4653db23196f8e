//! Read and write dispatch
//!
//! Reads use available copies: sites are tried in order and the first one
//! that gives a decisive answer settles the read. A conflict at that site
//! blocks or aborts the read even when a later replica would have granted.
//! Writes settle on the first decisive site the same way, then spread the
//! lock to the other up copies of a replicated variable.

use super::retry::{Resolution, Step};
use super::{Coordinator, DispatchMode};
use crate::error::Rejection;
use crate::event::{AbortReason, BlockReason, Event, ReadSource};
use crate::sink::EventSink;
use crate::transaction::TxStatus;
use tickdb_locking::{LockOutcome, Requester};
use tickdb_metrics::names;
use tickdb_primitives::{SiteId, TxId, Value, VarId};
use tickdb_storage::LockMode;
use tickdb_types::Operation;

impl Coordinator {
    // ==================== Read ====================

    pub(super) fn read(
        &mut self,
        tx: &TxId,
        op: &Operation,
        var: VarId,
        mode: DispatchMode,
        sink: &mut dyn EventSink,
    ) -> Step {
        let Some(txn) = self.transactions.get(tx) else {
            return Step::Resolved(Resolution::Aborted);
        };
        if txn.is_read_only() {
            return self.read_snapshot(tx, op, var, mode, sink);
        }
        if let Some(value) = txn.pending_write(&var) {
            sink.emit(Event::ValueRead {
                tx: tx.clone(),
                var,
                value,
                source: ReadSource::Buffered,
            });
            return Step::Progressed;
        }

        let requester = txn.requester();
        let Some((site, outcome)) = self.first_decisive(&requester, &var, LockMode::Read, sink) else {
            return self.block(tx, op, BlockReason::NoAvailableCopy { var }, mode, sink);
        };
        match outcome {
            LockOutcome::Abort { older } => {
                self.abort(tx, AbortReason::WaitDie { site, var, older }, sink);
                Step::Resolved(Resolution::Aborted)
            }
            LockOutcome::Block { younger } => {
                let reason = BlockReason::Conflict { site, var, younger };
                self.block(tx, op, reason, mode, sink)
            }
            held => self.grant_read(&requester, site, var, held == LockOutcome::AlreadyHeld, sink),
        }
    }

    fn read_snapshot(
        &mut self,
        tx: &TxId,
        op: &Operation,
        var: VarId,
        mode: DispatchMode,
        sink: &mut dyn EventSink,
    ) -> Step {
        let Some(value) = self.transactions.get(tx).and_then(|txn| txn.snapshot_value(&var)) else {
            sink.emit(Event::SnapshotMiss { tx: tx.clone(), var });
            return Step::Progressed;
        };

        let servable = self.snapshot_reads.contains(&var)
            || self
                .authorities
                .values()
                .any(|authority| authority.readable_value(&var).is_some());
        if !servable {
            return self.block(tx, op, BlockReason::SnapshotUnavailable { var }, mode, sink);
        }

        self.snapshot_reads.insert(var.clone());
        sink.emit(Event::ValueRead {
            tx: tx.clone(),
            var,
            value,
            source: ReadSource::Snapshot,
        });
        Step::Progressed
    }

    fn grant_read(
        &mut self,
        requester: &Requester,
        site: SiteId,
        var: VarId,
        already_held: bool,
        sink: &mut dyn EventSink,
    ) -> Step {
        let now = self.now();
        let Some(authority) = self.authorities.get_mut(&site) else {
            return Step::StillBlocked;
        };
        let value = match authority.acquire(requester, &var, LockMode::Read) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(%err, "granted read could not be installed");
                return Step::StillBlocked;
            }
        };
        if let Some(txn) = self.transactions.get_mut(&requester.id) {
            txn.record_access(site, now);
            txn.lock_read(var.clone());
        }
        self.metrics.incr(names::LOCK_GRANTED);

        let tx = requester.id.clone();
        let mode = LockMode::Read;
        sink.emit(if already_held {
            Event::LockAlreadyHeld {
                tx,
                var,
                site,
                mode,
                value,
            }
        } else {
            Event::LockGranted {
                tx,
                var,
                site,
                mode,
                value,
            }
        });
        Step::Progressed
    }

    // ==================== Write ====================

    pub(super) fn write(
        &mut self,
        tx: &TxId,
        op: &Operation,
        var: VarId,
        value: Value,
        mode: DispatchMode,
        sink: &mut dyn EventSink,
    ) -> Step {
        let Some(txn) = self.transactions.get(tx) else {
            return Step::Resolved(Resolution::Aborted);
        };
        if txn.is_read_only() {
            self.reject(Rejection::ReadOnlyWrite { tx: tx.clone(), var }, sink);
            return Step::Progressed;
        }

        let requester = txn.requester();
        let Some((site, outcome)) = self.first_decisive(&requester, &var, LockMode::Write, sink) else {
            return self.block(tx, op, BlockReason::NoAvailableCopy { var }, mode, sink);
        };
        match outcome {
            LockOutcome::Abort { older } => {
                self.abort(tx, AbortReason::WaitDie { site, var, older }, sink);
                Step::Resolved(Resolution::Aborted)
            }
            LockOutcome::Block { younger } => {
                let reason = BlockReason::Conflict { site, var, younger };
                self.block(tx, op, reason, mode, sink)
            }
            held => self.grant_write(&requester, site, var, value, held, sink),
        }
    }

    /// Lock `var` at `site`, then at every other up copy that accepts it
    fn grant_write(
        &mut self,
        requester: &Requester,
        site: SiteId,
        var: VarId,
        value: Value,
        outcome: LockOutcome,
        sink: &mut dyn EventSink,
    ) -> Step {
        let now = self.now();
        let replicated = self
            .catalog
            .get(&var)
            .map_or(false, |spec| spec.is_replicated());

        let mut decisions = vec![(site, outcome)];
        if replicated {
            for authority in self.authorities.values().filter(|a| a.id() != site) {
                match authority.try_write_lock(requester, &var) {
                    outcome @ (LockOutcome::Granted | LockOutcome::AlreadyHeld) => {
                        decisions.push((authority.id(), outcome));
                    }
                    LockOutcome::Abort { .. } | LockOutcome::Block { .. } => {
                        sink.emit(Event::ReplicaSkipped {
                            tx: requester.id.clone(),
                            var: var.clone(),
                            site: authority.id(),
                        });
                    }
                    // Down copies are not retried
                    _ => {}
                }
            }
        }

        let mut locked = Vec::with_capacity(decisions.len());
        for (site, outcome) in decisions {
            let Some(authority) = self.authorities.get_mut(&site) else {
                continue;
            };
            if let Err(err) = authority.acquire(requester, &var, LockMode::Write) {
                tracing::error!(%err, "granted write could not be installed");
                continue;
            }
            locked.push(site);

            let tx = requester.id.clone();
            let var = var.clone();
            let mode = LockMode::Write;
            sink.emit(if outcome == LockOutcome::AlreadyHeld {
                Event::LockAlreadyHeld {
                    tx,
                    var,
                    site,
                    mode,
                    value,
                }
            } else {
                Event::LockGranted {
                    tx,
                    var,
                    site,
                    mode,
                    value,
                }
            });
        }

        if let Some(txn) = self.transactions.get_mut(&requester.id) {
            for site in &locked {
                txn.record_access(*site, now);
            }
            txn.lock_write(var, value);
        }
        self.metrics.incr(names::LOCK_GRANTED);
        Step::Progressed
    }

    // ==================== Routing ====================

    /// Ask each site in order; report skips and stop at the first decisive answer
    fn first_decisive(
        &self,
        requester: &Requester,
        var: &VarId,
        mode: LockMode,
        sink: &mut dyn EventSink,
    ) -> Option<(SiteId, LockOutcome)> {
        self.authorities.values().find_map(|authority| {
            let site = authority.id();
            let outcome = match mode {
                LockMode::Read => authority.try_read_lock(requester, var),
                LockMode::Write => authority.try_write_lock(requester, var),
            };
            let var = var.clone();
            match outcome {
                LockOutcome::SiteDown => sink.emit(Event::SiteDown { site, var }),
                LockOutcome::VariableNotFound => sink.emit(Event::VariableNotFound { site, var }),
                LockOutcome::VariableUnavailable => {
                    sink.emit(Event::VariableUnavailable { site, var })
                }
                decisive => {
                    tracing::debug!(%site, tx = %requester.id, %var, %mode, ?decisive, "lock decision");
                    return Some((site, decisive));
                }
            }
            None
        })
    }

    /// Mark `tx` blocked on `op`. Fresh operations join the queue; a retried
    /// head is already there.
    pub(super) fn block(
        &mut self,
        tx: &TxId,
        op: &Operation,
        reason: BlockReason,
        mode: DispatchMode,
        sink: &mut dyn EventSink,
    ) -> Step {
        if mode == DispatchMode::Fresh {
            if let Some(txn) = self.transactions.get_mut(tx) {
                txn.set_status(TxStatus::Blocked);
                txn.enqueue(op.clone());
            }
            if !self.blocked.contains(tx) {
                self.blocked.push(tx.clone());
            }
            self.metrics.incr(names::LOCK_BLOCKED);
            tracing::debug!(%tx, op = %op.text, %reason, "transaction blocked");
        }
        sink.emit(Event::Blocked {
            tx: tx.clone(),
            op: op.text.clone(),
            reason,
        });
        Step::StillBlocked
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{run, site, t, x};
    use super::*;

    fn blocked_reason(events: &[Event]) -> Option<&BlockReason> {
        events.iter().rev().find_map(|e| match e {
            Event::Blocked { reason, .. } => Some(reason),
            _ => None,
        })
    }

    // ==================== Available Copies ====================

    #[test]
    fn test_read_uses_first_up_site() {
        let (c, events) = run("fail(1)\nbegin(T1)\nR(T1,x2)");
        assert!(events.iter().any(|e| matches!(e, Event::SiteDown { site: s, .. } if *s == site(1))));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::LockGranted { site: s, value: 20, mode: LockMode::Read, .. } if *s == site(2)
        )));
        let txn = c.transaction(&t("T1")).unwrap();
        assert_eq!(txn.first_access().keys().copied().collect::<Vec<_>>(), vec![site(2)]);
        assert!(txn.read_locked().contains(&x(2)));
    }

    #[test]
    fn test_read_skips_sites_without_variable() {
        let (_, events) = run("begin(T1)\nR(T1,x3)");
        let not_found = events
            .iter()
            .filter(|e| matches!(e, Event::VariableNotFound { .. }))
            .count();
        assert_eq!(not_found, 3);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::LockGranted { site: s, value: 30, .. } if *s == site(4)
        )));
    }

    #[test]
    fn test_repeated_read_reports_held_lock() {
        let (c, events) = run("begin(T1)\nR(T1,x2)\nR(T1,x2)");
        assert!(events.iter().any(|e| matches!(e, Event::LockAlreadyHeld { value: 20, .. })));
        assert_eq!(c.metrics().counter(names::LOCK_GRANTED), 2);
    }

    #[test]
    fn test_read_sees_own_buffered_write() {
        let (_, events) = run("begin(T1)\nW(T1,x2,77)\nR(T1,x2)");
        assert!(matches!(
            events.last(),
            Some(Event::ValueRead {
                value: 77,
                source: ReadSource::Buffered,
                ..
            })
        ));
    }

    #[test]
    fn test_write_settles_on_first_decisive_site() {
        // T2 read-locks x2 at site 1 only; T3 is younger and dies there
        // although sites 2..10 have no holders.
        let (c, events) = run("begin(T2)\nR(T2,x2)\nbegin(T3)\nW(T3,x2,5)");
        assert!(c.transaction(&t("T3")).is_none());
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Aborted {
                reason: AbortReason::WaitDie { site: s, .. },
                ..
            } if *s == site(1)
        )));
    }

    // ==================== Wait-Die ====================

    #[test]
    fn test_younger_writer_dies_older_writer_waits() {
        let (c, events) = run("begin(T1)\nR(T1,x1)\nbegin(T2)\nW(T2,x1,99)");
        assert!(c.transaction(&t("T2")).is_none());
        assert!(events.iter().any(|e| matches!(e, Event::Aborted { .. })));

        let (c, events) = run("begin(T2)\nbegin(T1)\nR(T1,x1)\nW(T2,x1,99)");
        assert!(c.is_blocked(&t("T2")));
        assert_eq!(
            blocked_reason(&events),
            Some(&BlockReason::Conflict {
                site: site(2),
                var: x(1),
                younger: vec![t("T1")],
            })
        );
    }

    #[test]
    fn test_blocked_operation_is_queued() {
        let (c, _) = run("begin(T2)\nbegin(T1)\nR(T1,x1)\nW(T2,x1,99)");
        let txn = c.transaction(&t("T2")).unwrap();
        assert_eq!(txn.status(), TxStatus::Blocked);
        assert_eq!(txn.peek_queued().unwrap().text, "W(T2,x1,99)");
        assert_eq!(c.metrics().counter(names::LOCK_BLOCKED), 1);
    }

    #[test]
    fn test_no_available_copy_blocks() {
        let (c, events) = run("begin(T1)\nfail(2)\nR(T1,x1)");
        assert!(c.is_blocked(&t("T1")));
        assert_eq!(
            blocked_reason(&events),
            Some(&BlockReason::NoAvailableCopy { var: x(1) })
        );
    }

    // ==================== Write ====================

    #[test]
    fn test_replicated_write_locks_every_up_copy() {
        let (c, _) = run("fail(3)\nbegin(T1)\nW(T1,x2,9)");
        let txn = c.transaction(&t("T1")).unwrap();
        assert_eq!(txn.first_access().len(), 9);
        assert!(!txn.first_access().contains_key(&site(3)));
        assert_eq!(txn.pending_write(&x(2)), Some(9));
        for a in c.authorities().filter(|a| a.is_up()) {
            assert_eq!(a.lock_table()[0].writers, vec![t("T1")]);
        }
    }

    #[test]
    fn test_single_copy_write_locks_one_site() {
        let (c, _) = run("begin(T1)\nW(T1,x5,9)");
        let txn = c.transaction(&t("T1")).unwrap();
        assert_eq!(txn.first_access().keys().copied().collect::<Vec<_>>(), vec![site(6)]);
    }

    #[test]
    fn test_write_skips_conflicting_replica() {
        // T2 read-locks x2 at site 2 while site 1 is down
        let script = "begin(T1)\nbegin(T2)\nfail(1)\nR(T2,x2)\nrecover(1)\nW(T1,x2,8)";
        let (c, events) = run(script);
        // Site 1 grants (no holders there); site 2 is skipped
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ReplicaSkipped { site: s, .. } if *s == site(2)
        )));
        let txn = c.transaction(&t("T1")).unwrap();
        assert!(!txn.first_access().contains_key(&site(2)));
        let site2 = c.authority(site(2)).unwrap().lock_table();
        assert!(site2[0].writers.is_empty());
        assert_eq!(site2[0].readers, vec![t("T2")]);
    }

    #[test]
    fn test_read_only_write_rejected() {
        let (c, events) = run("beginRO(T1)\nW(T1,x2,1)");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Rejected {
                reason: Rejection::ReadOnlyWrite { .. }
            }
        )));
        assert!(c.authorities().all(|a| a.lock_table().is_empty()));
    }

    // ==================== Read-only ====================

    #[test]
    fn test_snapshot_isolation() {
        let (_, events) = run("beginRO(T1)\nbegin(T2)\nW(T2,x2,99)\nend(T2)\nR(T1,x2)");
        assert!(matches!(
            events.last(),
            Some(Event::ValueRead {
                value: 20,
                source: ReadSource::Snapshot,
                ..
            })
        ));
    }

    #[test]
    fn test_snapshot_miss() {
        let script = "fail(1)\nfail(2)\nfail(3)\nfail(4)\nfail(5)\nfail(6)\nfail(7)\nfail(8)\nfail(9)\nfail(10)\nbeginRO(T1)\nR(T1,x2)";
        let (c, events) = run(script);
        assert!(matches!(events.last(), Some(Event::SnapshotMiss { .. })));
        assert!(!c.is_blocked(&t("T1")));
    }

    #[test]
    fn test_snapshot_read_waits_for_a_copy() {
        let script = "beginRO(T1)\nfail(1)\nfail(2)\nfail(3)\nfail(4)\nfail(5)\nfail(6)\nfail(7)\nfail(8)\nfail(9)\nfail(10)\nR(T1,x2)";
        let (c, events) = run(script);
        assert!(c.is_blocked(&t("T1")));
        assert_eq!(
            blocked_reason(&events),
            Some(&BlockReason::SnapshotUnavailable { var: x(2) })
        );
    }
}
