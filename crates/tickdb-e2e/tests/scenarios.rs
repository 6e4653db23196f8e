//! End-to-end scenarios
//!
//! Each test runs a short script through a fresh simulation and checks the
//! outcome through the transcript and the committed site state.

use tickdb_core::{AbortReason, BlockReason, Event};
use tickdb_e2e::{EventAssertions, Simulation};
use tickdb_primitives::{SiteId, TxId, VarId};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn simulate(script: &str) -> Simulation {
    init_tracing();
    let mut sim = Simulation::new();
    sim.run(script).unwrap();
    sim
}

fn site(n: i64) -> SiteId {
    SiteId::new(n).unwrap()
}

// ==================== Basic Commit ====================

#[test]
fn test_independent_writers_both_commit() {
    let sim = simulate(
        "begin(T1); begin(T2)\n\
         W(T1,x1,101)\n\
         W(T2,x2,202)\n\
         end(T1)\n\
         end(T2)\n\
         dump(x1)\n\
         dump(x2)",
    );
    let events = sim.events();

    assert_eq!(events.assert_committed("T1"), &[site(2)]);
    assert_eq!(events.assert_committed("T2").len(), 10);
    assert_eq!(sim.committed_value(2, "x1").unwrap(), 101);
    assert!(sim
        .committed_values("x2")
        .unwrap()
        .iter()
        .all(|(_, value)| *value == 202));

    let dumped: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Dump { site, values } if values.iter().any(|(v, _)| v.as_str() == "x1") => {
                Some((*site, values.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(dumped, vec![(site(2), vec![(VarId::indexed(1), 101)])]);
}

#[test]
fn test_read_sees_committed_write() {
    let sim = simulate(
        "begin(T1)\n\
         W(T1,x6,66)\n\
         end(T1)\n\
         begin(T2)\n\
         R(T2,x6)",
    );
    sim.events().assert_read("T2", "x6", 66);
}

// ==================== Site Failure ====================

#[test]
fn test_failure_after_write_aborts_whole_transaction() {
    let sim = simulate(
        "begin(T1)\n\
         W(T1,x2,500)\n\
         fail(2)\n\
         end(T1)",
    );
    let reason = sim.events().assert_aborted("T1");
    assert_eq!(reason, &AbortReason::SiteFailure { sites: vec![site(2)] });
    assert!(sim
        .committed_values("x2")
        .unwrap()
        .iter()
        .all(|(_, value)| *value == 20));
}

#[test]
fn test_failure_of_single_copy_aborts() {
    let sim = simulate(
        "begin(T1)\n\
         W(T1,x3,33)\n\
         fail(4)\n\
         recover(4)\n\
         end(T1)",
    );
    assert_eq!(
        sim.events().assert_aborted("T1"),
        &AbortReason::SiteFailure { sites: vec![site(4)] }
    );
    assert_eq!(sim.committed_value(4, "x3").unwrap(), 30);
}

#[test]
fn test_failure_before_access_is_harmless() {
    let sim = simulate(
        "begin(T1)\n\
         fail(2)\n\
         recover(2)\n\
         R(T1,x1)\n\
         W(T1,x1,7)\n\
         end(T1)",
    );
    let events = sim.events();
    events.assert_read("T1", "x1", 10);
    assert_eq!(events.assert_committed("T1"), &[site(2)]);
    assert_eq!(sim.committed_value(2, "x1").unwrap(), 7);
}

#[test]
fn test_commit_reaches_replica_recovered_after_write() {
    let sim = simulate(
        "begin(T1)\n\
         fail(3)\n\
         W(T1,x2,9)\n\
         recover(3)\n\
         end(T1)\n\
         begin(T2)\n\
         fail(1); fail(2)\n\
         R(T2,x2)",
    );
    let events = sim.events();
    assert_eq!(events.assert_committed("T1").len(), 10);
    assert_eq!(sim.committed_value(3, "x2").unwrap(), 9);

    // Site 3 serves the read: its copy became readable through the commit
    assert!(events.iter().any(|event| matches!(
        event,
        Event::LockGranted { tx, site: s, value: 9, .. } if tx.as_str() == "T2" && *s == site(3)
    )));
}

// ==================== Recovery ====================

#[test]
fn test_recovered_replica_waits_for_commit() {
    let sim = simulate(
        "begin(T1)\n\
         fail(1); fail(2); fail(3); fail(4); fail(5); fail(6); fail(7); fail(8); fail(9); fail(10)\n\
         recover(1)\n\
         R(T1,x2)\n\
         begin(T2)\n\
         W(T2,x2,77)\n\
         end(T2)\n\
         dump(x2)",
    );
    let events = sim.events();

    assert_eq!(
        events.assert_blocked("T1"),
        &BlockReason::NoAvailableCopy {
            var: VarId::indexed(2)
        }
    );
    assert!(events.iter().any(|event| matches!(
        event,
        Event::VariableUnavailable { site: s, .. } if *s == site(1)
    )));
    assert_eq!(events.assert_committed("T2"), &[site(1)]);
    events.assert_read("T1", "x2", 77).assert_unresolved("T1");
    assert!(!sim.coordinator().is_blocked(&TxId::from("T1")));
}

#[test]
fn test_single_copy_readable_right_after_recovery() {
    let sim = simulate(
        "fail(2)\n\
         recover(2)\n\
         begin(T1)\n\
         R(T1,x1)",
    );
    sim.events().assert_read("T1", "x1", 10);
}

#[test]
fn test_dump_skips_down_site() {
    let sim = simulate("fail(5)\ndump(5)\ndump()");
    let events = sim.events();
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::DumpUnavailable { site: s } if *s == site(5))));
    let dumped = events
        .iter()
        .filter(|event| matches!(event, Event::Dump { .. }))
        .count();
    assert_eq!(dumped, 9);
}

// ==================== Wait-Die ====================

#[test]
fn test_younger_writer_dies_against_older_reader() {
    let sim = simulate(
        "begin(T1)\n\
         R(T1,x1)\n\
         begin(T2)\n\
         W(T2,x1,99)\n\
         W(T1,x1,55)\n\
         end(T1)",
    );
    let events = sim.events();
    assert_eq!(
        events.assert_aborted("T2"),
        &AbortReason::WaitDie {
            site: site(2),
            var: VarId::indexed(1),
            older: vec![TxId::from("T1")],
        }
    );
    events.assert_committed("T1");
    assert_eq!(sim.committed_value(2, "x1").unwrap(), 55);
}

#[test]
fn test_older_writer_waits_for_younger_reader() {
    let sim = simulate(
        "begin(T2)\n\
         begin(T1)\n\
         R(T1,x1)\n\
         W(T2,x1,99)\n\
         end(T2)\n\
         end(T1)\n\
         dump(x1)",
    );
    let events = sim.events();
    assert_eq!(
        events.assert_blocked("T2"),
        &BlockReason::Conflict {
            site: site(2),
            var: VarId::indexed(1),
            younger: vec![TxId::from("T1")],
        }
    );

    // end(T2) arriving while blocked is queued behind the write
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::Queued { op, .. } if op == "end(T2)")));
    events.assert_committed("T1");
    events.assert_committed("T2");
    assert_eq!(sim.committed_value(2, "x1").unwrap(), 99);
}

#[test]
fn test_readers_share_then_writer_dies() {
    let sim = simulate(
        "begin(T1); begin(T2); begin(T3)\n\
         R(T1,x4); R(T2,x4)\n\
         W(T3,x4,1)",
    );
    let events = sim.events();
    events.assert_read("T1", "x4", 40).assert_read("T2", "x4", 40);
    assert!(matches!(
        events.assert_aborted("T3"),
        AbortReason::WaitDie { older, .. } if older.len() == 2
    ));
    assert!(sim.exclusivity_violations().is_empty());
}

// ==================== Read-Only ====================

#[test]
fn test_snapshot_ignores_later_commits() {
    let sim = simulate(
        "begin(T1)\n\
         beginRO(T2)\n\
         W(T1,x4,44)\n\
         end(T1)\n\
         R(T2,x4)\n\
         begin(T3)\n\
         R(T3,x4)\n\
         end(T2)",
    );
    let events = sim.events();
    events.assert_read("T2", "x4", 40);
    events.assert_read("T3", "x4", 44);
    assert_eq!(events.assert_committed("T2"), &[] as &[SiteId]);
}

#[test]
fn test_snapshot_read_takes_no_locks() {
    let sim = simulate(
        "beginRO(T1)\n\
         R(T1,x2)\n\
         begin(T2)\n\
         W(T2,x2,5)\n\
         end(T2)",
    );
    let events = sim.events();
    events.assert_read("T1", "x2", 20);
    events.assert_committed("T2");
}

#[test]
fn test_read_only_write_rejected() {
    let sim = simulate("beginRO(T1)\nW(T1,x2,5)");
    assert!(matches!(
        sim.events().assert_rejected(),
        tickdb_core::Rejection::ReadOnlyWrite { .. }
    ));
    assert_eq!(sim.committed_value(1, "x2").unwrap(), 20);
}
