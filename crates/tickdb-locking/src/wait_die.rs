//! Wait-die conflict resolution

use crate::outcome::{LockOutcome, Requester};
use std::collections::BTreeMap;
use tickdb_primitives::{Timestamp, TxId};

/// Decide a conflicting request.
///
/// `holders` are the conflicting holders other than the requester. If any
/// of them is older the requester dies; otherwise it waits. With no
/// conflicting holder there is nothing to wait for.
pub fn arbitrate(requester: &Requester, holders: &BTreeMap<TxId, Timestamp>) -> LockOutcome {
    if holders.is_empty() {
        return LockOutcome::Granted;
    }

    let older: Vec<TxId> = holders
        .iter()
        .filter(|(_, ts)| ts.is_older_than(&requester.timestamp))
        .map(|(id, _)| id.clone())
        .collect();

    if older.is_empty() {
        LockOutcome::Block {
            younger: holders.keys().cloned().collect(),
        }
    } else {
        LockOutcome::Abort { older }
    }
}
