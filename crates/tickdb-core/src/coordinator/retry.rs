//! Blocked-operation retry pass
//!
//! Runs once per tick before the tick's first new operation. Each blocked
//! transaction replays the head of its queue until the head blocks again or
//! the transaction ends.

use super::{Coordinator, DispatchMode};
use crate::event::Event;
use crate::sink::EventSink;
use crate::transaction::TxStatus;
use tickdb_metrics::names;
use tickdb_primitives::TxId;
use tickdb_types::{Operation, OperationKind};

/// How a transaction finished
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    Committed,
    Aborted,
}

/// Result of dispatching one read/write/end
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// The operation completed; the next one may run
    Progressed,
    /// The operation must wait
    StillBlocked,
    /// The transaction is gone
    Resolved(Resolution),
}

impl Coordinator {
    pub(super) fn retry_blocked(&mut self, sink: &mut dyn EventSink) {
        let pending = self.blocked.clone();
        for tx in pending {
            if self.is_blocked(&tx) {
                self.retry_transaction(&tx, sink);
            }
        }
    }

    fn retry_transaction(&mut self, tx: &TxId, sink: &mut dyn EventSink) {
        loop {
            let Some(op) = self
                .transactions
                .get(tx)
                .and_then(|txn| txn.peek_queued())
                .cloned()
            else {
                self.unblock(tx);
                return;
            };

            self.metrics.incr(names::OPS_RETRIED);
            // Buffer so a retry that blocks again leaves no trace
            let mut buffer = vec![Event::Operation {
                tick: self.now(),
                text: op.text.clone(),
            }];

            match self.retry_operation(tx, &op, &mut buffer) {
                Step::StillBlocked => {
                    tracing::trace!(%tx, op = %op.text, "still blocked");
                    return;
                }
                Step::Progressed => {
                    buffer.into_iter().for_each(|event| sink.emit(event));
                    if let Some(txn) = self.transactions.get_mut(tx) {
                        txn.pop_queued();
                    }
                }
                Step::Resolved(resolution) => {
                    buffer.into_iter().for_each(|event| sink.emit(event));
                    tracing::debug!(%tx, ?resolution, "blocked transaction resolved");
                    return;
                }
            }
        }
    }

    fn retry_operation(&mut self, tx: &TxId, op: &Operation, sink: &mut dyn EventSink) -> Step {
        match &op.kind {
            OperationKind::End { .. } => {
                if let Some(txn) = self.transactions.get_mut(tx) {
                    txn.clear_queue();
                }
                self.unblock(tx);
                Step::Resolved(self.end(tx, sink))
            }
            OperationKind::Read { var, .. } => {
                self.read(tx, op, var.clone(), DispatchMode::Retry, sink)
            }
            OperationKind::Write { var, value, .. } => {
                self.write(tx, op, var.clone(), *value, DispatchMode::Retry, sink)
            }
            _ => {
                tracing::warn!(%tx, op = %op.text, "unsupported queued operation dropped");
                sink.emit(Event::QueuedOperationDropped {
                    tx: tx.clone(),
                    op: op.text.clone(),
                });
                Step::Progressed
            }
        }
    }

    fn unblock(&mut self, tx: &TxId) {
        self.blocked.retain(|id| id != tx);
        if let Some(txn) = self.transactions.get_mut(tx) {
            txn.set_status(TxStatus::Active);
        }
    }
}
