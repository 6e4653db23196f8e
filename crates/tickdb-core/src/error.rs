//! Reportable conditions of the coordinator
//!
//! None of these stop a run: each is emitted as [`Event::Rejected`] and the
//! offending operation is dropped.
//!
//! [`Event::Rejected`]: crate::Event::Rejected

use serde::Serialize;
use thiserror::Error;
use tickdb_primitives::{Tick, TxId, VarId};
use tickdb_types::ScriptError;

/// Why an operation was dropped
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Unparseable script segment
    #[error("invalid input {text:?} on line {line}")]
    MalformedOperation {
        /// Line (tick) of the segment
        line: Tick,
        /// Offending text
        text: String,
    },

    /// Operation for a transaction that never began or already finished
    #[error("transaction {tx} does not exist, {op} dropped")]
    UnknownTransaction {
        /// Named transaction
        tx: TxId,
        /// Operation text
        op: String,
    },

    /// `begin` for a live transaction id
    #[error("transaction {tx} already exists")]
    DuplicateBegin {
        /// Named transaction
        tx: TxId,
    },

    /// Site number outside the topology
    #[error("invalid site {site}")]
    InvalidSiteId {
        /// Raw site number
        site: i64,
    },

    /// Write attempted by a read-only transaction
    #[error("read-only transaction {tx} cannot write {var}")]
    ReadOnlyWrite {
        /// Named transaction
        tx: TxId,
        /// Target variable
        var: VarId,
    },
}

impl From<ScriptError> for Rejection {
    fn from(err: ScriptError) -> Self {
        Rejection::MalformedOperation {
            line: err.line(),
            text: err.text().to_string(),
        }
    }
}
