//! Operation records

use tickdb_primitives::{Tick, TxId, Value, VarId};

/// A single script operation, immutable once parsed
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    /// Tick of the source line
    pub tick: Tick,
    /// Literal operation text with whitespace removed
    pub text: String,
    /// Decoded operation
    pub kind: OperationKind,
}

/// Recognized operation forms
///
/// Site numbers stay raw here; range validation belongs to the engine so
/// that an out-of-range site is a per-operation diagnostic rather than a
/// malformed line.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "op", rename_all = "snake_case")
)]
pub enum OperationKind {
    /// `begin(T)`
    Begin {
        /// Transaction name
        tx: TxId,
    },
    /// `beginRO(T)`
    BeginReadOnly {
        /// Transaction name
        tx: TxId,
    },
    /// `end(T)`
    End {
        /// Transaction name
        tx: TxId,
    },
    /// `R(T,x)`
    Read {
        /// Transaction name
        tx: TxId,
        /// Variable to read
        var: VarId,
    },
    /// `W(T,x,v)`
    Write {
        /// Transaction name
        tx: TxId,
        /// Variable to write
        var: VarId,
        /// Value to buffer
        value: Value,
    },
    /// `fail(i)`
    Fail {
        /// Raw site number
        site: i64,
    },
    /// `recover(i)`
    Recover {
        /// Raw site number
        site: i64,
    },
    /// `dump()`
    Dump,
    /// `dump(i)`
    DumpSite {
        /// Raw site number
        site: i64,
    },
    /// `dump(x)`
    DumpVariable {
        /// Variable to list
        var: VarId,
    },
    /// `querystate()`
    QueryState,
}

impl OperationKind {
    /// Transaction the operation belongs to, if any
    pub fn tx(&self) -> Option<&TxId> {
        match self {
            OperationKind::Begin { tx }
            | OperationKind::BeginReadOnly { tx }
            | OperationKind::End { tx }
            | OperationKind::Read { tx, .. }
            | OperationKind::Write { tx, .. } => Some(tx),
            _ => None,
        }
    }

    /// Whether the operation may sit in a blocked transaction's queue
    pub fn is_queueable(&self) -> bool {
        matches!(
            self,
            OperationKind::Read { .. } | OperationKind::Write { .. } | OperationKind::End { .. }
        )
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Begin { .. } => "begin",
            OperationKind::BeginReadOnly { .. } => "beginRO",
            OperationKind::End { .. } => "end",
            OperationKind::Read { .. } => "read",
            OperationKind::Write { .. } => "write",
            OperationKind::Fail { .. } => "fail",
            OperationKind::Recover { .. } => "recover",
            OperationKind::Dump => "dump",
            OperationKind::DumpSite { .. } => "dump_site",
            OperationKind::DumpVariable { .. } => "dump_variable",
            OperationKind::QueryState => "querystate",
        }
    }
}

impl Operation {
    /// Create an operation record
    pub fn new(tick: Tick, text: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            tick,
            text: text.into(),
            kind,
        }
    }

    /// Transaction the operation belongs to, if any
    pub fn tx(&self) -> Option<&TxId> {
        self.kind.tx()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_tx() {
        let op = Operation::new(
            3,
            "W(T1,x2,5)",
            OperationKind::Write {
                tx: TxId::from("T1"),
                var: VarId::indexed(2),
                value: 5,
            },
        );
        assert_eq!(op.tx(), Some(&TxId::from("T1")));
        assert!(op.kind.is_queueable());
        assert_eq!(op.kind.name(), "write");
    }

    #[test]
    fn test_site_operations_have_no_tx() {
        assert_eq!(OperationKind::Fail { site: 3 }.tx(), None);
        assert_eq!(OperationKind::QueryState.tx(), None);
        assert!(!OperationKind::Dump.is_queueable());
        assert!(!OperationKind::Begin { tx: TxId::from("T1") }.is_queueable());
    }
}
