//! Script decoding.
//!
//! A script is line oriented: every line is one tick, and a line may hold
//! several co-temporal operations separated by `;`. Whitespace anywhere on
//! the line is insignificant.

use crate::error::{ScriptError, ScriptResult};
use crate::operation::{Operation, OperationKind};
use tickdb_primitives::{Tick, Value};

/// Decoded script: operations in execution order plus rejected segments
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Script {
    /// Well-formed operations, ordered by tick then position on the line
    pub operations: Vec<Operation>,
    /// Segments that matched no recognized form
    pub rejected: Vec<ScriptError>,
    /// Number of lines read (the last tick)
    pub ticks: Tick,
}

// ============================================================================
// Script / Line
// ============================================================================

/// Decode a whole script. Line `n` (1-based) runs at tick `n`.
pub fn parse_script(input: &str) -> Script {
    let mut script = Script::default();
    for (idx, line) in input.lines().enumerate() {
        let tick = idx as Tick + 1;
        for parsed in parse_line(line, tick) {
            match parsed {
                Ok(op) => script.operations.push(op),
                Err(e) => script.rejected.push(e),
            }
        }
        script.ticks = tick;
    }
    script
}

/// Decode one line, keeping good and bad segments in line order.
/// Blank lines and `//` or `#` comments yield nothing.
pub fn parse_line(line: &str, tick: Tick) -> Vec<ScriptResult<Operation>> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.starts_with("//") || compact.starts_with('#') {
        return Vec::new();
    }
    compact
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|segment| parse_operation(segment, tick))
        .collect()
}

// ============================================================================
// Operation
// ============================================================================

/// Decode a single whitespace-free operation such as `W(T1,x2,10)`.
pub fn parse_operation(text: &str, tick: Tick) -> Result<Operation, ScriptError> {
    decode_kind(text)
        .map(|kind| Operation::new(tick, text, kind))
        .ok_or_else(|| ScriptError::Malformed {
            line: tick,
            text: text.to_string(),
        })
}

fn decode_kind(text: &str) -> Option<OperationKind> {
    let open = text.find('(')?;
    let name = &text[..open];
    let inner = text[open + 1..].strip_suffix(')')?;
    let args: Vec<&str> = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').collect()
    };

    let kind = match (name, args.as_slice()) {
        ("begin", [tx]) => OperationKind::Begin { tx: tx.parse().ok()? },
        ("beginRO", [tx]) => OperationKind::BeginReadOnly { tx: tx.parse().ok()? },
        ("end", [tx]) => OperationKind::End { tx: tx.parse().ok()? },
        ("R", [tx, var]) => OperationKind::Read {
            tx: tx.parse().ok()?,
            var: var.parse().ok()?,
        },
        ("W", [tx, var, value]) => OperationKind::Write {
            tx: tx.parse().ok()?,
            var: var.parse().ok()?,
            value: value.parse::<Value>().ok()?,
        },
        ("fail", [site]) => OperationKind::Fail { site: site.parse().ok()? },
        ("recover", [site]) => OperationKind::Recover { site: site.parse().ok()? },
        ("dump", []) => OperationKind::Dump,
        ("dump", [arg]) => match arg.parse::<i64>() {
            Ok(site) => OperationKind::DumpSite { site },
            Err(_) => OperationKind::DumpVariable { var: arg.parse().ok()? },
        },
        ("querystate", []) => OperationKind::QueryState,
        _ => return None,
    };
    Some(kind)
}
