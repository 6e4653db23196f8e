//! Script decoding errors

use tickdb_primitives::Tick;
use thiserror::Error;

/// Script decoding error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Operation text that matches no recognized form
    #[error("malformed operation {text:?} on line {line}")]
    Malformed {
        /// Line number (also the tick)
        line: Tick,
        /// Whitespace-stripped operation text
        text: String,
    },
}

impl ScriptError {
    /// Offending operation text
    pub fn text(&self) -> &str {
        match self {
            ScriptError::Malformed { text, .. } => text,
        }
    }

    /// Line the error was found on
    pub fn line(&self) -> Tick {
        match self {
            ScriptError::Malformed { line, .. } => *line,
        }
    }
}

/// Result alias for script decoding
pub type ScriptResult<T> = Result<T, ScriptError>;
