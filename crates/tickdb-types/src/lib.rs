//! # tickdb-types
//!
//! Operation records consumed by the TickDB engine.
//!
//! This crate provides:
//! - [`Operation`](operation::Operation) - One parsed script operation tagged with its tick
//! - [`OperationKind`](operation::OperationKind) - The recognized operation forms
//! - [`parse_script`](script::parse_script) - Line-oriented script decoding

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod operation;
pub mod script;

// Re-export commonly used types
pub use error::{ScriptError, ScriptResult};
pub use operation::{Operation, OperationKind};
pub use script::{parse_line, parse_operation, parse_script, Script};
