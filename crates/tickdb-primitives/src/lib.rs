//! # tickdb-primitives
//!
//! Primitive types for the TickDB replicated store simulator.
//!
//! This crate provides the identifiers shared by every other crate:
//! transactions, sites and variables, plus the logical clock types and the
//! fixed topology bounds.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod site;
mod timestamp;
mod transaction;
mod variable;

pub use error::{PrimitiveError, PrimitiveResult};
pub use site::SiteId;
pub use timestamp::Timestamp;
pub use transaction::TxId;
pub use variable::VarId;

/// Logical clock value; one per input line
pub type Tick = u64;

/// Committed or buffered variable value
pub type Value = i64;

/// Number of sites in the fixed topology
pub const SITE_COUNT: u8 = 10;

/// Number of variables in the fixed topology (x1..x20)
pub const VARIABLE_COUNT: u32 = 20;
