//! # tickdb-storage
//!
//! In-memory state of the simulated sites.
//!
//! This crate provides:
//! - [`Catalog`] - the static placement table (which site hosts which variable)
//! - [`VariableLedger`] - committed value, availability and lock holders of one
//!   variable copy
//! - [`Site`] - up/down status and the ledgers hosted at one site
//!
//! Nothing here decides whether a lock may be taken; arbitration lives in
//! `tickdb-locking`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod catalog;
mod ledger;
mod site;

pub use catalog::{Catalog, Placement, VariableSpec};
pub use ledger::{LockMode, VariableLedger};
pub use site::Site;
