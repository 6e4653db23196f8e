//! # tickdb-metrics
//!
//! Activity counters for the TickDB engine.
//!
//! Features:
//! - Counters for transaction and lock events
//! - Gauges for live and blocked transaction counts
//! - Tick-valued histograms (e.g. transaction lifetime)
//! - JSON export

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod export;
mod histogram;
pub mod names;

pub use collector::Metrics;
pub use export::{HistogramSummary, MetricsSnapshot};
pub use histogram::Histogram;
