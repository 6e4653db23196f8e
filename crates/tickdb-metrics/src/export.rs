//! Metrics snapshot and JSON export

use crate::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time copy of every metric, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Counter values
    pub counters: BTreeMap<String, u64>,
    /// Gauge values
    pub gauges: BTreeMap<String, i64>,
    /// Histogram summaries
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Summary of a histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean value
    pub mean: f64,
    /// Largest value
    pub max: u64,
    /// Total observation count
    pub count: u64,
}

impl MetricsSnapshot {
    /// Create a snapshot from a Metrics instance
    pub fn from_metrics(metrics: &Metrics) -> Self {
        let histograms = metrics
            .all_histograms()
            .into_iter()
            .map(|(name, h)| {
                let summary = HistogramSummary {
                    mean: h.mean(),
                    max: h.max(),
                    count: h.total_count(),
                };
                (name, summary)
            })
            .collect();

        Self {
            counters: metrics.all_counters().into_iter().collect(),
            gauges: metrics.all_gauges().into_iter().collect(),
            histograms,
        }
    }

    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export snapshot as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
