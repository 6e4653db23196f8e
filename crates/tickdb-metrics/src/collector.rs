//! Metrics store

use crate::Histogram;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Named counters, gauges and histograms
///
/// Handles are created on first use. The engine is single threaded but the
/// store is shared through `Arc` with whoever exports it.
#[derive(Default)]
pub struct Metrics {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<HashMap<String, Arc<AtomicI64>>>,
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
}

impl Metrics {
    /// Create a new metrics store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store ready to share
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Increment a counter by one
    pub fn incr(&self, name: &str) {
        self.add(name, 1);
    }

    /// Increment a counter
    pub fn add(&self, name: &str, delta: u64) {
        if let Some(c) = self.counters.read().get(name) {
            c.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Set a gauge value
    pub fn set_gauge(&self, name: &str, value: i64) {
        if let Some(g) = self.gauges.read().get(name) {
            g.store(value, Ordering::Relaxed);
            return;
        }
        self.gauges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .store(value, Ordering::Relaxed);
    }

    /// Record a histogram observation
    pub fn observe(&self, name: &str, value: u64) {
        if let Some(h) = self.histograms.read().get(name) {
            h.observe(value);
            return;
        }
        self.histograms
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new()))
            .observe(value);
    }

    /// Get counter value
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Get gauge value
    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.read().get(name).map(|g| g.load(Ordering::Relaxed))
    }

    /// Get a histogram handle
    pub fn histogram(&self, name: &str) -> Option<Arc<Histogram>> {
        self.histograms.read().get(name).cloned()
    }

    /// All counters
    pub fn all_counters(&self) -> Vec<(String, u64)> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// All gauges
    pub fn all_gauges(&self) -> Vec<(String, i64)> {
        self.gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// All histograms
    pub fn all_histograms(&self) -> Vec<(String, Arc<Histogram>)> {
        self.histograms
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }
}
