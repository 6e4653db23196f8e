//! Simulation harness for E2E testing
//!
//! Drives a [`Coordinator`] one script line at a time and keeps every event
//! it emitted, so a test can inspect both the transcript and the engine
//! state between steps.

use crate::{E2EError, E2EResult};
use tickdb_core::{AbortReason, BlockReason, Coordinator, Event, Rejection, Transaction};
use tickdb_locking::LockEntry;
use tickdb_primitives::{SiteId, Tick, TxId, Value, VarId};
use tickdb_storage::{Catalog, LockMode};
use tickdb_types::parse_line;

/// One coordinator plus the events it has produced so far
pub struct Simulation {
    coordinator: Coordinator,
    events: Vec<Event>,
    tick: Tick,
}

impl Simulation {
    /// Fresh simulation over the standard ten-site catalog
    pub fn new() -> Self {
        Self::from_coordinator(Coordinator::new())
    }

    /// Fresh simulation over a custom placement table
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self::from_coordinator(Coordinator::with_catalog(catalog))
    }

    fn from_coordinator(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            events: Vec::new(),
            tick: 0,
        }
    }

    // ==================== Driving ====================

    /// Run one line at the next tick and return the events it produced.
    ///
    /// The whole line is parsed before anything is submitted, so a malformed
    /// segment leaves the simulation untouched apart from the consumed tick.
    pub fn step(&mut self, line: &str) -> E2EResult<&[Event]> {
        self.tick += 1;
        let ops = parse_line(line, self.tick)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let start = self.events.len();
        for op in ops {
            tracing::trace!(tick = self.tick, op = %op.text, "submitting");
            self.coordinator.submit(op, &mut self.events);
        }
        Ok(&self.events[start..])
    }

    /// Run every line of `script` in turn
    pub fn run(&mut self, script: &str) -> E2EResult<&mut Self> {
        for line in script.lines() {
            self.step(line)?;
        }
        Ok(self)
    }

    /// Run one line and let the coordinator report malformed segments
    pub fn step_lenient(&mut self, line: &str) -> &[Event] {
        self.tick += 1;
        let start = self.events.len();
        for parsed in parse_line(line, self.tick) {
            match parsed {
                Ok(op) => self.coordinator.submit(op, &mut self.events),
                Err(err) => self
                    .coordinator
                    .reject(Rejection::from(err), &mut self.events),
            }
        }
        &self.events[start..]
    }

    // ==================== Inspection ====================

    /// Every event so far
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Tick of the last line run
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Underlying coordinator
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Live transaction by name
    pub fn transaction(&self, name: &str) -> Option<&Transaction> {
        self.coordinator.transaction(&TxId::from(name))
    }

    /// Check if a site is up
    pub fn is_up(&self, site: i64) -> E2EResult<bool> {
        let site = SiteId::new(site)?;
        Ok(self
            .coordinator
            .authority(site)
            .is_some_and(|authority| authority.is_up()))
    }

    /// Committed value of `var` at `site`, regardless of site status
    pub fn committed_value(&self, site: i64, var: &str) -> E2EResult<Value> {
        let site = SiteId::new(site)?;
        let var: VarId = var.parse()?;
        self.coordinator
            .authority(site)
            .and_then(|authority| authority.committed_value(&var))
            .ok_or(E2EError::NotHosted { site, var })
    }

    /// Committed value of `var` at every site holding a copy
    pub fn committed_values(&self, var: &str) -> E2EResult<Vec<(SiteId, Value)>> {
        let var: VarId = var.parse()?;
        Ok(self
            .coordinator
            .authorities()
            .filter_map(|authority| {
                authority
                    .committed_value(&var)
                    .map(|value| (authority.id(), value))
            })
            .collect())
    }

    /// Lock tables that break reader/writer exclusion, as readable lines
    pub fn exclusivity_violations(&self) -> Vec<String> {
        self.coordinator
            .authorities()
            .flat_map(|authority| {
                let site = authority.id();
                authority
                    .lock_table()
                    .into_iter()
                    .filter(|entry| !is_exclusive(entry))
                    .map(move |entry| {
                        format!(
                            "site {site} {}: readers {:?}, writers {:?}",
                            entry.var, entry.readers, entry.writers
                        )
                    })
            })
            .collect()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// At most one writer, and a writer shares the copy only with itself
fn is_exclusive(entry: &LockEntry) -> bool {
    match entry.writers.as_slice() {
        [] => true,
        [writer] => entry.readers.iter().all(|reader| reader == writer),
        _ => false,
    }
}

/// Assertions over a slice of events
pub trait EventAssertions {
    /// Assert `tx` committed; returns the sites that applied its writes
    fn assert_committed(&self, tx: &str) -> &[SiteId];

    /// Assert `tx` aborted; returns why
    fn assert_aborted(&self, tx: &str) -> &AbortReason;

    /// Assert `tx` blocked at least once; returns the first reason
    fn assert_blocked(&self, tx: &str) -> &BlockReason;

    /// Assert `tx` read `value` for `var` by any path
    fn assert_read(&self, tx: &str, var: &str, value: Value) -> &Self;

    /// Assert `tx` neither committed nor aborted
    fn assert_unresolved(&self, tx: &str) -> &Self;

    /// Assert some event was a rejection
    fn assert_rejected(&self) -> &Rejection;
}

impl EventAssertions for [Event] {
    fn assert_committed(&self, tx: &str) -> &[SiteId] {
        self.iter()
            .find_map(|event| match event {
                Event::Committed { tx: id, sites } if id.as_str() == tx => Some(sites.as_slice()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("Expected {tx} to commit"))
    }

    fn assert_aborted(&self, tx: &str) -> &AbortReason {
        self.iter()
            .find_map(|event| match event {
                Event::Aborted { tx: id, reason } if id.as_str() == tx => Some(reason),
                _ => None,
            })
            .unwrap_or_else(|| panic!("Expected {tx} to abort"))
    }

    fn assert_blocked(&self, tx: &str) -> &BlockReason {
        self.iter()
            .find_map(|event| match event {
                Event::Blocked { tx: id, reason, .. } if id.as_str() == tx => Some(reason),
                _ => None,
            })
            .unwrap_or_else(|| panic!("Expected {tx} to block"))
    }

    fn assert_read(&self, tx: &str, var: &str, value: Value) -> &Self {
        let found = self.iter().any(|event| match event {
            Event::LockGranted {
                tx: id,
                var: v,
                mode: LockMode::Read,
                value: read,
                ..
            }
            | Event::LockAlreadyHeld {
                tx: id,
                var: v,
                mode: LockMode::Read,
                value: read,
                ..
            }
            | Event::ValueRead {
                tx: id,
                var: v,
                value: read,
                ..
            } => id.as_str() == tx && v.as_str() == var && *read == value,
            _ => false,
        });
        assert!(found, "Expected {tx} to read {var}={value}");
        self
    }

    fn assert_unresolved(&self, tx: &str) -> &Self {
        let resolved = self.iter().any(|event| match event {
            Event::Committed { tx: id, .. } | Event::Aborted { tx: id, .. } => id.as_str() == tx,
            _ => false,
        });
        assert!(!resolved, "Expected {tx} to still be running");
        self
    }

    fn assert_rejected(&self) -> &Rejection {
        self.iter()
            .find_map(|event| match event {
                Event::Rejected { reason } => Some(reason),
                _ => None,
            })
            .unwrap_or_else(|| panic!("Expected a rejection"))
    }
}
