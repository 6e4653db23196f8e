//! Transaction coordinator
//!
//! Owns the site lock authorities and the registry of live transactions.
//! Operations arrive one at a time, tagged with their tick; the first
//! operation of a new tick triggers a retry pass over blocked transactions
//! before it is dispatched.

mod access;
mod report;
mod retry;

use crate::error::Rejection;
use crate::event::{AbortReason, Event, SiteCheck};
use crate::sink::EventSink;
use crate::transaction::Transaction;
use retry::Resolution;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tickdb_locking::SiteLockAuthority;
use tickdb_metrics::{names, Metrics};
use tickdb_primitives::{SiteId, Tick, Timestamp, TxId, VarId};
use tickdb_storage::{Catalog, Site};
use tickdb_types::{parse_line, Operation, OperationKind};

/// Whether an operation is new or replayed from a blocked queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DispatchMode {
    /// First dispatch; a block enqueues the operation
    Fresh,
    /// Replay of a queue head; a block leaves the queue as is
    Retry,
}

/// Concurrency control and recovery engine
pub struct Coordinator {
    catalog: Catalog,
    authorities: BTreeMap<SiteId, SiteLockAuthority>,
    transactions: HashMap<TxId, Transaction>,
    /// Blocked transactions in the order they blocked
    blocked: Vec<TxId>,
    /// Variables some read-only transaction has already been served
    snapshot_reads: HashSet<VarId>,
    current_tick: Option<Tick>,
    begun_in_tick: u32,
    metrics: Arc<Metrics>,
}

impl Coordinator {
    /// Coordinator over the standard ten-site topology
    pub fn new() -> Self {
        Self::with_catalog(Catalog::standard())
    }

    /// Coordinator over a custom placement table
    pub fn with_catalog(catalog: Catalog) -> Self {
        let authorities = SiteId::all()
            .map(|id| (id, SiteLockAuthority::new(Site::new(id, &catalog))))
            .collect();
        Self {
            catalog,
            authorities,
            transactions: HashMap::new(),
            blocked: Vec::new(),
            snapshot_reads: HashSet::new(),
            current_tick: None,
            begun_in_tick: 0,
            metrics: Metrics::shared(),
        }
    }

    /// Record into a shared metrics store
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    // ==================== Driving ====================

    /// Run a whole script, line `n` at tick `n`. Returns the last tick.
    pub fn run_script(&mut self, input: &str, sink: &mut dyn EventSink) -> Tick {
        let mut last = 0;
        for (idx, line) in input.lines().enumerate() {
            let tick = idx as Tick + 1;
            for parsed in parse_line(line, tick) {
                match parsed {
                    Ok(op) => self.submit(op, sink),
                    Err(err) => self.reject(err.into(), sink),
                }
            }
            last = tick;
        }
        last
    }

    /// Execute one operation at its tick
    pub fn submit(&mut self, op: Operation, sink: &mut dyn EventSink) {
        self.advance_clock(op.tick, sink);
        self.metrics.incr(names::OPS_DISPATCHED);
        sink.emit(Event::Operation {
            tick: op.tick,
            text: op.text.clone(),
        });
        self.dispatch(op, sink);
        self.publish_gauges();
    }

    /// Report a dropped operation
    pub fn reject(&mut self, reason: Rejection, sink: &mut dyn EventSink) {
        tracing::debug!(%reason, "operation rejected");
        self.metrics.incr(names::OPS_REJECTED);
        sink.emit(Event::Rejected { reason });
    }

    fn advance_clock(&mut self, tick: Tick, sink: &mut dyn EventSink) {
        match self.current_tick {
            Some(current) if current == tick => return,
            Some(current) if tick < current => {
                tracing::warn!(current, tick, "operation tick went backwards");
            }
            _ => {}
        }
        self.current_tick = Some(tick);
        self.begun_in_tick = 0;
        self.retry_blocked(sink);
    }

    fn now(&self) -> Tick {
        self.current_tick.unwrap_or_default()
    }

    fn dispatch(&mut self, op: Operation, sink: &mut dyn EventSink) {
        if op.kind.is_queueable() {
            self.dispatch_transactional(op, sink);
            return;
        }
        match &op.kind {
            OperationKind::Begin { tx } => self.begin(tx.clone(), false, sink),
            OperationKind::BeginReadOnly { tx } => self.begin(tx.clone(), true, sink),
            OperationKind::Fail { site } => {
                if let Some(site) = self.site_id(*site, sink) {
                    self.fail(site, sink);
                }
            }
            OperationKind::Recover { site } => {
                if let Some(site) = self.site_id(*site, sink) {
                    self.recover(site, sink);
                }
            }
            OperationKind::Dump => self.dump_all(sink),
            OperationKind::DumpSite { site } => {
                if let Some(site) = self.site_id(*site, sink) {
                    self.dump_site(site, sink);
                }
            }
            OperationKind::DumpVariable { var } => self.dump_variable(var, sink),
            OperationKind::QueryState => self.query_state(sink),
            OperationKind::End { .. } | OperationKind::Read { .. } | OperationKind::Write { .. } => {}
        }
    }

    fn dispatch_transactional(&mut self, op: Operation, sink: &mut dyn EventSink) {
        let Some(tx) = op.tx().cloned() else {
            return;
        };
        if !self.transactions.contains_key(&tx) {
            self.reject(
                Rejection::UnknownTransaction {
                    tx,
                    op: op.text.clone(),
                },
                sink,
            );
            return;
        }

        // Keep submission order behind a blocked operation
        if self.is_blocked(&tx) {
            self.enqueue(&tx, op, sink);
            return;
        }

        match &op.kind {
            OperationKind::End { .. } => {
                self.end(&tx, sink);
            }
            OperationKind::Read { var, .. } => {
                self.read(&tx, &op, var.clone(), DispatchMode::Fresh, sink);
            }
            OperationKind::Write { var, value, .. } => {
                self.write(&tx, &op, var.clone(), *value, DispatchMode::Fresh, sink);
            }
            _ => {}
        }
    }

    fn enqueue(&mut self, tx: &TxId, op: Operation, sink: &mut dyn EventSink) {
        let Some(txn) = self.transactions.get_mut(tx) else {
            return;
        };
        let text = op.text.clone();
        if txn.enqueue(op) {
            self.metrics.incr(names::OPS_QUEUED);
            sink.emit(Event::Queued { tx: tx.clone(), op: text });
        } else {
            tracing::trace!(%tx, op = %text, "already queued");
        }
    }

    fn site_id(&mut self, raw: i64, sink: &mut dyn EventSink) -> Option<SiteId> {
        match SiteId::new(raw) {
            Ok(site) => Some(site),
            Err(_) => {
                self.reject(Rejection::InvalidSiteId { site: raw }, sink);
                None
            }
        }
    }

    fn publish_gauges(&self) {
        self.metrics
            .set_gauge(names::TX_LIVE, self.transactions.len() as i64);
        self.metrics
            .set_gauge(names::TX_BLOCKED, self.blocked.len() as i64);
    }

    // ==================== Transaction Lifecycle ====================

    fn begin(&mut self, tx: TxId, read_only: bool, sink: &mut dyn EventSink) {
        if self.transactions.contains_key(&tx) {
            self.reject(Rejection::DuplicateBegin { tx }, sink);
            return;
        }

        let timestamp = Timestamp::new(self.now(), self.begun_in_tick);
        self.begun_in_tick += 1;

        let txn = if read_only {
            let mut snapshot = BTreeMap::new();
            for authority in self.authorities.values() {
                for (var, value) in authority.readable_values() {
                    snapshot.entry(var).or_insert(value);
                }
            }
            Transaction::read_only(tx.clone(), timestamp, snapshot)
        } else {
            Transaction::new(tx.clone(), timestamp)
        };

        tracing::info!(%tx, %timestamp, read_only, "transaction begun");
        self.transactions.insert(tx.clone(), txn);
        self.metrics.incr(names::TX_BEGUN);
        sink.emit(Event::TransactionBegun {
            tx,
            timestamp,
            read_only,
        });
    }

    /// Commit `tx` if every site it touched stayed up since the first
    /// access, otherwise abort it
    fn end(&mut self, tx: &TxId, sink: &mut dyn EventSink) -> Resolution {
        let Some(txn) = self.transactions.get(tx) else {
            return Resolution::Aborted;
        };

        let checks: Vec<SiteCheck> = txn
            .first_access()
            .iter()
            .filter_map(|(site, first)| {
                let state = self.authorities.get(site)?.site();
                Some(SiteCheck {
                    site: *site,
                    up: state.is_up(),
                    failed_at: state.failed_at(),
                    first_access: *first,
                    valid: state.up_since(*first),
                })
            })
            .collect();

        if !checks.is_empty() {
            sink.emit(Event::CommitCheck {
                tx: tx.clone(),
                sites: checks.clone(),
            });
        }

        let invalid: Vec<SiteId> = checks
            .iter()
            .filter(|check| !check.valid)
            .map(|check| check.site)
            .collect();
        if !invalid.is_empty() {
            self.abort(tx, AbortReason::SiteFailure { sites: invalid }, sink);
            return Resolution::Aborted;
        }

        self.commit(tx, sink);
        Resolution::Committed
    }

    fn commit(&mut self, tx: &TxId, sink: &mut dyn EventSink) {
        let Some(txn) = self.transactions.remove(tx) else {
            return;
        };
        self.blocked.retain(|id| id != tx);

        let mut sites = Vec::new();
        for authority in self.authorities.values_mut() {
            if !authority.commit(tx, txn.pending_writes()).is_empty() {
                sites.push(authority.id());
            }
        }

        let lifetime = self.now().saturating_sub(txn.timestamp().tick);
        self.metrics.incr(names::TX_COMMITTED);
        self.metrics.observe(names::TX_LIFETIME_TICKS, lifetime);
        tracing::info!(%tx, writes = txn.pending_writes().len(), sites = sites.len(), "transaction committed");
        sink.emit(Event::Committed {
            tx: tx.clone(),
            sites,
        });
    }

    /// Release `tx` everywhere and forget it
    fn abort(&mut self, tx: &TxId, reason: AbortReason, sink: &mut dyn EventSink) {
        for authority in self.authorities.values_mut() {
            authority.abort(tx);
        }
        if let Some(mut txn) = self.transactions.remove(tx) {
            txn.clear();
        }
        self.blocked.retain(|id| id != tx);

        self.metrics.incr(names::TX_ABORTED);
        tracing::info!(%tx, %reason, "transaction aborted");
        sink.emit(Event::Aborted {
            tx: tx.clone(),
            reason,
        });
    }

    // ==================== Sites ====================

    fn fail(&mut self, site: SiteId, sink: &mut dyn EventSink) {
        let now = self.now();
        let Some(authority) = self.authorities.get_mut(&site) else {
            return;
        };
        match authority.fail(now) {
            Ok(released) => {
                for lock in &released {
                    if let Some(txn) = self.transactions.get_mut(&lock.tx) {
                        txn.forget_lock(lock);
                    }
                }
                self.metrics.incr(names::SITE_FAILURES);
                sink.emit(Event::SiteFailed {
                    site,
                    tick: now,
                    released: released.len(),
                });
            }
            Err(err) => {
                tracing::debug!(%err, "fail ignored");
                sink.emit(Event::SiteAlreadyDown { site });
            }
        }
    }

    fn recover(&mut self, site: SiteId, sink: &mut dyn EventSink) {
        let Some(authority) = self.authorities.get_mut(&site) else {
            return;
        };
        match authority.recover() {
            Ok(()) => {
                self.metrics.incr(names::SITE_RECOVERIES);
                sink.emit(Event::SiteRecovered { site });
            }
            Err(err) => {
                tracing::debug!(%err, "recover ignored");
                sink.emit(Event::SiteAlreadyUp { site });
            }
        }
    }

    // ==================== Accessors ====================

    /// Live transaction by id
    pub fn transaction(&self, tx: &TxId) -> Option<&Transaction> {
        self.transactions.get(tx)
    }

    /// Number of live transactions
    pub fn live_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Check if `tx` is waiting on its queue
    pub fn is_blocked(&self, tx: &TxId) -> bool {
        self.blocked.contains(tx)
    }

    /// Blocked transactions in blocking order
    pub fn blocked(&self) -> &[TxId] {
        &self.blocked
    }

    /// Lock authority of `site`
    pub fn authority(&self, site: SiteId) -> Option<&SiteLockAuthority> {
        self.authorities.get(&site)
    }

    /// Every lock authority in site order
    pub fn authorities(&self) -> impl Iterator<Item = &SiteLockAuthority> {
        self.authorities.values()
    }

    /// Placement table
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Tick of the last submitted operation
    pub fn current_tick(&self) -> Option<Tick> {
        self.current_tick
    }

    /// Metrics store
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
