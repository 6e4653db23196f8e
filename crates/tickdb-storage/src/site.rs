//! A simulated site and the variable copies it hosts

use crate::catalog::Catalog;
use crate::ledger::VariableLedger;
use std::collections::HashMap;
use tickdb_primitives::{SiteId, Tick, TxId, VarId};

/// One site: status plus the ledgers of every variable it hosts
#[derive(Clone, Debug)]
pub struct Site {
    id: SiteId,
    up: bool,
    /// Tick of the most recent failure; kept after recovery
    failed_at: Option<Tick>,
    /// Ledgers in dump order
    variables: Vec<VariableLedger>,
    index: HashMap<VarId, usize>,
}

impl Site {
    /// Build a site with fresh copies of every variable the catalog places here
    pub fn new(id: SiteId, catalog: &Catalog) -> Self {
        let variables: Vec<VariableLedger> =
            catalog.hosted_at(id).map(VariableLedger::new).collect();
        let index = variables
            .iter()
            .enumerate()
            .map(|(pos, ledger)| (ledger.id().clone(), pos))
            .collect();
        Self {
            id,
            up: true,
            failed_at: None,
            variables,
            index,
        }
    }

    /// Site id
    pub fn id(&self) -> SiteId {
        self.id
    }

    /// Check if the site is up
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Tick of the most recent failure
    pub fn failed_at(&self) -> Option<Tick> {
        self.failed_at
    }

    /// Whether the site is up and has not failed at or after `since`
    pub fn up_since(&self, since: Tick) -> bool {
        self.up && self.failed_at.map_or(true, |failed| failed < since)
    }

    /// Mark down at `tick`
    pub fn mark_down(&mut self, tick: Tick) {
        self.up = false;
        self.failed_at = Some(tick);
    }

    /// Mark up
    pub fn mark_up(&mut self) {
        self.up = true;
    }

    /// Check if a copy of `var` lives here
    pub fn hosts(&self, var: &VarId) -> bool {
        self.index.contains_key(var)
    }

    /// Ledger of `var`
    pub fn variable(&self, var: &VarId) -> Option<&VariableLedger> {
        self.index.get(var).map(|&pos| &self.variables[pos])
    }

    /// Mutable ledger of `var`
    pub fn variable_mut(&mut self, var: &VarId) -> Option<&mut VariableLedger> {
        self.index.get(var).map(|&pos| &mut self.variables[pos])
    }

    /// Ledgers in dump order
    pub fn variables(&self) -> impl Iterator<Item = &VariableLedger> {
        self.variables.iter()
    }

    /// Mutable ledgers in dump order
    pub fn variables_mut(&mut self) -> impl Iterator<Item = &mut VariableLedger> {
        self.variables.iter_mut()
    }

    /// Drop every lock `tx` holds here; returns how many copies were touched
    pub fn release_all(&mut self, tx: &TxId) -> usize {
        self.variables
            .iter_mut()
            .map(|ledger| ledger.release(tx))
            .filter(|released| *released)
            .count()
    }
}
