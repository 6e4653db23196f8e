//! Static placement table

use std::collections::HashMap;
use tickdb_primitives::{SiteId, Value, VarId, VARIABLE_COUNT};

/// Where copies of a variable live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// A copy at every site
    Replicated,
    /// A single copy at one site
    Single(SiteId),
}

/// Fixed description of one variable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSpec {
    /// Variable name
    pub id: VarId,
    /// Dump ordering key
    pub order: u32,
    /// Value before any commit
    pub initial_value: Value,
    /// Hosting rule
    pub placement: Placement,
}

impl VariableSpec {
    /// Whether every site holds a copy
    pub fn is_replicated(&self) -> bool {
        self.placement == Placement::Replicated
    }

    /// Whether `site` holds a copy
    pub fn hosted_at(&self, site: SiteId) -> bool {
        match self.placement {
            Placement::Replicated => true,
            Placement::Single(home) => home == site,
        }
    }
}

/// Lookup table of every variable and its placement, built once at startup
#[derive(Clone, Debug)]
pub struct Catalog {
    /// Specs ordered by `order`
    variables: Vec<VariableSpec>,
    /// Name to position in `variables`
    by_id: HashMap<VarId, usize>,
}

impl Catalog {
    /// The fixed topology: `x1..x20`, even indices replicated everywhere,
    /// odd index `i` only at site `i mod 10 + 1`, initial value `10 * i`.
    pub fn standard() -> Self {
        let specs = (1..=VARIABLE_COUNT)
            .map(|index| VariableSpec {
                id: VarId::indexed(index),
                order: index,
                initial_value: Value::from(index) * 10,
                placement: if index % 2 == 0 {
                    Placement::Replicated
                } else {
                    Placement::Single(SiteId::wrapping(index))
                },
            })
            .collect();
        Self::from_specs(specs)
    }

    /// Build a catalog from arbitrary specs
    pub fn from_specs(mut variables: Vec<VariableSpec>) -> Self {
        variables.sort_by_key(|spec| spec.order);
        let by_id = variables
            .iter()
            .enumerate()
            .map(|(pos, spec)| (spec.id.clone(), pos))
            .collect();
        Self { variables, by_id }
    }

    /// Look up a variable
    pub fn get(&self, var: &VarId) -> Option<&VariableSpec> {
        self.by_id.get(var).map(|&pos| &self.variables[pos])
    }

    /// All variables in dump order
    pub fn variables(&self) -> impl Iterator<Item = &VariableSpec> {
        self.variables.iter()
    }

    /// Variables with a copy at `site`, in dump order
    pub fn hosted_at(&self, site: SiteId) -> impl Iterator<Item = &VariableSpec> {
        self.variables.iter().filter(move |spec| spec.hosted_at(site))
    }

    /// Sites holding a copy of `var`, ascending
    pub fn sites_hosting(&self, var: &VarId) -> Vec<SiteId> {
        match self.get(var) {
            Some(spec) => SiteId::all().filter(|&s| spec.hosted_at(s)).collect(),
            None => Vec::new(),
        }
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
