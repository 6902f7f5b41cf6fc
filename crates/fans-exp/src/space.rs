use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One partial configuration: a subset of job input ports and their values.
pub type PartialConfig<V> = BTreeMap<String, V>;

/// Ordered list of independently varying configuration groups.
///
/// Enumeration yields the Cartesian product with the first group varying
/// slowest. Each tuple is merged by shallow key union where a later group
/// overrides keys set by an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace<V> {
    groups: Vec<Vec<PartialConfig<V>>>,
}

impl<V> Default for ParameterSpace<V> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<V: Clone> ParameterSpace<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: Vec<Vec<PartialConfig<V>>>) -> Self {
        Self { groups }
    }

    pub fn with_group(mut self, group: Vec<PartialConfig<V>>) -> Self {
        self.push_group(group);
        self
    }

    pub fn push_group(&mut self, group: Vec<PartialConfig<V>>) {
        self.groups.push(group);
    }

    /// Shorthand for a group holding a single literal configuration.
    pub fn push_fixed(&mut self, config: PartialConfig<V>) {
        self.groups.push(vec![config]);
    }

    pub fn groups(&self) -> &[Vec<PartialConfig<V>>] {
        &self.groups
    }

    /// Number of configurations [`ParameterSpace::enumerate`] yields.
    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every merged configuration in enumeration order.
    pub fn enumerate(&self) -> Vec<PartialConfig<V>> {
        let mut outputs = Vec::with_capacity(self.len());
        expand(&self.groups, 0, BTreeMap::new(), &mut outputs);
        outputs
    }
}

fn expand<V: Clone>(
    groups: &[Vec<PartialConfig<V>>],
    idx: usize,
    current: PartialConfig<V>,
    outputs: &mut Vec<PartialConfig<V>>,
) {
    if idx == groups.len() {
        outputs.push(current);
        return;
    }
    for partial in &groups[idx] {
        let mut next = current.clone();
        next.extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
        expand(groups, idx + 1, next, outputs);
    }
}
