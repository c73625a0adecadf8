//! Identity-keyed target store.
//!
//! At most one record per identity string. `put` replaces wholesale; there
//! is no field-level merge. Iteration order is unspecified but stable until
//! the next mutation.

use std::collections::HashMap;

use crate::types::Target;

/// The live traffic collection.
#[derive(Debug, Clone, Default)]
pub struct TrafficSet {
    targets: HashMap<String, Target>,
}

impl TrafficSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.targets.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&Target> {
        self.targets.get(identity)
    }

    pub(crate) fn get_mut(&mut self, identity: &str) -> Option<&mut Target> {
        self.targets.get_mut(identity)
    }

    /// Insert or replace by `target.identity`. Returns the replaced record.
    pub fn put(&mut self, target: Target) -> Option<Target> {
        self.targets.insert(target.identity.clone(), target)
    }

    pub fn remove(&mut self, identity: &str) -> Option<Target> {
        self.targets.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Target> {
        self.targets.values_mut()
    }

    /// Snapshot of the stored identities, safe to hold across mutations.
    pub fn identities(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
