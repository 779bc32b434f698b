//! Static watch/exclude filters.
//!
//! A [`Filter`] declares which component types an entity must carry and which
//! it must not. Systems build their filter once, during initialization, and
//! the subscription engine tests entity signatures against it on every
//! structural change.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::storage::Signature;

/// A conjunction of "has" and "has-not" conditions on component ids.
///
/// `watch ∩ exclude = ∅` is a usage precondition and is not validated; a
/// filter that violates it simply matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Component types an entity must all possess.
    pub watch: BTreeSet<ComponentId>,
    /// Component types an entity must possess none of.
    pub exclude: BTreeSet<ComponentId>,
}

impl Filter {
    /// Create a filter that matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a component.
    #[must_use]
    pub fn with(mut self, id: ComponentId) -> Self {
        self.watch.insert(id);
        self
    }

    /// Forbid a component.
    #[must_use]
    pub fn without(mut self, id: ComponentId) -> Self {
        self.exclude.insert(id);
        self
    }

    /// Whether a set of attached component ids satisfies the filter.
    #[must_use]
    pub fn matches(&self, signature: &Signature<'_>) -> bool {
        self.watch.iter().all(|&id| signature.contains(id))
            && !self.exclude.iter().any(|&id| signature.contains(id))
    }

    /// Returns `true` if the filter names no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watch.is_empty() && self.exclude.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentFlags, ComponentRegistry};
    use crate::storage::EntityStore;

    #[test]
    fn test_all_presence_combinations() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register_raw("A", 1, ComponentFlags::SINGLE);
        let b = registry.register_raw("B", 1, ComponentFlags::SINGLE);
        let c = registry.register_raw("C", 1, ComponentFlags::SINGLE);
        let filter = Filter::new().with(a).with(b).without(c);

        let mut store = EntityStore::new();
        for mask in 0u8..8 {
            let e = store.spawn();
            for (bit, id) in [a, b, c].into_iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    store.set_component(&registry, e, id, 0u8).unwrap();
                }
            }
            let expected = mask == 0b011;
            assert_eq!(
                filter.matches(&store.signature(e).unwrap()),
                expected,
                "mask {mask:03b}"
            );
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let mut store = EntityStore::new();
        let e = store.spawn();
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&store.signature(e).unwrap()));
    }

    #[test]
    fn test_overlapping_filter_matches_nothing() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register_raw("A", 1, ComponentFlags::SINGLE);
        let filter = Filter::new().with(a).without(a);

        let mut store = EntityStore::new();
        let e = store.spawn();
        assert!(!filter.matches(&store.signature(e).unwrap()));
        store.set_component(&registry, e, a, 1u8).unwrap();
        assert!(!filter.matches(&store.signature(e).unwrap()));
    }
}
