//! Incremental per-system membership.
//!
//! The [`SubscriptionEngine`] keeps, for every registered system, the exact
//! set of entities that currently satisfy its [`Filter`] and are Active. It
//! never rescans the population: callers re-evaluate one entity at a time
//! whenever that entity's signature or lifecycle state changes, so the cost
//! of a mutation is proportional to the number of systems.

use std::collections::HashSet;

use strata_component::{Entity, EntityState, Filter, Signature};

use crate::system::SystemId;

/// A membership transition produced by an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// The entity joined the system's matched set.
    Subscribed(SystemId),
    /// The entity left the system's matched set.
    Unsubscribed(SystemId),
}

#[derive(Debug, Default)]
struct Subscription {
    filter: Filter,
    /// Matched entities in the order they started matching.
    matched: Vec<Entity>,
    members: HashSet<Entity>,
}

impl Subscription {
    fn insert(&mut self, entity: Entity) -> bool {
        if self.members.insert(entity) {
            self.matched.push(entity);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, entity: Entity) -> bool {
        if !self.members.remove(&entity) {
            return false;
        }
        if let Some(pos) = self.matched.iter().position(|&e| e == entity) {
            self.matched.remove(pos);
        }
        true
    }
}

/// Matched-entity sets for every system.
#[derive(Debug, Default)]
pub struct SubscriptionEngine {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionEngine {
    /// Create an engine with no systems.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system with an empty filter and return its id.
    pub fn add_system(&mut self) -> SystemId {
        let id = SystemId(self.subscriptions.len() as u32);
        self.subscriptions.push(Subscription::default());
        id
    }

    /// Replace a system's filter. Existing members are kept until their next
    /// evaluation.
    pub fn set_filter(&mut self, system: SystemId, filter: Filter) {
        if let Some(subscription) = self.subscriptions.get_mut(system.index()) {
            subscription.filter = filter;
        }
    }

    /// A system's filter.
    #[must_use]
    pub fn filter(&self, system: SystemId) -> Option<&Filter> {
        self.subscriptions.get(system.index()).map(|s| &s.filter)
    }

    /// Number of systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if no system has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// A system's matched entities in insertion order.
    #[must_use]
    pub fn matched(&self, system: SystemId) -> &[Entity] {
        self.subscriptions
            .get(system.index())
            .map(|s| s.matched.as_slice())
            .unwrap_or_default()
    }

    /// Whether `entity` is currently in the system's matched set.
    #[must_use]
    pub fn is_subscribed(&self, system: SystemId, entity: Entity) -> bool {
        self.subscriptions
            .get(system.index())
            .is_some_and(|s| s.members.contains(&entity))
    }

    /// Recompute the entity's membership in every system.
    ///
    /// Returns the transitions in system registration order; systems whose
    /// membership did not change are omitted.
    pub fn evaluate(
        &mut self,
        entity: Entity,
        state: EntityState,
        signature: &Signature<'_>,
    ) -> Vec<SubscriptionChange> {
        let active = state.is_active();
        let mut changes = Vec::new();
        for (index, subscription) in self.subscriptions.iter_mut().enumerate() {
            let id = SystemId(index as u32);
            let matches = active && subscription.filter.matches(signature);
            if matches {
                if subscription.insert(entity) {
                    changes.push(SubscriptionChange::Subscribed(id));
                }
            } else if subscription.remove(entity) {
                changes.push(SubscriptionChange::Unsubscribed(id));
            }
        }
        changes
    }

    /// Drop the entity from every matched set, regardless of filters.
    pub fn unsubscribe_all(&mut self, entity: Entity) -> Vec<SubscriptionChange> {
        self.subscriptions
            .iter_mut()
            .enumerate()
            .filter_map(|(index, subscription)| {
                subscription
                    .remove(entity)
                    .then_some(SubscriptionChange::Unsubscribed(SystemId(index as u32)))
            })
            .collect()
    }
}
