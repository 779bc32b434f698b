//! Entity lifecycle transitions.
//!
//! Each transition updates the entity's state, notifies every manager, and
//! then reports the subscription changes it caused, in that order.

use strata_component::{Entity, Result, Transition};
use tracing::debug;

use crate::notify::{LifecycleEvent, Notification};
use crate::world::World;

impl World {
    /// Make a Spawned entity Active.
    ///
    /// # Errors
    ///
    /// [`strata_component::EcsError::InvalidTransition`] unless the entity is
    /// Spawned; [`strata_component::EcsError::EntityNotFound`] for removed
    /// or stale handles.
    pub fn add(&mut self, entity: Entity) -> Result<()> {
        self.apply_transition(entity, Transition::Add, LifecycleEvent::Added)
    }

    /// Bring a Disabled entity back to Active.
    ///
    /// # Errors
    ///
    /// As [`World::add`]; the entity must be Disabled.
    pub fn enable(&mut self, entity: Entity) -> Result<()> {
        self.apply_transition(entity, Transition::Enable, LifecycleEvent::Enabled)
    }

    /// Take an Active entity out of every system without removing it.
    ///
    /// # Errors
    ///
    /// As [`World::add`]; the entity must be Active.
    pub fn disable(&mut self, entity: Entity) -> Result<()> {
        self.apply_transition(entity, Transition::Disable, LifecycleEvent::Disabled)
    }

    /// Remove an entity for good.
    ///
    /// Managers see `deleted` and each system that had the entity sees
    /// `unsubscribed`; components stay readable during those hooks. The
    /// handle is recycled once they have all run, after which every
    /// operation on it fails with `EntityNotFound`.
    ///
    /// # Errors
    ///
    /// [`strata_component::EcsError::EntityNotFound`] if already removed.
    pub fn remove(&mut self, entity: Entity) -> Result<()> {
        self.apply_transition(entity, Transition::Remove, LifecycleEvent::Deleted)
    }

    fn apply_transition(
        &mut self,
        entity: Entity,
        transition: Transition,
        event: LifecycleEvent,
    ) -> Result<()> {
        let state = self.store.transition(entity, transition)?;
        debug!(%entity, %transition, %state, "entity transition");

        self.enqueue(Notification::Lifecycle(event, entity));
        if transition == Transition::Remove {
            let changes = self.subscriptions.unsubscribe_all(entity);
            self.enqueue_changes(entity, changes);
            self.enqueue(Notification::Release(entity));
        } else {
            self.reevaluate(entity);
        }
        self.flush();
        Ok(())
    }
}
