//! Hook delivery.
//!
//! Membership and state changes are applied synchronously; the hook calls
//! they imply are queued and delivered in FIFO order. The queue drains before
//! the outermost [`World`] call returns. Hooks never nest: a notification
//! raised while a hook is running joins the back of the queue and is
//! delivered once the notification being handled has reached every
//! recipient.

use strata_component::Entity;
use tracing::{debug, warn};

use crate::subscription::SubscriptionChange;
use crate::system::{Manager, SystemId, System};
use crate::world::World;

/// A lifecycle transition reported to every manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `Spawned -> Active`
    Added,
    /// `Disabled -> Active`
    Enabled,
    /// `Active -> Disabled`
    Disabled,
    /// `* -> Removed`
    Deleted,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Notification {
    Lifecycle(LifecycleEvent, Entity),
    Subscription(SubscriptionChange, Entity),
    /// Free a removed entity's storage once its hooks have run.
    Release(Entity),
}

impl World {
    pub(crate) fn enqueue(&mut self, notification: Notification) {
        self.pending.push_back(notification);
    }

    pub(crate) fn enqueue_changes(&mut self, entity: Entity, changes: Vec<SubscriptionChange>) {
        self.pending.extend(
            changes
                .into_iter()
                .map(|change| Notification::Subscription(change, entity)),
        );
    }

    /// Deliver queued notifications unless a hook is already running.
    pub(crate) fn flush(&mut self) {
        if self.hook_depth > 0 {
            return;
        }
        while let Some(notification) = self.pending.pop_front() {
            match notification {
                Notification::Lifecycle(event, entity) => {
                    for index in 0..self.managers.len() {
                        self.invoke_manager(index, |manager, world| match event {
                            LifecycleEvent::Added => manager.added(world, entity),
                            LifecycleEvent::Enabled => manager.enabled(world, entity),
                            LifecycleEvent::Disabled => manager.disabled(world, entity),
                            LifecycleEvent::Deleted => manager.deleted(world, entity),
                        });
                    }
                }
                Notification::Subscription(SubscriptionChange::Subscribed(id), entity) => {
                    self.invoke_system(id, |system, world| system.subscribed(world, entity));
                }
                Notification::Subscription(SubscriptionChange::Unsubscribed(id), entity) => {
                    self.invoke_system(id, |system, world| system.unsubscribed(world, entity));
                }
                Notification::Release(entity) => match self.store.release(entity) {
                    Ok(()) => debug!(%entity, "released entity storage"),
                    Err(err) => warn!(%entity, %err, "entity storage already released"),
                },
            }
        }
    }

    /// Run one system hook with the system temporarily moved out of the
    /// world, then deliver whatever the hook queued.
    pub(crate) fn call_system<R>(
        &mut self,
        id: SystemId,
        hook: impl FnOnce(&mut dyn System, &mut World) -> R,
    ) -> Option<R> {
        let result = self.invoke_system(id, hook);
        self.flush();
        result
    }

    fn invoke_system<R>(
        &mut self,
        id: SystemId,
        hook: impl FnOnce(&mut dyn System, &mut World) -> R,
    ) -> Option<R> {
        let mut system = self.systems.get_mut(id.index())?.behavior.take()?;
        self.hook_depth += 1;
        let result = hook(system.as_mut(), self);
        self.hook_depth -= 1;
        self.systems[id.index()].behavior = Some(system);
        Some(result)
    }

    fn invoke_manager(&mut self, index: usize, hook: impl FnOnce(&mut dyn Manager, &mut World)) {
        let Some(mut manager) = self
            .managers
            .get_mut(index)
            .and_then(|slot| slot.behavior.take())
        else {
            return;
        };
        self.hook_depth += 1;
        hook(manager.as_mut(), self);
        self.hook_depth -= 1;
        self.managers[index].behavior = Some(manager);
    }
}
