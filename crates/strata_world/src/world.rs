//! The [`World`]: aggregate root of the runtime.
//!
//! The world owns the component registry, the entity store, the subscription
//! engine, every registered system and manager, and the simulation clock. It
//! is the only path to any of them; there is no global world.

use std::collections::VecDeque;
use std::fmt;

use strata_component::{
    Component, ComponentFlags, ComponentId, ComponentRegistry, EcsError, Entity, EntityState,
    EntityStore, Filter, Result,
};
use tracing::{debug, info, warn};

use crate::notify::Notification;
use crate::subscription::SubscriptionEngine;
use crate::system::{Manager, ManagerFlags, ManagerId, System, SystemFlags, SystemId, Watches};

pub(crate) struct SystemSlot {
    pub(crate) name: String,
    pub(crate) flags: SystemFlags,
    /// `None` while one of the system's hooks is running.
    pub(crate) behavior: Option<Box<dyn System>>,
}

pub(crate) struct ManagerSlot {
    pub(crate) name: String,
    pub(crate) flags: ManagerFlags,
    pub(crate) behavior: Option<Box<dyn Manager>>,
}

/// The ECS world.
///
/// # Examples
///
/// ```rust
/// use strata_world::World;
///
/// let mut world = World::new();
/// world.initialize().unwrap();
/// let e = world.spawn();
/// world.add(e).unwrap();
/// world.process(1.0 / 60.0).unwrap();
/// assert_eq!(world.tick(), 1);
/// ```
pub struct World {
    pub(crate) registry: ComponentRegistry,
    pub(crate) store: EntityStore,
    pub(crate) subscriptions: SubscriptionEngine,
    pub(crate) systems: Vec<SystemSlot>,
    pub(crate) managers: Vec<ManagerSlot>,
    pub(crate) pending: VecDeque<Notification>,
    /// Number of hooks currently on the call stack.
    pub(crate) hook_depth: usize,
    /// Set once `initialize` starts collecting watches, whatever its outcome.
    pub(crate) sealed: bool,
    pub(crate) initialized: bool,
    pub(crate) elapsed: f64,
    pub(crate) tick: u64,
}

impl World {
    /// Create an empty, uninitialized world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ComponentRegistry::new(),
            store: EntityStore::new(),
            subscriptions: SubscriptionEngine::new(),
            systems: Vec::new(),
            managers: Vec::new(),
            pending: VecDeque::new(),
            hook_depth: 0,
            sealed: false,
            initialized: false,
            elapsed: 0.0,
            tick: 0,
        }
    }

    // -- Registration --

    /// Register a component type. Idempotent.
    pub fn register_component<T: Component>(&mut self) -> ComponentId {
        self.registry.register::<T>()
    }

    /// Register a component by name, element size, and storage flags.
    pub fn register_component_raw(
        &mut self,
        name: &str,
        size: usize,
        flags: ComponentFlags,
    ) -> ComponentId {
        self.registry.register_raw(name, size, flags)
    }

    /// Register a system. Systems run in registration order.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadyInitialized`] once [`World::initialize`] has been
    /// called.
    pub fn register_system(&mut self, system: impl System + 'static) -> Result<SystemId> {
        if self.sealed {
            return Err(EcsError::AlreadyInitialized);
        }
        let id = self.subscriptions.add_system();
        let name = system.name().to_string();
        let flags = system.flags();
        debug!(%id, system = name, passive = flags.is_passive(), "registered system");
        self.systems.push(SystemSlot {
            name,
            flags,
            behavior: Some(Box::new(system)),
        });
        Ok(id)
    }

    /// Register a manager. Managers are notified in registration order.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadyInitialized`] once [`World::initialize`] has been
    /// called.
    pub fn register_manager(&mut self, manager: impl Manager + 'static) -> Result<ManagerId> {
        if self.sealed {
            return Err(EcsError::AlreadyInitialized);
        }
        let id = ManagerId(self.managers.len() as u32);
        let name = manager.name().to_string();
        let flags = manager.flags();
        debug!(%id, manager = name, flags = flags.0, "registered manager");
        self.managers.push(ManagerSlot {
            name,
            flags,
            behavior: Some(Box::new(manager)),
        });
        Ok(id)
    }

    /// Close registration and collect every system's watch and exclude sets.
    ///
    /// Each system's [`System::add_watches`] runs at most once over the
    /// world's lifetime. Entities that are already Active are then evaluated
    /// against the new filters.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadyInitialized`] on any call after the first, or the
    /// first error returned by an `add_watches` hook. In that case no filter
    /// is installed, components registered by the hooks are forgotten, and
    /// the world stays uninitialized for good.
    pub fn initialize(&mut self) -> Result<()> {
        if self.sealed {
            return Err(EcsError::AlreadyInitialized);
        }
        self.sealed = true;

        let registered = self.registry.len();
        let mut filters = Vec::with_capacity(self.systems.len());
        for slot in &mut self.systems {
            let mut filter = Filter::new();
            if let Some(system) = slot.behavior.as_mut() {
                let collected =
                    system.add_watches(&mut Watches::new(&mut self.registry, &mut filter));
                if let Err(err) = collected {
                    warn!(system = slot.name, %err, "add_watches failed, world stays uninitialized");
                    self.registry.truncate(registered);
                    return Err(err);
                }
            }
            debug!(
                system = slot.name,
                watch = filter.watch.len(),
                exclude = filter.exclude.len(),
                "collected watches"
            );
            filters.push(filter);
        }
        for (index, filter) in filters.into_iter().enumerate() {
            self.subscriptions.set_filter(SystemId(index as u32), filter);
        }
        self.initialized = true;

        info!(
            systems = self.systems.len(),
            managers = self.managers.len(),
            components = self.registry.len(),
            "world initialized"
        );

        let entities: Vec<Entity> = self.store.entities().collect();
        for entity in entities {
            self.reevaluate(entity);
        }
        self.flush();
        Ok(())
    }

    /// Whether [`World::initialize`] has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // -- Entities --

    /// Allocate a new entity in state Spawned. It is invisible to systems
    /// and managers until [`World::add`].
    pub fn spawn(&mut self) -> Entity {
        let entity = self.store.spawn();
        debug!(%entity, "spawned entity");
        entity
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] once the entity's storage is released.
    pub fn state(&self, entity: Entity) -> Result<EntityState> {
        self.store.state(entity)
    }

    /// Whether the handle refers to an entity that has not been removed.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.is_alive(entity)
    }

    /// Read-only access to the entity store.
    #[must_use]
    pub fn entities(&self) -> &EntityStore {
        &self.store
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- Components by id --

    /// Set the single slot of a Single component.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::set_component`].
    pub fn set_component<T: Send + Sync + 'static>(
        &mut self,
        entity: Entity,
        component: ComponentId,
        value: T,
    ) -> Result<()> {
        let changed = self
            .store
            .set_component(&self.registry, entity, component, value)?;
        self.signature_changed(entity, changed);
        Ok(())
    }

    /// Append to a Multiple component, or set a Single one.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::add_component`].
    pub fn add_component<T: Send + Sync + 'static>(
        &mut self,
        entity: Entity,
        component: ComponentId,
        value: T,
    ) -> Result<()> {
        let changed = self
            .store
            .add_component(&self.registry, entity, component, value)?;
        self.signature_changed(entity, changed);
        Ok(())
    }

    /// Borrow the Single value, or element 0 of a Multiple sequence.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::get_component`].
    pub fn get_component<T: 'static>(&self, entity: Entity, component: ComponentId) -> Result<&T> {
        self.store.get_component(&self.registry, entity, component)
    }

    /// Mutably borrow the Single value, or element 0 of a Multiple sequence.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::get_component_mut`].
    pub fn get_component_mut<T: 'static>(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<&mut T> {
        self.store
            .get_component_mut(&self.registry, entity, component)
    }

    /// Borrow element `index` of a component's sequence.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::get_component_at`].
    pub fn get_component_at<T: 'static>(
        &self,
        entity: Entity,
        component: ComponentId,
        index: usize,
    ) -> Result<&T> {
        self.store
            .get_component_at(&self.registry, entity, component, index)
    }

    /// Mutably borrow element `index` of a component's sequence.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::get_component_at_mut`].
    pub fn get_component_at_mut<T: 'static>(
        &mut self,
        entity: Entity,
        component: ComponentId,
        index: usize,
    ) -> Result<&mut T> {
        self.store
            .get_component_at_mut(&self.registry, entity, component, index)
    }

    /// Number of attached instances; 0 if absent.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::component_count`].
    pub fn component_count(&self, entity: Entity, component: ComponentId) -> Result<usize> {
        self.store.component_count(&self.registry, entity, component)
    }

    /// Detach every instance of a component.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::remove_component`].
    pub fn remove_component(&mut self, entity: Entity, component: ComponentId) -> Result<()> {
        self.store
            .remove_component(&self.registry, entity, component)?;
        self.signature_changed(entity, true);
        Ok(())
    }

    /// Detach one instance, shifting later indices down.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::remove_component_at`].
    pub fn remove_component_at(
        &mut self,
        entity: Entity,
        component: ComponentId,
        index: usize,
    ) -> Result<()> {
        let changed = self
            .store
            .remove_component_at(&self.registry, entity, component, index)?;
        self.signature_changed(entity, changed);
        Ok(())
    }

    // -- Components by type --

    /// Typed [`World::set_component`]; registers `T` on first use.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::set_component`].
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let id = self.registry.register::<T>();
        self.set_component(entity, id, value)
    }

    /// Typed [`World::add_component`]; registers `T` on first use.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::add_component`].
    pub fn add_to<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let id = self.registry.register::<T>();
        self.add_component(entity, id, value)
    }

    /// Typed [`World::get_component`].
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if `T` was never registered, otherwise
    /// see [`EntityStore::get_component`].
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        self.get_component(entity, self.registry.id_of::<T>()?)
    }

    /// Typed [`World::get_component_mut`].
    ///
    /// # Errors
    ///
    /// As [`World::get`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let id = self.registry.id_of::<T>()?;
        self.get_component_mut(entity, id)
    }

    /// Typed [`World::get_component_at`].
    ///
    /// # Errors
    ///
    /// As [`World::get`], plus [`EcsError::IndexOutOfRange`].
    pub fn get_at<T: Component>(&self, entity: Entity, index: usize) -> Result<&T> {
        self.get_component_at(entity, self.registry.id_of::<T>()?, index)
    }

    /// Typed [`World::get_component_at_mut`].
    ///
    /// # Errors
    ///
    /// As [`World::get_at`].
    pub fn get_at_mut<T: Component>(&mut self, entity: Entity, index: usize) -> Result<&mut T> {
        let id = self.registry.id_of::<T>()?;
        self.get_component_at_mut(entity, id, index)
    }

    /// Typed [`World::component_count`].
    ///
    /// # Errors
    ///
    /// As [`World::get`].
    pub fn count<T: Component>(&self, entity: Entity) -> Result<usize> {
        self.component_count(entity, self.registry.id_of::<T>()?)
    }

    /// Typed [`World::remove_component`].
    ///
    /// # Errors
    ///
    /// As [`World::get`].
    pub fn detach<T: Component>(&mut self, entity: Entity) -> Result<()> {
        let id = self.registry.id_of::<T>()?;
        self.remove_component(entity, id)
    }

    /// Typed [`World::remove_component_at`].
    ///
    /// # Errors
    ///
    /// As [`World::get_at`].
    pub fn detach_at<T: Component>(&mut self, entity: Entity, index: usize) -> Result<()> {
        let id = self.registry.id_of::<T>()?;
        self.remove_component_at(entity, id, index)
    }

    // -- Systems --

    /// A system's currently matched entities, in the order they matched.
    #[must_use]
    pub fn matched(&self, system: SystemId) -> &[Entity] {
        self.subscriptions.matched(system)
    }

    /// Whether `entity` is in the system's matched set.
    #[must_use]
    pub fn is_subscribed(&self, system: SystemId, entity: Entity) -> bool {
        self.subscriptions.is_subscribed(system, entity)
    }

    /// A system's watch/exclude filter. Empty until initialization.
    #[must_use]
    pub fn filter(&self, system: SystemId) -> Option<&Filter> {
        self.subscriptions.filter(system)
    }

    /// Number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Number of registered managers.
    #[must_use]
    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }

    /// Flags a system declared at registration.
    #[must_use]
    pub fn system_flags(&self, system: SystemId) -> Option<SystemFlags> {
        self.systems.get(system.index()).map(|slot| slot.flags)
    }

    /// Flags a manager declared at registration.
    #[must_use]
    pub fn manager_flags(&self, manager: ManagerId) -> Option<ManagerFlags> {
        self.managers.get(manager.index()).map(|slot| slot.flags)
    }

    // -- Clock --

    /// Total simulated time in seconds.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // -- Internals --

    fn signature_changed(&mut self, entity: Entity, changed: bool) {
        if changed {
            self.reevaluate(entity);
            self.flush();
        }
    }

    /// Recompute one entity's membership and queue the resulting hooks.
    ///
    /// Filters do not exist before initialization, so nothing matches yet.
    pub(crate) fn reevaluate(&mut self, entity: Entity) {
        if !self.initialized {
            return;
        }
        let Ok(state) = self.store.state(entity) else {
            return;
        };
        let Ok(signature) = self.store.signature(entity) else {
            return;
        };
        let changes = self.subscriptions.evaluate(entity, state, &signature);
        self.enqueue_changes(entity, changes);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("components", &self.registry.len())
            .field("entities", &self.store.len())
            .field(
                "systems",
                &self.systems.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "managers",
                &self.managers.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            )
            .field("initialized", &self.initialized)
            .field("tick", &self.tick)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use strata_component::StorageKind;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Joint {
        id: i32,
    }

    impl Component for Joint {
        fn type_name() -> &'static str {
            "Joint"
        }

        fn storage() -> StorageKind {
            StorageKind::Multiple
        }
    }

    struct Idle;

    impl System for Idle {}

    #[test]
    fn test_registration_closes_after_initialize() {
        let mut world = World::new();
        assert_eq!(world.register_system(Idle), Ok(SystemId(0)));
        world.initialize().unwrap();
        assert!(world.is_initialized());
        assert_eq!(
            world.register_system(Idle),
            Err(EcsError::AlreadyInitialized)
        );
        assert_eq!(world.initialize(), Err(EcsError::AlreadyInitialized));
        assert_eq!(world.system_count(), 1);
    }

    #[test]
    fn test_typed_helpers_register_on_first_use() {
        let mut world = World::new();
        let e = world.spawn();
        assert!(matches!(
            world.get::<Position>(e),
            Err(EcsError::UnknownComponent(_))
        ));

        world.set(e, Position { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(world.get::<Position>(e), Ok(&Position { x: 1.0, y: 2.0 }));

        world.add_to(e, Joint { id: 5 }).unwrap();
        world.add_to(e, Joint { id: 9 }).unwrap();
        assert_eq!(world.count::<Joint>(e), Ok(2));
        assert_eq!(world.get_at::<Joint>(e, 1).unwrap().id, 9);

        world.detach_at::<Joint>(e, 0).unwrap();
        assert_eq!(world.get::<Joint>(e).unwrap().id, 9);
        world.detach::<Position>(e).unwrap();
        assert_eq!(world.count::<Position>(e), Ok(0));
    }

    #[test]
    fn test_registration_keeps_existing_data() {
        let mut world = World::new();
        let first = world.register_component::<Position>();
        let e = world.spawn();
        world.set(e, Position { x: 3.0, y: 4.0 }).unwrap();

        assert_eq!(world.register_component::<Position>(), first);
        assert_eq!(
            world.register_component_raw("Position", std::mem::size_of::<Position>(), ComponentFlags::SINGLE),
            first
        );
        assert_eq!(world.get::<Position>(e), Ok(&Position { x: 3.0, y: 4.0 }));
    }

    #[test]
    fn test_debug_lists_system_names() {
        let mut world = World::new();
        world.register_system(Idle).unwrap();
        let rendered = format!("{world:?}");
        assert!(rendered.contains("Idle"), "{rendered}");
    }
}
