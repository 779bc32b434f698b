//! The [`System`] and [`Manager`] capability traits.
//!
//! Both are flat sets of named hooks with no-op defaults. Every hook that runs
//! after initialization receives the owning [`World`] explicitly, so a hook
//! can read and mutate entities without any ambient "current world".

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_component::{Component, ComponentId, ComponentRegistry, Entity, Filter, Result};

use crate::world::World;

/// Identifier assigned to a system at registration, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl SystemId {
    /// Returns the id as an index into per-system tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// Identifier assigned to a manager at registration, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagerId(pub u32);

impl ManagerId {
    /// Returns the id as an index into the manager table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manager#{}", self.0)
    }
}

/// Scheduling flags returned by [`System::flags`].
///
/// Only bit 0 is assigned today. The remaining bits are reserved and ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SystemFlags(pub u32);

impl SystemFlags {
    /// Run by every [`World::process`] call.
    pub const NORMAL: Self = Self(0);
    /// Kept up to date like any other system but skipped by
    /// [`World::process`]; the host runs it with [`World::process_system`].
    pub const PASSIVE: Self = Self(1 << 0);

    /// Whether [`World::process`] skips this system.
    #[must_use]
    pub const fn is_passive(self) -> bool {
        self.0 & Self::PASSIVE.0 != 0
    }
}

/// Flags returned by [`Manager::flags`].
///
/// No bit is assigned yet; every value behaves like [`ManagerFlags::NORMAL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ManagerFlags(pub u32);

impl ManagerFlags {
    /// Notified of every lifecycle transition.
    pub const NORMAL: Self = Self(0);
}

/// A behavioral unit run once per tick over every matching Active entity.
///
/// # Examples
///
/// ```rust
/// use strata_component::{Component, Entity, Result};
/// use strata_world::{System, Watches, World};
///
/// #[derive(Debug, Clone, Copy)]
/// struct Age(f32);
///
/// impl Component for Age {
///     fn type_name() -> &'static str { "Age" }
/// }
///
/// struct Ageing;
///
/// impl System for Ageing {
///     fn add_watches(&mut self, watches: &mut Watches<'_>) -> Result<()> {
///         watches.watch::<Age>();
///         Ok(())
///     }
///
///     fn process(&mut self, world: &mut World, entity: Entity, delta: f32) -> Result<()> {
///         world.get_mut::<Age>(entity)?.0 += delta;
///         Ok(())
///     }
/// }
/// ```
pub trait System {
    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Scheduling discipline, read once at registration.
    fn flags(&self) -> SystemFlags {
        SystemFlags::NORMAL
    }

    /// Declare the watch and exclude sets. Called exactly once, from
    /// [`World::initialize`].
    ///
    /// # Errors
    ///
    /// Propagate `UnknownComponent` from the id-based helpers.
    fn add_watches(&mut self, watches: &mut Watches<'_>) -> Result<()> {
        let _ = watches;
        Ok(())
    }

    /// Called at the start of this system's turn in every tick.
    fn starting(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Called once per matched entity per tick.
    ///
    /// # Errors
    ///
    /// An error aborts the tick and is returned from [`World::process`].
    fn process(&mut self, world: &mut World, entity: Entity, delta: f32) -> Result<()> {
        let _ = (world, entity, delta);
        Ok(())
    }

    /// Called at the end of this system's turn in every tick.
    fn ending(&mut self, world: &mut World) {
        let _ = world;
    }

    /// The entity joined this system's matched set.
    fn subscribed(&mut self, world: &mut World, entity: Entity) {
        let _ = (world, entity);
    }

    /// The entity left this system's matched set.
    fn unsubscribed(&mut self, world: &mut World, entity: Entity) {
        let _ = (world, entity);
    }
}

/// An unconditional observer of entity lifecycle transitions.
pub trait Manager {
    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Read once at registration.
    fn flags(&self) -> ManagerFlags {
        ManagerFlags::NORMAL
    }

    /// The entity left `Spawned` and became Active.
    fn added(&mut self, world: &mut World, entity: Entity) {
        let _ = (world, entity);
    }

    /// The entity went from Disabled back to Active.
    fn enabled(&mut self, world: &mut World, entity: Entity) {
        let _ = (world, entity);
    }

    /// The entity went from Active to Disabled.
    fn disabled(&mut self, world: &mut World, entity: Entity) {
        let _ = (world, entity);
    }

    /// The entity was removed. Its components are still readable.
    fn deleted(&mut self, world: &mut World, entity: Entity) {
        let _ = (world, entity);
    }
}

/// Builder handed to [`System::add_watches`].
///
/// The typed helpers register the component on first reference; the id-based
/// helpers require the id to be registered already.
#[derive(Debug)]
pub struct Watches<'a> {
    registry: &'a mut ComponentRegistry,
    filter: &'a mut Filter,
}

impl<'a> Watches<'a> {
    pub(crate) fn new(registry: &'a mut ComponentRegistry, filter: &'a mut Filter) -> Self {
        Self { registry, filter }
    }

    /// Require component `T`, registering it if needed.
    pub fn watch<T: Component>(&mut self) -> ComponentId {
        let id = self.registry.register::<T>();
        self.filter.watch.insert(id);
        id
    }

    /// Forbid component `T`, registering it if needed.
    pub fn exclude<T: Component>(&mut self) -> ComponentId {
        let id = self.registry.register::<T>();
        self.filter.exclude.insert(id);
        id
    }

    /// Require an already-registered component.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if `id` was never registered.
    pub fn watch_id(&mut self, id: ComponentId) -> Result<()> {
        self.registry.meta(id)?;
        self.filter.watch.insert(id);
        Ok(())
    }

    /// Forbid an already-registered component.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if `id` was never registered.
    pub fn exclude_id(&mut self, id: ComponentId) -> Result<()> {
        self.registry.meta(id)?;
        self.filter.exclude.insert(id);
        Ok(())
    }

    /// Require a component registered under `name`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if the name was never registered.
    pub fn watch_name(&mut self, name: &str) -> Result<ComponentId> {
        let id = self.registry.lookup(name)?;
        self.filter.watch.insert(id);
        Ok(id)
    }

    /// Forbid a component registered under `name`.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` if the name was never registered.
    pub fn exclude_name(&mut self, name: &str) -> Result<ComponentId> {
        let id = self.registry.lookup(name)?;
        self.filter.exclude.insert(id);
        Ok(id)
    }

    /// The filter built so far.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_component::EcsError;

    #[derive(Debug, Clone, Copy)]
    struct Tag;

    impl Component for Tag {
        fn type_name() -> &'static str {
            "Tag"
        }
    }

    #[test]
    fn test_typed_watch_registers_component() {
        let mut registry = ComponentRegistry::new();
        let mut filter = Filter::new();
        let mut watches = Watches::new(&mut registry, &mut filter);
        let id = watches.watch::<Tag>();
        assert!(watches.filter().watch.contains(&id));
        assert_eq!(registry.lookup("Tag"), Ok(id));
    }

    #[test]
    fn test_id_watch_requires_registration() {
        let mut registry = ComponentRegistry::new();
        let mut filter = Filter::new();
        let mut watches = Watches::new(&mut registry, &mut filter);
        assert!(matches!(
            watches.watch_id(ComponentId(0)),
            Err(EcsError::UnknownComponent(_))
        ));
        assert!(matches!(
            watches.exclude_name("Tag"),
            Err(EcsError::UnknownComponent(_))
        ));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_system_id_display() {
        assert_eq!(SystemId(3).to_string(), "system#3");
        assert_eq!(ManagerId(1).to_string(), "manager#1");
    }

    #[test]
    fn test_passive_flag_bits() {
        assert!(!SystemFlags::NORMAL.is_passive());
        assert!(SystemFlags::PASSIVE.is_passive());
        assert!(SystemFlags(0b11).is_passive());
        assert!(!SystemFlags(0b10).is_passive());
        assert_eq!(SystemFlags::default(), SystemFlags::NORMAL);
        assert_eq!(ManagerFlags::default(), ManagerFlags::NORMAL);
    }

    #[test]
    fn test_ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&SystemId(4)).unwrap(), "4");
        let id: ManagerId = serde_json::from_str("2").unwrap();
        assert_eq!(id, ManagerId(2));
    }
}
