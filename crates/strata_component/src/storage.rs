//! Per-entity component storage.
//!
//! The [`EntityStore`] owns every live entity and, for each one, a map from
//! [`ComponentId`] to the attached values. A Single component holds one value;
//! a Multiple component holds an ordered sequence addressed by index.
//!
//! Values are type-erased (`Box<dyn Any>`) so components registered by name
//! alone can be stored next to Rust-typed ones. Typed accessors check the
//! registered element size and downcast on the way out.
//!
//! References returned by the accessors borrow the store, so they cannot be
//! held across the next structural mutation (attach, detach, removal).

use std::any::Any;
use std::collections::BTreeMap;

use crate::component::{ComponentId, ComponentMeta, ComponentRegistry, StorageKind};
use crate::entity::{Entity, EntityAllocator, EntityState, Transition};
use crate::error::{EcsError, Result};

type Value = Box<dyn Any + Send + Sync>;

/// The values attached to one entity for one component id.
#[derive(Debug)]
enum ComponentSlot {
    Single(Value),
    /// Never empty: the slot is dropped with its last element.
    Multiple(Vec<Value>),
}

impl ComponentSlot {
    fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(values) => values.len(),
        }
    }

    fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Self::Single(value) if index == 0 => Some(value),
            Self::Single(_) => None,
            Self::Multiple(values) => values.get(index),
        }
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        match self {
            Self::Single(value) if index == 0 => Some(value),
            Self::Single(_) => None,
            Self::Multiple(values) => values.get_mut(index),
        }
    }
}

#[derive(Debug)]
struct EntityRecord {
    entity: Entity,
    state: EntityState,
    components: BTreeMap<ComponentId, ComponentSlot>,
}

/// Read-only view of the component ids attached to an entity.
#[derive(Debug, Clone, Copy)]
pub struct Signature<'a> {
    components: &'a BTreeMap<ComponentId, ComponentSlot>,
}

impl Signature<'_> {
    /// Whether the component is attached.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Attached ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.keys().copied()
    }

    /// Number of distinct component ids attached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Owns all entities and their component data.
#[derive(Debug, Default)]
pub struct EntityStore {
    allocator: EntityAllocator,
    records: Vec<Option<EntityRecord>>,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new entity in state [`EntityState::Spawned`].
    pub fn spawn(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let index = entity.id() as usize;
        if index >= self.records.len() {
            self.records.resize_with(index + 1, || None);
        }
        self.records[index] = Some(EntityRecord {
            entity,
            state: EntityState::Spawned,
            components: BTreeMap::new(),
        });
        entity
    }

    /// Number of entities whose storage has not been released.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocator.count()
    }

    /// Returns `true` if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entities whose storage has not been released, in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.records.iter().flatten().map(|record| record.entity)
    }

    /// Whether the handle refers to an entity that has not been removed.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.record(entity)
            .is_ok_and(|record| record.state != EntityState::Removed)
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for unknown or released handles.
    pub fn state(&self, entity: Entity) -> Result<EntityState> {
        Ok(self.record(entity)?.state)
    }

    /// Apply a lifecycle transition, returning the new state.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] if the entity is unknown or already
    /// removed, [`EcsError::InvalidTransition`] if the transition is not
    /// permitted from the current state.
    pub fn transition(&mut self, entity: Entity, transition: Transition) -> Result<EntityState> {
        let record = self.live_record_mut(entity)?;
        let next = record
            .state
            .apply(transition)
            .ok_or(EcsError::InvalidTransition {
                entity,
                state: record.state,
                transition,
            })?;
        record.state = next;
        Ok(next)
    }

    /// Drop all component data and recycle the handle.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for unknown or released handles.
    pub fn release(&mut self, entity: Entity) -> Result<()> {
        self.record(entity)?;
        self.records[entity.id() as usize] = None;
        self.allocator.release(entity);
        Ok(())
    }

    /// The set of component ids currently attached.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for unknown or released handles.
    pub fn signature(&self, entity: Entity) -> Result<Signature<'_>> {
        Ok(Signature {
            components: &self.record(entity)?.components,
        })
    }

    /// Whether at least one instance of `component` is attached.
    #[must_use]
    pub fn has_component(&self, entity: Entity, component: ComponentId) -> bool {
        self.record(entity)
            .is_ok_and(|record| record.components.contains_key(&component))
    }

    /// Replace the single slot of a Single component, creating it if absent.
    ///
    /// Returns `true` if the entity's signature changed.
    ///
    /// # Errors
    ///
    /// [`EcsError::WrongStorage`] for Multiple components, plus the errors of
    /// [`EntityStore::add_component`].
    pub fn set_component<T: Send + Sync + 'static>(
        &mut self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
        value: T,
    ) -> Result<bool> {
        let meta = checked_meta::<T>(registry, component)?;
        if meta.storage != StorageKind::Single {
            return Err(EcsError::WrongStorage {
                component,
                kind: meta.storage,
            });
        }
        let record = self.live_record_mut(entity)?;
        let previous = record
            .components
            .insert(component, ComponentSlot::Single(Box::new(value)));
        Ok(previous.is_none())
    }

    /// Append to a Multiple component, or set a Single one.
    ///
    /// Returns `true` if the entity's signature changed.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`], [`EcsError::LayoutMismatch`] if
    /// `size_of::<T>()` differs from the registered size, and
    /// [`EcsError::EntityNotFound`].
    pub fn add_component<T: Send + Sync + 'static>(
        &mut self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
        value: T,
    ) -> Result<bool> {
        let meta = checked_meta::<T>(registry, component)?;
        let storage = meta.storage;
        let record = self.live_record_mut(entity)?;
        match storage {
            StorageKind::Single => {
                let previous = record
                    .components
                    .insert(component, ComponentSlot::Single(Box::new(value)));
                Ok(previous.is_none())
            }
            StorageKind::Multiple => match record.components.get_mut(&component) {
                Some(ComponentSlot::Multiple(values)) => {
                    values.push(Box::new(value));
                    Ok(false)
                }
                _ => {
                    record
                        .components
                        .insert(component, ComponentSlot::Multiple(vec![Box::new(value)]));
                    Ok(true)
                }
            },
        }
    }

    /// The Single slot, or element 0 of a Multiple sequence.
    ///
    /// # Errors
    ///
    /// [`EcsError::NoSuchComponent`] if nothing is attached, and
    /// [`EcsError::TypeMismatch`] if the stored value is not a `T`.
    pub fn get_component<T: 'static>(
        &self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
    ) -> Result<&T> {
        registry.meta(component)?;
        let slot = self
            .record(entity)?
            .components
            .get(&component)
            .ok_or(EcsError::NoSuchComponent { entity, component })?;
        downcast(slot.get(0), component)
    }

    /// Mutable form of [`EntityStore::get_component`].
    ///
    /// # Errors
    ///
    /// As [`EntityStore::get_component`]; removed entities are rejected with
    /// [`EcsError::EntityNotFound`].
    pub fn get_component_mut<T: 'static>(
        &mut self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
    ) -> Result<&mut T> {
        registry.meta(component)?;
        let slot = self
            .live_record_mut(entity)?
            .components
            .get_mut(&component)
            .ok_or(EcsError::NoSuchComponent { entity, component })?;
        downcast_mut(slot.get_mut(0), component)
    }

    /// Index-addressed access into a component's sequence.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] if `index >= count`.
    pub fn get_component_at<T: 'static>(
        &self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
        index: usize,
    ) -> Result<&T> {
        registry.meta(component)?;
        let record = self.record(entity)?;
        let slot = record.components.get(&component);
        let count = slot.map_or(0, ComponentSlot::len);
        match slot {
            Some(slot) if index < count => downcast(slot.get(index), component),
            _ => Err(EcsError::IndexOutOfRange {
                entity,
                component,
                index,
                count,
            }),
        }
    }

    /// Mutable form of [`EntityStore::get_component_at`].
    ///
    /// # Errors
    ///
    /// As [`EntityStore::get_component_at`].
    pub fn get_component_at_mut<T: 'static>(
        &mut self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
        index: usize,
    ) -> Result<&mut T> {
        registry.meta(component)?;
        let record = self.live_record_mut(entity)?;
        let slot = record.components.get_mut(&component);
        let count = slot.as_ref().map_or(0, |slot| slot.len());
        match slot {
            Some(slot) if index < count => downcast_mut(slot.get_mut(index), component),
            _ => Err(EcsError::IndexOutOfRange {
                entity,
                component,
                index,
                count,
            }),
        }
    }

    /// Number of attached instances; 0 if absent.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] and [`EcsError::EntityNotFound`].
    pub fn component_count(
        &self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
    ) -> Result<usize> {
        registry.meta(component)?;
        Ok(self
            .record(entity)?
            .components
            .get(&component)
            .map_or(0, ComponentSlot::len))
    }

    /// Detach every instance of `component`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NoSuchComponent`] if nothing is attached.
    pub fn remove_component(
        &mut self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
    ) -> Result<()> {
        registry.meta(component)?;
        self.live_record_mut(entity)?
            .components
            .remove(&component)
            .map(drop)
            .ok_or(EcsError::NoSuchComponent { entity, component })
    }

    /// Detach one instance, shifting later indices down by one.
    ///
    /// Returns `true` if that was the last instance, i.e. the signature
    /// changed.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] if `index >= count`.
    pub fn remove_component_at(
        &mut self,
        registry: &ComponentRegistry,
        entity: Entity,
        component: ComponentId,
        index: usize,
    ) -> Result<bool> {
        registry.meta(component)?;
        let record = self.live_record_mut(entity)?;
        let count = record.components.get(&component).map_or(0, ComponentSlot::len);
        if index >= count {
            return Err(EcsError::IndexOutOfRange {
                entity,
                component,
                index,
                count,
            });
        }
        if count == 1 {
            record.components.remove(&component);
            return Ok(true);
        }
        if let Some(ComponentSlot::Multiple(values)) = record.components.get_mut(&component) {
            values.remove(index);
        }
        Ok(false)
    }

    fn record(&self, entity: Entity) -> Result<&EntityRecord> {
        self.records
            .get(entity.id() as usize)
            .and_then(Option::as_ref)
            .filter(|record| record.entity == entity)
            .ok_or(EcsError::EntityNotFound(entity))
    }

    fn live_record_mut(&mut self, entity: Entity) -> Result<&mut EntityRecord> {
        self.records
            .get_mut(entity.id() as usize)
            .and_then(Option::as_mut)
            .filter(|record| record.entity == entity && record.state != EntityState::Removed)
            .ok_or(EcsError::EntityNotFound(entity))
    }
}

fn checked_meta<T>(registry: &ComponentRegistry, component: ComponentId) -> Result<&ComponentMeta> {
    let meta = registry.meta(component)?;
    let actual = std::mem::size_of::<T>();
    if meta.size != actual {
        return Err(EcsError::LayoutMismatch {
            component,
            expected: meta.size,
            actual,
        });
    }
    Ok(meta)
}

fn downcast<T: 'static>(value: Option<&Value>, component: ComponentId) -> Result<&T> {
    value
        .and_then(|value| value.downcast_ref::<T>())
        .ok_or(EcsError::TypeMismatch {
            component,
            requested: std::any::type_name::<T>(),
        })
}

fn downcast_mut<T: 'static>(value: Option<&mut Value>, component: ComponentId) -> Result<&mut T> {
    value
        .and_then(|value| value.downcast_mut::<T>())
        .ok_or(EcsError::TypeMismatch {
            component,
            requested: std::any::type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentFlags};

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

    fn setup() -> (ComponentRegistry, EntityStore, ComponentId, ComponentId) {
        let mut registry = ComponentRegistry::new();
        let position = registry.register::<Position>();
        let joint = registry.register::<Joint>();
        (registry, EntityStore::new(), position, joint)
    }

    #[test]
    fn test_single_set_then_get() {
        let (registry, mut store, position, _) = setup();
        let e = store.spawn();
        let p = Position { x: 1.0, y: 2.0 };
        assert!(store.set_component(&registry, e, position, p).unwrap());
        assert_eq!(store.get_component::<Position>(&registry, e, position), Ok(&p));
        assert_eq!(store.component_count(&registry, e, position), Ok(1));
    }

    #[test]
    fn test_single_set_replaces() {
        let (registry, mut store, position, _) = setup();
        let e = store.spawn();
        store.set_component(&registry, e, position, Position { x: 1.0, y: 1.0 }).unwrap();
        let changed = store
            .add_component(&registry, e, position, Position { x: 3.0, y: 4.0 })
            .unwrap();
        assert!(!changed);
        assert_eq!(store.component_count(&registry, e, position), Ok(1));
        assert_eq!(
            store.get_component::<Position>(&registry, e, position).unwrap().x,
            3.0
        );
    }

    #[test]
    fn test_multiple_append_preserves_order() {
        let (registry, mut store, _, joint) = setup();
        let e = store.spawn();
        assert!(store.add_component(&registry, e, joint, Joint { id: 5 }).unwrap());
        assert!(!store.add_component(&registry, e, joint, Joint { id: 9 }).unwrap());
        assert_eq!(store.component_count(&registry, e, joint), Ok(2));
        assert_eq!(store.get_component_at::<Joint>(&registry, e, joint, 0).unwrap().id, 5);
        assert_eq!(store.get_component_at::<Joint>(&registry, e, joint, 1).unwrap().id, 9);
        assert_eq!(store.get_component::<Joint>(&registry, e, joint).unwrap().id, 5);
    }

    #[test]
    fn test_set_on_multiple_is_rejected() {
        let (registry, mut store, _, joint) = setup();
        let e = store.spawn();
        assert_eq!(
            store.set_component(&registry, e, joint, Joint { id: 1 }),
            Err(EcsError::WrongStorage {
                component: joint,
                kind: StorageKind::Multiple
            })
        );
        assert!(!store.has_component(e, joint));
    }

    #[test]
    fn test_remove_at_shifts_down() {
        let (registry, mut store, _, joint) = setup();
        let e = store.spawn();
        for id in [10, 11, 12] {
            store.add_component(&registry, e, joint, Joint { id }).unwrap();
        }
        assert_eq!(store.remove_component_at(&registry, e, joint, 0), Ok(false));
        assert_eq!(store.component_count(&registry, e, joint), Ok(2));
        assert_eq!(store.get_component_at::<Joint>(&registry, e, joint, 0).unwrap().id, 11);
        assert_eq!(store.get_component_at::<Joint>(&registry, e, joint, 1).unwrap().id, 12);
    }

    #[test]
    fn test_remove_last_instance_changes_signature() {
        let (registry, mut store, _, joint) = setup();
        let e = store.spawn();
        store.add_component(&registry, e, joint, Joint { id: 1 }).unwrap();
        assert_eq!(store.remove_component_at(&registry, e, joint, 0), Ok(true));
        assert!(!store.has_component(e, joint));
        assert_eq!(store.component_count(&registry, e, joint), Ok(0));
    }

    #[test]
    fn test_index_out_of_range() {
        let (registry, mut store, _, joint) = setup();
        let e = store.spawn();
        store.add_component(&registry, e, joint, Joint { id: 1 }).unwrap();
        let expected = EcsError::IndexOutOfRange {
            entity: e,
            component: joint,
            index: 1,
            count: 1,
        };
        assert_eq!(
            store.get_component_at::<Joint>(&registry, e, joint, 1),
            Err(expected.clone())
        );
        assert_eq!(store.remove_component_at(&registry, e, joint, 1), Err(expected));
        assert_eq!(store.component_count(&registry, e, joint), Ok(1));
    }

    #[test]
    fn test_missing_component() {
        let (registry, mut store, position, _) = setup();
        let e = store.spawn();
        let missing = EcsError::NoSuchComponent {
            entity: e,
            component: position,
        };
        assert_eq!(
            store.get_component::<Position>(&registry, e, position),
            Err(missing.clone())
        );
        assert_eq!(store.remove_component(&registry, e, position), Err(missing));
        assert_eq!(store.component_count(&registry, e, position), Ok(0));
    }

    #[test]
    fn test_unknown_component() {
        let (registry, mut store, _, _) = setup();
        let e = store.spawn();
        let bogus = ComponentId(42);
        assert!(matches!(
            store.set_component(&registry, e, bogus, 1u32),
            Err(EcsError::UnknownComponent(_))
        ));
        assert!(matches!(
            store.component_count(&registry, e, bogus),
            Err(EcsError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_type_and_layout_checks() {
        let (registry, mut store, position, _) = setup();
        let e = store.spawn();
        assert_eq!(
            store.set_component(&registry, e, position, 1u8),
            Err(EcsError::LayoutMismatch {
                component: position,
                expected: std::mem::size_of::<Position>(),
                actual: 1,
            })
        );
        store.set_component(&registry, e, position, Position { x: 0.0, y: 0.0 }).unwrap();
        assert!(matches!(
            store.get_component::<u64>(&registry, e, position),
            Err(EcsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_raw_registered_component() {
        let mut registry = ComponentRegistry::new();
        let score = registry.register_raw("Score", 4, ComponentFlags::SINGLE);
        let mut store = EntityStore::new();
        let e = store.spawn();
        store.set_component(&registry, e, score, 99u32).unwrap();
        assert_eq!(store.get_component::<u32>(&registry, e, score), Ok(&99));
    }

    #[test]
    fn test_get_mut_writes_through() {
        let (registry, mut store, position, _) = setup();
        let e = store.spawn();
        store.set_component(&registry, e, position, Position { x: 0.0, y: 0.0 }).unwrap();
        store
            .get_component_mut::<Position>(&registry, e, position)
            .unwrap()
            .x = 5.0;
        assert_eq!(
            store.get_component::<Position>(&registry, e, position).unwrap().x,
            5.0
        );
    }

    #[test]
    fn test_removed_entity_is_readable_until_released() {
        let (registry, mut store, position, _) = setup();
        let e = store.spawn();
        store.set_component(&registry, e, position, Position { x: 1.0, y: 0.0 }).unwrap();
        store.transition(e, Transition::Remove).unwrap();

        assert!(!store.is_alive(e));
        assert!(store.get_component::<Position>(&registry, e, position).is_ok());
        assert_eq!(
            store.remove_component(&registry, e, position),
            Err(EcsError::EntityNotFound(e))
        );
        assert_eq!(
            store.transition(e, Transition::Enable),
            Err(EcsError::EntityNotFound(e))
        );

        store.release(e).unwrap();
        assert_eq!(
            store.get_component::<Position>(&registry, e, position),
            Err(EcsError::EntityNotFound(e))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let (registry, mut store, position, _) = setup();
        let old = store.spawn();
        store.transition(old, Transition::Remove).unwrap();
        store.release(old).unwrap();

        let new = store.spawn();
        assert_eq!(new.id(), old.id());
        store.set_component(&registry, new, position, Position { x: 7.0, y: 7.0 }).unwrap();

        assert_eq!(store.state(old), Err(EcsError::EntityNotFound(old)));
        assert_eq!(
            store.get_component::<Position>(&registry, old, position),
            Err(EcsError::EntityNotFound(old))
        );
        assert_eq!(store.entities().collect::<Vec<_>>(), vec![new]);
    }

    #[test]
    fn test_invalid_transition() {
        let (_, mut store, _, _) = setup();
        let e = store.spawn();
        assert_eq!(
            store.transition(e, Transition::Enable),
            Err(EcsError::InvalidTransition {
                entity: e,
                state: EntityState::Spawned,
                transition: Transition::Enable,
            })
        );
        assert_eq!(store.state(e), Ok(EntityState::Spawned));
    }

    #[test]
    fn test_signature_lists_attached_ids() {
        let (registry, mut store, position, joint) = setup();
        let e = store.spawn();
        store.set_component(&registry, e, position, Position { x: 0.0, y: 0.0 }).unwrap();
        store.add_component(&registry, e, joint, Joint { id: 1 }).unwrap();
        let signature = store.signature(e).unwrap();
        assert!(signature.contains(position));
        assert!(signature.contains(joint));
        assert_eq!(signature.iter().collect::<Vec<_>>(), vec![position, joint]);
    }
}
