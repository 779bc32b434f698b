//! Entity handles, the index allocator, and the lifecycle state machine.
//!
//! An [`Entity`] is a lightweight `(index, generation)` pair with no inherent
//! data. Indices are recycled after removal; the generation is bumped on every
//! recycle so a stale handle can never observe the entity that reused its
//! index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A generation-tagged entity handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The integer id, unique among live entities.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.index
    }

    /// How many times this index has been recycled.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single `u64` (generation in the high half).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Inverse of [`Entity::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

/// Lifecycle state of a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Created, components may be attached, not yet visible to systems.
    Spawned,
    /// Participates in every system whose filter it satisfies.
    Active,
    /// Keeps its data but participates in no system.
    Disabled,
    /// Being torn down. Readable until its storage is released.
    Removed,
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawned => f.write_str("spawned"),
            Self::Active => f.write_str("active"),
            Self::Disabled => f.write_str("disabled"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// A lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    /// `Spawned -> Active`
    Add,
    /// `Disabled -> Active`
    Enable,
    /// `Active -> Disabled`
    Disable,
    /// `Spawned | Active | Disabled -> Removed`
    Remove,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Enable => f.write_str("enable"),
            Self::Disable => f.write_str("disable"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

impl EntityState {
    /// The state reached by applying `transition`, or `None` if the
    /// transition is not permitted from `self`.
    #[must_use]
    pub const fn apply(self, transition: Transition) -> Option<Self> {
        match (self, transition) {
            (Self::Spawned, Transition::Add) => Some(Self::Active),
            (Self::Disabled, Transition::Enable) => Some(Self::Active),
            (Self::Active, Transition::Disable) => Some(Self::Disabled),
            (Self::Spawned | Self::Active | Self::Disabled, Transition::Remove) => {
                Some(Self::Removed)
            }
            _ => None,
        }
    }

    /// Whether systems may match an entity in this state.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Hands out entity handles, recycling released indices.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl EntityAllocator {
    /// Creates a new allocator. Indices start at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a handle, reusing the most recently released index if any.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            return Entity::new(index, self.generations[index as usize]);
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        Entity::new(index, 0)
    }

    /// Returns the handle's index to the pool and bumps its generation.
    ///
    /// Returns `false` if the handle is stale or already released.
    pub fn release(&mut self, entity: Entity) -> bool {
        match self.generations.get_mut(entity.index as usize) {
            Some(generation) if *generation == entity.generation => {
                *generation = generation.wrapping_add(1);
                self.free.push(entity.index);
                true
            }
            _ => false,
        }
    }

    /// Number of handles currently allocated.
    #[must_use]
    pub fn count(&self) -> usize {
        self.generations.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.id(), 0);
        assert_eq!(e2.id(), 1);
        assert_eq!(e3.id(), 2);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_recycled_index_gets_new_generation() {
        let mut alloc = EntityAllocator::new();
        let old = alloc.allocate();
        assert!(alloc.release(old));
        let new = alloc.allocate();
        assert_eq!(new.id(), old.id());
        assert_eq!(new.generation(), old.generation() + 1);
        assert_ne!(new, old);
    }

    #[test]
    fn test_release_rejects_stale_handle() {
        let mut alloc = EntityAllocator::new();
        let old = alloc.allocate();
        assert!(alloc.release(old));
        assert!(!alloc.release(old));
        assert_eq!(alloc.count(), 0);
    }

    #[test]
    fn test_bits_roundtrip() {
        let e = Entity::new(42, 7);
        assert_eq!(Entity::from_bits(e.to_bits()), e);
        assert_eq!(e.to_string(), "Entity(42v7)");
    }

    #[test]
    fn test_transitions() {
        use EntityState::*;
        use Transition::*;

        assert_eq!(Spawned.apply(Add), Some(Active));
        assert_eq!(Active.apply(Disable), Some(Disabled));
        assert_eq!(Disabled.apply(Enable), Some(Active));
        for state in [Spawned, Active, Disabled] {
            assert_eq!(state.apply(Remove), Some(Removed));
        }

        assert_eq!(Spawned.apply(Enable), None);
        assert_eq!(Spawned.apply(Disable), None);
        assert_eq!(Active.apply(Add), None);
        assert_eq!(Active.apply(Enable), None);
        assert_eq!(Disabled.apply(Disable), None);
        assert_eq!(Removed.apply(Remove), None);
        assert_eq!(Removed.apply(Enable), None);
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let entity = Entity::new(999, 2);
        let json = serde_json::to_string(&entity).unwrap();
        let restored: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, restored);
    }
}
