//! Core [`Component`] trait and the [`ComponentRegistry`].
//!
//! ## Type Identity
//!
//! Components are identified by their registered **name**, not by Rust
//! `TypeId`s. The registry hands out a dense, zero-based [`ComponentId`] the
//! first time a name is seen and returns the same id on every later
//! registration. Ids are stable for the lifetime of the owning world, which
//! lets hosts register components that have no Rust type at all through
//! [`ComponentRegistry::register_raw`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EcsError, Result};

/// Dense, zero-based identifier assigned by a [`ComponentRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Returns the id as an index into dense per-component tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How many instances of a component an entity may hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    /// At most one value per entity.
    #[default]
    Single,
    /// An ordered, index-addressable sequence of values per entity.
    Multiple,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Multiple => f.write_str("multiple"),
        }
    }
}

/// Storage flags accepted by [`ComponentRegistry::register_raw`].
///
/// Only bit 0 is assigned today. The remaining bits are reserved for future
/// storage disciplines and are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentFlags(pub u32);

impl ComponentFlags {
    /// One value per entity.
    pub const SINGLE: Self = Self(0);
    /// A sequence of values per entity.
    pub const MULTIPLE: Self = Self(1 << 0);

    /// Returns the storage discipline encoded by these flags.
    #[must_use]
    pub const fn storage_kind(self) -> StorageKind {
        if self.0 & Self::MULTIPLE.0 != 0 {
            StorageKind::Multiple
        } else {
            StorageKind::Single
        }
    }
}

impl From<StorageKind> for ComponentFlags {
    fn from(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Single => Self::SINGLE,
            StorageKind::Multiple => Self::MULTIPLE,
        }
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use strata_component::{Component, StorageKind};
///
/// #[derive(Debug, Clone, Copy)]
/// struct Joint {
///     id: i32,
/// }
///
/// impl Component for Joint {
///     fn type_name() -> &'static str { "Joint" }
///     fn storage() -> StorageKind { StorageKind::Multiple }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// The registration key for this component type.
    fn type_name() -> &'static str;

    /// Storage discipline. Single unless overridden.
    fn storage() -> StorageKind {
        StorageKind::Single
    }
}

/// Metadata recorded for each registered component type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMeta {
    /// The dense identifier.
    pub id: ComponentId,
    /// The registration key.
    pub name: String,
    /// Size of one element in bytes.
    pub size: usize,
    /// Storage discipline.
    pub storage: StorageKind,
}

/// Assigns and remembers a [`ComponentId`] per component name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    metas: Vec<ComponentMeta>,
    by_name: HashMap<String, ComponentId>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Rust component type, returning its id.
    ///
    /// Idempotent: a type that is already known keeps its id.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.register_with(T::type_name(), std::mem::size_of::<T>(), T::storage())
    }

    /// Register a component by name, element size, and storage flags.
    ///
    /// Idempotent in the same way as [`ComponentRegistry::register`].
    pub fn register_raw(&mut self, name: &str, size: usize, flags: ComponentFlags) -> ComponentId {
        self.register_with(name, size, flags.storage_kind())
    }

    fn register_with(&mut self, name: &str, size: usize, storage: StorageKind) -> ComponentId {
        if let Some(&id) = self.by_name.get(name) {
            let meta = &self.metas[id.index()];
            if meta.size != size || meta.storage != storage {
                warn!(
                    component = name,
                    %id,
                    registered_size = meta.size,
                    registered_storage = %meta.storage,
                    size,
                    %storage,
                    "conflicting re-registration ignored"
                );
            }
            return id;
        }

        let id = ComponentId(self.metas.len() as u32);
        self.metas.push(ComponentMeta {
            id,
            name: name.to_string(),
            size,
            storage,
        });
        self.by_name.insert(name.to_string(), id);
        debug!(component = name, %id, size, %storage, "registered component");
        id
    }

    /// Look up the id of a registered name.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name was never registered.
    pub fn lookup(&self, name: &str) -> Result<ComponentId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EcsError::UnknownComponent(name.to_string()))
    }

    /// Look up the id of a registered Rust component type.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if `T` was never registered.
    pub fn id_of<T: Component>(&self) -> Result<ComponentId> {
        self.lookup(T::type_name())
    }

    /// Metadata for a registered id.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the id was never assigned.
    pub fn meta(&self, id: ComponentId) -> Result<&ComponentMeta> {
        self.metas
            .get(id.index())
            .ok_or_else(|| EcsError::UnknownComponent(id.to_string()))
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Forget every registration made after the first `len`.
    ///
    /// Only ids that no entity holds may be dropped this way.
    pub fn truncate(&mut self, len: usize) {
        for meta in self.metas.drain(len.min(self.metas.len())..) {
            self.by_name.remove(&meta.name);
        }
    }

    /// Iterate over all registered metadata in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentMeta> {
        self.metas.iter()
    }
}
