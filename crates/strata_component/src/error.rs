//! Error taxonomy shared by the registry, the entity store, and the world.
//!
//! Every variant is a local, recoverable condition reported synchronously at
//! the offending call. An operation that returns an error has not mutated any
//! storage or subscription state.

use crate::component::{ComponentId, StorageKind};
use crate::entity::{Entity, EntityState, Transition};

/// Convenience alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, EcsError>;

/// Errors raised by ECS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The component type was never registered.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// The entity has no instance of the component.
    #[error("{entity} has no component {component}")]
    NoSuchComponent {
        /// The entity that was queried.
        entity: Entity,
        /// The missing component.
        component: ComponentId,
    },

    /// Indexed access beyond the current instance count.
    #[error("index {index} out of range for component {component} on {entity} (count {count})")]
    IndexOutOfRange {
        /// The entity that was queried.
        entity: Entity,
        /// The component being indexed.
        component: ComponentId,
        /// The requested index.
        index: usize,
        /// The number of instances attached.
        count: usize,
    },

    /// The handle does not refer to a live entity.
    #[error("{0} not found")]
    EntityNotFound(Entity),

    /// The lifecycle operation is not permitted in the entity's current state.
    #[error("cannot {transition} {entity} while {state}")]
    InvalidTransition {
        /// The entity being transitioned.
        entity: Entity,
        /// Its state at the time of the call.
        state: EntityState,
        /// The rejected operation.
        transition: Transition,
    },

    /// Systems and managers can no longer be registered.
    #[error("world is already initialized")]
    AlreadyInitialized,

    /// No system was registered under this index.
    #[error("unknown system #{0}")]
    UnknownSystem(u32),

    /// `process` was called before `initialize`.
    #[error("world is not initialized")]
    NotInitialized,

    /// `process` was called from inside a system or manager hook.
    #[error("process called while a hook is running")]
    ReentrantProcess,

    /// Single-slot access was used on a component with another discipline.
    #[error("component {component} uses {kind} storage")]
    WrongStorage {
        /// The component being accessed.
        component: ComponentId,
        /// Its registered discipline.
        kind: StorageKind,
    },

    /// The stored value is not of the requested Rust type.
    #[error("component {component} does not hold a `{requested}`")]
    TypeMismatch {
        /// The component being accessed.
        component: ComponentId,
        /// The Rust type the caller asked for.
        requested: &'static str,
    },

    /// The value's size differs from the registered element size.
    #[error("component {component} expects {expected}-byte elements, got {actual}")]
    LayoutMismatch {
        /// The component being written.
        component: ComponentId,
        /// The registered element size.
        expected: usize,
        /// `size_of` the supplied value.
        actual: usize,
    },
}
