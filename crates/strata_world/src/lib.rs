//! # strata_world
//!
//! The "S" in ECS: systems, managers, and the world that runs them.
//!
//! This crate provides:
//!
//! - [`World`]: owns every registry, entity, system, and manager.
//! - [`System`] and [`Manager`] traits, with [`Watches`] for declaring filters.
//! - [`SubscriptionEngine`]: incremental per-system matched sets.
//! - Lifecycle transitions (`add`, `enable`, `disable`, `remove`) and the
//!   per-tick `process` loop, both as methods on [`World`].
//!
//! Hook calls are delivered through a FIFO queue so a hook may freely mutate
//! the world it is handed.

mod lifecycle;
mod notify;
mod scheduler;
pub mod subscription;
pub mod system;
mod world;

pub use notify::LifecycleEvent;
pub use subscription::{SubscriptionChange, SubscriptionEngine};
pub use system::{Manager, ManagerFlags, ManagerId, System, SystemFlags, SystemId, Watches};
pub use world::World;

pub use strata_component::{
    Component, ComponentFlags, ComponentId, ComponentMeta, ComponentRegistry, EcsError, Entity,
    EntityState, EntityStore, Filter, Result, Signature, StorageKind, Transition,
};
