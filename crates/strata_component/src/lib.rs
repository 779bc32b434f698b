//! # strata_component
//!
//! The "C" in ECS: what a component is, how component types are registered,
//! and how component values are attached to entities.
//!
//! This crate provides:
//!
//! - [`Component`] trait and [`ComponentRegistry`]: dense ids per name.
//! - [`Entity`]: generation-tagged handles, plus the lifecycle state machine.
//! - [`EntityStore`]: per-entity Single/Multiple component storage.
//! - [`Filter`]: watch/exclude conditions used by systems.
//! - [`EcsError`]: the error taxonomy shared with `strata_world`.

pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod storage;

pub use component::{Component, ComponentFlags, ComponentId, ComponentMeta, ComponentRegistry, StorageKind};
pub use entity::{Entity, EntityAllocator, EntityState, Transition};
pub use error::{EcsError, Result};
pub use query::Filter;
pub use storage::{EntityStore, Signature};
