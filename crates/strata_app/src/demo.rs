//! The demo scene: a mover that integrates its velocity and a jointed rig
//! that is "rendered" to the log every tick.

use glam::Vec2;
use strata_component::{Component, Entity, Result, StorageKind};
use strata_world::{Manager, System, Watches, World};
use tracing::{debug, info};

/// World-space position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position(pub Vec2);

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

/// Units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec2);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// Marks an entity as drawable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Renderer {
    /// Palette index.
    pub colour: u32,
}

impl Component for Renderer {
    fn type_name() -> &'static str {
        "Renderer"
    }
}

/// One attachment point of a rig. An entity may carry any number of joints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Joint {
    /// Caller-chosen joint identifier, unique within one rig.
    pub id: i32,
}

impl Component for Joint {
    fn type_name() -> &'static str {
        "Joint"
    }

    fn storage() -> StorageKind {
        StorageKind::Multiple
    }
}

/// Integrates `Velocity` into `Position`.
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn add_watches(&mut self, watches: &mut Watches<'_>) -> Result<()> {
        watches.watch::<Position>();
        watches.watch::<Velocity>();
        Ok(())
    }

    fn process(&mut self, world: &mut World, entity: Entity, delta: f32) -> Result<()> {
        let velocity = world.get::<Velocity>(entity)?.0;
        let position = world.get_mut::<Position>(entity)?;
        position.0 += velocity * delta;
        debug!(%entity, x = position.0.x, y = position.0.y, "moved");
        Ok(())
    }
}

/// Logs every jointed, drawable entity once per tick.
#[derive(Debug, Default)]
pub struct RenderSystem {
    drawn: u64,
}

impl System for RenderSystem {
    fn name(&self) -> &str {
        "render"
    }

    fn add_watches(&mut self, watches: &mut Watches<'_>) -> Result<()> {
        watches.watch::<Position>();
        watches.watch::<Renderer>();
        watches.watch::<Joint>();
        Ok(())
    }

    fn process(&mut self, world: &mut World, entity: Entity, _delta: f32) -> Result<()> {
        let position = world.get::<Position>(entity)?.0;
        let colour = world.get::<Renderer>(entity)?.colour;
        let joints = (0..world.count::<Joint>(entity)?)
            .map(|index| world.get_at::<Joint>(entity, index).map(|joint| joint.id))
            .collect::<Result<Vec<_>>>()?;
        debug!(%entity, ?position, colour, ?joints, "draw");
        self.drawn += 1;
        Ok(())
    }

    fn ending(&mut self, _world: &mut World) {
        debug!(drawn = self.drawn, "render pass complete");
    }
}

/// Logs entities entering and leaving the world.
#[derive(Debug, Default)]
pub struct SpawnLogger;

impl Manager for SpawnLogger {
    fn name(&self) -> &str {
        "spawn-logger"
    }

    fn added(&mut self, _world: &mut World, entity: Entity) {
        info!(%entity, "entity spawned");
    }

    fn deleted(&mut self, _world: &mut World, entity: Entity) {
        info!(%entity, "entity deleted");
    }
}

/// Handles to the entities created by [`spawn_scene`].
#[derive(Debug, Clone, Copy)]
pub struct Scene {
    /// Entity with a position and velocity, moved every tick.
    pub mover: Entity,
    /// Rendered, stationary entity carrying two joints.
    pub rig: Entity,
}

/// Register the demo systems and manager, then initialize the world.
///
/// # Errors
///
/// Propagates registration and initialization errors.
pub fn build_world() -> Result<World> {
    let mut world = World::new();
    world.register_system(MovementSystem)?;
    world.register_system(RenderSystem::default())?;
    world.register_manager(SpawnLogger)?;
    world.initialize()?;
    Ok(world)
}

/// Spawn the mover and the rig and make both Active.
///
/// # Errors
///
/// Propagates component and lifecycle errors.
pub fn spawn_scene(world: &mut World) -> Result<Scene> {
    let mover = world.spawn();
    world.set(mover, Position::default())?;
    world.set(mover, Velocity(Vec2::new(1.5, 0.0)))?;
    world.add(mover)?;

    let rig = world.spawn();
    world.set(rig, Position::default())?;
    world.set(rig, Renderer::default())?;
    world.add_to(rig, Joint { id: 0 })?;
    world.add_to(rig, Joint { id: 1 })?;
    world.add(rig)?;

    Ok(Scene { mover, rig })
}
