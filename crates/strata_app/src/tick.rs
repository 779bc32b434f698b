//! Fixed-timestep host loop.
//!
//! Each iteration calls [`World::process`] with the configured delta, then
//! sleeps for whatever remains of the tick budget.

use std::time::{Duration, Instant};

use strata_component::Result;
use strata_world::World;
use tracing::{debug, info, warn};

use crate::config::TickConfig;

/// Drives a [`World`] at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    config: TickConfig,
    world: World,
}

impl TickLoop {
    /// Wrap an initialized world.
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self { config, world }
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Run a single tick.
    ///
    /// # Errors
    ///
    /// Propagates the first system error of the tick.
    pub fn tick(&mut self) -> Result<()> {
        let delta = self.config.delta() as f32;
        self.world.process(delta)?;
        debug!(tick = self.world.tick(), delta, "tick");
        Ok(())
    }

    /// Run until `max_ticks` ticks have completed, or forever if it is 0.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failed tick.
    pub fn run(&mut self) -> Result<()> {
        let budget = Duration::from_secs_f64(self.config.delta());
        let mut ticks = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();
            self.tick()?;

            ticks += 1;
            if self.config.max_ticks > 0 && ticks >= self.config.max_ticks {
                info!(
                    ticks,
                    elapsed = self.world.elapsed(),
                    "tick loop complete"
                );
                return Ok(());
            }

            let spent = start.elapsed();
            if spent < budget {
                std::thread::sleep(budget - spent);
            } else {
                warn!(
                    tick = self.world.tick(),
                    spent_ms = spent.as_millis() as u64,
                    budget_ms = budget.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_component::{EcsError, Entity};
    use strata_world::System;

    use super::*;

    fn ready_world() -> World {
        let mut world = World::new();
        world.initialize().unwrap();
        world
    }

    #[test]
    fn test_tick_advances_world_clock() {
        let config = TickConfig {
            tick_rate: 50.0,
            max_ticks: 0,
        };
        let mut tick_loop = TickLoop::new(config, ready_world());
        tick_loop.tick().unwrap();
        tick_loop.tick().unwrap();
        assert_eq!(tick_loop.world().tick(), 2);
        assert!((tick_loop.world().elapsed() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0,
            max_ticks: 5,
        };
        let mut tick_loop = TickLoop::new(config, ready_world());
        tick_loop.run().unwrap();
        assert_eq!(tick_loop.world().tick(), 5);
    }

    struct AlwaysFails;

    impl System for AlwaysFails {
        fn process(&mut self, _world: &mut World, entity: Entity, _delta: f32) -> Result<()> {
            Err(EcsError::EntityNotFound(entity))
        }
    }

    #[test]
    fn test_run_stops_on_error() {
        let mut world = World::new();
        world.register_system(AlwaysFails).unwrap();
        world.initialize().unwrap();
        let e = world.spawn();
        world.add(e).unwrap();

        let config = TickConfig {
            tick_rate: 1000.0,
            max_ticks: 0,
        };
        let mut tick_loop = TickLoop::new(config, world);
        assert_eq!(tick_loop.run(), Err(EcsError::EntityNotFound(e)));
        assert_eq!(tick_loop.world_mut().tick(), 0);
    }
}
