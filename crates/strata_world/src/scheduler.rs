//! Per-tick system execution.
//!
//! Systems run sequentially in registration order. Each turn walks a
//! snapshot of the system's matched set taken after `starting` returns, so
//! entities that join during the turn wait for the next tick and entities
//! that leave are skipped. Every turn that calls `starting` also calls
//! `ending`, including a turn cut short by a `process` error.

use std::time::Instant;

use strata_component::{EcsError, Result};
use tracing::{debug, error, trace};

use crate::system::SystemId;
use crate::world::World;

impl World {
    /// Run one tick of `delta` seconds over every non-passive system.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotInitialized`] before [`World::initialize`],
    /// [`EcsError::ReentrantProcess`] when called from inside a hook, and
    /// the first error returned by a system's `process` hook. On a hook
    /// error the failing system's `ending` still runs, later systems are
    /// skipped, and the clock is not advanced.
    pub fn process(&mut self, delta: f32) -> Result<()> {
        self.ensure_runnable()?;

        let started = Instant::now();
        for index in 0..self.systems.len() {
            if self.systems[index].flags.is_passive() {
                continue;
            }
            self.run_system(SystemId(index as u32), delta)?;
        }

        self.elapsed += f64::from(delta);
        self.tick += 1;
        debug!(
            tick = self.tick,
            delta,
            elapsed = self.elapsed,
            took_us = started.elapsed().as_micros() as u64,
            "tick complete"
        );
        Ok(())
    }

    /// Run a single system's turn, passive or not, without advancing the
    /// clock.
    ///
    /// # Errors
    ///
    /// As [`World::process`], plus [`EcsError::UnknownSystem`] for an id
    /// that was never registered.
    pub fn process_system(&mut self, system: SystemId, delta: f32) -> Result<()> {
        self.ensure_runnable()?;
        if system.index() >= self.systems.len() {
            return Err(EcsError::UnknownSystem(system.0));
        }
        self.run_system(system, delta)
    }

    fn ensure_runnable(&self) -> Result<()> {
        if !self.initialized {
            return Err(EcsError::NotInitialized);
        }
        if self.hook_depth > 0 {
            return Err(EcsError::ReentrantProcess);
        }
        Ok(())
    }

    fn run_system(&mut self, id: SystemId, delta: f32) -> Result<()> {
        self.call_system(id, |system, world| system.starting(world));

        let snapshot = self.subscriptions.matched(id).to_vec();
        trace!(system = %id, entities = snapshot.len(), "system turn");

        let mut outcome = Ok(());
        for entity in snapshot {
            if !self.subscriptions.is_subscribed(id, entity) {
                continue;
            }
            let processed = self.call_system(id, |system, world| system.process(world, entity, delta));
            if let Some(Err(err)) = processed {
                error!(
                    tick = self.tick,
                    system = self.systems[id.index()].name,
                    %entity,
                    %err,
                    "system failed, aborting tick"
                );
                outcome = Err(err);
                break;
            }
        }

        self.call_system(id, |system, world| system.ending(world));
        outcome
    }
}
