//! # strata_app: demo host
//!
//! Embeds a Strata world, spawns a two-entity scene, and drives it at a fixed
//! tick rate.
//!
//! ## Usage
//!
//! ```text
//! strata_app [config.json] [--tick-rate <HZ>] [--max-ticks <N>]
//! ```
//!
//! The optional JSON file may set `tick_rate` and `max_ticks`; the flags, or
//! `STRATA_TICK_RATE` and `STRATA_MAX_TICKS`, override it. Set `RUST_LOG` to
//! adjust verbosity (default `strata_app=info`).

mod config;
mod demo;
mod tick;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Args;
use tick::TickLoop;

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("strata_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = args.tick_config()?;
    info!(?config, "strata demo starting");

    let world = demo::build_world().context("failed to build world")?;
    let mut tick_loop = TickLoop::new(config, world);
    let scene = demo::spawn_scene(tick_loop.world_mut()).context("failed to spawn scene")?;
    info!(mover = %scene.mover, rig = %scene.rig, "scene ready");

    tick_loop.run().context("tick loop aborted")?;

    info!(world = ?tick_loop.world(), "strata demo shut down");
    Ok(())
}
