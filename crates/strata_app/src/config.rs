//! Command line and tick loop configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! JSON file, and the `--tick-rate` / `--max-ticks` flags (or their
//! `STRATA_TICK_RATE` / `STRATA_MAX_TICKS` environment variables).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "strata_app", about = "Drive a demo Strata world at a fixed tick rate")]
pub struct Args {
    /// JSON file with `tick_rate` and `max_ticks`
    pub config: Option<PathBuf>,

    /// Target ticks per second
    #[arg(long, env = "STRATA_TICK_RATE")]
    pub tick_rate: Option<f64>,

    /// Stop after this many ticks (0 = unlimited)
    #[arg(long, env = "STRATA_MAX_TICKS")]
    pub max_ticks: Option<u64>,
}

impl Args {
    /// Resolve the tick configuration: file or defaults, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the merged
    /// tick rate is not a positive finite number.
    pub fn tick_config(&self) -> Result<TickConfig> {
        let mut config = match &self.config {
            Some(path) => TickConfig::load(path)?,
            None => TickConfig::default(),
        };
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(max_ticks) = self.max_ticks {
            config.max_ticks = max_ticks;
        }
        config.validate()
    }
}

/// Configuration for the host tick loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or the tick rate is not
    /// a positive finite number.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid tick config")?;
        config.validate()
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    ///
    /// As [`TickConfig::from_json`], plus any I/O error.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Seconds per tick.
    #[must_use]
    pub fn delta(&self) -> f64 {
        1.0 / self.tick_rate
    }

    fn validate(self) -> Result<Self> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            bail!("tick_rate must be positive, got {}", self.tick_rate);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = TickConfig::from_json("{}").unwrap();
        assert_eq!(config, TickConfig::default());

        let config = TickConfig::from_json(r#"{"max_ticks": 30}"#).unwrap();
        assert_eq!(config.max_ticks, 30);
        assert_eq!(config.tick_rate, 60.0);
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert!(TickConfig::from_json(r#"{"tick_rate": 0}"#).is_err());
        assert!(TickConfig::from_json(r#"{"tick_rate": -5.0}"#).is_err());
        assert!(TickConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args =
            Args::try_parse_from(["strata_app", "--tick-rate", "30", "--max-ticks", "120"]).unwrap();
        assert_eq!(args.config, None);
        let config = args.tick_config().unwrap();
        assert_eq!(config.tick_rate, 30.0);
        assert_eq!(config.max_ticks, 120);
        assert!((config.delta() - 1.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_bad_flags_are_rejected() {
        assert!(Args::try_parse_from(["strata_app", "--max-ticks", "lots"]).is_err());
        let args = Args::try_parse_from(["strata_app", "--tick-rate", "0"]).unwrap();
        assert!(args.tick_config().is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let path = std::env::temp_dir().join(format!("strata_tick_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"tick_rate": 20, "max_ticks": 5}"#).unwrap();
        let file = path.to_str().unwrap();

        let config = Args::try_parse_from(["strata_app", file])
            .unwrap()
            .tick_config()
            .unwrap();
        assert_eq!(config.tick_rate, 20.0);
        assert_eq!(config.max_ticks, 5);

        let config = Args::try_parse_from(["strata_app", file, "--max-ticks", "9"])
            .unwrap()
            .tick_config()
            .unwrap();
        assert_eq!(config.tick_rate, 20.0);
        assert_eq!(config.max_ticks, 9);

        std::fs::remove_file(&path).unwrap();
        assert!(
            Args::try_parse_from(["strata_app", file])
                .unwrap()
                .tick_config()
                .is_err()
        );
    }
}
