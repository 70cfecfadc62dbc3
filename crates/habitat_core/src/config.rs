//! Configuration for a simulation run.
//!
//! Maps onto a `config.toml` file. Every section has defaults, so a file only
//! needs the keys it overrides.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [world]
//! rows = 25
//! columns = 25
//! initial_population = 10
//! food_replenish_fraction = 0.11
//!
//! [timing]
//! round_period_ms = 2000
//! round_duration_ms = 1600
//! step_delay_ms = 75
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

/// Grid and population parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub rows: usize,
    pub columns: usize,
    pub initial_population: usize,
    /// Share of cells drawn for food at every round boundary. Draws can
    /// repeat, so 0.11 yields roughly 10% coverage.
    pub food_replenish_fraction: f64,
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            rows: 25,
            columns: 25,
            initial_population: 10,
            food_replenish_fraction: 0.11,
            seed: None,
        }
    }
}

/// Round cadence. All values are milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub round_period_ms: u64,
    pub round_duration_ms: u64,
    pub step_delay_ms: u64,
    pub initial_delay_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            round_period_ms: 2000,
            round_duration_ms: 1600,
            step_delay_ms: 75,
            initial_delay_ms: 0,
            shutdown_grace_ms: 6000,
        }
    }
}

impl TimingConfig {
    pub fn round_period(&self) -> Duration {
        Duration::from_millis(self.round_period_ms)
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Offset past each round tick at which the boundary coordinators run:
    /// halfway between the end of the foraging window and the next tick.
    pub fn coordinator_offset(&self) -> Duration {
        let slack = self.round_period_ms.saturating_sub(self.round_duration_ms);
        Duration::from_millis(self.round_duration_ms + slack / 2)
    }
}

/// Worker pool sizing and gate tuning.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Workers provisioned per initial agent. The pool is not resized later.
    pub pool_multiplier: usize,
    pub max_workers: usize,
    /// Busy-wait iterations in the gate before yielding.
    pub gate_spin_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_multiplier: 50,
            max_workers: 64,
            gate_spin_limit: 10_000,
        }
    }
}

impl SchedulerConfig {
    /// Pool size for `initial_population`, clamped to `[2, max_workers]`.
    pub fn worker_threads(&self, initial_population: usize) -> usize {
        initial_population
            .saturating_mul(self.pool_multiplier)
            .clamp(2, self.max_workers.max(2))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub world: WorldConfig,
    pub timing: TimingConfig,
    pub scheduler: SchedulerConfig,
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, writing the defaults there first if the file is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let default = Self::default();
                fs::write(path, toml::to_string(&default)?)?;
                tracing::info!(path = %path.display(), "Wrote default configuration");
                Ok(default)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        let timing = &self.timing;
        if world.rows == 0 || world.columns == 0 {
            return Err(ConfigError::EmptyGrid {
                rows: world.rows,
                columns: world.columns,
            });
        }
        if world.initial_population == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        let fraction = world.food_replenish_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::ReplenishFraction(fraction));
        }
        if timing.round_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if timing.round_duration_ms >= timing.round_period_ms {
            return Err(ConfigError::DurationExceedsPeriod {
                duration_ms: timing.round_duration_ms,
                period_ms: timing.round_period_ms,
            });
        }
        if timing.step_delay_ms >= timing.round_duration_ms {
            return Err(ConfigError::StepExceedsDuration {
                step_ms: timing.step_delay_ms,
                duration_ms: timing.round_duration_ms,
            });
        }
        Ok(())
    }
}
