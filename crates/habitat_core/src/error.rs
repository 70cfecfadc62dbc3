//! Error types shared by the engine components.

use std::time::Duration;
use thiserror::Error;

/// A grid coordinate outside `[0, rows) x [0, cols)`.
///
/// Movement never produces such a coordinate, so seeing one means the
/// caller has a bounds bug rather than a recoverable runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid must have at least one row and one column (got {rows}x{columns})")]
    EmptyGrid { rows: usize, columns: usize },
    #[error("initial population must be positive")]
    EmptyPopulation,
    #[error("food replenish fraction {0} is outside (0, 1]")]
    ReplenishFraction(f64),
    #[error("round period must be positive")]
    ZeroPeriod,
    #[error("round duration {duration_ms}ms must be shorter than the period {period_ms}ms")]
    DurationExceedsPeriod { duration_ms: u64, period_ms: u64 },
    #[error("step delay {step_ms}ms must be shorter than the round duration {duration_ms}ms")]
    StepExceedsDuration { step_ms: u64, duration_ms: u64 },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("in-flight rounds did not drain within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("scheduler has already been shut down")]
    AlreadyShutDown,
    #[error("failed to build worker pool: {0}")]
    Runtime(#[from] std::io::Error),
}
