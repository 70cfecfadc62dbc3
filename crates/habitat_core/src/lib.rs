//! # Habitat Core
//!
//! A concurrent, time-driven forage ecosystem on a bounded grid.
//!
//! Every agent lives on its own recurring round. During a round it wanders
//! the grid one neighbouring cell at a time, eating whatever single food
//! unit it finds. At the end of the round the meal count decides its fate:
//! no meal starves, two or more spawn one offspring on the border.
//!
//! ## Architecture
//!
//! - **Shared grid**: lock-free cells, each holding at most one food unit
//! - **Round gate**: the first agent of a round publishes the start stamp
//! - **Admission scheduler**: tokio worker pool plus a lazily started
//!   admitter thread for newborns
//! - **Statistics log**: per-round alive counts with blocking waiters
//!
//! ## Example
//!
//! ```
//! use habitat_core::grid::ResourceGrid;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let grid = ResourceGrid::new(25, 25);
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let picks = grid.replenish(0.11, &mut rng);
//! assert_eq!(picks, 68);
//! assert!(grid.food_count() <= picks);
//! ```

/// Agents, their identity and the per-round state machine
pub mod agent;
/// Configuration for grid, cadence and worker pool
pub mod config;
/// Error types
pub mod error;
/// First-arrival-wins round start coordination
pub mod gate;
/// Shared food grid
pub mod grid;
/// Population counters and logging setup
pub mod metrics;
/// Position-dependent movement rules
pub mod movement;
/// Recurring rounds, admission and shutdown
pub mod scheduler;
/// Per-round alive counts
pub mod stats;

pub use agent::{Agent, AgentId, Organism, Population, RoundContext, RoundOutcome};
pub use config::SimulationConfig;
pub use error::{ConfigError, GridError, SchedulerError};
pub use metrics::{init_logging, MetricsSnapshot, PopulationMetrics};
pub use scheduler::{AdmissionScheduler, SchedulerHandle};
