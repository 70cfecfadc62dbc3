//! Driver for the habitat simulation: wires the engine in `habitat_core`
//! into a complete run with coordinators, early shutdown and a final report.

pub mod app;

pub use app::{RoundTally, ShutdownManager, Simulation, SimulationReport};
pub use habitat_core::config::SimulationConfig;
