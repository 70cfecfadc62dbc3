pub mod shutdown;
pub mod simulation;

pub use shutdown::ShutdownManager;
pub use simulation::{RoundTally, Simulation, SimulationReport};
