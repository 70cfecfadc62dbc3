use habitat_lib::{Simulation, SimulationConfig};

#[allow(dead_code)]
pub struct SimulationBuilder {
    config: SimulationConfig,
}

#[allow(dead_code)]
impl SimulationBuilder {
    /// A small, fast world: 10x10 grid, five founders, 50ms rounds.
    pub fn new() -> Self {
        let mut config = SimulationConfig::default();
        config.world.rows = 10;
        config.world.columns = 10;
        config.world.initial_population = 5;
        config.world.seed = Some(42);
        config.timing.round_period_ms = 50;
        config.timing.round_duration_ms = 40;
        config.timing.step_delay_ms = 5;
        config.timing.shutdown_grace_ms = 2000;
        config.scheduler.max_workers = 16;
        Self { config }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.world.seed = Some(seed);
        self
    }

    pub fn with_grid(mut self, rows: usize, columns: usize) -> Self {
        self.config.world.rows = rows;
        self.config.world.columns = columns;
        self
    }

    pub fn with_population(mut self, population: usize) -> Self {
        self.config.world.initial_population = population;
        self
    }

    pub fn with_timing(mut self, period_ms: u64, duration_ms: u64, step_ms: u64) -> Self {
        self.config.timing.round_period_ms = period_ms;
        self.config.timing.round_duration_ms = duration_ms;
        self.config.timing.step_delay_ms = step_ms;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut SimulationConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn build(self) -> Simulation {
        Simulation::new(self.config).expect("Failed to build simulation")
    }

    pub fn start(self) -> Simulation {
        let mut sim = self.build();
        sim.start().expect("Failed to start simulation");
        sim
    }
}
