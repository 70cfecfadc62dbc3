use anyhow::{bail, Context, Result};
use habitat_core::agent::Agent;
use habitat_core::config::SimulationConfig;
use habitat_core::error::SchedulerError;
use habitat_core::grid::ResourceGrid;
use habitat_core::metrics::MetricsSnapshot;
use habitat_core::scheduler::AdmissionScheduler;
use habitat_core::stats::StatisticsLog;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::shutdown::ShutdownManager;

/// Commits without progress for this many periods count as a stall.
const STALL_PERIODS: u32 = 4;

fn lock(tallies: &Mutex<Vec<RoundTally>>) -> MutexGuard<'_, Vec<RoundTally>> {
    tallies.lock().unwrap_or_else(|e| e.into_inner())
}

/// A committed round: its alive count and the lifetime counters at the
/// moment of the commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoundTally {
    pub alive: usize,
    pub births: u64,
    pub deaths: u64,
}

/// One complete run: grid, population, scheduler and the statistics they
/// feed.
pub struct Simulation {
    config: SimulationConfig,
    grid: Arc<ResourceGrid>,
    stats: Arc<StatisticsLog>,
    tallies: Arc<Mutex<Vec<RoundTally>>>,
    scheduler: AdmissionScheduler,
    founders: Vec<Agent>,
    rng: ChaCha8Rng,
    started: bool,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate().context("Invalid simulation configuration")?;

        let world = &config.world;
        let mut rng = match world.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let grid = Arc::new(ResourceGrid::new(world.rows, world.columns));
        let food = grid.replenish(world.food_replenish_fraction, &mut rng);
        let stats = Arc::new(StatisticsLog::new());
        let scheduler = AdmissionScheduler::new(&config, Arc::clone(&grid), Arc::clone(&stats))
            .context("Failed to start worker pool")?;

        let founders: Vec<Agent> = (0..world.initial_population)
            .map(|_| Agent::on_perimeter(world.rows, world.columns, &mut rng))
            .collect();

        tracing::info!(
            rows = world.rows,
            columns = world.columns,
            population = founders.len(),
            food,
            "Simulation created"
        );

        Ok(Self {
            config,
            grid,
            stats,
            tallies: Arc::new(Mutex::new(Vec::new())),
            scheduler,
            founders,
            rng,
            started: false,
        })
    }

    /// Schedules the founders and the two per-round coordinators: statistics
    /// commit and food turnover.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            bail!("Simulation already started");
        }
        let timing = &self.config.timing;
        self.scheduler
            .schedule_initial(self.founders.drain(..), timing.initial_delay())
            .context("Failed to schedule founders")?;

        let offset = timing.coordinator_offset();
        let stats = Arc::clone(&self.stats);
        let tallies = Arc::clone(&self.tallies);
        let population = self.scheduler.handle().clone();
        self.scheduler.schedule_coordinator(offset, move || {
            let alive = stats.commit_round();
            let counters = population.metrics().snapshot();
            lock(&tallies).push(RoundTally {
                alive,
                births: counters.births,
                deaths: counters.deaths,
            });
            stats.notify_advance();
            tracing::info!(round = stats.rounds_collected(), alive, "Round committed");
        })?;

        let grid = Arc::clone(&self.grid);
        let fraction = self.config.world.food_replenish_fraction;
        let mut rng = ChaCha8Rng::seed_from_u64(self.rng.gen());
        self.scheduler.schedule_coordinator(offset, move || {
            grid.clear_all();
            grid.replenish(fraction, &mut rng);
        })?;

        self.started = true;
        Ok(())
    }

    /// Blocks until `target` rounds are committed or `shutdown` is requested.
    /// Returns the number of committed rounds.
    pub fn run_rounds(&self, target: usize, shutdown: &ShutdownManager) -> Result<usize> {
        if !self.started {
            bail!("Simulation not started");
        }
        let period = self.config.timing.round_period();
        let stall_after = period * STALL_PERIODS + self.config.timing.initial_delay();
        let mut last = self.stats.rounds_collected();
        let mut last_progress = Instant::now();

        loop {
            let reached = self.stats.wait_for_rounds_timeout(
                |n| n < target && !shutdown.is_shutdown_requested(),
                period,
            );
            let rounds = self.stats.rounds_collected();
            if reached {
                return Ok(rounds);
            }
            if rounds != last {
                last = rounds;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > stall_after {
                bail!(
                    "No round committed within {}ms (stuck at {} rounds)",
                    stall_after.as_millis(),
                    rounds
                );
            }
        }
    }

    /// Per-commit tallies so far, oldest first.
    pub fn tallies(&self) -> Vec<RoundTally> {
        lock(&self.tallies).clone()
    }

    pub fn stats(&self) -> &StatisticsLog {
        &self.stats
    }

    pub fn grid(&self) -> &ResourceGrid {
        &self.grid
    }

    pub fn scheduler(&self) -> &AdmissionScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Stops the scheduler within the configured grace period and collects
    /// the report. A round that agents already reported into but that was
    /// never committed is committed here.
    pub fn shutdown(mut self) -> Result<SimulationReport, SchedulerError> {
        let grace = self.config.timing.shutdown_grace();
        self.scheduler.shutdown(grace)?;

        let metrics = self.scheduler.metrics().snapshot();
        if self.stats.live_count() > 0 {
            let alive = self.stats.commit_round();
            lock(&self.tallies).push(RoundTally {
                alive,
                births: metrics.births,
                deaths: metrics.deaths,
            });
            self.stats.notify_advance();
        }

        Ok(SimulationReport {
            rounds: self.stats.snapshot(),
            tallies: self.tallies(),
            metrics,
        })
    }
}

/// Alive counts per round plus lifetime population counters.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub rounds: Vec<usize>,
    pub tallies: Vec<RoundTally>,
    pub metrics: MetricsSnapshot,
}

impl SimulationReport {
    pub fn final_population(&self) -> Option<usize> {
        self.rounds.last().copied()
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alive) in self.rounds.iter().enumerate() {
            writeln!(f, "Round {}: {} alive", i + 1, alive)?;
        }
        write!(
            f,
            "births: {}, deaths: {}, peak scheduled: {}, elapsed: {}ms",
            self.metrics.births,
            self.metrics.deaths,
            self.metrics.peak_scheduled,
            self.metrics.elapsed_ms
        )
    }
}
