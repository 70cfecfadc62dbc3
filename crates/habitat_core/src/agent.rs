//! Agents and their per-round state machine.
//!
//! Each invocation of [`Agent::run_round`] is one round:
//!
//! 1. enter the shared [`RoundGate`] and read the round's start stamp;
//! 2. reset the meal counter and report alive;
//! 3. wander and forage until the round duration has elapsed;
//! 4. decide the fate: no meal starves, two or more meals spawn exactly one
//!    offspring on the grid border, one meal just survives;
//! 5. leave the gate.
//!
//! Rules:
//! - an agent that ate nothing retires itself from its [`Population`];
//! - the surplus above two meals is ignored, there is never a second child;
//! - position only changes inside the agent's own round.

use crate::error::GridError;
use crate::gate::RoundGate;
use crate::grid::ResourceGrid;
use crate::movement;
use crate::stats::StatisticsLog;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Stable agent identity: a process-wide sequence number plus a salt drawn
/// at construction. Position never takes part in hashing or equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId {
    seq: u64,
    salt: u64,
}

impl AgentId {
    fn next<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            salt: rng.gen(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.seq)
    }
}

/// Where offspring go and where starved agents are removed from.
pub trait Population: Send + Sync {
    /// Hands a newborn over for scheduling.
    fn admit(&self, agent: Agent);
    /// Cancels the recurring round of `id`. Only ever called by `id` itself.
    fn retire(&self, id: AgentId);
}

/// The capability set every simulated organism provides.
pub trait Organism {
    fn move_step(&mut self, rows: usize, cols: usize);
    /// Tries to eat at the current cell. Returns whether a unit was taken.
    fn forage(&mut self, grid: &ResourceGrid) -> Result<bool, GridError>;
    fn can_reproduce(&self) -> bool;
    fn should_die(&self) -> bool;
    fn reproduce(&mut self, rows: usize, cols: usize) -> Self
    where
        Self: Sized;
}

/// Everything a round needs besides the agent itself.
#[derive(Debug, Clone)]
pub struct RoundContext {
    pub grid: Arc<ResourceGrid>,
    pub gate: Arc<RoundGate>,
    pub stats: Arc<StatisticsLog>,
    pub round_duration: Duration,
    pub step_delay: Duration,
}

/// How a round ended, as decided from the meal count.
#[derive(Debug)]
pub enum Fate {
    Starved,
    Survived,
    Reproduced(Agent),
}

/// Agent state after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Active,
    Spawned(AgentId),
    Dead,
}

#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    row: usize,
    col: usize,
    eaten_this_round: u32,
    generation: u32,
    rng: ChaCha8Rng,
}

impl Agent {
    /// Creates an agent at `(row, col)` with its own RNG seeded from `rng`.
    pub fn new<R: Rng + ?Sized>(row: usize, col: usize, rng: &mut R) -> Self {
        Self {
            id: AgentId::next(rng),
            row,
            col,
            eaten_this_round: 0,
            generation: 0,
            rng: ChaCha8Rng::seed_from_u64(rng.gen()),
        }
    }

    /// Places a new agent on a random border cell.
    pub fn on_perimeter<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let (row, col) = movement::perimeter_coordinates(rows, cols, rng);
        Self::new(row, col, rng)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current `(row, col)`.
    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Food units taken since the current round started.
    pub fn eaten_this_round(&self) -> u32 {
        self.eaten_this_round
    }

    /// Number of ancestors; founders are generation 0.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Decides the outcome of the round from the meal count.
    pub fn conclude(&mut self, rows: usize, cols: usize) -> Fate {
        if self.should_die() {
            Fate::Starved
        } else if self.can_reproduce() {
            Fate::Reproduced(self.reproduce(rows, cols))
        } else {
            Fate::Survived
        }
    }

    /// Runs one full round. Grid errors abort the round early; the gate is
    /// still released because the pass is dropped on the way out.
    pub async fn run_round(
        &mut self,
        ctx: &RoundContext,
        population: &dyn Population,
    ) -> Result<RoundOutcome, GridError> {
        let pass = ctx.gate.enter();
        let started = ctx.gate.read().await;

        self.eaten_this_round = 0;
        ctx.stats.report_alive();

        let (rows, cols) = ctx.grid.dimensions();
        let deadline = started + ctx.round_duration;
        while Instant::now() < deadline {
            self.move_step(rows, cols);
            self.forage(&ctx.grid)?;
            tokio::time::sleep(ctx.step_delay).await;
        }

        let outcome = match self.conclude(rows, cols) {
            Fate::Starved => {
                tracing::debug!(agent = %self.id, "Starved");
                population.retire(self.id);
                RoundOutcome::Dead
            }
            Fate::Reproduced(child) => {
                let child_id = child.id();
                tracing::debug!(
                    agent = %self.id,
                    child = %child_id,
                    meals = self.eaten_this_round,
                    "Reproduced"
                );
                population.admit(child);
                RoundOutcome::Spawned(child_id)
            }
            Fate::Survived => RoundOutcome::Active,
        };

        pass.leave();
        Ok(outcome)
    }
}

impl Organism for Agent {
    fn move_step(&mut self, rows: usize, cols: usize) {
        let (row, col) = movement::step_target(self.row, self.col, rows, cols, &mut self.rng);
        self.row = row;
        self.col = col;
    }

    fn forage(&mut self, grid: &ResourceGrid) -> Result<bool, GridError> {
        let ate = grid.try_consume(self.row, self.col)?;
        if ate {
            self.eaten_this_round += 1;
        }
        Ok(ate)
    }

    fn can_reproduce(&self) -> bool {
        self.eaten_this_round >= 2
    }

    fn should_die(&self) -> bool {
        self.eaten_this_round == 0
    }

    fn reproduce(&mut self, rows: usize, cols: usize) -> Self {
        let mut child = Self::on_perimeter(rows, cols, &mut self.rng);
        child.generation = self.generation + 1;
        child
    }
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Agent {}

impl Hash for Agent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent {} {{row: {}, col: {}}}", self.id, self.row, self.col)
    }
}
