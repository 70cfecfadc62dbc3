//! Per-round alive counts.
//!
//! Agents bump a live counter once per round; the coordinator swaps it out
//! into the append-only log at each round boundary and wakes anyone blocked
//! in [`StatisticsLog::wait_for_rounds`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Append-only per-round alive counts with a monitor for waiters.
#[derive(Debug, Default)]
pub struct StatisticsLog {
    rounds: Mutex<Vec<usize>>,
    advanced: Condvar,
    alive: AtomicUsize,
}

impl StatisticsLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<usize>> {
        self.rounds.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Counts the caller as alive in the current round.
    pub fn report_alive(&self) {
        self.alive.fetch_add(1, Ordering::AcqRel);
    }

    /// Closes the current round: the live counter is reset to zero and its
    /// previous value appended to the log. Returns the committed value.
    pub fn commit_round(&self) -> usize {
        let mut rounds = self.lock();
        let alive = self.alive.swap(0, Ordering::AcqRel);
        rounds.push(alive);
        alive
    }

    /// Wakes every waiter so it can re-check its predicate.
    pub fn notify_advance(&self) {
        let _rounds = self.lock();
        self.advanced.notify_all();
    }

    /// Blocks while `keep_waiting(rounds_collected)` holds.
    pub fn wait_for_rounds<P>(&self, mut keep_waiting: P)
    where
        P: FnMut(usize) -> bool,
    {
        let mut rounds = self.lock();
        while keep_waiting(rounds.len()) {
            rounds = self
                .advanced
                .wait(rounds)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`StatisticsLog::wait_for_rounds`], but gives up after `timeout`.
    /// Returns `true` if the predicate was released before the deadline.
    pub fn wait_for_rounds_timeout<P>(&self, mut keep_waiting: P, timeout: Duration) -> bool
    where
        P: FnMut(usize) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut rounds = self.lock();
        while keep_waiting(rounds.len()) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            rounds = self
                .advanced
                .wait_timeout(rounds, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    /// Number of committed rounds.
    pub fn rounds_collected(&self) -> usize {
        self.lock().len()
    }

    /// Reports received since the last commit.
    pub fn live_count(&self) -> usize {
        self.alive.load(Ordering::Acquire)
    }

    /// Copy of the committed alive counts, oldest first.
    pub fn snapshot(&self) -> Vec<usize> {
        self.lock().clone()
    }
}

impl fmt::Display for StatisticsLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alive) in self.lock().iter().enumerate() {
            writeln!(f, "Round {}: {} alive", i + 1, alive)?;
        }
        Ok(())
    }
}
