//! Population counters and logging setup.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Lifetime counters for a scheduler. All updates are relaxed; the values are
/// for reporting, not for synchronisation.
#[derive(Debug)]
pub struct PopulationMetrics {
    births: AtomicU64,
    deaths: AtomicU64,
    admitted: AtomicU64,
    failed_rounds: AtomicU64,
    peak_scheduled: AtomicU64,
    start_time: Instant,
}

impl Default for PopulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PopulationMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            births: AtomicU64::new(0),
            deaths: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            failed_rounds: AtomicU64::new(0),
            peak_scheduled: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_birth(&self) {
        self.births.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_death(&self) {
        self.deaths.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_round(&self) {
        self.failed_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_scheduled(&self, scheduled: usize) {
        self.peak_scheduled
            .fetch_max(scheduled as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            births: self.births.load(Ordering::Relaxed),
            deaths: self.deaths.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            failed_rounds: self.failed_rounds.load(Ordering::Relaxed),
            peak_scheduled: self.peak_scheduled.load(Ordering::Relaxed),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub births: u64,
    pub deaths: u64,
    pub admitted: u64,
    pub failed_rounds: u64,
    pub peak_scheduled: u64,
    pub elapsed_ms: u64,
}

/// Installs a fmt subscriber. `RUST_LOG` wins over `default_level` when set.
/// Calling this again after a subscriber exists is a no-op.
pub fn init_logging(default_level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = PopulationMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.births, 0);
        assert_eq!(snap.deaths, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = PopulationMetrics::new();
        metrics.record_birth();
        metrics.record_birth();
        metrics.record_death();
        metrics.record_admission();
        metrics.record_failed_round();
        metrics.observe_scheduled(7);
        metrics.observe_scheduled(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.births, 2);
        assert_eq!(snap.deaths, 1);
        assert_eq!(snap.admitted, 1);
        assert_eq!(snap.failed_rounds, 1);
        assert_eq!(snap.peak_scheduled, 7);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(tracing::Level::WARN);
        init_logging(tracing::Level::DEBUG);
    }
}
