//! Recurring agent rounds, lazy admission of newborns and shutdown.
//!
//! The scheduler owns a multi-threaded tokio runtime sized once from the
//! initial population. Every live agent is one task ticking on the shared
//! cadence. Offspring do not start immediately: they go through an
//! unbounded admission queue drained by a dedicated `habitat-admitter`
//! thread, which is started by whichever enqueue comes first.

use crate::agent::{Agent, AgentId, Population, RoundContext, RoundOutcome};
use crate::config::SimulationConfig;
use crate::error::SchedulerError;
use crate::gate::RoundGate;
use crate::grid::ResourceGrid;
use crate::metrics::PopulationMetrics;
use crate::stats::StatisticsLog;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
struct Shared {
    runtime: Handle,
    context: RoundContext,
    period: Duration,
    epoch: OnceLock<Instant>,
    queue: Mutex<Sender<Agent>>,
    pending: Mutex<Option<Receiver<Agent>>>,
    admitter_started: AtomicBool,
    admitter: Mutex<Option<thread::JoinHandle<()>>>,
    schedules: Mutex<HashMap<AgentId, AbortHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    metrics: PopulationMetrics,
}

/// Cloneable access to a running scheduler. This is what agents see as
/// their [`Population`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    fn is_shutting_down(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// First cadence boundary that is not in the past. The epoch is fixed by
    /// whoever asks first.
    fn next_boundary(&self) -> Instant {
        let now = Instant::now();
        let epoch = *self.shared.epoch.get_or_init(|| now);
        if now <= epoch {
            return epoch;
        }
        let period = self.shared.period.as_nanos().max(1);
        let elapsed = (now - epoch).as_nanos();
        let ticks = elapsed.div_ceil(period);
        epoch + Duration::from_nanos((ticks * period) as u64)
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.shared.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Starts the recurring round of `agent` with its first tick at `start`.
    fn spawn_recurring(&self, agent: Agent, start: Instant) {
        let id = agent.id();
        let handle = self.clone();
        let mut shutdown = self.shared.shutdown.subscribe();

        // Holding the map lock across the spawn guarantees the abort handle
        // is registered before the task can retire itself.
        let mut schedules = lock(&self.shared.schedules);
        let task = self.shared.runtime.spawn(async move {
            let mut agent = agent;
            let mut ticks = tokio::time::interval_at(start, handle.shared.period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                let stopping = *shutdown.borrow();
                if stopping {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticks.tick() => {}
                }
                match agent.run_round(&handle.shared.context, &handle).await {
                    Ok(RoundOutcome::Dead) => break,
                    Ok(_) => {}
                    Err(e) => {
                        handle.shared.metrics.record_failed_round();
                        tracing::error!(agent = %id, error = %e, "Round failed");
                    }
                }
            }
        });
        schedules.insert(id, task.abort_handle());
        let scheduled = schedules.len();
        drop(schedules);

        self.shared.metrics.observe_scheduled(scheduled);
        self.track(task);
    }

    /// Adds `agent` to the admission queue and makes sure the admitter runs.
    pub fn enqueue(&self, agent: Agent) {
        let id = agent.id();
        if lock(&self.shared.queue).send(agent).is_err() {
            tracing::warn!(agent = %id, "Admission queue closed, dropping agent");
            return;
        }
        self.ensure_admitter();
    }

    fn ensure_admitter(&self) {
        if self
            .shared
            .admitter_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Some(pending) = lock(&self.shared.pending).take() else {
            return;
        };
        let handle = self.clone();
        let spawned = thread::Builder::new()
            .name("habitat-admitter".to_string())
            .spawn(move || handle.admit_loop(pending));
        match spawned {
            Ok(thread) => *lock(&self.shared.admitter) = Some(thread),
            Err(e) => tracing::error!(error = %e, "Failed to start admitter thread"),
        }
    }

    fn admit_loop(&self, pending: Receiver<Agent>) {
        tracing::info!("Admitter started");
        while !self.is_shutting_down() {
            match pending.recv_timeout(self.shared.period) {
                Ok(agent) => {
                    if self.is_shutting_down() {
                        break;
                    }
                    let id = agent.id();
                    let start = self.next_boundary();
                    self.spawn_recurring(agent, start);
                    self.shared.metrics.record_admission();
                    tracing::debug!(agent = %id, "Admitted");
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Admission queue disconnected");
                    break;
                }
            }
        }
        tracing::info!("Admitter stopped");
    }

    /// Cancels the recurring round of `id`. Returns whether it was scheduled.
    pub fn cancel(&self, id: AgentId) -> bool {
        match lock(&self.shared.schedules).remove(&id) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Number of agents with a live recurring round.
    pub fn active_agents(&self) -> usize {
        lock(&self.shared.schedules).len()
    }

    /// Lifetime population counters.
    pub fn metrics(&self) -> &PopulationMetrics {
        &self.shared.metrics
    }
}

impl Population for SchedulerHandle {
    fn admit(&self, agent: Agent) {
        self.shared.metrics.record_birth();
        self.enqueue(agent);
    }

    fn retire(&self, id: AgentId) {
        if self.cancel(id) {
            self.shared.metrics.record_death();
        }
    }
}

/// Owns the worker runtime. Dropping it without [`AdmissionScheduler::shutdown`]
/// still stops the admitter and cancels every task.
#[derive(Debug)]
pub struct AdmissionScheduler {
    runtime: Option<Runtime>,
    handle: SchedulerHandle,
    worker_threads: usize,
}

impl AdmissionScheduler {
    /// Builds the worker pool and a fresh round gate. The pool size is
    /// derived from the configured initial population and never changes.
    pub fn new(
        config: &SimulationConfig,
        grid: Arc<ResourceGrid>,
        stats: Arc<StatisticsLog>,
    ) -> Result<Self, SchedulerError> {
        let worker_threads = config
            .scheduler
            .worker_threads(config.world.initial_population);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("habitat-round")
            .enable_time()
            .build()?;

        let context = RoundContext {
            grid,
            gate: Arc::new(RoundGate::new(config.scheduler.gate_spin_limit)),
            stats,
            round_duration: config.timing.round_duration(),
            step_delay: config.timing.step_delay(),
        };
        let (queue, pending) = mpsc::channel();
        let (shutdown, _) = watch::channel(false);
        let shared = Shared {
            runtime: runtime.handle().clone(),
            context,
            period: config.timing.round_period(),
            epoch: OnceLock::new(),
            queue: Mutex::new(queue),
            pending: Mutex::new(Some(pending)),
            admitter_started: AtomicBool::new(false),
            admitter: Mutex::new(None),
            schedules: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            shutdown,
            metrics: PopulationMetrics::new(),
        };

        tracing::info!(worker_threads, "Scheduler ready");
        Ok(Self {
            runtime: Some(runtime),
            handle: SchedulerHandle {
                shared: Arc::new(shared),
            },
            worker_threads,
        })
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.runtime.is_none() {
            return Err(SchedulerError::AlreadyShutDown);
        }
        Ok(())
    }

    /// Schedules the founding population. Their first round fires after
    /// `initial_delay`, which also fixes the cadence epoch.
    pub fn schedule_initial(
        &self,
        agents: impl IntoIterator<Item = Agent>,
        initial_delay: Duration,
    ) -> Result<(), SchedulerError> {
        self.ensure_running()?;
        let requested = Instant::now() + initial_delay;
        let epoch = *self.handle.shared.epoch.get_or_init(|| requested);
        // Founders own the epoch unless something else fixed it first.
        let start = if epoch == requested {
            epoch
        } else {
            self.handle.next_boundary().max(requested)
        };
        let mut count = 0usize;
        for agent in agents {
            self.handle.spawn_recurring(agent, start);
            count += 1;
        }
        tracing::info!(count, "Scheduled initial population");
        Ok(())
    }

    /// Runs `task` once per period at `offset` past the cadence epoch.
    pub fn schedule_coordinator<F>(&self, offset: Duration, mut task: F) -> Result<(), SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.ensure_running()?;
        let shared = &self.handle.shared;
        let epoch = *shared.epoch.get_or_init(Instant::now);
        let period = shared.period;
        let mut shutdown = shared.shutdown.subscribe();
        let join = shared.runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(epoch + offset, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                let stopping = *shutdown.borrow();
                if stopping {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticks.tick() => task(),
                }
            }
        });
        self.handle.track(join);
        Ok(())
    }

    /// Queues `agent` for admission on the next cadence boundary.
    pub fn enqueue(&self, agent: Agent) -> Result<(), SchedulerError> {
        self.ensure_running()?;
        self.handle.enqueue(agent);
        Ok(())
    }

    /// Cancels the recurring round of `id`. Returns whether it was scheduled.
    pub fn cancel(&self, id: AgentId) -> bool {
        self.handle.cancel(id)
    }

    /// Cloneable handle for code that outlives a borrow of the scheduler,
    /// such as coordinator closures.
    pub fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    /// Grid, gate and statistics shared by every round.
    pub fn context(&self) -> &RoundContext {
        &self.handle.shared.context
    }

    /// Number of agents with a live recurring round.
    pub fn active_agents(&self) -> usize {
        self.handle.active_agents()
    }

    /// Lifetime population counters.
    pub fn metrics(&self) -> &PopulationMetrics {
        self.handle.metrics()
    }

    /// Size of the worker pool, fixed at construction.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Whether [`AdmissionScheduler::shutdown`] has already run.
    pub fn is_shut_down(&self) -> bool {
        self.runtime.is_none()
    }

    /// Stops admitting and scheduling, then waits up to `grace` of wall-clock
    /// time for rounds in flight to finish. The deadline holds even when
    /// every worker is blocked. Must not be called from inside an async
    /// context.
    pub fn shutdown(&mut self, grace: Duration) -> Result<(), SchedulerError> {
        let runtime = self.runtime.take().ok_or(SchedulerError::AlreadyShutDown)?;
        let deadline = std::time::Instant::now() + grace;
        let shared = &self.handle.shared;
        shared.shutdown.send_replace(true);
        shared.context.gate.close();

        if let Some(admitter) = lock(&shared.admitter).take() {
            if admitter.join().is_err() {
                tracing::warn!("Admitter thread panicked");
            }
        }

        let tasks = std::mem::take(&mut *lock(&shared.tasks));
        let in_flight = tasks.len();
        let (done, drained) = mpsc::channel();
        runtime.spawn(async move {
            let results = futures::future::join_all(tasks).await;
            // The receiver is gone once the deadline passed.
            let _ = done.send(results);
        });
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        let drained = drained.recv_timeout(remaining);
        lock(&shared.schedules).clear();

        match drained {
            Ok(results) => {
                let panicked = results
                    .iter()
                    .filter(|r| matches!(r, Err(e) if e.is_panic()))
                    .count();
                if panicked > 0 {
                    tracing::warn!(panicked, "Tasks panicked before shutdown");
                }
                runtime.shutdown_timeout(Duration::from_millis(100));
                tracing::info!(in_flight, "Scheduler drained");
                Ok(())
            }
            Err(_) => {
                runtime.shutdown_background();
                tracing::error!(grace_ms = grace.as_millis() as u64, "Shutdown timed out");
                Err(SchedulerError::ShutdownTimeout(grace))
            }
        }
    }
}

impl Drop for AdmissionScheduler {
    fn drop(&mut self) {
        self.handle.shared.shutdown.send_replace(true);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
