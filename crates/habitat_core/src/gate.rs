//! First-arrival-wins round start coordination.
//!
//! Agents whose rounds fire on the same tick race into [`RoundGate::enter`].
//! The winner of the arming compare-and-set stamps the shared timestamp; every
//! other caller is a no-op and picks the stamp up through [`RoundGate::read`].
//! Only the arming pass clears the stamp again when it leaves, which re-arms
//! the gate for whoever enters next.
//!
//! One gate serves the whole population, not a single cohort. If the next
//! round's first caller arms the gate before a slow caller from the previous
//! round has read it, that caller observes the new round's timestamp. This is
//! kept as-is; see `DESIGN.md`.
//!
//! The mirror case is a caller entering just after the armer left: it waits
//! for the next arming. At shutdown none comes, so the scheduler
//! [`closes`](RoundGate::close) the gate and waiting readers fall back to
//! their own clock.

use std::hint;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Stamp value meaning "nothing published".
const UNSET: u64 = 0;

#[derive(Debug)]
pub struct RoundGate {
    origin: Instant,
    stamp: AtomicU64,
    armed: AtomicBool,
    generation: AtomicU64,
    closed: AtomicBool,
    spin_limit: u32,
}

impl RoundGate {
    /// `spin_limit` bounds the busy-wait in [`RoundGate::read`] before it
    /// falls back to yielding the worker.
    pub fn new(spin_limit: u32) -> Self {
        Self {
            origin: Instant::now(),
            stamp: AtomicU64::new(UNSET),
            armed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            spin_limit,
        }
    }

    fn encode(&self, at: Instant) -> u64 {
        // +1 keeps a stamp taken at the exact origin distinct from UNSET.
        at.saturating_duration_since(self.origin).as_nanos() as u64 + 1
    }

    fn decode(&self, raw: u64) -> Instant {
        self.origin + Duration::from_nanos(raw - 1)
    }

    /// Joins the current cohort, arming the gate if nobody holds it.
    pub fn enter(&self) -> GatePass<'_> {
        let armer = self
            .armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if armer {
            self.generation.fetch_add(1, Ordering::Relaxed);
            self.stamp
                .store(self.encode(Instant::now()), Ordering::Release);
        }
        GatePass {
            gate: self,
            armer,
            released: false,
        }
    }

    /// Currently published timestamp, if any.
    pub fn try_read(&self) -> Option<Instant> {
        match self.stamp.load(Ordering::Acquire) {
            UNSET => None,
            raw => Some(self.decode(raw)),
        }
    }

    /// Waits until a timestamp is published and returns it. Spins first to
    /// keep the task on its core, then yields between polls. On a closed
    /// gate with nothing published it returns the current time.
    pub async fn read(&self) -> Instant {
        let mut spins = 0u32;
        loop {
            if let Some(at) = self.try_read() {
                return at;
            }
            if self.is_closed() {
                return Instant::now();
            }
            if spins < self.spin_limit {
                spins += 1;
                hint::spin_loop();
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    /// Stops readers from waiting for an arming that will never come.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether some pass currently holds the stamp.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Number of times the gate has been armed.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    fn disarm(&self) {
        self.stamp.store(UNSET, Ordering::Release);
        self.armed.store(false, Ordering::Release);
    }
}

/// Proof of having entered the gate. Dropping it is the same as
/// [`GatePass::leave`].
#[derive(Debug)]
pub struct GatePass<'a> {
    gate: &'a RoundGate,
    armer: bool,
    released: bool,
}

impl GatePass<'_> {
    /// Whether this pass won the arming race and owns the stamp.
    pub fn is_armer(&self) -> bool {
        self.armer
    }

    /// Leaves the cohort; the armer also clears the stamp.
    pub fn leave(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.armer && !self.released {
            self.gate.disarm();
        }
        self.released = true;
    }
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
