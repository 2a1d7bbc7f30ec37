//! Fixed-rate loop runner.
//!
//! [`spawn_loop`] moves a [`CycleLoop`] onto a named thread that calls
//! [`cycle_once`](CycleLoop::cycle_once) once per period and sleeps the
//! remaining budget. The sleep is a `park_timeout`, so
//! [`LoopHandle::stop`] unparks the thread and shutdown latency is
//! bounded by one cycle rather than one full period of sleep.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::ConfigError;

/// A loop body driven at a fixed period.
pub trait CycleLoop: Send + 'static {
    /// Metrics produced by one cycle.
    type Metrics: Clone + Default + Send + 'static;

    /// Name used for the thread and in logs.
    fn name(&self) -> &str;

    /// Run one cycle. Must not block beyond the work of the cycle.
    fn cycle_once(&mut self) -> Self::Metrics;

    /// Called on the loop thread after the last cycle, before the loop
    /// value is handed back.
    fn on_stop(&mut self) {}
}

/// Handle to a running loop.
///
/// Dropping the handle stops the loop and discards the loop value.
pub struct LoopHandle<L: CycleLoop> {
    name: String,
    period: Duration,
    running: Arc<AtomicBool>,
    last: Arc<Mutex<L::Metrics>>,
    overruns: Arc<AtomicU64>,
    thread: Option<JoinHandle<L>>,
}

/// Run `body` every `period` on a new thread named after it.
pub fn spawn_loop<L: CycleLoop>(body: L, period: Duration) -> Result<LoopHandle<L>, ConfigError> {
    let name = body.name().to_owned();
    let running = Arc::new(AtomicBool::new(true));
    let last = Arc::new(Mutex::new(L::Metrics::default()));
    let overruns = Arc::new(AtomicU64::new(0));

    let thread_running = Arc::clone(&running);
    let thread_last = Arc::clone(&last);
    let thread_overruns = Arc::clone(&overruns);
    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run(body, period, &thread_running, &thread_last, &thread_overruns))
        .map_err(|e| ConfigError::ThreadSpawnFailed {
            reason: format!("{name}: {e}"),
        })?;

    Ok(LoopHandle {
        name,
        period,
        running,
        last,
        overruns,
        thread: Some(thread),
    })
}

fn run<L: CycleLoop>(
    mut body: L,
    period: Duration,
    running: &AtomicBool,
    last: &Mutex<L::Metrics>,
    overruns: &AtomicU64,
) -> L {
    info!(
        loop_name = body.name(),
        period_ms = period.as_millis() as u64,
        "loop started"
    );
    let mut cycles: u64 = 0;
    while running.load(Ordering::Acquire) {
        let start = Instant::now();
        let metrics = body.cycle_once();
        *last.lock().unwrap_or_else(PoisonError::into_inner) = metrics;
        cycles += 1;

        let deadline = start + period;
        if Instant::now() > deadline {
            let total = overruns.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                loop_name = body.name(),
                cycle = cycles,
                overruns = total,
                "cycle overran its period"
            );
        }
        // Parks can wake spuriously; keep parking until the deadline
        // or a stop request.
        while running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
    body.on_stop();
    info!(
        loop_name = body.name(),
        cycles,
        overruns = overruns.load(Ordering::Relaxed),
        "loop stopped"
    );
    body
}

impl<L: CycleLoop> LoopHandle<L> {
    /// The loop's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the loop thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Metrics from the most recent completed cycle.
    pub fn last_metrics(&self) -> L::Metrics {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cycles so far that took longer than the period.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Stop the loop, wait for its thread, and hand back the loop value.
    ///
    /// Returns `None` if the loop thread panicked.
    pub fn stop(mut self) -> Option<L> {
        self.halt()
    }

    fn halt(&mut self) -> Option<L> {
        let handle = self.thread.take()?;
        self.running.store(false, Ordering::Release);
        handle.thread().unpark();
        match handle.join() {
            Ok(body) => Some(body),
            Err(_) => {
                warn!(loop_name = %self.name, "loop thread panicked");
                None
            }
        }
    }
}

impl<L: CycleLoop> Drop for LoopHandle<L> {
    fn drop(&mut self) {
        self.halt();
    }
}

impl<L: CycleLoop> std::fmt::Debug for LoopHandle<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}
