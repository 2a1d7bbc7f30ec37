//! Trajectory watchdog: flags agents whose updated trajectory is no
//! longer being refreshed.
//!
//! Staleness is measured on the monotonic instant recorded by the store
//! at write time, not on the injected clock, so a stalled engine is
//! detected even when the clock is frozen.

use std::sync::Arc;
use std::time::Duration;

use arbiter_core::{AgentKey, Clock, WardenError};
use arbiter_warden::TrajectoryStore;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, TrajectoryWatchdogConfig};
use crate::metrics::WatchdogMetrics;
use crate::runner::{spawn_loop, CycleLoop, LoopHandle};
use crate::status::{StatusEntry, StatusFlag, StatusReason, StatusTable};

/// The trajectory watchdog loop body.
pub struct TrajectoryWatchdog {
    config: TrajectoryWatchdogConfig,
    clock: Arc<dyn Clock>,
    updated: Arc<TrajectoryStore>,
    table: Arc<StatusTable>,
    flags: IndexMap<AgentKey, StatusFlag>,
    metrics: WatchdogMetrics,
}

impl TrajectoryWatchdog {
    /// Watchdog over the published trajectories in `updated`,
    /// reporting into `table`.
    pub fn new(
        config: TrajectoryWatchdogConfig,
        clock: Arc<dyn Clock>,
        updated: Arc<TrajectoryStore>,
        table: Arc<StatusTable>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            updated,
            table,
            flags: IndexMap::new(),
            metrics: WatchdogMetrics::default(),
        })
    }

    /// The status table this watchdog writes.
    pub fn table(&self) -> &Arc<StatusTable> {
        &self.table
    }

    /// Cumulative metrics.
    pub fn metrics(&self) -> &WatchdogMetrics {
        &self.metrics
    }

    /// Move the watchdog onto its own thread at the configured period.
    pub fn spawn(self) -> Result<LoopHandle<Self>, ConfigError> {
        let period = self.config.period;
        spawn_loop(self, period)
    }

    /// Check every agent once.
    pub fn run_cycle(&mut self) -> WatchdogMetrics {
        let now = self.clock.now();
        let window = self.config.staleness_window;
        for key in self.table.keys() {
            let entry = match self.updated.read_stamped(&key) {
                Ok(stamped) => match stamped.age() {
                    None => StatusEntry::raised(StatusFlag::Stale, StatusReason::NeverWritten, now),
                    Some(age) if age > window => StatusEntry::raised(
                        StatusFlag::Stale,
                        StatusReason::Stale {
                            age_ms: millis(age),
                        },
                        now,
                    ),
                    Some(_) => StatusEntry::nominal(now),
                },
                Err(_) => {
                    StatusEntry::raised(StatusFlag::Unknown, StatusReason::StateUnavailable, now)
                }
            };
            self.record(key, entry);
        }
        self.metrics.cycles += 1;
        self.metrics.clone()
    }

    fn record(&mut self, key: AgentKey, entry: StatusEntry) {
        let previous = self.flags.insert(key.clone(), entry.flag);
        if previous != Some(entry.flag) {
            match &entry.reason {
                Some(reason) => {
                    warn!(agent = %key, flag = %entry.flag, %reason, "trajectory status raised")
                }
                None if previous.is_some() => info!(agent = %key, "trajectory status cleared"),
                None => {}
            }
        }
        if !entry.is_nominal() {
            self.metrics.raised += 1;
        }
        match self.table.write(&key, entry) {
            Ok(_) => {}
            Err(WardenError::StoreStopped) => debug!(agent = %key, "status table stopped"),
            Err(e) => {
                self.flags.shift_remove(&key);
                debug!(agent = %key, error = %e, "status entry dropped");
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl CycleLoop for TrajectoryWatchdog {
    type Metrics = WatchdogMetrics;

    fn name(&self) -> &str {
        "trajectory-watchdog"
    }

    fn cycle_once(&mut self) -> WatchdogMetrics {
        self.run_cycle()
    }

    fn on_stop(&mut self) {
        self.table.stop();
    }
}

impl std::fmt::Debug for TrajectoryWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryWatchdog")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish()
    }
}
