//! State watchdog: audits every agent's current vehicle state against
//! the map's free space and a kinematic envelope.
//!
//! Observational only. It never corrects state; it writes one
//! [`StatusEntry`] per agent per cycle into its [`StatusTable`], so a
//! nominal entry clears an earlier violation on the next cycle.

use std::sync::Arc;

use arbiter_core::{AgentKey, Clock, VehicleState, WardenError};
use arbiter_space::{FreeSpace, Map};
use arbiter_warden::StateStore;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, KinematicEnvelope, StateWatchdogConfig};
use crate::metrics::WatchdogMetrics;
use crate::runner::{spawn_loop, CycleLoop, LoopHandle};
use crate::status::{StatusEntry, StatusFlag, StatusReason, StatusTable};

/// Audit a single state. Checks run in a fixed order and the first
/// failure is reported.
pub fn evaluate<F: FreeSpace + ?Sized>(
    state: &VehicleState,
    free_space: &F,
    envelope: &KinematicEnvelope,
    at: f64,
) -> StatusEntry {
    let speed = state.speed();
    let angular_rate = state.angular_rate();
    let reason = if !free_space.is_free_space(state.position) {
        Some(StatusReason::OutsideFreeSpace)
    } else if !(speed <= envelope.max_speed) {
        Some(StatusReason::SpeedExceeded(speed))
    } else if !(angular_rate <= envelope.max_angular_rate) {
        Some(StatusReason::AngularRateExceeded(angular_rate))
    } else {
        None
    };
    match reason {
        Some(r) => StatusEntry::raised(StatusFlag::Violation, r, at),
        None => StatusEntry::nominal(at),
    }
}

/// The state watchdog loop body.
pub struct StateWatchdog {
    config: StateWatchdogConfig,
    map: Arc<Map>,
    clock: Arc<dyn Clock>,
    states: Arc<StateStore>,
    table: Arc<StatusTable>,
    flags: IndexMap<AgentKey, StatusFlag>,
    metrics: WatchdogMetrics,
}

impl StateWatchdog {
    /// Watchdog over `states`, reporting into `table`. The keys of
    /// `table` are the agents audited.
    pub fn new(
        config: StateWatchdogConfig,
        map: Arc<Map>,
        clock: Arc<dyn Clock>,
        states: Arc<StateStore>,
        table: Arc<StatusTable>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            map,
            clock,
            states,
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

    /// Audit every agent once.
    pub fn run_cycle(&mut self) -> WatchdogMetrics {
        let now = self.clock.now();
        for key in self.table.keys() {
            let entry = match self.states.read(&key) {
                Ok(state) => evaluate(&state, &*self.map, &self.config.envelope, now),
                Err(e) => {
                    if e.is_stopped() {
                        debug!(agent = %key, "state store stopped");
                    }
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
                    warn!(agent = %key, flag = %entry.flag, %reason, "state status raised")
                }
                None if previous.is_some() => info!(agent = %key, "state status cleared"),
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

impl CycleLoop for StateWatchdog {
    type Metrics = WatchdogMetrics;

    fn name(&self) -> &str {
        "state-watchdog"
    }

    fn cycle_once(&mut self) -> WatchdogMetrics {
        self.run_cycle()
    }

    fn on_stop(&mut self) {
        self.table.stop();
    }
}

impl std::fmt::Debug for StateWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateWatchdog")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish()
    }
}
