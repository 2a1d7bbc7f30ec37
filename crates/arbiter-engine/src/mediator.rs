//! System assembly: stores, engine, and watchdogs wired together.
//!
//! [`Mediator::start`] builds every store, registers every configured
//! agent in each of them, seeds each agent's state at rest at its
//! initial position, and only then starts the loops. The transport
//! layer talks to the running system through the `Arc` store handles
//! and the outbound [`Dispatch`] receiver.

use std::sync::Arc;
use std::time::Instant;

use arbiter_core::{AgentKey, Clock, CycleId, VehicleState};
use arbiter_space::Map;
use arbiter_warden::{StateStore, TrajectoryStore, VerdictStore};
use crossbeam_channel::Receiver;
use tracing::info;

use crate::arbitration::{ArbitrationEngine, ArbitrationStores, Dispatch};
use crate::config::{ConfigError, MediatorConfig};
use crate::metrics::{CycleMetrics, WatchdogMetrics};
use crate::planner::PlannerClient;
use crate::runner::LoopHandle;
use crate::state_watchdog::StateWatchdog;
use crate::status::{SafetySummary, StatusTable};
use crate::trajectory_watchdog::TrajectoryWatchdog;

/// Report from [`Mediator::shutdown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total time spent shutting down.
    pub elapsed_ms: u64,
    /// Loop threads joined cleanly (at most three).
    pub loops_joined: usize,
    /// Last arbitration cycle completed, if the engine was recovered.
    pub last_cycle: Option<CycleId>,
}

/// Loops built by [`Mediator::assemble`], not yet running.
struct Loops {
    engine: ArbitrationEngine,
    state_watchdog: StateWatchdog,
    trajectory_watchdog: TrajectoryWatchdog,
}

/// The running arbitration system.
pub struct Mediator {
    config: MediatorConfig,
    map: Arc<Map>,
    stores: ArbitrationStores,
    state_status: Arc<StatusTable>,
    trajectory_status: Arc<StatusTable>,
    dispatch: Receiver<Dispatch>,
    engine: Option<LoopHandle<ArbitrationEngine>>,
    state_watchdog: Option<LoopHandle<StateWatchdog>>,
    trajectory_watchdog: Option<LoopHandle<TrajectoryWatchdog>>,
}

impl Mediator {
    /// Validate `config`, build and seed the stores, and start the
    /// engine and both watchdogs.
    ///
    /// If a loop fails to start, the loops already running are stopped
    /// and every store is released before the error is returned.
    pub fn start(
        config: MediatorConfig,
        map: Arc<Map>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let (mut mediator, loops) = Self::assemble(config, map, clock)?;
        mediator.launch(loops)?;
        info!(
            agents = mediator.config.agents.len(),
            arbitration_ms = mediator.config.arbitration.period.as_millis() as u64,
            min_separation = mediator.config.arbitration.min_separation,
            "mediator started"
        );
        Ok(mediator)
    }

    fn assemble(
        config: MediatorConfig,
        map: Arc<Map>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, Loops), ConfigError> {
        config.validate()?;
        let keys: Vec<AgentKey> = config.keys().cloned().collect();

        let stores = ArbitrationStores {
            states: Arc::new(StateStore::with_keys(keys.iter().cloned())?),
            proposed: Arc::new(TrajectoryStore::with_keys(keys.iter().cloned())?),
            updated: Arc::new(TrajectoryStore::with_keys(keys.iter().cloned())?),
            verdicts: Arc::new(VerdictStore::with_keys(keys.iter().cloned())?),
        };
        let state_status = Arc::new(StatusTable::with_keys(keys.iter().cloned())?);
        let trajectory_status = Arc::new(StatusTable::with_keys(keys.iter().cloned())?);
        for agent in &config.agents {
            stores
                .states
                .write(&agent.key, VehicleState::at_rest(agent.initial_position))?;
        }

        let (engine, dispatch) = ArbitrationEngine::new(
            config.arbitration.clone(),
            Arc::clone(&map),
            Arc::clone(&clock),
            stores.clone(),
        )?;
        let state_watchdog = StateWatchdog::new(
            config.state_watchdog.clone(),
            Arc::clone(&map),
            Arc::clone(&clock),
            Arc::clone(&stores.states),
            Arc::clone(&state_status),
        )?;
        let trajectory_watchdog = TrajectoryWatchdog::new(
            config.trajectory_watchdog.clone(),
            clock,
            Arc::clone(&stores.updated),
            Arc::clone(&trajectory_status),
        )?;

        let mediator = Self {
            config,
            map,
            stores,
            state_status,
            trajectory_status,
            dispatch,
            engine: None,
            state_watchdog: None,
            trajectory_watchdog: None,
        };
        let loops = Loops {
            engine,
            state_watchdog,
            trajectory_watchdog,
        };
        Ok((mediator, loops))
    }

    /// On error the caller drops `self`, which shuts down whatever
    /// started.
    fn launch(&mut self, loops: Loops) -> Result<(), ConfigError> {
        self.engine = Some(loops.engine.spawn()?);
        self.state_watchdog = Some(loops.state_watchdog.spawn()?);
        self.trajectory_watchdog = Some(loops.trajectory_watchdog.spawn()?);
        Ok(())
    }

    /// The configuration the system was started with.
    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// The static map.
    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    /// Vehicle states; the transport layer writes inbound states here.
    pub fn states(&self) -> &Arc<StateStore> {
        &self.stores.states
    }

    /// Proposed trajectories; planners write here.
    pub fn proposed(&self) -> &Arc<TrajectoryStore> {
        &self.stores.proposed
    }

    /// Published trajectories; publishers await these.
    pub fn updated(&self) -> &Arc<TrajectoryStore> {
        &self.stores.updated
    }

    /// Verdicts for the producers.
    pub fn verdicts(&self) -> &Arc<VerdictStore> {
        &self.stores.verdicts
    }

    /// The state watchdog's status table.
    pub fn state_status(&self) -> &Arc<StatusTable> {
        &self.state_status
    }

    /// The trajectory watchdog's status table.
    pub fn trajectory_status(&self) -> &Arc<StatusTable> {
        &self.trajectory_status
    }

    /// Receiving end of the outbound dispatch channel.
    pub fn dispatch(&self) -> &Receiver<Dispatch> {
        &self.dispatch
    }

    /// A client that vets and submits proposals.
    pub fn planner_client(&self) -> PlannerClient {
        PlannerClient::new(
            Arc::clone(&self.map),
            self.config.arbitration.limits,
            Arc::clone(&self.stores.proposed),
        )
    }

    /// Current view of both watchdogs' status tables.
    pub fn safety_summary(&self) -> SafetySummary {
        SafetySummary::collect(&self.state_status, &self.trajectory_status)
    }

    /// Metrics of the most recent arbitration cycle.
    pub fn engine_metrics(&self) -> CycleMetrics {
        self.engine
            .as_ref()
            .map(LoopHandle::last_metrics)
            .unwrap_or_default()
    }

    /// Cumulative metrics of the state and trajectory watchdogs.
    pub fn watchdog_metrics(&self) -> (WatchdogMetrics, WatchdogMetrics) {
        (
            self.state_watchdog
                .as_ref()
                .map(LoopHandle::last_metrics)
                .unwrap_or_default(),
            self.trajectory_watchdog
                .as_ref()
                .map(LoopHandle::last_metrics)
                .unwrap_or_default(),
        )
    }

    /// Whether every loop thread is still running.
    pub fn is_running(&self) -> bool {
        self.engine.as_ref().is_some_and(LoopHandle::is_running)
            && self.state_watchdog.as_ref().is_some_and(LoopHandle::is_running)
            && self
                .trajectory_watchdog
                .as_ref()
                .is_some_and(LoopHandle::is_running)
    }

    /// Stop the engine, then the watchdogs, then every store.
    ///
    /// Blocked `await_next` callers on any store are released with
    /// `StoreStopped`. Calling this again is a no-op.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let start = Instant::now();
        let mut loops_joined = 0;

        let last_cycle = self
            .engine
            .take()
            .and_then(LoopHandle::stop)
            .map(|engine| {
                loops_joined += 1;
                engine.cycle()
            });
        if self.state_watchdog.take().and_then(LoopHandle::stop).is_some() {
            loops_joined += 1;
        }
        if self
            .trajectory_watchdog
            .take()
            .and_then(LoopHandle::stop)
            .is_some()
        {
            loops_joined += 1;
        }

        let was_running = !self.stores.states.is_stopped();
        self.stores.states.stop();
        self.stores.proposed.stop();
        self.stores.updated.stop();
        self.stores.verdicts.stop();
        self.state_status.stop();
        self.trajectory_status.stop();

        let report = ShutdownReport {
            elapsed_ms: start.elapsed().as_millis() as u64,
            loops_joined,
            last_cycle,
        };
        if was_running {
            info!(
                elapsed_ms = report.elapsed_ms,
                loops_joined = report.loops_joined,
                "mediator stopped"
            );
        }
        report
    }
}

impl Drop for Mediator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("agents", &self.config.agents.len())
            .field("running", &self.is_running())
            .finish()
    }
}
