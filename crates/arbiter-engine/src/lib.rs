//! Arbitration engine, watchdogs, and system assembly.
//!
//! The [`ArbitrationEngine`] is the control loop: each cycle it
//! snapshots proposed trajectories and vehicle states, vets every
//! proposal, projects pairs forward to find separation breaches,
//! corrects by truncate-and-hold, and publishes an updated trajectory
//! plus a [`Verdict`](arbiter_core::Verdict) per agent. Two watchdogs
//! audit vehicle states and trajectory freshness independently.
//!
//! Every loop runs on its own named thread through [`spawn_loop`] and
//! can equally be driven synchronously with
//! [`CycleLoop::cycle_once`] for lockstep use and tests. [`Mediator`]
//! wires the whole system together from a [`MediatorConfig`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arbitration;
pub mod config;
pub mod mediator;
pub mod metrics;
pub mod planner;
pub mod projection;
pub mod runner;
pub mod state_watchdog;
pub mod status;
pub mod trajectory_watchdog;

pub use arbitration::{ArbitrationEngine, ArbitrationStores, Dispatch};
pub use config::{
    AgentSpec, ArbitrationConfig, ConfigError, KinematicEnvelope, MediatorConfig,
    StateWatchdogConfig, TrajectoryWatchdogConfig,
};
pub use mediator::{Mediator, ShutdownReport};
pub use metrics::{CycleMetrics, PlannerMetrics, WatchdogMetrics};
pub use planner::{Planner, PlannerClient, PlannerLoop, PlanningSnapshot};
pub use runner::{spawn_loop, CycleLoop, LoopHandle};
pub use state_watchdog::StateWatchdog;
pub use status::{AgentSafety, SafetySummary, StatusEntry, StatusFlag, StatusReason, StatusTable};
pub use trajectory_watchdog::TrajectoryWatchdog;
