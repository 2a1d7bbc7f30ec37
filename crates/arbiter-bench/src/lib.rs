//! Benchmark profiles for the Arbiter arbitration engine.
//!
//! Provides deterministic scenarios for benchmarking:
//!
//! - [`parallel_profile`]: `n` agents on parallel lanes, no conflicts
//! - [`ring_profile`]: `n` agents on a ring all flying through its centre
//! - [`build_engine`]: seeds fresh stores from a profile and returns a
//!   ready-to-cycle engine

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::f64::consts::TAU;
use std::sync::Arc;

use arbiter_core::{AgentKey, Clock, Trajectory, TrajectorySample, Vec3, VehicleState};
use arbiter_engine::{ArbitrationConfig, ArbitrationEngine, ArbitrationStores, ConfigError, Dispatch};
use arbiter_space::Map;
use arbiter_warden::{StateStore, TrajectoryStore, VerdictStore};
use crossbeam_channel::Receiver;

/// Start time of every profile's trajectories.
pub const EPOCH: f64 = 1_000.0;

/// Sample spacing of every profile's trajectories (s).
pub const STEP: f64 = 0.1;

/// A frozen clock at [`EPOCH`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        EPOCH
    }
}

/// One agent of a profile.
#[derive(Clone, Debug)]
pub struct ProfileAgent {
    /// Agent key.
    pub key: AgentKey,
    /// Starting state.
    pub state: VehicleState,
    /// Proposed trajectory.
    pub proposal: Trajectory,
}

/// A deterministic scenario.
#[derive(Clone, Debug)]
pub struct Profile {
    /// The static map.
    pub map: Map,
    /// All agents.
    pub agents: Vec<ProfileAgent>,
}

fn line(start: Vec3, velocity: Vec3, samples: usize) -> Trajectory {
    (0..samples)
        .map(|i| {
            let dt = i as f64 * STEP;
            TrajectorySample::new(start + velocity * dt, velocity, Vec3::ZERO, 0.0, EPOCH + dt)
        })
        .collect()
}

fn arena(half_width: f64) -> Result<Map, arbiter_space::SpaceError> {
    Map::open_box(
        Vec3::new(-half_width, -half_width, 0.0),
        Vec3::new(half_width, half_width, 10.0),
    )
}

/// `n` agents on lanes 3 m apart flying in parallel for `samples`
/// samples. Every proposal is legal and conflict-free.
pub fn parallel_profile(n: usize, samples: usize) -> Result<Profile, arbiter_space::SpaceError> {
    let travel = samples as f64 * STEP;
    let half_width = (n as f64 * 1.5 + 20.0).max(travel + 20.0);
    let agents = (0..n)
        .map(|i| {
            let start = Vec3::new(-15.0, -(n as f64) * 1.5 + i as f64 * 3.0, 2.0);
            ProfileAgent {
                key: AgentKey::new(format!("lane-{i}")),
                state: VehicleState::at_rest(start),
                proposal: line(start, Vec3::new(1.0, 0.0, 0.0), samples),
            }
        })
        .collect();
    Ok(Profile {
        map: arena(half_width)?,
        agents,
    })
}

/// `n` agents evenly spaced on a ring of `radius`, all heading through
/// the centre at 1 m/s. Every pair conflicts; this is the correction
/// worst case.
pub fn ring_profile(n: usize, radius: f64) -> Result<Profile, arbiter_space::SpaceError> {
    let samples = (2.0 * radius / STEP) as usize;
    let agents = (0..n)
        .map(|i| {
            let a = TAU * i as f64 / n as f64;
            let start = Vec3::new(radius * a.cos(), radius * a.sin(), 2.0);
            let velocity = Vec3::new(-a.cos(), -a.sin(), 0.0);
            ProfileAgent {
                key: AgentKey::new(format!("ring-{i}")),
                state: VehicleState::at_rest(start),
                proposal: line(start, velocity, samples),
            }
        })
        .collect();
    Ok(Profile {
        map: arena(radius + 5.0)?,
        agents,
    })
}

/// Fresh stores seeded from `profile`, and an engine over them.
pub fn build_engine(
    profile: &Profile,
    config: ArbitrationConfig,
) -> Result<(ArbitrationEngine, Receiver<Dispatch>), ConfigError> {
    let keys: Vec<AgentKey> = profile.agents.iter().map(|a| a.key.clone()).collect();
    let stores = ArbitrationStores {
        states: Arc::new(StateStore::with_keys(keys.iter().cloned())?),
        proposed: Arc::new(TrajectoryStore::with_keys(keys.iter().cloned())?),
        updated: Arc::new(TrajectoryStore::with_keys(keys.iter().cloned())?),
        verdicts: Arc::new(VerdictStore::with_keys(keys.iter().cloned())?),
    };
    for a in &profile.agents {
        stores.states.write(&a.key, a.state)?;
        stores.proposed.write(&a.key, a.proposal.clone())?;
    }
    ArbitrationEngine::new(config, Arc::new(profile.map.clone()), Arc::new(FixedClock), stores)
}
