//! Arbiter demo: two vehicles whose planners would fly them into each
//! other.
//!
//! Demonstrates:
//!   1. Starting a `Mediator` (engine + both watchdogs) from config
//!   2. One planner loop per team proposing through a `PlannerClient`
//!   3. Simulated vehicles that await their updated trajectories and
//!      report their state back, as the transport layer would
//!   4. Reading verdicts and the safety summary while everything runs
//!   5. Timed shutdown, releasing every blocked thread
//!
//! Vehicle "north" circles the origin; vehicle "west" flies a straight
//! line through the middle of that circle. The engine cuts whichever
//! trajectory would bring them within the minimum separation.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example two_vehicles

use std::f64::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arbiter_core::{
    AgentKey, Clock, SystemClock, Trajectory, TrajectorySample, Vec3, VehicleState, WardenError,
};
use arbiter_engine::{
    spawn_loop, AgentSpec, Mediator, MediatorConfig, Planner, PlannerLoop, PlanningSnapshot,
};
use arbiter_space::{ConvexRegion, Map};
use arbiter_warden::{StateStore, TrajectoryStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ─── Scenario parameters ────────────────────────────────────────

const RADIUS: f64 = 4.0;
const ALTITUDE: f64 = 2.0;
const SPEED: f64 = 1.5;
const STEP: f64 = 0.1;
const HORIZON: usize = 40;
const RUN_FOR: Duration = Duration::from_secs(6);

// ─── Planners ───────────────────────────────────────────────────

/// Flies its agent around a circle centred on the origin. The phase
/// lives in the planner instance, not in a global.
struct Circler {
    phase: f64,
}

impl Planner for Circler {
    fn plan(&mut self, snapshot: &PlanningSnapshot) -> Vec<(AgentKey, Trajectory)> {
        let omega = SPEED / RADIUS;
        let trajectories = snapshot
            .states
            .keys()
            .map(|k| {
                let samples = (0..HORIZON).map(|i| {
                    let dt = i as f64 * STEP;
                    let a = self.phase + omega * dt;
                    let (s, c) = a.sin_cos();
                    TrajectorySample::new(
                        Vec3::new(RADIUS * c, RADIUS * s, ALTITUDE),
                        Vec3::new(-SPEED * s, SPEED * c, 0.0),
                        Vec3::new(-SPEED * omega * c, -SPEED * omega * s, 0.0),
                        a + TAU / 4.0,
                        snapshot.time + dt,
                    )
                });
                (k.clone(), samples.collect())
            })
            .collect();
        self.phase = (self.phase + omega * 0.2) % TAU;
        trajectories
    }
}

/// Flies its agent east along the x axis from wherever it is.
struct Eastbound;

impl Planner for Eastbound {
    fn plan(&mut self, snapshot: &PlanningSnapshot) -> Vec<(AgentKey, Trajectory)> {
        snapshot
            .states
            .iter()
            .map(|(k, s)| {
                let samples = (0..HORIZON).map(|i| {
                    let dt = i as f64 * STEP;
                    TrajectorySample::new(
                        s.position + Vec3::new(SPEED * dt, 0.0, 0.0),
                        Vec3::new(SPEED, 0.0, 0.0),
                        Vec3::ZERO,
                        0.0,
                        snapshot.time + dt,
                    )
                });
                (k.clone(), samples.collect())
            })
            .collect()
    }
}

// ─── Simulated vehicle ──────────────────────────────────────────

/// Follows the published trajectory perfectly: on every update (or
/// every 50 ms without one) reports the commanded position as state.
fn fly(
    key: AgentKey,
    updated: Arc<TrajectoryStore>,
    states: Arc<StateStore>,
    clock: Arc<dyn Clock>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut current = Trajectory::default();
        loop {
            match updated.await_next_timeout(&key, Duration::from_millis(50)) {
                Ok(t) => current = t,
                Err(WardenError::TimedOut) => {}
                Err(_) => return,
            }
            let t = clock.now();
            let Some(i) = current.nearest_index(t) else {
                continue;
            };
            let Some(s) = current.sample(i) else {
                continue;
            };
            let state = VehicleState {
                position: s.position,
                velocity: s.velocity,
                ..VehicleState::default()
            };
            if states.write(&key, state).is_err() {
                return;
            }
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let map = Map::open_box(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 5.0))?
        .with_obstacle(ConvexRegion::ball(Vec3::new(0.0, -7.0, ALTITUDE), 1.0)?);
    let map = Arc::new(map);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let north = AgentKey::new("north");
    let west = AgentKey::new("west");
    let mut config = MediatorConfig::new(vec![
        AgentSpec::new(north.clone(), Vec3::new(RADIUS, 0.0, ALTITUDE)),
        AgentSpec::new(west.clone(), Vec3::new(-8.0, 0.0, ALTITUDE)),
    ]);
    config.arbitration.min_separation = 1.5;

    let mut mediator = Mediator::start(config, Arc::clone(&map), Arc::clone(&clock))?;

    let team_north = spawn_loop(
        PlannerLoop::new(
            "planner-north",
            Circler { phase: 0.0 },
            vec![north.clone()],
            Arc::clone(mediator.states()),
            mediator.planner_client(),
            Arc::clone(&clock),
        ),
        Duration::from_millis(200),
    )?;
    let team_west = spawn_loop(
        PlannerLoop::new(
            "planner-west",
            Eastbound,
            vec![west.clone()],
            Arc::clone(mediator.states()),
            mediator.planner_client(),
            Arc::clone(&clock),
        ),
        Duration::from_millis(200),
    )?;

    let vehicles: Vec<_> = [north.clone(), west.clone()]
        .into_iter()
        .map(|k| {
            fly(
                k,
                Arc::clone(mediator.updated()),
                Arc::clone(mediator.states()),
                Arc::clone(&clock),
            )
        })
        .collect();

    let started = std::time::Instant::now();
    while started.elapsed() < RUN_FOR {
        thread::sleep(Duration::from_millis(500));
        for k in [&north, &west] {
            let state = mediator.states().read(k)?;
            match mediator.verdicts().read(k)? {
                Some(v) => info!(
                    agent = %k,
                    cycle = v.cycle.0,
                    code = %v.code,
                    x = state.position.x,
                    y = state.position.y,
                    "verdict"
                ),
                None => info!(agent = %k, "no verdict yet"),
            }
        }
        let summary = mediator.safety_summary();
        for (k, flag) in summary.flagged() {
            warn!(agent = %k, %flag, "safety flag");
        }
        // Drain the transport handoff so it never fills.
        let sent = mediator.dispatch().try_iter().count();
        info!(dispatched = sent, metrics = ?mediator.engine_metrics(), "tick");
    }

    team_north.stop();
    team_west.stop();
    let report = mediator.shutdown();
    for v in vehicles {
        let _ = v.join();
    }
    info!(
        elapsed_ms = report.elapsed_ms,
        loops_joined = report.loops_joined,
        "demo finished"
    );
    Ok(())
}
