//! The producer side: planners propose trajectories into the proposed
//! store.
//!
//! A [`Planner`] is a capability: given a snapshot of its agents'
//! states, produce trajectories. All planning state lives in the
//! planner instance. [`PlannerClient`] vets a proposal against the
//! static map before it is written, and [`PlannerLoop`] drives a
//! planner at a fixed rate.

use std::sync::Arc;

use arbiter_core::{AgentKey, Clock, ResultCode, Trajectory, VehicleState, Violations, WardenError};
use arbiter_space::Map;
use arbiter_vetter::KinematicLimits;
use arbiter_warden::{StateStore, TrajectoryStore};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::metrics::PlannerMetrics;
use crate::runner::CycleLoop;

/// The states a planner plans from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanningSnapshot {
    /// Clock time of the snapshot (s since UNIX epoch).
    pub time: f64,
    /// Readable states of the planner's agents, in agent order.
    pub states: IndexMap<AgentKey, VehicleState>,
}

/// Produces trajectories from a state snapshot.
pub trait Planner: Send {
    /// Trajectories to propose this cycle. Agents without an entry keep
    /// following their previous trajectory.
    fn plan(&mut self, snapshot: &PlanningSnapshot) -> Vec<(AgentKey, Trajectory)>;
}

impl<F> Planner for F
where
    F: FnMut(&PlanningSnapshot) -> Vec<(AgentKey, Trajectory)> + Send,
{
    fn plan(&mut self, snapshot: &PlanningSnapshot) -> Vec<(AgentKey, Trajectory)> {
        self(snapshot)
    }
}

// ── PlannerClient ──────────────────────────────────────────────────

/// Submission path into the proposed-trajectory store.
#[derive(Clone, Debug)]
pub struct PlannerClient {
    map: Arc<Map>,
    limits: KinematicLimits,
    proposed: Arc<TrajectoryStore>,
}

impl PlannerClient {
    /// Client vetting against `map` and `limits`.
    pub fn new(map: Arc<Map>, limits: KinematicLimits, proposed: Arc<TrajectoryStore>) -> Self {
        Self {
            map,
            limits,
            proposed,
        }
    }

    /// Vet `trajectory` and, if legal, write it as `key`'s proposal.
    ///
    /// Returns the advisory result. A vetoed proposal is not written, so
    /// the engine keeps arbitrating the previous one.
    pub fn submit(&self, key: &AgentKey, trajectory: Trajectory) -> Result<ResultCode, WardenError> {
        let code = self.vet(&trajectory);
        if code.is_success() {
            self.proposed.write(key, trajectory)?;
        }
        Ok(code)
    }

    /// Advisory result for `trajectory` without submitting it.
    pub fn vet(&self, trajectory: &Trajectory) -> ResultCode {
        match arbiter_vetter::check(trajectory, &*self.map, &self.limits) {
            Ok(()) => ResultCode::Success,
            Err(v) => ResultCode::ConstraintViolation(v),
        }
    }

    /// Every category of problem with `trajectory`, first occurrence each.
    pub fn diagnose(&self, trajectory: &Trajectory) -> Violations {
        arbiter_vetter::violations(trajectory, &*self.map, &self.limits)
    }
}

// ── PlannerLoop ────────────────────────────────────────────────────

/// Runs a [`Planner`] for a fixed set of agents.
pub struct PlannerLoop<P> {
    name: String,
    planner: P,
    agents: Vec<AgentKey>,
    states: Arc<StateStore>,
    client: PlannerClient,
    clock: Arc<dyn Clock>,
    advisory: IndexMap<AgentKey, ResultCode>,
    metrics: PlannerMetrics,
}

impl<P: Planner + 'static> PlannerLoop<P> {
    /// Loop named `name` planning for `agents`.
    pub fn new(
        name: impl Into<String>,
        planner: P,
        agents: Vec<AgentKey>,
        states: Arc<StateStore>,
        client: PlannerClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            planner,
            agents,
            states,
            client,
            clock,
            advisory: IndexMap::new(),
            metrics: PlannerMetrics::default(),
        }
    }

    /// The planner.
    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Advisory result of the last submission for `key`.
    pub fn advisory(&self, key: &AgentKey) -> Option<&ResultCode> {
        self.advisory.get(key)
    }

    /// Snapshot, plan, and submit once.
    pub fn run_cycle(&mut self) -> PlannerMetrics {
        let snapshot = self.snapshot();
        for (key, trajectory) in self.planner.plan(&snapshot) {
            if !self.agents.contains(&key) {
                warn!(planner = %self.name, agent = %key, "planner proposed for a foreign agent");
                continue;
            }
            let code = self.client.vet(&trajectory);
            if !code.is_success() {
                self.metrics.vetoed += 1;
                warn!(
                    planner = %self.name,
                    agent = %key,
                    %code,
                    problems = self.client.diagnose(&trajectory).len(),
                    "proposal vetoed"
                );
                self.advisory.insert(key, code);
                continue;
            }
            match self.client.proposed.write(&key, trajectory) {
                Ok(_) => {
                    self.metrics.submitted += 1;
                    self.advisory.insert(key, code);
                }
                Err(WardenError::StoreStopped) => {
                    debug!(planner = %self.name, agent = %key, "proposed store stopped")
                }
                Err(e) => warn!(planner = %self.name, agent = %key, error = %e, "submit failed"),
            }
        }
        self.metrics.cycles += 1;
        self.metrics.clone()
    }

    fn snapshot(&self) -> PlanningSnapshot {
        let mut states = IndexMap::with_capacity(self.agents.len());
        for key in &self.agents {
            match self.states.read(key) {
                Ok(s) => {
                    states.insert(key.clone(), s);
                }
                Err(e) => debug!(planner = %self.name, agent = %key, error = %e, "state unreadable"),
            }
        }
        PlanningSnapshot {
            time: self.clock.now(),
            states,
        }
    }
}

impl<P: Planner + 'static> CycleLoop for PlannerLoop<P> {
    type Metrics = PlannerMetrics;

    fn name(&self) -> &str {
        &self.name
    }

    fn cycle_once(&mut self) -> PlannerMetrics {
        self.run_cycle()
    }
}

impl<P> std::fmt::Debug for PlannerLoop<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerLoop")
            .field("name", &self.name)
            .field("agents", &self.agents)
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{TrajectorySample, Vec3, ViolationKind};
    use arbiter_test_utils::{arena, straight_line, ManualClock, T0};

    fn key(s: &str) -> AgentKey {
        AgentKey::new(s)
    }

    fn client(proposed: &Arc<TrajectoryStore>) -> PlannerClient {
        PlannerClient::new(
            Arc::new(arena()),
            KinematicLimits::default(),
            Arc::clone(proposed),
        )
    }

    #[test]
    fn legal_proposal_written() {
        let proposed = Arc::new(TrajectoryStore::with_keys(["a"]).unwrap());
        let t = straight_line(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 10);
        let code = client(&proposed).submit(&key("a"), t.clone()).unwrap();
        assert_eq!(code, ResultCode::Success);
        assert_eq!(proposed.read(&key("a")).unwrap(), t);
    }

    #[test]
    fn vetoed_proposal_not_written() {
        let proposed = Arc::new(TrajectoryStore::with_keys(["a"]).unwrap());
        let bad: Trajectory = vec![
            TrajectorySample::new(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::ZERO, 0.0, T0),
            TrajectorySample::new(Vec3::new(99.0, 0.0, 1.0), Vec3::ZERO, Vec3::ZERO, 0.0, T0 + 0.1),
        ]
        .into();
        let c = client(&proposed);
        let code = c.submit(&key("a"), bad.clone()).unwrap();
        let v = code.violation().unwrap();
        assert_eq!(v.kind, ViolationKind::SampleOutsideFreeSpace);
        assert_eq!(v.index, 1);
        assert_eq!(proposed.generation(&key("a")).unwrap(), 0);
        assert_eq!(c.diagnose(&bad).len(), 1);
    }

    #[test]
    fn vet_reports_without_writing() {
        let proposed = Arc::new(TrajectoryStore::with_keys(["a"]).unwrap());
        let c = client(&proposed);
        let good = straight_line(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 10);
        let fast = straight_line(Vec3::new(0.0, 0.0, 1.0), Vec3::new(9.0, 0.0, 0.0), T0, 0.1, 10);
        assert_eq!(c.vet(&good), ResultCode::Success);
        assert_eq!(
            c.vet(&fast).violation().map(|v| v.kind.clone()),
            Some(ViolationKind::MaxVelocityExceeded)
        );
        assert_eq!(proposed.generation(&key("a")).unwrap(), 0);
    }

    #[test]
    fn loop_vetoes_illegal_and_writes_legal() {
        let states = Arc::new(StateStore::with_keys(["a", "b"]).unwrap());
        let proposed = Arc::new(TrajectoryStore::with_keys(["a", "b"]).unwrap());
        let planner = |snapshot: &PlanningSnapshot| {
            vec![
                (
                    key("a"),
                    straight_line(Vec3::new(0.0, 0.0, 1.0), Vec3::new(9.0, 0.0, 0.0), snapshot.time, 0.1, 10),
                ),
                (
                    key("b"),
                    straight_line(Vec3::new(0.0, 5.0, 1.0), Vec3::new(1.0, 0.0, 0.0), snapshot.time, 0.1, 10),
                ),
            ]
        };
        let mut l = PlannerLoop::new(
            "team-ab",
            planner,
            vec![key("a"), key("b")],
            states,
            client(&proposed),
            Arc::new(ManualClock::new(T0)),
        );
        let m = l.run_cycle();
        assert_eq!(m.vetoed, 1);
        assert_eq!(m.submitted, 1);
        assert_eq!(
            l.advisory(&key("a")).and_then(|c| c.violation()).map(|v| v.index),
            Some(0)
        );
        assert_eq!(proposed.generation(&key("a")).unwrap(), 0);
        assert_eq!(proposed.generation(&key("b")).unwrap(), 1);
        assert_eq!(l.advisory(&key("b")), Some(&ResultCode::Success));
    }

    #[test]
    fn unknown_key_surfaces() {
        let proposed = Arc::new(TrajectoryStore::new());
        let err = client(&proposed)
            .submit(&key("x"), Trajectory::default())
            .unwrap_err();
        assert_eq!(err, WardenError::UnknownKey(key("x")));
    }

    /// Sends every agent one metre ahead along x from where it is.
    struct Forward {
        seen: usize,
    }

    impl Planner for Forward {
        fn plan(&mut self, snapshot: &PlanningSnapshot) -> Vec<(AgentKey, Trajectory)> {
            self.seen += snapshot.states.len();
            snapshot
                .states
                .iter()
                .map(|(k, s)| {
                    let t = straight_line(s.position, Vec3::new(1.0, 0.0, 0.0), snapshot.time, 0.1, 11);
                    (k.clone(), t)
                })
                .collect()
        }
    }

    #[test]
    fn loop_plans_for_readable_agents() {
        let states = Arc::new(StateStore::with_keys(["a", "b"]).unwrap());
        let proposed = Arc::new(TrajectoryStore::with_keys(["a", "b"]).unwrap());
        states
            .write(&key("a"), VehicleState::at_rest(Vec3::new(0.0, 0.0, 1.0)))
            .unwrap();
        states.retire(&key("b")).unwrap();

        let mut l = PlannerLoop::new(
            "team-1",
            Forward { seen: 0 },
            vec![key("a"), key("b")],
            states,
            client(&proposed),
            Arc::new(ManualClock::new(T0)),
        );
        let m = l.run_cycle();
        assert_eq!(m.submitted, 1);
        assert_eq!(m.vetoed, 0);
        assert_eq!(l.planner().seen, 1);
        assert_eq!(l.advisory(&key("a")), Some(&ResultCode::Success));
        assert!(l.advisory(&key("b")).is_none());
        assert_eq!(proposed.read(&key("a")).unwrap().start_time(), Some(T0));
        assert_eq!(l.name(), "team-1");
    }

    #[test]
    fn foreign_agents_ignored() {
        let states = Arc::new(StateStore::with_keys(["a", "b"]).unwrap());
        let proposed = Arc::new(TrajectoryStore::with_keys(["a", "b"]).unwrap());
        let planner = |_: &PlanningSnapshot| {
            vec![(key("b"), Trajectory::hold(Vec3::new(0.0, 0.0, 1.0), 0.0, T0))]
        };
        let mut l = PlannerLoop::new(
            "team-a",
            planner,
            vec![key("a")],
            states,
            client(&proposed),
            Arc::new(ManualClock::new(T0)),
        );
        let m = l.run_cycle();
        assert_eq!(m.submitted, 0);
        assert_eq!(proposed.generation(&key("b")).unwrap(), 0);
    }
}
