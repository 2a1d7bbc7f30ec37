//! End-to-end arbitration scenarios driven cycle by cycle.
//!
//! Each scenario builds its own stores, seeds states and proposals, and
//! runs the engine in lockstep with a manual clock, so results are
//! deterministic.

use std::sync::Arc;

use arbiter_core::{
    AgentKey, RejectReason, ResultCode, Trajectory, Vec3, VehicleState, ViolationKind,
};
use arbiter_engine::projection::moving_breach;
use arbiter_engine::{ArbitrationConfig, ArbitrationEngine, ArbitrationStores, Dispatch};
use arbiter_space::Map;
use arbiter_test_utils::{arena, arena_with_pillar, crossing_pair, straight_line, ManualClock, T0};
use arbiter_warden::{StateStore, TrajectoryStore, VerdictStore};
use crossbeam_channel::Receiver;

const MIN_SEP: f64 = 1.5;

struct Scenario {
    engine: ArbitrationEngine,
    dispatch: Receiver<Dispatch>,
    stores: ArbitrationStores,
    clock: Arc<ManualClock>,
}

impl Scenario {
    /// Every key is arbitrated; only `with_state` keys have a state slot.
    fn new(keys: &[&str], with_state: &[&str], map: Map) -> Self {
        let stores = ArbitrationStores {
            states: Arc::new(StateStore::with_keys(with_state.iter().copied()).unwrap()),
            proposed: Arc::new(TrajectoryStore::with_keys(keys.iter().copied()).unwrap()),
            updated: Arc::new(TrajectoryStore::with_keys(keys.iter().copied()).unwrap()),
            verdicts: Arc::new(VerdictStore::with_keys(keys.iter().copied()).unwrap()),
        };
        let clock = Arc::new(ManualClock::new(T0));
        let config = ArbitrationConfig {
            min_separation: MIN_SEP,
            ..Default::default()
        };
        let (engine, dispatch) =
            ArbitrationEngine::new(config, Arc::new(map), clock.clone(), stores.clone()).unwrap();
        Self {
            engine,
            dispatch,
            stores,
            clock,
        }
    }

    fn place(&self, k: &str, p: Vec3) {
        self.stores
            .states
            .write(&key(k), VehicleState::at_rest(p))
            .unwrap();
    }

    fn propose(&self, k: &str, t: Trajectory) {
        self.stores.proposed.write(&key(k), t).unwrap();
    }

    fn code(&self, k: &str) -> ResultCode {
        self.stores.verdicts.read(&key(k)).unwrap().unwrap().code
    }

    fn updated(&self, k: &str) -> Trajectory {
        self.stores.updated.read(&key(k)).unwrap()
    }

    /// Every pair of published trajectories keeps `MIN_SEP` from now on.
    fn assert_separated(&self, keys: &[&str]) {
        let now = self.clock_now();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                let breach = moving_breach(&self.updated(a), &self.updated(b), now, MIN_SEP);
                assert!(breach.is_none(), "{a} and {b} breach at {breach:?}");
            }
        }
    }

    fn clock_now(&self) -> f64 {
        use arbiter_core::Clock;
        self.clock.now()
    }
}

fn key(s: &str) -> AgentKey {
    AgentKey::new(s)
}

#[test]
fn crossing_agents_are_both_corrected() {
    let mut s = Scenario::new(&["a", "b"], &["a", "b"], arena());
    s.place("a", Vec3::new(-5.0, 0.0, 1.0));
    s.place("b", Vec3::new(5.0, 0.0, 1.0));
    let (ta, tb) = crossing_pair(T0, 1.0);
    s.propose("a", ta);
    s.propose("b", tb);

    let m = s.engine.run_cycle();
    assert_eq!(m.agents, 2);
    assert_eq!(m.corrected, 2);
    assert!(!s.code("a").is_success());
    assert!(!s.code("b").is_success());
    s.assert_separated(&["a", "b"]);

    // Both stop short and hover.
    for k in ["a", "b"] {
        let last = *s.updated(k).samples().last().unwrap();
        assert_eq!(last.velocity, Vec3::ZERO);
    }
    let sent: Vec<_> = s.dispatch.try_iter().map(|d| d.key).collect();
    assert_eq!(sent, vec![key("a"), key("b")]);
}

#[test]
fn missing_state_does_not_block_others() {
    let mut s = Scenario::new(&["a", "ghost", "b"], &["a", "b"], arena());
    s.place("a", Vec3::new(-10.0, -5.0, 1.0));
    s.place("b", Vec3::new(-10.0, 5.0, 1.0));
    s.propose(
        "a",
        straight_line(Vec3::new(-10.0, -5.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 50),
    );
    s.propose(
        "b",
        straight_line(Vec3::new(-10.0, 5.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 50),
    );
    s.propose(
        "ghost",
        straight_line(Vec3::new(-10.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 50),
    );

    let m = s.engine.run_cycle();
    assert_eq!(m.skipped, 1);
    assert_eq!(s.code("a"), ResultCode::Success);
    assert_eq!(s.code("b"), ResultCode::Success);
    assert_eq!(s.stores.verdicts.read(&key("ghost")).unwrap(), None);
}

#[test]
fn path_through_obstacle_is_cut_before_it() {
    let mut s = Scenario::new(&["a"], &["a"], arena_with_pillar());
    s.place("a", Vec3::new(-5.0, 0.0, 1.0));
    s.propose(
        "a",
        straight_line(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 101),
    );
    s.engine.run_cycle();
    let v = s.code("a").violation().cloned().unwrap();
    assert_eq!(v.kind, ViolationKind::SampleOutsideFreeSpace);
    let out = s.updated("a");
    assert_eq!(out.len(), v.index);
    assert!(out.samples().iter().all(|p| p.position.x < -1.0));
}

#[test]
fn obstacle_reported_before_later_separation_breach() {
    let mut s = Scenario::new(&["a", "b"], &["a", "b"], arena_with_pillar());
    // a would cross the pillar and then fly into b, hovering beyond it.
    s.place("a", Vec3::new(-5.0, 0.0, 1.0));
    s.place("b", Vec3::new(3.0, 0.0, 1.0));
    s.propose(
        "a",
        straight_line(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), T0, 0.1, 101),
    );
    s.engine.run_cycle();
    assert_eq!(
        s.code("a").violation().map(|v| v.kind.clone()),
        Some(ViolationKind::SampleOutsideFreeSpace)
    );
    assert_eq!(s.code("b"), ResultCode::Rejected(RejectReason::EmptyProposal));
}

#[test]
fn three_way_convergence_keeps_separation() {
    let keys = ["a", "b", "c"];
    let mut s = Scenario::new(&keys, &keys, arena());
    let starts = [
        Vec3::new(-6.0, 0.0, 2.0),
        Vec3::new(6.0, 0.0, 2.0),
        Vec3::new(0.0, -6.0, 2.0),
    ];
    for (k, p) in keys.iter().zip(starts) {
        s.place(k, p);
        // Everyone heads for the origin at 1 m/s and keeps going.
        let v = (Vec3::new(0.0, 0.0, 2.0) - p).normalized().unwrap();
        s.propose(k, straight_line(p, v, T0, 0.1, 120));
    }
    let m = s.engine.run_cycle();
    assert_eq!(m.agents, 3);
    assert!(keys.iter().all(|k| !s.code(k).is_success()));
    s.assert_separated(&keys);
}

#[test]
fn later_cycles_track_the_clock() {
    let mut s = Scenario::new(&["a", "b"], &["a", "b"], arena());
    s.place("a", Vec3::new(-5.0, 0.0, 1.0));
    s.place("b", Vec3::new(5.0, 0.0, 1.0));
    let (ta, tb) = crossing_pair(T0, 1.0);
    s.propose("a", ta);
    s.propose("b", tb);
    s.engine.run_cycle();

    // Vehicles have moved along their cut trajectories; a new planner
    // round sends them apart along y.
    s.clock.advance(2.0);
    s.place("a", Vec3::new(-3.0, 0.0, 1.0));
    s.place("b", Vec3::new(3.0, 0.0, 1.0));
    s.propose(
        "a",
        straight_line(Vec3::new(-3.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 0.0), T0 + 2.0, 0.1, 30),
    );
    s.propose(
        "b",
        straight_line(Vec3::new(3.0, 0.0, 1.0), Vec3::new(0.0, -1.0, 0.0), T0 + 2.0, 0.1, 30),
    );
    let m = s.engine.run_cycle();
    assert_eq!(m.cycle.0, 2);
    assert_eq!(m.corrected, 0);
    assert_eq!(s.code("a"), ResultCode::Success);
    let verdict = s.stores.verdicts.read(&key("b")).unwrap().unwrap();
    assert_eq!(verdict.proposal_generation, 2);
}

#[cfg(not(miri))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn agent() -> impl Strategy<Value = (f64, f64, f64)> {
        (-10.0f64..10.0, -2.0f64..2.0, -2.0f64..2.0)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn published_trajectories_keep_separation(
            agents in prop::collection::vec(agent(), 2..6),
        ) {
            let names: Vec<String> = (0..agents.len()).map(|i| format!("v{i}")).collect();
            let keys: Vec<&str> = names.iter().map(String::as_str).collect();
            let mut s = Scenario::new(&keys, &keys, arena());
            for (i, (y, vx, vy)) in agents.iter().enumerate() {
                let start = Vec3::new(-15.0 + 6.0 * i as f64, *y, 1.0);
                s.place(keys[i], start);
                s.propose(keys[i], straight_line(start, Vec3::new(*vx, *vy, 0.0), T0, 0.1, 50));
            }

            let m = s.engine.run_cycle();
            prop_assert_eq!(m.agents, keys.len());
            s.assert_separated(&keys);
            for k in &keys {
                let code = s.code(k);
                prop_assert!(
                    !matches!(code, ResultCode::Rejected(RejectReason::Unresolvable)),
                    "{} unresolvable", k
                );
            }
        }
    }
}
