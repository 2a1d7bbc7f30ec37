//! The arbitration ("mediation") loop.
//!
//! One cycle:
//!
//! 1. **Snapshot.** Read every agent's proposed trajectory and current
//!    state. Agents whose state or proposal cannot be read are skipped
//!    for this cycle only.
//! 2. **Legality.** Vet each effective input against the static map;
//!    an illegal trajectory is truncated before its first violation.
//! 3. **Projection.** Place a bubble of `min_separation` around every
//!    agent's current position, then project every pair forward from
//!    the cycle's clock time.
//! 4. **Correction.** Each breach cuts the trajectories involved back
//!    to the samples before it (truncate-and-hold). Pairs are
//!    re-projected until no breach remains.
//! 5. **Publish.** Every arbitrated agent gets a verdict and an updated
//!    trajectory, also offered to the outbound dispatch channel.
//!
//! The effective input is the proposal if non-empty, else the last
//! trajectory published for the agent, else a hold at its current
//! position. An agent is never left without a published command.

use std::sync::Arc;
use std::time::Instant;

use arbiter_core::{
    AgentKey, Clock, CycleId, RejectReason, ResultCode, Trajectory, VehicleState, Verdict,
    Violation, ViolationKind, WardenError,
};
use arbiter_space::{CycleMap, Map};
use arbiter_warden::{StateStore, TrajectoryStore, VerdictStore};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::config::{ArbitrationConfig, ConfigError};
use crate::metrics::CycleMetrics;
use crate::projection::{cut_before, holding_breach, moving_breach, Breach};
use crate::runner::{spawn_loop, CycleLoop, LoopHandle};

/// The stores the engine reads and writes.
#[derive(Clone, Debug)]
pub struct ArbitrationStores {
    /// Current vehicle states (read).
    pub states: Arc<StateStore>,
    /// Trajectories proposed by planners (read). Its keys are the set
    /// of agents the engine arbitrates.
    pub proposed: Arc<TrajectoryStore>,
    /// Published, possibly corrected trajectories (written).
    pub updated: Arc<TrajectoryStore>,
    /// Verdicts for the producers (written).
    pub verdicts: Arc<VerdictStore>,
}

/// One outbound message for the transport layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
    /// The agent.
    pub key: AgentKey,
    /// The trajectory the vehicle should now execute.
    pub trajectory: Trajectory,
    /// The verdict for the producer.
    pub verdict: Verdict,
}

// ── Per-cycle working set ──────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Input {
    Proposed,
    LastGood,
    Empty,
}

struct Candidate {
    key: AgentKey,
    state: VehicleState,
    generation: u64,
    input: Input,
    original: Trajectory,
    working: Trajectory,
    code: ResultCode,
}

impl Candidate {
    fn holding(&self) -> bool {
        self.working.is_empty()
    }

    /// Record a separation conflict, cutting back before `breach`.
    /// An earlier verdict is kept: the first problem found is reported.
    fn cut(&mut self, other: &AgentKey, breach: Breach) {
        let index = self.working.nearest_index(breach.time).unwrap_or(0);
        if self.code.is_success() {
            self.code = ResultCode::ConstraintViolation(Violation::new(
                ViolationKind::MinimumSeparation {
                    other: other.clone(),
                },
                breach.distance,
                index,
            ));
        }
        self.working = cut_before(&self.working, breach.time);
    }
}

enum Conflict {
    /// Both agents follow trajectories.
    Moving(usize, usize, Breach),
    /// A moving agent enters a holding agent's bubble.
    Holding { mover: usize, holder: usize, breach: Breach },
    /// Two holding agents already too close.
    Stationary(usize, usize),
}

// ── ArbitrationEngine ──────────────────────────────────────────────

/// The arbitration loop body.
///
/// Drive it with [`spawn_loop`](crate::spawn_loop) for the fixed-rate
/// loop, or call [`run_cycle`](Self::run_cycle) directly in lockstep.
pub struct ArbitrationEngine {
    config: ArbitrationConfig,
    map: Arc<Map>,
    clock: Arc<dyn Clock>,
    stores: ArbitrationStores,
    outbox: Sender<Dispatch>,
    last_good: IndexMap<AgentKey, Trajectory>,
    cycle: CycleId,
    dispatch_dropped: u64,
}

// Compile-time assertion: the engine can move onto its loop thread.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<ArbitrationEngine>();
};

impl ArbitrationEngine {
    /// Engine over `stores`, plus the receiving end of its outbound
    /// dispatch channel.
    pub fn new(
        config: ArbitrationConfig,
        map: Arc<Map>,
        clock: Arc<dyn Clock>,
        stores: ArbitrationStores,
    ) -> Result<(Self, Receiver<Dispatch>), ConfigError> {
        config.validate()?;
        let (outbox, dispatch) = crossbeam_channel::bounded(config.outbox_capacity);
        let engine = Self {
            config,
            map,
            clock,
            stores,
            outbox,
            last_good: IndexMap::new(),
            cycle: CycleId::default(),
            dispatch_dropped: 0,
        };
        Ok((engine, dispatch))
    }

    /// The configuration in use.
    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    /// The stores in use.
    pub fn stores(&self) -> &ArbitrationStores {
        &self.stores
    }

    /// The most recently completed cycle (0 before the first).
    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// The last trajectory published for `key`, if it ever had an input.
    pub fn last_good(&self, key: &AgentKey) -> Option<&Trajectory> {
        self.last_good.get(key)
    }

    /// Outbound dispatches dropped on a full channel so far.
    pub fn dispatch_dropped(&self) -> u64 {
        self.dispatch_dropped
    }

    /// Move the engine onto its own thread at the configured period.
    pub fn spawn(self) -> Result<LoopHandle<Self>, ConfigError> {
        let period = self.config.period;
        spawn_loop(self, period)
    }

    /// Run one full cycle.
    pub fn run_cycle(&mut self) -> CycleMetrics {
        let start = Instant::now();
        self.cycle = self.cycle.next();
        let now = self.clock.now();
        let min_separation = self.config.min_separation;

        // 1. Snapshot.
        let keys = self.stores.proposed.keys();
        let mut skipped = 0;
        let mut candidates = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.snapshot(key) {
                Some(c) => candidates.push(c),
                None => skipped += 1,
            }
        }
        self.last_good.retain(|k, _| keys.contains(k));

        // 2. Legality.
        for c in candidates.iter_mut().filter(|c| !c.holding()) {
            if let Err(v) = arbiter_vetter::check(&c.working, &*self.map, &self.config.limits) {
                warn!(
                    agent = %c.key,
                    kind = v.kind.name(),
                    index = v.index,
                    value = v.value,
                    "trajectory failed legality check"
                );
                c.working = c.working.truncated(v.index);
                c.code = ResultCode::ConstraintViolation(v);
            }
        }

        // 3 + 4. Projection and correction.
        let map = Arc::clone(&self.map);
        let mut cycle_map = CycleMap::new(&map);
        for c in &candidates {
            if let Err(e) =
                cycle_map.add_dynamic_obstacle(c.key.clone(), c.state.position, min_separation)
            {
                warn!(agent = %c.key, error = %e, "could not place safety bubble");
            }
        }
        resolve(&mut candidates, &cycle_map, now, min_separation);
        drop(cycle_map);

        // 5. Publish.
        let agents = candidates.len();
        let mut corrected = 0;
        for c in candidates {
            if c.working != c.original {
                corrected += 1;
            }
            let published = if c.holding() {
                Trajectory::hold(c.state.position, c.state.yaw(), now)
            } else {
                c.working
            };
            if c.input != Input::Empty {
                self.last_good.insert(c.key.clone(), published.clone());
            }
            let verdict = Verdict {
                cycle: self.cycle,
                proposal_generation: c.generation,
                code: c.code,
            };
            self.publish(c.key, published, verdict);
        }

        let metrics = CycleMetrics {
            cycle: self.cycle,
            elapsed_us: start.elapsed().as_micros() as u64,
            agents,
            corrected,
            skipped,
            dispatch_dropped: self.dispatch_dropped,
        };
        debug!(
            cycle = metrics.cycle.0,
            agents = metrics.agents,
            corrected = metrics.corrected,
            skipped = metrics.skipped,
            elapsed_us = metrics.elapsed_us,
            "arbitration cycle"
        );
        metrics
    }

    fn snapshot(&self, key: &AgentKey) -> Option<Candidate> {
        let state = match self.stores.states.read(key) {
            Ok(s) => s,
            Err(e) => {
                log_skip(key, "state", &e);
                return None;
            }
        };
        if !state.position.is_finite() {
            warn!(agent = %key, "skipping agent: non-finite position");
            return None;
        }
        let proposal = match self.stores.proposed.read_stamped(key) {
            Ok(p) => p,
            Err(e) => {
                log_skip(key, "proposal", &e);
                return None;
            }
        };

        let (input, trajectory, code) = if !proposal.value.is_empty() {
            (Input::Proposed, proposal.value, ResultCode::Success)
        } else if let Some(t) = self.last_good.get(key) {
            (Input::LastGood, t.clone(), ResultCode::Success)
        } else {
            (
                Input::Empty,
                Trajectory::default(),
                ResultCode::Rejected(RejectReason::EmptyProposal),
            )
        };
        Some(Candidate {
            key: key.clone(),
            state,
            generation: proposal.generation,
            input,
            original: trajectory.clone(),
            working: trajectory,
            code,
        })
    }

    fn publish(&mut self, key: AgentKey, trajectory: Trajectory, verdict: Verdict) {
        // Verdict first: a consumer woken by the trajectory write then
        // finds the matching verdict.
        if let Err(e) = self.stores.verdicts.write(&key, Some(verdict.clone())) {
            log_publish_failure(&key, "verdict", &e);
        }
        if let Err(e) = self.stores.updated.write(&key, trajectory.clone()) {
            log_publish_failure(&key, "trajectory", &e);
        }
        let message = Dispatch {
            key,
            trajectory,
            verdict,
        };
        match self.outbox.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                self.dispatch_dropped += 1;
                warn!(
                    agent = %m.key,
                    dropped = self.dispatch_dropped,
                    "outbound dispatch dropped: channel full"
                );
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl CycleLoop for ArbitrationEngine {
    type Metrics = CycleMetrics;

    fn name(&self) -> &str {
        "arbitration"
    }

    fn cycle_once(&mut self) -> CycleMetrics {
        self.run_cycle()
    }

    /// Stops the stores the engine publishes into, releasing every
    /// publisher and producer blocked on them. The input stores belong
    /// to the transport layer and stay open.
    fn on_stop(&mut self) {
        self.stores.updated.stop();
        self.stores.verdicts.stop();
        debug!(cycle = self.cycle.0, "arbitration outputs stopped");
    }
}

impl std::fmt::Debug for ArbitrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationEngine")
            .field("cycle", &self.cycle)
            .field("agents", &self.last_good.len())
            .field("dispatch_dropped", &self.dispatch_dropped)
            .finish()
    }
}

fn log_skip(key: &AgentKey, what: &str, e: &WardenError) {
    match e {
        WardenError::StoreStopped => debug!(agent = %key, what, "skipping agent: store stopped"),
        _ => warn!(agent = %key, what, error = %e, "skipping agent"),
    }
}

fn log_publish_failure(key: &AgentKey, what: &str, e: &WardenError) {
    match e {
        WardenError::StoreStopped => debug!(agent = %key, what, "not published: store stopped"),
        _ => warn!(agent = %key, what, error = %e, "not published"),
    }
}

// ── Correction ─────────────────────────────────────────────────────

/// Cut trajectories until no pair breaches. Every moving conflict
/// removes at least one sample and every stationary conflict is
/// recorded once, so the round budget is never reached in practice.
fn resolve(candidates: &mut [Candidate], cycle_map: &CycleMap<'_>, now: f64, min_separation: f64) {
    let n = candidates.len();
    let budget = candidates.iter().map(|c| c.working.len()).sum::<usize>() + n * n + 1;
    let mut stuck: IndexSet<(usize, usize)> = IndexSet::new();

    for _ in 0..budget {
        let Some(conflict) = first_conflict(candidates, cycle_map, now, min_separation, &stuck)
        else {
            return;
        };
        match conflict {
            Conflict::Moving(a, b, breach) => {
                let (ka, kb) = (candidates[a].key.clone(), candidates[b].key.clone());
                warn!(
                    agent = %ka,
                    other = %kb,
                    time = breach.time,
                    distance = breach.distance,
                    "projected separation breach"
                );
                candidates[a].cut(&kb, breach);
                candidates[b].cut(&ka, breach);
            }
            Conflict::Holding {
                mover,
                holder,
                breach,
            } => {
                let holder_key = candidates[holder].key.clone();
                warn!(
                    agent = %candidates[mover].key,
                    other = %holder_key,
                    time = breach.time,
                    distance = breach.distance,
                    "trajectory enters holding agent's bubble"
                );
                candidates[mover].cut(&holder_key, breach);
            }
            Conflict::Stationary(a, b) => {
                warn!(
                    agent = %candidates[a].key,
                    other = %candidates[b].key,
                    "holding agents inside each other's bubble"
                );
                for i in [a, b] {
                    candidates[i].code = ResultCode::Rejected(RejectReason::Unresolvable);
                }
                stuck.insert((a, b));
            }
        }
    }

    warn!(agents = n, "correction did not converge; holding every agent");
    for c in candidates.iter_mut().filter(|c| !c.holding()) {
        c.working = Trajectory::default();
        c.code = ResultCode::Rejected(RejectReason::Unresolvable);
    }
}

fn first_conflict(
    candidates: &[Candidate],
    cycle_map: &CycleMap<'_>,
    now: f64,
    min_separation: f64,
    stuck: &IndexSet<(usize, usize)>,
) -> Option<Conflict> {
    for a in 0..candidates.len() {
        for b in (a + 1)..candidates.len() {
            let (ca, cb) = (&candidates[a], &candidates[b]);
            let conflict = match (ca.holding(), cb.holding()) {
                (false, false) => moving_breach(&ca.working, &cb.working, now, min_separation)
                    .map(|breach| Conflict::Moving(a, b, breach)),
                (false, true) => cycle_map
                    .dynamic_obstacle(&cb.key)
                    .and_then(|bubble| holding_breach(&ca.working, bubble, now))
                    .map(|breach| Conflict::Holding {
                        mover: a,
                        holder: b,
                        breach,
                    }),
                (true, false) => cycle_map
                    .dynamic_obstacle(&ca.key)
                    .and_then(|bubble| holding_breach(&cb.working, bubble, now))
                    .map(|breach| Conflict::Holding {
                        mover: b,
                        holder: a,
                        breach,
                    }),
                (true, true) => {
                    let too_close = !stuck.contains(&(a, b))
                        && cycle_map
                            .dynamic_obstacle(&cb.key)
                            .is_some_and(|bubble| bubble.contains_strictly(ca.state.position));
                    too_close.then_some(Conflict::Stationary(a, b))
                }
            };
            if conflict.is_some() {
                return conflict;
            }
        }
    }
    None
}
