//! Per-cycle metrics for the engine, watchdog, and planner loops.
//!
//! Each loop returns its metrics from
//! [`cycle_once`](crate::CycleLoop::cycle_once); a running
//! [`LoopHandle`](crate::LoopHandle) keeps the most recent value.

use arbiter_core::CycleId;

/// Metrics for one arbitration cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleMetrics {
    /// The cycle these metrics describe.
    pub cycle: CycleId,
    /// Wall-clock time for the cycle, in microseconds.
    pub elapsed_us: u64,
    /// Agents arbitrated (state and proposal both readable).
    pub agents: usize,
    /// Agents whose published trajectory differs from their input.
    pub corrected: usize,
    /// Agents skipped because their state or proposal was unreadable.
    pub skipped: usize,
    /// Cumulative outbound dispatches dropped on a full channel.
    pub dispatch_dropped: u64,
}

/// Cumulative metrics for a watchdog loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchdogMetrics {
    /// Cycles completed.
    pub cycles: u64,
    /// Non-nominal status entries written, across all cycles.
    pub raised: u64,
}

/// Cumulative metrics for a planner loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlannerMetrics {
    /// Planning cycles completed.
    pub cycles: u64,
    /// Proposals written to the proposed-trajectory store.
    pub submitted: u64,
    /// Proposals withheld because advisory vetting failed.
    pub vetoed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = CycleMetrics::default();
        assert_eq!(m.cycle, CycleId(0));
        assert_eq!(m.elapsed_us, 0);
        assert_eq!(m.agents, 0);
        assert_eq!(m.corrected, 0);
        assert_eq!(m.skipped, 0);
        assert_eq!(m.dispatch_dropped, 0);
        assert_eq!(WatchdogMetrics::default().raised, 0);
        assert_eq!(PlannerMetrics::default().vetoed, 0);
    }
}
