//! Running statistics folded in at MEASURE

use ouro_core::{CycleResult, Phase};
use serde::{Deserialize, Serialize};

/// Counters accumulated across cycles, used for later hypothesis testing.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RunningStats {
    pub cycles_run: u64,
    pub cycles_completed: u64,
    pub desires_generated: u64,
    pub desires_accepted: u64,
    pub desires_rejected: u64,
    pub practice_attempts: u64,
    pub practice_successes: u64,
    pub heuristics_crystallized: u64,
    pub domains_blocked: u64,
    pub interruptions: u64,
    pub errors: u64,
}

impl RunningStats {
    /// Fold one cycle result. Whether a domain-blocked cycle counts as
    /// complete is policy, not inference — the source was inconsistent.
    pub fn fold(&mut self, result: &CycleResult, count_blocked_as_complete: bool) {
        self.cycles_run += 1;
        self.desires_generated += result.desires_generated as u64;
        self.desires_accepted += result.desires_verified as u64;
        self.desires_rejected += result.desires_rejected as u64;

        if result.practice_attempted {
            self.practice_attempts += 1;
        }
        if result.practice_succeeded {
            self.practice_successes += 1;
        }
        if result.heuristic_crystallized.is_some() {
            self.heuristics_crystallized += 1;
        }
        if result.domain_blocked {
            self.domains_blocked += 1;
        }
        if result.interrupted {
            self.interruptions += 1;
        }
        if result.error.is_some() {
            self.errors += 1;
        }

        let completed = result.phase_reached == Phase::Measure
            && !result.interrupted
            && result.error.is_none();
        if completed && (!result.domain_blocked || count_blocked_as_complete) {
            self.cycles_completed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_cycle_counting_is_policy() {
        let mut result = CycleResult::new("c");
        result.phase_reached = Phase::Measure;
        result.domain_blocked = true;

        let mut counted = RunningStats::default();
        counted.fold(&result, true);
        assert_eq!(counted.cycles_completed, 1);

        let mut uncounted = RunningStats::default();
        uncounted.fold(&result, false);
        assert_eq!(uncounted.cycles_completed, 0);
        assert_eq!(uncounted.domains_blocked, 1);
    }

    #[test]
    fn interrupted_cycle_is_never_complete() {
        let mut result = CycleResult::new("c");
        result.phase_reached = Phase::Measure;
        result.interrupted = true;

        let mut stats = RunningStats::default();
        stats.fold(&result, true);
        assert_eq!(stats.cycles_completed, 0);
        assert_eq!(stats.interruptions, 1);
    }
}
