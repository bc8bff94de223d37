//! Cycle engine - one pass through the 8-phase state machine

use crate::collaborators::{
    BootstrapState, Crystallizer, OracleGate, PracticeExecutor, Reflector, TrajectoryRecord,
    TrajectoryStore, Verifier,
};
use crate::collapse::{collapse_diverse, RandomSource, ThreadRngSource};
use crate::stats::RunningStats;
use crate::strategy::StrategyStore;
use ouro_core::{CancelToken, CycleResult, Domain, Error, MetaContext, Phase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum combined verification score for acceptance.
    pub accept_threshold: f64,
    /// Successful trajectories required to crystallize while a domain is
    /// still bootstrapping (before its first crystallization).
    pub bootstrap_trajectory_threshold: usize,
    /// Threshold after the domain's first successful crystallization.
    /// Raised permanently — early wins are cheap, later ones must earn it.
    pub crystallize_trajectory_threshold: usize,
    /// Max heuristics kept in the strategy store before pruning.
    pub strategy_budget: usize,
    /// Whether a domain-blocked cycle counts toward completed-cycle stats.
    pub count_blocked_as_complete: bool,
    /// Intensity multiplier for domains absent from recent history.
    pub diversity_boost: f64,
    /// Intensity multiplier for domains seen more than twice recently.
    pub diversity_penalty: f64,
    /// How many recent selections feed the diversity adjustment.
    pub recent_domain_window: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.6,
            bootstrap_trajectory_threshold: 2,
            crystallize_trajectory_threshold: 5,
            strategy_budget: 50,
            count_blocked_as_complete: true,
            diversity_boost: 1.5,
            diversity_penalty: 0.5,
            recent_domain_window: 10,
        }
    }
}

pub struct CycleEngine {
    reflector: Arc<dyn Reflector>,
    verifier: Arc<dyn Verifier>,
    practice: Arc<dyn PracticeExecutor>,
    crystallizer: Arc<dyn Crystallizer>,
    storage: Arc<dyn TrajectoryStore>,
    gate: Arc<dyn OracleGate>,
    rng: Box<dyn RandomSource>,
    config: CycleConfig,
    strategies: StrategyStore,
    stats: RunningStats,
    recent_domains: Vec<Domain>,
}

impl CycleEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reflector: Arc<dyn Reflector>,
        verifier: Arc<dyn Verifier>,
        practice: Arc<dyn PracticeExecutor>,
        crystallizer: Arc<dyn Crystallizer>,
        storage: Arc<dyn TrajectoryStore>,
        gate: Arc<dyn OracleGate>,
        config: CycleConfig,
    ) -> Self {
        let strategy_budget = config.strategy_budget;
        Self {
            reflector,
            verifier,
            practice,
            crystallizer,
            storage,
            gate,
            rng: Box::new(ThreadRngSource),
            config,
            strategies: StrategyStore::new(strategy_budget),
            stats: RunningStats::default(),
            recent_domains: Vec::new(),
        }
    }

    /// Replace the randomness source (deterministic collapse under test).
    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn strategies(&self) -> &StrategyStore {
        &self.strategies
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Run one full cycle. Never returns Err: collaborator failures are
    /// recorded on the result and treated as retryable by the caller.
    pub async fn run_cycle(
        &mut self,
        meta_context: Option<&MetaContext>,
        cancel: &CancelToken,
    ) -> CycleResult {
        let mut result = CycleResult::new(Uuid::new_v4().to_string());
        self.drive(&mut result, meta_context, cancel).await;
        self.stats
            .fold(&result, self.config.count_blocked_as_complete);
        result
    }

    async fn drive(
        &mut self,
        result: &mut CycleResult,
        meta_context: Option<&MetaContext>,
        cancel: &CancelToken,
    ) {
        // REFLECT
        result.phase_reached = Phase::Reflect;
        let desires = match self.reflector.reflect(meta_context).await {
            Ok(desires) => desires,
            Err(e) => return fail(result, Phase::Reflect, e),
        };
        result.desires_generated = desires.len();
        if desires.is_empty() {
            debug!(cycle = %result.cycle_id, "reflection produced no desires");
            return;
        }

        if observe_cancel(result, Phase::Verify, cancel) {
            return;
        }

        // VERIFY
        result.phase_reached = Phase::Verify;
        let mut accepted = Vec::new();
        for desire in &desires {
            match self.verifier.verify(desire).await {
                Ok(verdict) if verdict.score >= self.config.accept_threshold => {
                    accepted.push(desire.clone());
                }
                Ok(verdict) => {
                    debug!(
                        desire = %desire.description,
                        score = verdict.score,
                        "rejected at verify"
                    );
                    result.desires_rejected += 1;
                }
                Err(e) => return fail(result, Phase::Verify, e),
            }
        }
        result.desires_verified = accepted.len();
        if accepted.is_empty() {
            return;
        }

        if observe_cancel(result, Phase::Collapse, cancel) {
            return;
        }

        // COLLAPSE
        result.phase_reached = Phase::Collapse;
        let Some(collapsed) = collapse_diverse(
            &accepted,
            &self.recent_domains,
            self.config.diversity_boost,
            self.config.diversity_penalty,
            self.rng.as_mut(),
        ) else {
            return;
        };
        let domain = collapsed.desire.domain;
        result.selected_desire = Some(collapsed.desire.clone());
        result.domain = Some(domain);
        self.note_domain(domain);
        debug!(tag = %collapsed.tag, domain = %domain, "collapsed to desire");

        if observe_cancel(result, Phase::Route, cancel) {
            return;
        }

        // ROUTE
        result.phase_reached = Phase::Route;
        match self.gate.can_practice(domain).await {
            Ok(true) => {}
            Ok(false) => {
                // Blocked attempt: still a completed cycle, recorded but
                // never practiced.
                warn!(domain = %domain, "practice blocked by oracle gate");
                result.domain_blocked = true;
            }
            Err(e) => return fail(result, Phase::Route, e),
        }

        if !result.domain_blocked {
            if observe_cancel(result, Phase::Practice, cancel) {
                return;
            }

            // PRACTICE
            result.phase_reached = Phase::Practice;
            match self.practice.execute(&collapsed.desire, domain).await {
                Ok(outcome) => {
                    result.practice_attempted = true;
                    result.practice_succeeded = outcome.success;
                    result.practice_details = Some(outcome);
                }
                Err(e) => return fail(result, Phase::Practice, e),
            }
        }

        if observe_cancel(result, Phase::Record, cancel) {
            return;
        }

        // RECORD - persist the attempt regardless of outcome to grow the
        // crystallization corpus.
        result.phase_reached = Phase::Record;
        let record = build_record(result, domain);
        if let Err(e) = self.storage.append_trajectory(record).await {
            return fail(result, Phase::Record, e);
        }

        if result.practice_succeeded {
            if observe_cancel(result, Phase::Crystallize, cancel) {
                return;
            }

            // CRYSTALLIZE
            result.phase_reached = Phase::Crystallize;
            if let Err(e) = self.crystallize(result, domain).await {
                return fail(result, Phase::Crystallize, e);
            }
        }

        if observe_cancel(result, Phase::Measure, cancel) {
            return;
        }

        // MEASURE - the fold itself happens in run_cycle once the result
        // is final; reaching here marks the cycle complete.
        result.phase_reached = Phase::Measure;
        info!(
            cycle = %result.cycle_id,
            domain = %domain,
            practiced = result.practice_attempted,
            succeeded = result.practice_succeeded,
            crystallized = result.heuristic_crystallized.is_some(),
            "cycle complete"
        );
    }

    async fn crystallize(&mut self, result: &mut CycleResult, domain: Domain) -> ouro_core::Result<()> {
        let state = self.storage.read_bootstrap_state(domain).await?;
        let threshold = if state.crystallized_once {
            self.config.crystallize_trajectory_threshold
        } else {
            self.config.bootstrap_trajectory_threshold
        };

        let trajectories = self
            .storage
            .read_successful_trajectories(domain, threshold.max(1))
            .await?;
        if trajectories.len() < threshold {
            debug!(
                domain = %domain,
                have = trajectories.len(),
                need = threshold,
                "not enough trajectories to crystallize"
            );
            return Ok(());
        }

        let Some(heuristic) = self.crystallizer.crystallize(domain, &trajectories).await? else {
            return Ok(());
        };

        self.storage
            .store_or_merge_heuristic(domain, &heuristic, trajectories.len())
            .await?;
        self.strategies.merge(domain, &heuristic);
        result.heuristic_crystallized = Some(heuristic);

        if !state.crystallized_once {
            self.storage
                .write_bootstrap_state(
                    domain,
                    BootstrapState {
                        crystallized_once: true,
                    },
                )
                .await?;
            info!(domain = %domain, "first crystallization, threshold raised");
        }
        Ok(())
    }

    fn note_domain(&mut self, domain: Domain) {
        self.recent_domains.push(domain);
        if self.recent_domains.len() > self.config.recent_domain_window {
            self.recent_domains.remove(0);
        }
    }
}

/// Poll the token at a phase boundary. If set, the cycle stops with the
/// boundary phase and the token's reason; no later collaborator is called.
fn observe_cancel(result: &mut CycleResult, boundary: Phase, cancel: &CancelToken) -> bool {
    if !cancel.is_cancelled() {
        return false;
    }
    result.interrupted = true;
    result.phase_reached = boundary;
    result.cancellation_reason = cancel.reason().map(str::to_string);
    info!(cycle = %result.cycle_id, phase = %boundary, "cycle interrupted");
    true
}

fn fail(result: &mut CycleResult, phase: Phase, error: Error) {
    result.phase_reached = phase;
    result.error = Some(error.to_string());
    warn!(cycle = %result.cycle_id, phase = %phase, error = %error, "cycle aborted");
}

fn build_record(result: &CycleResult, domain: Domain) -> TrajectoryRecord {
    let desire = result
        .selected_desire
        .as_ref()
        .map(|d| d.description.clone())
        .unwrap_or_default();
    let details = result.practice_details.as_ref();
    let mut metadata = std::collections::BTreeMap::new();
    metadata.insert("cycle_id".to_string(), result.cycle_id.clone());
    if result.domain_blocked {
        metadata.insert("blocked".to_string(), "true".to_string());
    }
    TrajectoryRecord {
        desire,
        domain,
        problem: details.map(|d| d.problem.clone()).unwrap_or_default(),
        solution: details.map(|d| d.solution.clone()).unwrap_or_default(),
        approach: details.map(|d| d.approach.clone()).unwrap_or_default(),
        success: result.practice_succeeded,
        metadata,
    }
}
