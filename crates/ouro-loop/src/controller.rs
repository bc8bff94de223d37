//! Outer loop controller
//!
//! Drives the iteration bridge until a terminal condition fires and always
//! returns a fully populated result. Bounds are checked once per pass, so
//! an in-flight iteration completes before any stop takes effect.

use crate::bridge::{run_checkpoint, IterationBridge, IterationOutcome};
use crate::checkpoint::CheckpointTool;
use crate::config::LoopConfig;
use ouro_core::{CancelToken, IterationSummary, LoopResult, ResourceUsage, StopReason};
use std::time::Instant;
use tracing::{error, info, warn};

pub struct LoopController {
    bridge: IterationBridge,
    checkpoint: Box<dyn CheckpointTool>,
    config: LoopConfig,
    cancel: CancelToken,
    checkpoints_created: u32,
    checkpoint_failures: u32,
}

impl LoopController {
    pub fn new(
        bridge: IterationBridge,
        checkpoint: Box<dyn CheckpointTool>,
        config: LoopConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            bridge,
            checkpoint,
            config,
            cancel,
            checkpoints_created: 0,
            checkpoint_failures: 0,
        }
    }

    /// Handle for requesting a manual stop from outside the loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn checkpoint_failures(&self) -> u32 {
        self.checkpoint_failures
    }

    pub fn bridge(&self) -> &IterationBridge {
        &self.bridge
    }

    /// Run iterations until a terminal condition. Every exit path yields
    /// exactly one stop reason; the loop never exits silently.
    pub async fn run(&mut self) -> LoopResult {
        let started = Instant::now();
        let mut totals = ResourceUsage::default();
        let mut iterations_completed: u64 = 0;
        let mut recent: Vec<IterationSummary> = Vec::new();

        let reason = loop {
            // Manual stop: once per pass, so the in-flight iteration
            // always completes before the loop exits.
            if self.cancel.is_cancelled() {
                info!(
                    reason = self.cancel.reason().unwrap_or("unspecified"),
                    "manual stop observed"
                );
                break StopReason::ManualStop;
            }

            let elapsed = started.elapsed().as_secs_f64();
            if let Some(stop) = self.bound_reached(iterations_completed, &totals, elapsed) {
                break stop;
            }

            let iteration = iterations_completed + 1;
            let hint = self.budget_remaining_hint(iterations_completed, &totals, elapsed);
            let outcome = match self
                .bridge
                .run_iteration(iteration, elapsed, hint, &self.cancel)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(iteration, error = %e, "unrecoverable iteration failure");
                    break StopReason::Error;
                }
            };

            totals.accumulate(&outcome.usage);
            iterations_completed = iteration;

            recent.push(IterationSummary {
                iteration,
                cycle_id: outcome.cycle.cycle_id.clone(),
                phase_reached: outcome.cycle.phase_reached,
                emergence_confidence: outcome.emergence.confidence,
                crystallized: outcome.cycle.heuristic_crystallized.is_some(),
            });
            if recent.len() > self.config.recent_iterations_kept {
                recent.remove(0);
            }

            if outcome.checkpoint_due && self.config.checkpoint.enabled {
                self.try_checkpoint(&outcome, iteration, totals.cost_usd, started)
                    .await;
            }

            if outcome.emergence.emerged {
                info!(
                    iteration,
                    confidence = outcome.emergence.confidence,
                    reason = %outcome.emergence.reason,
                    "stopping on emergence"
                );
                break StopReason::EmergenceDetected;
            }
        };

        let result = LoopResult {
            terminated: true,
            reason,
            iterations_completed,
            total_time_seconds: started.elapsed().as_secs_f64(),
            total_cost_usd: totals.cost_usd,
            total_tokens: totals.tokens,
            checkpoints_created: self.checkpoints_created,
            recent_iterations: recent,
        };
        info!(
            reason = %result.reason,
            iterations = result.iterations_completed,
            checkpoints = result.checkpoints_created,
            "loop terminated"
        );
        result
    }

    fn bound_reached(
        &self,
        iterations_completed: u64,
        totals: &ResourceUsage,
        elapsed: f64,
    ) -> Option<StopReason> {
        let bounds = &self.config.bounds;
        if let Some(max) = bounds.max_iterations {
            if iterations_completed >= max {
                return Some(StopReason::MaxIterations);
            }
        }
        if let Some(max) = bounds.max_cost_usd {
            if totals.cost_usd >= max {
                return Some(StopReason::MaxCost);
            }
        }
        if let Some(max) = bounds.max_time_seconds {
            if elapsed >= max {
                return Some(StopReason::MaxTime);
            }
        }
        None
    }

    /// Smallest remaining fraction across the configured bounds, or None
    /// when nothing is bounded.
    fn budget_remaining_hint(
        &self,
        iterations_completed: u64,
        totals: &ResourceUsage,
        elapsed: f64,
    ) -> Option<f64> {
        let bounds = &self.config.bounds;
        let mut hint: Option<f64> = None;
        let mut fold = |used: f64, max: f64| {
            if max > 0.0 {
                let remaining = (1.0 - used / max).clamp(0.0, 1.0);
                hint = Some(hint.map_or(remaining, |h: f64| h.min(remaining)));
            }
        };
        if let Some(max) = bounds.max_iterations {
            fold(iterations_completed as f64, max as f64);
        }
        if let Some(max) = bounds.max_cost_usd {
            fold(totals.cost_usd, max);
        }
        if let Some(max) = bounds.max_time_seconds {
            fold(elapsed, max);
        }
        hint
    }

    async fn try_checkpoint(
        &mut self,
        outcome: &IterationOutcome,
        iteration: u64,
        total_cost_usd: f64,
        started: Instant,
    ) {
        let result = run_checkpoint(
            self.checkpoint.as_ref(),
            &self.config.checkpoint.tag_prefix,
            iteration,
            outcome.emergence.confidence,
            total_cost_usd,
            started.elapsed().as_secs_f64(),
        )
        .await;
        match result {
            Ok(()) => {
                self.checkpoints_created += 1;
                info!(iteration, "checkpoint created");
            }
            Err(e) => {
                // Never fatal: counted and logged, the loop goes on.
                self.checkpoint_failures += 1;
                warn!(iteration, error = %e, "checkpoint failed");
            }
        }
    }
}
