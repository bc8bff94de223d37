//! Iteration bridge - one outer-loop pass, end to end
//!
//! Meta-context, cycle, resource snapshot, delta drain, frame write,
//! emergence check, checkpoint decision. The bridge owns the cycle engine
//! and the frame log; the controller owns the bridge.

use crate::checkpoint::CheckpointTool;
use crate::config::CheckpointConfig;
use crate::emergence::EmergenceDetector;
use crate::meta::MetaContextBuilder;
use async_trait::async_trait;
use ouro_core::{CancelToken, CycleResult, EmergenceResult, ResourceUsage, Result};
use ouro_engine::{CycleEngine, TrajectoryStore};
use ouro_history::{Frame, FrameLog};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Reports cost and token consumption for the iteration that just ran.
/// Wall-clock time is measured by the bridge itself.
#[async_trait]
pub trait ResourceMeter: Send + Sync {
    async fn measure(&self) -> Result<ResourceUsage>;
}

/// Meter for collaborators that consume nothing billable.
pub struct NullMeter;

#[async_trait]
impl ResourceMeter for NullMeter {
    async fn measure(&self) -> Result<ResourceUsage> {
        Ok(ResourceUsage::default())
    }
}

/// Flat per-iteration estimate, for demos and smoke runs.
pub struct FlatRateMeter {
    pub cost_usd: f64,
    pub tokens: u64,
}

#[async_trait]
impl ResourceMeter for FlatRateMeter {
    async fn measure(&self) -> Result<ResourceUsage> {
        Ok(ResourceUsage {
            elapsed_seconds: 0.0,
            cost_usd: self.cost_usd,
            tokens: self.tokens,
        })
    }
}

/// Everything one iteration produced.
pub struct IterationOutcome {
    pub cycle: CycleResult,
    pub frame: Frame,
    pub emergence: EmergenceResult,
    pub usage: ResourceUsage,
    pub checkpoint_due: bool,
}

pub struct IterationBridge {
    engine: CycleEngine,
    log: FrameLog,
    detector: EmergenceDetector,
    meta_builder: MetaContextBuilder,
    storage: Arc<dyn TrajectoryStore>,
    meter: Box<dyn ResourceMeter>,
    checkpoint_interval: u64,
}

impl IterationBridge {
    pub fn new(
        engine: CycleEngine,
        log: FrameLog,
        detector: EmergenceDetector,
        meta_builder: MetaContextBuilder,
        storage: Arc<dyn TrajectoryStore>,
        checkpoint: &CheckpointConfig,
    ) -> Self {
        Self {
            engine,
            log,
            detector,
            meta_builder,
            storage,
            meter: Box::new(NullMeter),
            checkpoint_interval: checkpoint.interval,
        }
    }

    pub fn with_meter(mut self, meter: Box<dyn ResourceMeter>) -> Self {
        self.meter = meter;
        self
    }

    pub fn log(&self) -> &FrameLog {
        &self.log
    }

    pub fn engine(&self) -> &CycleEngine {
        &self.engine
    }

    /// Run one full iteration. An `Err` here means the history or storage
    /// layer failed, which the controller treats as unrecoverable;
    /// collaborator failures are carried inside the cycle result instead.
    pub async fn run_iteration(
        &mut self,
        iteration: u64,
        elapsed_seconds: f64,
        budget_remaining_hint: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<IterationOutcome> {
        let started = Instant::now();

        let meta = self
            .meta_builder
            .build(&self.log, iteration, elapsed_seconds, budget_remaining_hint);

        let cycle = self.engine.run_cycle(meta.as_ref(), cancel).await;

        let mut usage = self.meter.measure().await?;
        usage.elapsed_seconds = started.elapsed().as_secs_f64();

        let (belief_delta, capability_delta) = self.storage.drain_deltas().await?;

        let frame = self.log.write_frame(
            &cycle,
            belief_delta,
            capability_delta,
            iteration,
            usage,
        )?;

        let emergence = self.detector.check(&self.log, &frame);

        let interval_due =
            self.checkpoint_interval > 0 && iteration % self.checkpoint_interval == 0;
        let checkpoint_due =
            interval_due || frame.heuristic_crystallized.is_some() || emergence.emerged;

        debug!(
            iteration,
            sequence = frame.sequence_number,
            emerged = emergence.emerged,
            confidence = emergence.confidence,
            checkpoint_due,
            "iteration bridged"
        );

        Ok(IterationOutcome {
            cycle,
            frame,
            emergence,
            usage,
            checkpoint_due,
        })
    }
}

/// Checkpoint an iteration: stage, commit with the run metrics embedded,
/// annotated tag. Any failure propagates for the caller to log and count.
pub async fn run_checkpoint(
    tool: &dyn CheckpointTool,
    tag_prefix: &str,
    iteration: u64,
    confidence: f64,
    total_cost_usd: f64,
    elapsed_seconds: f64,
) -> Result<()> {
    let message = format!(
        "checkpoint: iteration {} (confidence {:.2}, cost ${:.4}, elapsed {:.1}s)",
        iteration, confidence, total_cost_usd, elapsed_seconds
    );
    tool.stage_all().await?;
    tool.commit(&message).await?;
    tool.tag(&format!("{}-{}", tag_prefix, iteration), &message)
        .await
}
