//! Integration tests for the outer loop
//!
//! Deterministic collaborator stubs drive the controller through every
//! terminal condition: iteration, cost, and time bounds, emergence,
//! manual stop, unrecoverable storage failure, and checkpoint failure.

use async_trait::async_trait;
use ouro_core::{
    CancelToken, Desire, Domain, Error, MetaContext, Phase, PracticeOutcome, Result, StopReason,
    Verification,
};
use ouro_engine::memory::{AlwaysOpenGate, MemoryTrajectoryStore};
use ouro_engine::{
    BootstrapState, Crystallizer, CycleEngine, FixedSource, PracticeExecutor, Reflector,
    TrajectoryRecord, TrajectoryStore, Verifier,
};
use ouro_history::{audit, FrameLog, JsonlStore};
use ouro_loop::{
    CheckpointTool, EmergenceDetector, FlatRateMeter, IterationBridge, LoopConfig, LoopController,
    MetaContextBuilder, NoopCheckpoint, ResourceMeter,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================
// Stub collaborators
// ============================================================

/// Emits one fresh, distinct hypothesis per call.
#[derive(Default)]
struct SeqReflector {
    calls: AtomicUsize,
}

#[async_trait]
impl Reflector for SeqReflector {
    async fn reflect(&self, _meta: Option<&MetaContext>) -> Result<Vec<Desire>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Desire::new(
            format!("implement and test improvement number {}", n),
            0.8,
            Domain::Code,
        )])
    }
}

struct PassVerifier;

#[async_trait]
impl Verifier for PassVerifier {
    async fn verify(&self, _desire: &Desire) -> Result<Verification> {
        Ok(Verification {
            score: 1.0,
            provenance_score: 1.0,
            specificity_score: 1.0,
            rejection_reason: None,
        })
    }
}

struct OkPractice;

#[async_trait]
impl PracticeExecutor for OkPractice {
    async fn execute(&self, desire: &Desire, _domain: Domain) -> Result<PracticeOutcome> {
        Ok(PracticeOutcome {
            success: true,
            problem: desire.description.clone(),
            approach: "stub".into(),
            solution: "done".into(),
            attempts: 1,
            difficulty: 0.5,
        })
    }
}

/// Crystallizes on every opportunity, or never.
struct MaybeCrystallizer {
    enabled: bool,
}

#[async_trait]
impl Crystallizer for MaybeCrystallizer {
    async fn crystallize(
        &self,
        domain: Domain,
        trajectories: &[TrajectoryRecord],
    ) -> Result<Option<String>> {
        if self.enabled {
            Ok(Some(format!("{}: keep drills small ({})", domain, trajectories.len())))
        } else {
            Ok(None)
        }
    }
}

struct RecordingCheckpoint {
    commits: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl CheckpointTool for RecordingCheckpoint {
    async fn stage_all(&self) -> Result<()> {
        if self.fail {
            return Err(Error::Checkpoint("no repository".into()));
        }
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.commits.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn tag(&self, _name: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Trajectory store whose delta drain is permanently broken. Everything
/// the cycle touches succeeds; only the frame-write path fails.
struct BrokenDeltaStore;

#[async_trait]
impl TrajectoryStore for BrokenDeltaStore {
    async fn append_trajectory(&self, _record: TrajectoryRecord) -> Result<()> {
        Ok(())
    }

    async fn read_successful_trajectories(
        &self,
        _domain: Domain,
        _limit: usize,
    ) -> Result<Vec<TrajectoryRecord>> {
        Ok(Vec::new())
    }

    async fn store_or_merge_heuristic(
        &self,
        _domain: Domain,
        _content: &str,
        _trajectory_count: usize,
    ) -> Result<()> {
        Ok(())
    }

    async fn read_bootstrap_state(&self, _domain: Domain) -> Result<BootstrapState> {
        Ok(BootstrapState::default())
    }

    async fn write_bootstrap_state(&self, _domain: Domain, _state: BootstrapState) -> Result<()> {
        Ok(())
    }

    async fn drain_deltas(
        &self,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>)> {
        Err(Error::storage("delta store offline"))
    }
}

struct Harness {
    reflector: Arc<SeqReflector>,
    controller: LoopController,
}

fn harness(config: LoopConfig, crystallize: bool, checkpoint: Box<dyn CheckpointTool>) -> Harness {
    harness_full(
        config,
        crystallize,
        checkpoint,
        FrameLog::new(),
        Arc::new(MemoryTrajectoryStore::new()),
        None,
    )
}

fn harness_with_log(
    config: LoopConfig,
    crystallize: bool,
    checkpoint: Box<dyn CheckpointTool>,
    log: FrameLog,
) -> Harness {
    harness_full(
        config,
        crystallize,
        checkpoint,
        log,
        Arc::new(MemoryTrajectoryStore::new()),
        None,
    )
}

fn harness_full(
    config: LoopConfig,
    crystallize: bool,
    checkpoint: Box<dyn CheckpointTool>,
    log: FrameLog,
    storage: Arc<dyn TrajectoryStore>,
    meter: Option<Box<dyn ResourceMeter>>,
) -> Harness {
    let reflector = Arc::new(SeqReflector::default());
    let engine = CycleEngine::new(
        reflector.clone(),
        Arc::new(PassVerifier),
        Arc::new(OkPractice),
        Arc::new(MaybeCrystallizer { enabled: crystallize }),
        storage.clone(),
        Arc::new(AlwaysOpenGate),
        config.cycle.clone(),
    )
    .with_random_source(Box::new(FixedSource::new(vec![0.0])));

    let mut bridge = IterationBridge::new(
        engine,
        log,
        EmergenceDetector::new(config.emergence.clone()),
        MetaContextBuilder::new(config.meta.clone()),
        storage,
        &config.checkpoint,
    );
    if let Some(meter) = meter {
        bridge = bridge.with_meter(meter);
    }

    Harness {
        reflector,
        controller: LoopController::new(bridge, checkpoint, config, CancelToken::new()),
    }
}

fn bounded_config(max_iterations: u64) -> LoopConfig {
    let mut config = LoopConfig::default();
    config.bounds.max_iterations = Some(max_iterations);
    config
}

/// Emergence reachable quickly: three frames, crystallization dominant.
fn eager_emergence_config(max_iterations: u64) -> LoopConfig {
    let mut config = bounded_config(max_iterations);
    config.emergence.min_cycles = 3;
    config.cycle.bootstrap_trajectory_threshold = 1;
    config.cycle.crystallize_trajectory_threshold = 1;
    config
}

// ============================================================
// Bounds
// ============================================================

#[tokio::test]
async fn max_iterations_bound_is_exact() {
    let mut h = harness(bounded_config(5), false, Box::new(NoopCheckpoint));
    let result = h.controller.run().await;

    assert!(result.terminated);
    assert_eq!(result.reason, StopReason::MaxIterations);
    assert_eq!(result.iterations_completed, 5);
    assert_eq!(h.reflector.calls.load(Ordering::SeqCst), 5);
    assert_eq!(h.controller.bridge().log().len(), 5);
}

#[tokio::test]
async fn cost_bound_stops_the_loop() {
    let mut config = bounded_config(100);
    config.bounds.max_cost_usd = Some(2.0);
    let mut h = harness_full(
        config,
        false,
        Box::new(NoopCheckpoint),
        FrameLog::new(),
        Arc::new(MemoryTrajectoryStore::new()),
        Some(Box::new(FlatRateMeter {
            cost_usd: 0.5,
            tokens: 100,
        })),
    );
    let result = h.controller.run().await;

    // Four iterations at $0.50 reach the $2.00 ceiling exactly.
    assert_eq!(result.reason, StopReason::MaxCost);
    assert_eq!(result.iterations_completed, 4);
    assert_eq!(result.total_cost_usd, 2.0);
    assert_eq!(result.total_tokens, 400);
}

#[tokio::test]
async fn zero_time_budget_stops_before_first_iteration() {
    let mut config = bounded_config(10);
    config.bounds.max_time_seconds = Some(0.0);
    let mut h = harness(config, false, Box::new(NoopCheckpoint));
    let result = h.controller.run().await;

    assert_eq!(result.reason, StopReason::MaxTime);
    assert_eq!(result.iterations_completed, 0);
    assert_eq!(h.reflector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn manual_stop_before_start_yields_zero_iterations() {
    let mut h = harness(bounded_config(10), false, Box::new(NoopCheckpoint));
    h.controller.cancel_token().cancel("operator said stop");
    let result = h.controller.run().await;

    assert_eq!(result.reason, StopReason::ManualStop);
    assert_eq!(result.iterations_completed, 0);
}

// ============================================================
// Emergence
// ============================================================

#[tokio::test]
async fn emergence_stops_on_the_exact_iteration() {
    let mut h = harness(eager_emergence_config(50), true, Box::new(NoopCheckpoint));
    let result = h.controller.run().await;

    // min_cycles = 3: the third frame is the first eligible one, and
    // crystallization pushes confidence past the threshold immediately.
    assert_eq!(result.reason, StopReason::EmergenceDetected);
    assert_eq!(result.iterations_completed, 3);
    assert_eq!(h.reflector.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn detector_below_min_cycles_never_fires() {
    let mut config = bounded_config(5);
    config.cycle.bootstrap_trajectory_threshold = 1;
    config.cycle.crystallize_trajectory_threshold = 1;
    // Default min_cycles (50) is far beyond the 5 iterations allowed.
    let mut h = harness(config, true, Box::new(NoopCheckpoint));
    let result = h.controller.run().await;

    assert_eq!(result.reason, StopReason::MaxIterations);
    assert_eq!(result.iterations_completed, 5);
}

// ============================================================
// Checkpointing
// ============================================================

#[tokio::test]
async fn interval_checkpoints_embed_iteration_metrics() {
    let commits = Arc::new(Mutex::new(Vec::new()));
    let mut config = bounded_config(4);
    config.checkpoint.enabled = true;
    config.checkpoint.interval = 2;
    let mut h = harness(
        config,
        false,
        Box::new(RecordingCheckpoint {
            commits: commits.clone(),
            fail: false,
        }),
    );
    let result = h.controller.run().await;

    assert_eq!(result.reason, StopReason::MaxIterations);
    assert_eq!(result.checkpoints_created, 2);
    let commits = commits.lock().unwrap();
    assert_eq!(commits.len(), 2);
    assert!(commits[0].contains("iteration 2"));
    assert!(commits[1].contains("iteration 4"));
}

#[tokio::test]
async fn crystallization_triggers_an_off_interval_checkpoint() {
    let commits = Arc::new(Mutex::new(Vec::new()));
    let mut config = bounded_config(3);
    config.checkpoint.enabled = true;
    config.checkpoint.interval = 100;
    config.cycle.bootstrap_trajectory_threshold = 1;
    config.cycle.crystallize_trajectory_threshold = 1;
    let mut h = harness(
        config,
        true,
        Box::new(RecordingCheckpoint {
            commits: commits.clone(),
            fail: false,
        }),
    );
    let result = h.controller.run().await;

    // Every iteration crystallizes, so every iteration checkpoints.
    assert_eq!(result.checkpoints_created, 3);
}

#[tokio::test]
async fn checkpoint_failure_never_aborts_the_loop() {
    let mut config = bounded_config(4);
    config.checkpoint.enabled = true;
    config.checkpoint.interval = 1;
    let mut h = harness(
        config,
        false,
        Box::new(RecordingCheckpoint {
            commits: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }),
    );
    let result = h.controller.run().await;

    assert_eq!(result.reason, StopReason::MaxIterations);
    assert_eq!(result.iterations_completed, 4);
    assert_eq!(result.checkpoints_created, 0);
    assert_eq!(h.controller.checkpoint_failures(), 4);
}

// ============================================================
// Unrecoverable failure
// ============================================================

#[tokio::test]
async fn storage_failure_terminates_with_error_reason() {
    let mut h = harness_full(
        bounded_config(10),
        false,
        Box::new(NoopCheckpoint),
        FrameLog::new(),
        Arc::new(BrokenDeltaStore),
        None,
    );
    let result = h.controller.run().await;

    assert!(result.terminated);
    assert_eq!(result.reason, StopReason::Error);
    assert_eq!(result.iterations_completed, 0);
    // The failing iteration never produced a frame.
    assert_eq!(h.controller.bridge().log().len(), 0);
}

// ============================================================
// Result population and history integrity
// ============================================================

#[tokio::test]
async fn trailing_history_is_capped() {
    let mut config = bounded_config(5);
    config.recent_iterations_kept = 2;
    let mut h = harness(config, false, Box::new(NoopCheckpoint));
    let result = h.controller.run().await;

    assert_eq!(result.recent_iterations.len(), 2);
    assert_eq!(result.recent_iterations[0].iteration, 4);
    assert_eq!(result.recent_iterations[1].iteration, 5);
    assert_eq!(result.recent_iterations[1].phase_reached, Phase::Measure);
}

#[tokio::test]
async fn completed_run_leaves_an_auditable_chain() {
    let mut h = harness(bounded_config(6), false, Box::new(NoopCheckpoint));
    h.controller.run().await;

    let frames = h.controller.bridge().log().frames().to_vec();
    assert_eq!(frames.len(), 6);
    audit::verify_chain(&frames).expect("chain must verify");
}

#[tokio::test]
async fn jsonl_backed_run_survives_reload_and_audit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frames.jsonl");

    let store = JsonlStore::open(&path).unwrap();
    let mut h = harness_with_log(
        bounded_config(4),
        false,
        Box::new(NoopCheckpoint),
        FrameLog::with_store(Box::new(store)),
    );
    let result = h.controller.run().await;
    assert_eq!(result.iterations_completed, 4);

    // An external auditor reloads the file and verifies independently.
    let reloaded = JsonlStore::open(&path).unwrap();
    let log = FrameLog::with_store(Box::new(reloaded));
    assert_eq!(log.len(), 4);
    audit::verify_chain(log.frames()).expect("persisted chain must verify");
}
