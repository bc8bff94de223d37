//! Ouro — recursive self-improvement control loop
//!
//! Usage:
//!   ouro --workspace ./.ouro --iterations 60
//!
//! Runs the outer loop against a deterministic scripted collaborator
//! stack, so the whole machine is exercisable without external services.
//! Frames are persisted as JSONL under the workspace and can be audited
//! offline with `ouro_history::audit::verify_chain`.

use async_trait::async_trait;
use clap::Parser;
use ouro_core::{CancelToken, Desire, Domain, MetaContext, PracticeOutcome, Result};
use ouro_engine::memory::{AlwaysOpenGate, MemoryTrajectoryStore};
use ouro_engine::{
    Crystallizer, CycleEngine, KeywordVerifier, PracticeExecutor, Reflector, TrajectoryRecord,
};
use ouro_history::{FrameLog, JsonlStore};
use ouro_loop::{
    EmergenceDetector, FlatRateMeter, GitCheckpoint, IterationBridge, LoopConfig, LoopController,
    MetaContextBuilder, NoopCheckpoint,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ouro", about = "Recursive self-improvement control loop")]
struct Cli {
    /// Workspace root for frames and checkpoints
    #[arg(long, default_value = "./.ouro")]
    workspace: String,

    /// Path to config file (TOML). Default: <workspace>/ouro.toml
    #[arg(long)]
    config: Option<String>,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Override the configured iteration bound.
    #[arg(long)]
    iterations: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", LoopConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ouro=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workspace = expand_tilde(&cli.workspace);
    std::fs::create_dir_all(&workspace)?;

    let config_path = cli
        .config
        .map(|p| expand_tilde(&p))
        .unwrap_or_else(|| workspace.join("ouro.toml"));
    let mut config = LoopConfig::load(&config_path);
    if let Some(iterations) = cli.iterations {
        config.bounds.max_iterations = Some(iterations);
    }

    let storage = Arc::new(MemoryTrajectoryStore::new());
    let engine = CycleEngine::new(
        Arc::new(ScriptedReflector::default()),
        Arc::new(KeywordVerifier::default()),
        Arc::new(ScriptedPractice {
            storage: storage.clone(),
        }),
        Arc::new(ScriptedCrystallizer),
        storage.clone(),
        Arc::new(AlwaysOpenGate),
        config.cycle.clone(),
    );

    let store = JsonlStore::open(workspace.join("frames.jsonl"))?;
    let log = FrameLog::with_store(Box::new(store));

    let bridge = IterationBridge::new(
        engine,
        log,
        EmergenceDetector::new(config.emergence.clone()),
        MetaContextBuilder::new(config.meta.clone()),
        storage,
        &config.checkpoint,
    )
    .with_meter(Box::new(FlatRateMeter {
        cost_usd: 0.002,
        tokens: 900,
    }));

    let checkpoint: Box<dyn ouro_loop::CheckpointTool> = if config.checkpoint.enabled {
        Box::new(GitCheckpoint::new(&workspace))
    } else {
        Box::new(NoopCheckpoint)
    };

    let mut controller = LoopController::new(bridge, checkpoint, config, CancelToken::new());
    let result = controller.run().await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

// ============================================================
// Scripted demo collaborators
// ============================================================

/// Rotates through a canned desire script so runs are reproducible.
#[derive(Default)]
struct ScriptedReflector {
    calls: AtomicUsize,
}

const SCRIPT: &[(&str, f64, Domain)] = &[
    ("implement a faster tokenizer for markdown input", 0.8, Domain::Code),
    ("prove the triangle inequality holds for the edit metric", 0.7, Domain::Math),
    ("solve the river crossing puzzle with 4 constraints", 0.6, Domain::Logic),
    ("refactor the scheduler to measure queue latency", 0.75, Domain::Code),
    ("plan a 3 step rollout with verifiable milestones", 0.65, Domain::Planning),
    ("benchmark two hash functions and test collision rates", 0.85, Domain::Code),
    ("write a short fable exploring unintended consequences", 0.5, Domain::Creative),
    ("verify the cache invalidation proof covers 2 edge cases", 0.7, Domain::Logic),
];

#[async_trait]
impl Reflector for ScriptedReflector {
    async fn reflect(&self, meta: Option<&MetaContext>) -> Result<Vec<Desire>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(meta) = meta {
            tracing::debug!(
                iteration = meta.iteration,
                trend = ?meta.entropy_trend,
                "reflecting with context"
            );
        }
        let desires = (0..3)
            .map(|offset| {
                let (description, intensity, domain) = SCRIPT[(call + offset) % SCRIPT.len()];
                Desire::new(description, intensity, domain)
            })
            .collect();
        Ok(desires)
    }
}

/// Practice that always attempts and succeeds unless the hypothesis is
/// creative writing, which this stack has no harness for.
struct ScriptedPractice {
    storage: Arc<MemoryTrajectoryStore>,
}

#[async_trait]
impl PracticeExecutor for ScriptedPractice {
    async fn execute(&self, desire: &Desire, domain: Domain) -> Result<PracticeOutcome> {
        let success = domain != Domain::Creative;
        if success {
            self.storage
                .record_capability(format!("practiced:{}", domain), desire.description.clone())
                .await;
            self.storage
                .record_belief(
                    format!("competent:{}", domain),
                    format!("intensity {:.2}", desire.intensity),
                )
                .await;
        }
        Ok(PracticeOutcome {
            success,
            problem: desire.description.clone(),
            approach: "scripted drill".into(),
            solution: if success { "drill completed".into() } else { String::new() },
            attempts: 1,
            difficulty: desire.intensity,
        })
    }
}

/// Distills a one-line heuristic from the trajectory corpus.
struct ScriptedCrystallizer;

#[async_trait]
impl Crystallizer for ScriptedCrystallizer {
    async fn crystallize(
        &self,
        domain: Domain,
        trajectories: &[TrajectoryRecord],
    ) -> Result<Option<String>> {
        Ok(Some(format!(
            "{}: after {} drills, lead with the smallest verifiable step",
            domain,
            trajectories.len()
        )))
    }
}
