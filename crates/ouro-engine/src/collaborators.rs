//! Collaborator traits - the narrow interfaces the scheduler consumes
//!
//! Everything outside the control loop (text generation, practice,
//! storage) sits behind one of these. All calls are the engine's only
//! suspension points; each collaborator owns its own timeouts.

use async_trait::async_trait;
use ouro_core::{Desire, Domain, MetaContext, PracticeOutcome, Result, Verification};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generates candidate desires for the next cycle. Returning an empty
/// list is a valid outcome, not an error.
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(&self, meta_context: Option<&MetaContext>) -> Result<Vec<Desire>>;
}

/// Scores a desire for acceptance during VERIFY.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, desire: &Desire) -> Result<Verification>;
}

/// Executes one practice attempt for the collapsed-to desire.
#[async_trait]
pub trait PracticeExecutor: Send + Sync {
    async fn execute(&self, desire: &Desire, domain: Domain) -> Result<PracticeOutcome>;
}

/// Distills repeated successful trajectories into a reusable heuristic.
/// `None` means the trajectories did not yield anything worth keeping.
#[async_trait]
pub trait Crystallizer: Send + Sync {
    async fn crystallize(
        &self,
        domain: Domain,
        trajectories: &[TrajectoryRecord],
    ) -> Result<Option<String>>;
}

/// The "can I practice this domain right now" gate.
#[async_trait]
pub trait OracleGate: Send + Sync {
    async fn can_practice(&self, domain: Domain) -> Result<bool>;
}

/// One recorded problem/approach/outcome triple feeding crystallization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub desire: String,
    pub domain: Domain,
    pub problem: String,
    pub solution: String,
    pub approach: String,
    pub success: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Per-domain crystallization state. The trajectory threshold is lower
/// while a domain is bootstrapping and raised permanently after its
/// first successful crystallization.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct BootstrapState {
    pub crystallized_once: bool,
}

/// Durable storage for trajectories, heuristics, bootstrap state, and the
/// belief/capability deltas accumulated between iterations.
#[async_trait]
pub trait TrajectoryStore: Send + Sync {
    async fn append_trajectory(&self, record: TrajectoryRecord) -> Result<()>;

    async fn read_successful_trajectories(
        &self,
        domain: Domain,
        limit: usize,
    ) -> Result<Vec<TrajectoryRecord>>;

    async fn store_or_merge_heuristic(
        &self,
        domain: Domain,
        content: &str,
        trajectory_count: usize,
    ) -> Result<()>;

    async fn read_bootstrap_state(&self, domain: Domain) -> Result<BootstrapState>;

    async fn write_bootstrap_state(&self, domain: Domain, state: BootstrapState) -> Result<()>;

    /// Take the belief and capability deltas accumulated since the last
    /// call. Consumed once per outer-loop iteration when writing a frame.
    async fn drain_deltas(
        &self,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>)>;
}
