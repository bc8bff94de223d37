//! Core types for the Ouro improvement loop

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The six practice domains. Closed set — unknown domain strings map to
/// `General` at the parsing boundary, never deeper in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Code,
    Math,
    Logic,
    Planning,
    Creative,
    General,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Code,
        Domain::Math,
        Domain::Logic,
        Domain::Planning,
        Domain::Creative,
        Domain::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Code => "code",
            Domain::Math => "math",
            Domain::Logic => "logic",
            Domain::Planning => "planning",
            Domain::Creative => "creative",
            Domain::General => "general",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "code" | "coding" | "programming" => Domain::Code,
            "math" | "mathematics" => Domain::Math,
            "logic" | "reasoning" => Domain::Logic,
            "planning" => Domain::Planning,
            "creative" | "writing" => Domain::Creative,
            _ => Domain::General,
        })
    }
}

/// The eight cycle phases, in execution order. A cycle enters them without
/// skipping; `phase_reached` on a result names the last phase completed or
/// interrupted at.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Reflect,
    Verify,
    Collapse,
    Route,
    Practice,
    Record,
    Crystallize,
    Measure,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Reflect,
        Phase::Verify,
        Phase::Collapse,
        Phase::Route,
        Phase::Practice,
        Phase::Record,
        Phase::Crystallize,
        Phase::Measure,
    ];

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Reflect => "reflect",
            Phase::Verify => "verify",
            Phase::Collapse => "collapse",
            Phase::Route => "route",
            Phase::Practice => "practice",
            Phase::Record => "record",
            Phase::Crystallize => "crystallize",
            Phase::Measure => "measure",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a desire came from. Pure reflection scores highest at VERIFY;
/// externally-requested desires are provenance-penalized.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DesireOrigin {
    Reflection,
    External,
    Bootstrap,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Provenance {
    pub origin: DesireOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_request: Option<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
}

impl Provenance {
    pub fn reflection() -> Self {
        Self {
            origin: DesireOrigin::Reflection,
            external_request: None,
            source_ids: Vec::new(),
        }
    }

    pub fn external(request: impl Into<String>) -> Self {
        Self {
            origin: DesireOrigin::External,
            external_request: Some(request.into()),
            source_ids: Vec::new(),
        }
    }

    pub fn bootstrap() -> Self {
        Self {
            origin: DesireOrigin::Bootstrap,
            external_request: None,
            source_ids: Vec::new(),
        }
    }
}

/// An improvement hypothesis. Created by the reflection collaborator,
/// consumed once per cycle, never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Desire {
    pub description: String,
    pub intensity: f64,
    pub domain: Domain,
    pub provenance: Provenance,
}

impl Desire {
    /// Intensity is clamped into [0, 1] at construction so downstream
    /// probability math never sees out-of-range values.
    pub fn new(description: impl Into<String>, intensity: f64, domain: Domain) -> Self {
        Self {
            description: description.into(),
            intensity: intensity.clamp(0.0, 1.0),
            domain,
            provenance: Provenance::reflection(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// Outcome of one practice attempt, as reported by the practice executor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PracticeOutcome {
    pub success: bool,
    pub problem: String,
    pub approach: String,
    pub solution: String,
    pub attempts: u32,
    pub difficulty: f64,
}

/// Verdict from the verification collaborator for a single desire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verification {
    /// Combined score: 0.5 * provenance + 0.5 * specificity.
    pub score: f64,
    pub provenance_score: f64,
    pub specificity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Resource consumption snapshot for one iteration (or a running total).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceUsage {
    pub elapsed_seconds: f64,
    pub cost_usd: f64,
    pub tokens: u64,
}

impl ResourceUsage {
    pub fn accumulate(&mut self, other: &ResourceUsage) {
        self.elapsed_seconds += other.elapsed_seconds;
        self.cost_usd += other.cost_usd;
        self.tokens += other.tokens;
    }
}

/// Result of one cycle engine invocation. Owned by that invocation;
/// folded into a Frame and running statistics, then discarded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: String,
    pub phase_reached: Phase,
    pub desires_generated: usize,
    pub desires_verified: usize,
    pub desires_rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_desire: Option<Desire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    pub domain_blocked: bool,
    pub practice_attempted: bool,
    pub practice_succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practice_details: Option<PracticeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic_crystallized: Option<String>,
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleResult {
    pub fn new(cycle_id: impl Into<String>) -> Self {
        Self {
            cycle_id: cycle_id.into(),
            phase_reached: Phase::Reflect,
            desires_generated: 0,
            desires_verified: 0,
            desires_rejected: 0,
            selected_desire: None,
            domain: None,
            domain_blocked: false,
            practice_attempted: false,
            practice_succeeded: false,
            practice_details: None,
            heuristic_crystallized: None,
            interrupted: false,
            cancellation_reason: None,
            error: None,
        }
    }
}

/// The detector's verdict for one frame. Recomputed fresh on every check;
/// only the boolean drives the loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmergenceResult {
    pub emerged: bool,
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl EmergenceResult {
    pub fn not_emerged(reason: impl Into<String>) -> Self {
        Self {
            emerged: false,
            confidence: 0.0,
            reason: reason.into(),
            metrics: BTreeMap::new(),
        }
    }
}

/// Direction of the short-window entropy delta, with a dead-band so small
/// wobbles read as stable.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntropyTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Advisory context injected into the next cycle's reflection call.
/// Never affects control flow; can be disabled entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetaContext {
    pub iteration: u64,
    pub total_frames: u64,
    pub entropy_trend: EntropyTrend,
    /// Crystallizations in the trailing hour.
    pub recent_crystallizations: usize,
    pub elapsed_seconds: f64,
    /// Coarse fraction of budget remaining, when bounds are configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_remaining_hint: Option<f64>,
}

/// Why the outer loop stopped. Every exit path yields exactly one of these.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmergenceDetected,
    MaxIterations,
    MaxCost,
    MaxTime,
    Error,
    ManualStop,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::EmergenceDetected => "emergence_detected",
            StopReason::MaxIterations => "max_iterations",
            StopReason::MaxCost => "max_cost",
            StopReason::MaxTime => "max_time",
            StopReason::Error => "error",
            StopReason::ManualStop => "manual_stop",
        };
        write!(f, "{}", s)
    }
}

/// One line of trailing loop history carried in the LoopResult.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: u64,
    pub cycle_id: String,
    pub phase_reached: Phase,
    pub emergence_confidence: f64,
    pub crystallized: bool,
}

/// Terminal result of the outer loop. Produced once, at loop exit,
/// always fully populated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopResult {
    pub terminated: bool,
    pub reason: StopReason,
    pub iterations_completed: u64,
    pub total_time_seconds: f64,
    pub total_cost_usd: f64,
    pub total_tokens: u64,
    pub checkpoints_created: u32,
    #[serde(default)]
    pub recent_iterations: Vec<IterationSummary>,
}
