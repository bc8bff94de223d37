//! Ouro Engine - the 8-phase cycle state machine
//!
//! REFLECT → VERIFY → COLLAPSE → ROUTE → PRACTICE → RECORD → CRYSTALLIZE
//! → MEASURE, entered without skipping. Collaborators (reflection,
//! verification, practice, storage, oracle gate) are injected as async
//! traits; the engine branches on their results rather than catching
//! broadly. Cancellation is polled once at every phase boundary.

pub mod collaborators;
pub mod collapse;
pub mod cycle;
pub mod memory;
pub mod stats;
pub mod strategy;
pub mod stratify;
pub mod verify;

pub use collaborators::{
    BootstrapState, Crystallizer, OracleGate, PracticeExecutor, Reflector, TrajectoryRecord,
    TrajectoryStore, Verifier,
};
pub use collapse::{collapse, collapse_diverse, Collapsed, FixedSource, RandomSource, ThreadRngSource};
pub use cycle::{CycleConfig, CycleEngine};
pub use stats::RunningStats;
pub use strategy::StrategyStore;
pub use stratify::{get_domain_weight, should_prioritize, stratum_for, Stratum};
pub use verify::KeywordVerifier;
