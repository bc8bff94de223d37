//! Ouro Loop - resource-bounded outer loop with checkpointing
//!
//! One controller instance owns one bridge, one engine, one frame log.
//! Nothing is shared between instances; parallelism means running several
//! fully isolated controllers.

pub mod bridge;
pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod emergence;
pub mod meta;

pub use bridge::{FlatRateMeter, IterationBridge, IterationOutcome, NullMeter, ResourceMeter};
pub use checkpoint::{CheckpointTool, CommandRunner, GitCheckpoint, NoopCheckpoint};
pub use config::{BoundsConfig, CheckpointConfig, LoopConfig};
pub use controller::LoopController;
pub use emergence::{EmergenceConfig, EmergenceDetector};
pub use meta::{MetaConfig, MetaContextBuilder};
