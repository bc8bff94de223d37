//! Loop configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use crate::emergence::EmergenceConfig;
use crate::meta::MetaConfig;
use ouro_engine::CycleConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Hard resource bounds; any unset bound is unenforced.
    pub bounds: BoundsConfig,
    /// Checkpoint cadence and tagging.
    pub checkpoint: CheckpointConfig,
    /// Meta-context injection into reflection.
    pub meta: MetaConfig,
    /// Emergence detector thresholds.
    pub emergence: EmergenceConfig,
    /// Cycle engine knobs (acceptance threshold, crystallization gates).
    pub cycle: CycleConfig,
    /// Trailing iteration summaries kept on the final result.
    pub recent_iterations_kept: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    /// Stop after this many iterations.
    pub max_iterations: Option<u64>,
    /// Stop once accumulated cost reaches this.
    pub max_cost_usd: Option<f64>,
    /// Stop once wall-clock time reaches this.
    pub max_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Whether checkpoint-due iterations actually run the tool.
    pub enabled: bool,
    /// Checkpoint every N iterations (0 disables the interval trigger;
    /// crystallization and emergence still trigger).
    pub interval: u64,
    /// Prefix for annotated tag names.
    pub tag_prefix: String,
}

// ============================================================
// Defaults
// ============================================================

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            bounds: BoundsConfig::default(),
            checkpoint: CheckpointConfig::default(),
            meta: MetaConfig::default(),
            emergence: EmergenceConfig::default(),
            cycle: CycleConfig::default(),
            recent_iterations_kept: 20,
        }
    }
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(100),
            max_cost_usd: None,
            max_time_seconds: None,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 10,
            tag_prefix: "ouro".into(),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl LoopConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
