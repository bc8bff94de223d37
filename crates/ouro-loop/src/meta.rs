//! Meta-context builder - advisory state injected into reflection
//!
//! Purely informational. Nothing here affects control flow, and the whole
//! feature can be switched off.

use chrono::{Duration, Utc};
use ouro_core::{EntropyTrend, MetaContext};
use ouro_history::FrameLog;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Master switch. Off means reflection sees no context at all.
    pub meta_awareness: bool,
    /// Short window for the entropy trend.
    pub trend_window: usize,
    /// Entropy deltas inside this band read as stable.
    pub trend_dead_band: f64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            meta_awareness: true,
            trend_window: 20,
            trend_dead_band: 0.05,
        }
    }
}

pub struct MetaContextBuilder {
    config: MetaConfig,
}

impl MetaContextBuilder {
    pub fn new(config: MetaConfig) -> Self {
        Self { config }
    }

    /// `None` when meta-awareness is disabled.
    pub fn build(
        &self,
        log: &FrameLog,
        iteration: u64,
        elapsed_seconds: f64,
        budget_remaining_hint: Option<f64>,
    ) -> Option<MetaContext> {
        if !self.config.meta_awareness {
            return None;
        }

        let delta = log.compute_entropy_delta(self.config.trend_window);
        let entropy_trend = if delta > self.config.trend_dead_band {
            EntropyTrend::Increasing
        } else if delta < -self.config.trend_dead_band {
            EntropyTrend::Decreasing
        } else {
            EntropyTrend::Stable
        };

        let hour_ago = Utc::now() - Duration::hours(1);
        let recent_crystallizations = log
            .frames()
            .iter()
            .filter(|f| f.heuristic_crystallized.is_some() && f.timestamp >= hour_ago)
            .count();

        Some(MetaContext {
            iteration,
            total_frames: log.len(),
            entropy_trend,
            recent_crystallizations,
            elapsed_seconds,
            budget_remaining_hint,
        })
    }
}
