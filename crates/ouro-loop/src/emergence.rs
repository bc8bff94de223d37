//! Emergence detector - multi-signal termination check
//!
//! Stateless over the frame log: every check recomputes from history, no
//! verdict is cached. Five signals vote; a circular trajectory vetoes
//! everything else.

use ouro_core::EmergenceResult;
use ouro_history::{Frame, FrameLog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergenceConfig {
    /// Frames required before the detector considers emerging at all.
    pub min_cycles: u64,
    /// Window for the entropy-delta signal.
    pub entropy_window: usize,
    /// Entropy delta above this counts as a positive signal.
    pub entropy_threshold: f64,
    /// Window for the circular-pattern veto.
    pub circular_window: usize,
    /// How far back the belief-divergence comparison reaches.
    pub divergence_lookback: u64,
    /// Jaccard divergence above this counts as a positive signal.
    pub divergence_threshold: f64,
    /// Confidence bonus when the frame crystallized a heuristic.
    pub crystallization_bonus: f64,
    /// Confidence at or above this is emergence.
    pub emergence_threshold: f64,
}

impl Default for EmergenceConfig {
    fn default() -> Self {
        Self {
            min_cycles: 50,
            entropy_window: 100,
            entropy_threshold: 0.1,
            circular_window: 50,
            divergence_lookback: 100,
            divergence_threshold: 0.30,
            crystallization_bonus: 0.5,
            emergence_threshold: 0.4,
        }
    }
}

pub struct EmergenceDetector {
    config: EmergenceConfig,
}

impl Default for EmergenceDetector {
    fn default() -> Self {
        Self::new(EmergenceConfig::default())
    }
}

impl EmergenceDetector {
    pub fn new(config: EmergenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmergenceConfig {
        &self.config
    }

    /// Check the newest frame against the full history. Missing data for
    /// any individual signal degrades that signal to false rather than
    /// erroring.
    pub fn check(&self, log: &FrameLog, frame: &Frame) -> EmergenceResult {
        if log.len() < self.config.min_cycles {
            return EmergenceResult::not_emerged("too early");
        }

        // Circular trajectory vetoes regardless of the other signals.
        let circular = log.detect_circular_patterns(self.config.circular_window);
        if circular.is_circular {
            debug!(
                patterns = circular.pattern_count,
                "circular trajectory, emergence vetoed"
            );
            let mut result = EmergenceResult::not_emerged(format!(
                "circular trajectory: {} repeated patterns",
                circular.pattern_count
            ));
            result
                .metrics
                .insert("pattern_count".into(), circular.pattern_count as f64);
            return result;
        }

        let crystallized = frame.heuristic_crystallized.is_some();

        let entropy_delta = log.compute_entropy_delta(self.config.entropy_window);
        let entropy_signal = entropy_delta > self.config.entropy_threshold;

        // The pattern signal is the healthy complement of the veto: a
        // window with zero repeated hypotheses.
        let pattern_signal = circular.pattern_count == 0;

        let capability_signal = !frame.capability_delta.is_empty();

        let divergence = self.belief_divergence(log, frame);
        let divergence_signal = divergence > self.config.divergence_threshold;

        let positives = [
            crystallized,
            entropy_signal,
            pattern_signal,
            capability_signal,
            divergence_signal,
        ]
        .iter()
        .filter(|&&s| s)
        .count();

        let mut confidence = positives as f64 / 5.0;
        if crystallized {
            confidence += self.config.crystallization_bonus;
        }
        let confidence = confidence.min(1.0);
        let emerged = confidence >= self.config.emergence_threshold;

        let reason = if emerged {
            format!("{} of 5 signals positive, confidence {:.2}", positives, confidence)
        } else {
            format!(
                "only {} of 5 signals positive, confidence {:.2}",
                positives, confidence
            )
        };

        if emerged {
            info!(
                sequence = frame.sequence_number,
                confidence, crystallized, "emergence detected"
            );
        }

        let mut result = EmergenceResult {
            emerged,
            confidence,
            reason,
            metrics: Default::default(),
        };
        result.metrics.insert("entropy_delta".into(), entropy_delta);
        result.metrics.insert("belief_divergence".into(), divergence);
        result
            .metrics
            .insert("pattern_count".into(), circular.pattern_count as f64);
        result.metrics.insert("positives".into(), positives as f64);
        result
    }

    /// Jaccard divergence between this frame's belief keys and the frame
    /// `divergence_lookback` steps behind it: 1 - |intersection|/|union|.
    /// No frame that far back, or two empty key sets, reads as 0.0.
    fn belief_divergence(&self, log: &FrameLog, frame: &Frame) -> f64 {
        let Some(past) = log.time_travel(self.config.divergence_lookback) else {
            return 0.0;
        };
        let current: BTreeSet<&String> = frame.belief_delta.keys().collect();
        let previous: BTreeSet<&String> = past.belief_delta.keys().collect();
        let union = current.union(&previous).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = current.intersection(&previous).count();
        1.0 - intersection as f64 / union as f64
    }
}
