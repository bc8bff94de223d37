//! Pluggable novelty metric for the frame entropy score
//!
//! The default is a crude distinct-token proxy. It is deliberately behind
//! a trait so a better metric can be swapped in without touching the
//! chain invariants.

/// Scores a selected desire's description for novelty, bounded to [0, 1].
pub trait NoveltyMetric: Send + Sync {
    fn score(&self, text: &str) -> f64;
}

/// Distinct whitespace-separated tokens, normalized by a divisor and
/// capped at 1.0. Empty text scores 0.0.
pub struct UniqueTokenNovelty {
    divisor: f64,
}

impl UniqueTokenNovelty {
    pub fn new(divisor: f64) -> Self {
        Self {
            divisor: divisor.max(1.0),
        }
    }
}

impl Default for UniqueTokenNovelty {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl NoveltyMetric for UniqueTokenNovelty {
    fn score(&self, text: &str) -> f64 {
        let mut seen = std::collections::HashSet::new();
        for token in text.split_whitespace() {
            seen.insert(token.to_lowercase());
        }
        (seen.len() as f64 / self.divisor).min(1.0)
    }
}
