//! Weighted collapse - pure selection of one desire among candidates
//!
//! Intensities are normalized to a probability distribution and a single
//! uniform draw walks the cumulative mass. Randomness comes through a
//! trait so tests can force the draw.

use crate::stratify;
use ouro_core::{Desire, Domain};
use rand::Rng;
use tracing::debug;

/// External randomness source yielding a uniform value in [0, 1).
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
    fn name(&self) -> &str;
}

/// Thread-local RNG source for production use.
#[derive(Default)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn next_unit(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn name(&self) -> &str {
        "thread_rng"
    }
}

/// Deterministic source for tests: replays a fixed sequence, repeating
/// the last value when exhausted.
pub struct FixedSource {
    values: Vec<f64>,
    index: usize,
}

impl FixedSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, index: 0 }
    }
}

impl RandomSource for FixedSource {
    fn next_unit(&mut self) -> f64 {
        let value = self
            .values
            .get(self.index)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0);
        if self.index < self.values.len() {
            self.index += 1;
        }
        value
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// A selection and the tag describing how it was made: "empty" never
/// appears (that case returns `None`), "single" for a lone candidate,
/// otherwise the randomness source's name.
#[derive(Clone, Debug)]
pub struct Collapsed {
    pub desire: Desire,
    pub tag: String,
}

/// Select one desire by weighted draw. Zero-intensity distributions fall
/// back to uniform; a draw that never crosses the cumulative mass (float
/// edge case) selects the last candidate.
pub fn collapse(candidates: &[Desire], rng: &mut dyn RandomSource) -> Option<Collapsed> {
    match candidates.len() {
        0 => None,
        1 => Some(Collapsed {
            desire: candidates[0].clone(),
            tag: "single".into(),
        }),
        _ => {
            let weights: Vec<f64> = candidates.iter().map(|d| d.intensity).collect();
            Some(weighted_pick(candidates, &weights, rng))
        }
    }
}

/// The cycle engine's production variant: each candidate's intensity is
/// scaled by its domain's stratification weight, then boosted if the
/// domain is absent from the recent-domain history or penalized if seen
/// there more than twice, then collapsed.
pub fn collapse_diverse(
    candidates: &[Desire],
    recent_domains: &[Domain],
    boost: f64,
    penalty: f64,
    rng: &mut dyn RandomSource,
) -> Option<Collapsed> {
    match candidates.len() {
        0 => None,
        1 => Some(Collapsed {
            desire: candidates[0].clone(),
            tag: "single".into(),
        }),
        _ => {
            let weights: Vec<f64> = candidates
                .iter()
                .map(|d| {
                    let seen = recent_domains.iter().filter(|&&r| r == d.domain).count();
                    let factor = if seen == 0 {
                        boost
                    } else if seen > 2 {
                        penalty
                    } else {
                        1.0
                    };
                    d.intensity * factor * stratify::get_domain_weight(d.domain)
                })
                .collect();
            Some(weighted_pick(candidates, &weights, rng))
        }
    }
}

fn weighted_pick(
    candidates: &[Desire],
    weights: &[f64],
    rng: &mut dyn RandomSource,
) -> Collapsed {
    let total: f64 = weights.iter().sum();
    let probabilities: Vec<f64> = if total <= 0.0 {
        // All-zero intensities: uniform distribution.
        vec![1.0 / candidates.len() as f64; candidates.len()]
    } else {
        weights.iter().map(|w| w / total).collect()
    };

    let t = rng.next_unit();
    let mut cumulative = 0.0;
    for (desire, p) in candidates.iter().zip(&probabilities) {
        cumulative += p;
        if cumulative > t {
            debug!(tag = rng.name(), desire = %desire.description, "collapsed");
            return Collapsed {
                desire: desire.clone(),
                tag: rng.name().to_string(),
            };
        }
    }

    // Floating-point underrun: the last candidate takes it.
    Collapsed {
        desire: candidates[candidates.len() - 1].clone(),
        tag: rng.name().to_string(),
    }
}
