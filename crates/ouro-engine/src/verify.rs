//! Default verification scoring
//!
//! Provenance: 1.0 for pure reflection, 0.3 when an external request
//! influenced the desire, 0.0 otherwise. Specificity: fast keyword
//! heuristic; ambiguous mid-band scores can delegate to a secondary
//! scorer. Combined = 0.5 * provenance + 0.5 * specificity.

use async_trait::async_trait;
use ouro_core::{Desire, DesireOrigin, Result, Verification};

use crate::collaborators::Verifier;

/// Secondary scorer consulted only when the keyword heuristic lands in
/// the ambiguous band.
pub trait SpecificityScorer: Send + Sync {
    fn score(&self, description: &str) -> f64;
}

const CONCRETE_MARKERS: [&str; 8] = [
    "implement", "measure", "prove", "solve", "refactor", "benchmark", "verify", "test",
];

const VAGUE_MARKERS: [&str; 6] = ["better", "improve", "somehow", "stuff", "things", "more"];

pub fn provenance_score(desire: &Desire) -> f64 {
    match desire.provenance.origin {
        DesireOrigin::Reflection => 1.0,
        _ if desire.provenance.external_request.is_some() => 0.3,
        _ => 0.0,
    }
}

/// Keyword heuristic in [0, 1]: concrete verbs and numerals raise the
/// score, filler words lower it, longer descriptions get a small bump.
pub fn specificity_score(description: &str) -> f64 {
    let lower = description.to_lowercase();
    let mut score: f64 = 0.5;

    for marker in CONCRETE_MARKERS {
        if lower.contains(marker) {
            score += 0.15;
        }
    }
    for marker in VAGUE_MARKERS {
        if lower.contains(marker) {
            score -= 0.15;
        }
    }
    if lower.chars().any(|c| c.is_ascii_digit()) {
        score += 0.1;
    }
    if lower.split_whitespace().count() >= 6 {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

/// Stock verifier: keyword specificity with optional delegation for
/// ambiguous cases.
pub struct KeywordVerifier {
    secondary: Option<Box<dyn SpecificityScorer>>,
    /// Scores within this distance of 0.5 are considered ambiguous.
    ambiguous_band: f64,
}

impl Default for KeywordVerifier {
    fn default() -> Self {
        Self {
            secondary: None,
            ambiguous_band: 0.1,
        }
    }
}

impl KeywordVerifier {
    pub fn with_secondary(scorer: Box<dyn SpecificityScorer>) -> Self {
        Self {
            secondary: Some(scorer),
            ambiguous_band: 0.1,
        }
    }
}

#[async_trait]
impl Verifier for KeywordVerifier {
    async fn verify(&self, desire: &Desire) -> Result<Verification> {
        let provenance = provenance_score(desire);
        let mut specificity = specificity_score(&desire.description);

        if let Some(secondary) = &self.secondary {
            if (specificity - 0.5).abs() <= self.ambiguous_band {
                specificity = secondary.score(&desire.description).clamp(0.0, 1.0);
            }
        }

        let score = 0.5 * provenance + 0.5 * specificity;
        Ok(Verification {
            score,
            provenance_score: provenance,
            specificity_score: specificity,
            rejection_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ouro_core::{Domain, Provenance};

    #[test]
    fn reflection_provenance_is_full() {
        let desire = Desire::new("x", 0.5, Domain::Code);
        assert_eq!(provenance_score(&desire), 1.0);
    }

    #[test]
    fn external_request_is_penalized() {
        let desire = Desire::new("x", 0.5, Domain::Code)
            .with_provenance(Provenance::external("please do this"));
        assert_eq!(provenance_score(&desire), 0.3);
    }

    #[test]
    fn bootstrap_without_request_scores_zero() {
        let desire = Desire::new("x", 0.5, Domain::Code).with_provenance(Provenance::bootstrap());
        assert_eq!(provenance_score(&desire), 0.0);
    }

    #[test]
    fn concrete_beats_vague() {
        let concrete = specificity_score("implement and benchmark a b-tree with 3 page sizes");
        let vague = specificity_score("get better at stuff");
        assert!(concrete > vague);
        assert!(concrete >= 0.8);
        assert!(vague <= 0.3);
    }

    #[tokio::test]
    async fn combined_score_accepts_specific_reflection() {
        let verifier = KeywordVerifier::default();
        let desire = Desire::new(
            "implement and test a streaming parser for chunked input",
            0.8,
            Domain::Code,
        );
        let verdict = verifier.verify(&desire).await.unwrap();
        assert!(verdict.score >= 0.6, "got {}", verdict.score);
        assert_eq!(verdict.provenance_score, 1.0);
    }

    #[tokio::test]
    async fn secondary_scorer_handles_ambiguous_band() {
        struct Pessimist;
        impl SpecificityScorer for Pessimist {
            fn score(&self, _: &str) -> f64 {
                0.05
            }
        }

        let verifier = KeywordVerifier::with_secondary(Box::new(Pessimist));
        // No markers, short: keyword heuristic lands on 0.5 (ambiguous).
        let desire = Desire::new("reorganize notes", 0.5, Domain::General);
        let verdict = verifier.verify(&desire).await.unwrap();
        assert!((verdict.specificity_score - 0.05).abs() < f64::EPSILON);
    }
}
