//! Frame - immutable snapshot of one cycle's outcome

use chrono::{DateTime, Utc};
use ouro_core::{Domain, Phase, ResourceUsage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Summary of the desire a cycle collapsed to. Only the fields that feed
/// the content hash and the pattern queries are kept.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SelectedDesire {
    pub description: String,
    pub domain: Domain,
    pub intensity: f64,
}

/// One hash-chained snapshot. Created exactly once per outer-loop
/// iteration by `FrameLog::write_frame`; never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    pub sequence_number: u64,
    pub cycle_id: String,
    pub timestamp: DateTime<Utc>,
    pub phase_reached: Phase,
    pub desires_generated: usize,
    pub desires_verified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_desire: Option<SelectedDesire>,
    pub practice_succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic_crystallized: Option<String>,
    #[serde(default)]
    pub belief_delta: BTreeMap<String, String>,
    #[serde(default)]
    pub capability_delta: BTreeMap<String, String>,
    pub entropy_score: f64,
    pub iteration_number: u64,
    pub resource_usage: ResourceUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
    pub content_hash: String,
}

impl Frame {
    /// Recompute this frame's content hash from its own fields. Any reader
    /// can call this to verify the stored value.
    pub fn recompute_hash(&self) -> String {
        compute_content_hash(
            &self.cycle_id,
            self.phase_reached,
            self.selected_desire.as_ref(),
            self.heuristic_crystallized.as_deref(),
            self.parent_hash.as_deref(),
        )
    }

    pub fn hash_matches(&self) -> bool {
        self.recompute_hash() == self.content_hash
    }
}

/// Deterministic content hash over the chain-relevant fields. The preimage
/// uses a fixed field order with `|` separators and fixed-precision floats
/// so the hash is reproducible across writers.
pub fn compute_content_hash(
    cycle_id: &str,
    phase_reached: Phase,
    selected_desire: Option<&SelectedDesire>,
    heuristic_crystallized: Option<&str>,
    parent_hash: Option<&str>,
) -> String {
    let mut preimage = String::new();
    preimage.push_str(cycle_id);
    preimage.push('|');
    preimage.push_str(phase_reached.as_str());
    preimage.push('|');
    match selected_desire {
        Some(d) => {
            preimage.push_str(&d.description);
            preimage.push('|');
            preimage.push_str(d.domain.as_str());
            preimage.push('|');
            preimage.push_str(&format!("{:.6}", d.intensity));
        }
        None => preimage.push_str("none"),
    }
    preimage.push('|');
    preimage.push_str(heuristic_crystallized.unwrap_or("none"));
    preimage.push('|');
    preimage.push_str(parent_hash.unwrap_or("genesis"));

    let digest = Sha256::digest(preimage.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desire() -> SelectedDesire {
        SelectedDesire {
            description: "improve recursion handling".into(),
            domain: Domain::Code,
            intensity: 0.8,
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let a = compute_content_hash("c-1", Phase::Measure, Some(&desire()), Some("h"), None);
        let b = compute_content_hash("c-1", Phase::Measure, Some(&desire()), Some("h"), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_differs_per_field() {
        let base = compute_content_hash("c-1", Phase::Measure, Some(&desire()), None, None);
        assert_ne!(
            base,
            compute_content_hash("c-2", Phase::Measure, Some(&desire()), None, None)
        );
        assert_ne!(
            base,
            compute_content_hash("c-1", Phase::Record, Some(&desire()), None, None)
        );
        assert_ne!(
            base,
            compute_content_hash("c-1", Phase::Measure, None, None, None)
        );
        assert_ne!(
            base,
            compute_content_hash("c-1", Phase::Measure, Some(&desire()), None, Some("abc"))
        );
    }
}
