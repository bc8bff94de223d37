//! FrameLog - owner of the hash chain
//!
//! Exactly one writer per log. The outer loop is single-threaded per
//! controller instance, so frames append in strict sequence with no
//! interleaving and no locks.

use crate::frame::{compute_content_hash, Frame, SelectedDesire};
use crate::novelty::{NoveltyMetric, UniqueTokenNovelty};
use crate::store::{FrameStore, MemoryStore};
use chrono::{DateTime, Utc};
use ouro_core::{CycleResult, ResourceUsage, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Result of the circular-pattern query over a trailing window.
#[derive(Clone, Debug, Default)]
pub struct CircularPatternReport {
    pub is_circular: bool,
    pub pattern_count: usize,
    pub repeated_descriptions: Vec<String>,
}

/// Descriptions are normalized before counting: lowercased and truncated
/// to this many characters.
const NORMALIZE_MAX_CHARS: usize = 100;

pub struct FrameLog {
    store: Box<dyn FrameStore>,
    novelty: Box<dyn NoveltyMetric>,
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLog {
    /// In-memory log with the default novelty metric.
    pub fn new() -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            novelty: Box::new(UniqueTokenNovelty::default()),
        }
    }

    pub fn with_store(store: Box<dyn FrameStore>) -> Self {
        Self {
            store,
            novelty: Box::new(UniqueTokenNovelty::default()),
        }
    }

    pub fn set_novelty_metric(&mut self, metric: Box<dyn NoveltyMetric>) {
        self.novelty = metric;
    }

    /// Fold a cycle result into the next frame and append it. Assigns the
    /// next sequence number, links `parent_hash` to the previous frame's
    /// content hash, and computes the entropy score over the selected
    /// desire's description.
    pub fn write_frame(
        &mut self,
        cycle: &CycleResult,
        belief_delta: BTreeMap<String, String>,
        capability_delta: BTreeMap<String, String>,
        iteration: u64,
        resource_usage: ResourceUsage,
    ) -> Result<Frame> {
        let sequence_number = self.store.len();
        let parent_hash = self.store.last().map(|f| f.content_hash.clone());

        let selected_desire = cycle.selected_desire.as_ref().map(|d| SelectedDesire {
            description: d.description.clone(),
            domain: d.domain,
            intensity: d.intensity,
        });

        let entropy_score = selected_desire
            .as_ref()
            .map(|d| self.novelty.score(&d.description))
            .unwrap_or(0.0);

        let content_hash = compute_content_hash(
            &cycle.cycle_id,
            cycle.phase_reached,
            selected_desire.as_ref(),
            cycle.heuristic_crystallized.as_deref(),
            parent_hash.as_deref(),
        );

        let frame = Frame {
            sequence_number,
            cycle_id: cycle.cycle_id.clone(),
            timestamp: Utc::now(),
            phase_reached: cycle.phase_reached,
            desires_generated: cycle.desires_generated,
            desires_verified: cycle.desires_verified,
            selected_desire,
            practice_succeeded: cycle.practice_succeeded,
            heuristic_crystallized: cycle.heuristic_crystallized.clone(),
            belief_delta,
            capability_delta,
            entropy_score,
            iteration_number: iteration,
            resource_usage,
            parent_hash,
            content_hash,
        };

        debug!(
            sequence = frame.sequence_number,
            cycle = %frame.cycle_id,
            phase = %frame.phase_reached,
            entropy = frame.entropy_score,
            "frame written"
        );

        self.store.append(frame.clone())?;
        Ok(frame)
    }

    /// Frame `n` steps back from the newest: index `len - n - 1`.
    /// Out of range is `None`, never an error.
    pub fn time_travel(&self, n: u64) -> Option<Frame> {
        let len = self.store.len();
        if n >= len {
            return None;
        }
        self.store.get(len - n - 1).cloned()
    }

    /// Average entropy over the most recent `window/2` frames minus the
    /// average over the `window/2` frames immediately preceding them.
    /// An odd window ignores its oldest frame. Returns 0.0 when fewer
    /// than `window` frames exist.
    pub fn compute_entropy_delta(&self, window: usize) -> f64 {
        let frames = self.store.frames();
        if window == 0 || frames.len() < window {
            return 0.0;
        }
        let half = window / 2;
        if half == 0 {
            return 0.0;
        }
        let tail = &frames[frames.len() - window..];
        let earlier: f64 = tail[window - 2 * half..window - half]
            .iter()
            .map(|f| f.entropy_score)
            .sum::<f64>()
            / half as f64;
        let recent: f64 = tail[window - half..]
            .iter()
            .map(|f| f.entropy_score)
            .sum::<f64>()
            / half as f64;
        recent - earlier
    }

    /// Count normalized selected-desire descriptions over the last `window`
    /// frames. Circular when more than 2 distinct descriptions each occur
    /// 3 or more times — the loop is grinding the same hypotheses.
    pub fn detect_circular_patterns(&self, window: usize) -> CircularPatternReport {
        let frames = self.store.frames();
        let start = frames.len().saturating_sub(window);

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for frame in &frames[start..] {
            if let Some(desire) = &frame.selected_desire {
                let normalized = normalize_description(&desire.description);
                *counts.entry(normalized).or_insert(0) += 1;
            }
        }

        let repeated_descriptions: Vec<String> = counts
            .iter()
            .filter(|(_, &count)| count >= 3)
            .map(|(desc, _)| desc.clone())
            .collect();

        CircularPatternReport {
            is_circular: repeated_descriptions.len() > 2,
            pattern_count: repeated_descriptions.len(),
            repeated_descriptions,
        }
    }

    /// Case-insensitive substring search over descriptions and crystallized
    /// heuristics, newest first.
    pub fn search_semantic(&self, query: &str, limit: usize) -> Vec<Frame> {
        let needle = query.to_lowercase();
        self.store
            .frames()
            .iter()
            .rev()
            .filter(|f| {
                f.selected_desire
                    .as_ref()
                    .is_some_and(|d| d.description.to_lowercase().contains(&needle))
                    || f.heuristic_crystallized
                        .as_ref()
                        .is_some_and(|h| h.to_lowercase().contains(&needle))
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Frames whose timestamp falls in `[start, end]`, in chain order.
    pub fn get_temporal_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Frame> {
        self.store
            .frames()
            .iter()
            .filter(|f| f.timestamp >= start && f.timestamp <= end)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn last(&self) -> Option<Frame> {
        self.store.last().cloned()
    }

    pub fn frames(&self) -> &[Frame] {
        self.store.frames()
    }
}

fn normalize_description(description: &str) -> String {
    description
        .to_lowercase()
        .chars()
        .take(NORMALIZE_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ouro_core::{Desire, Domain, Phase};

    fn cycle_with(description: &str) -> CycleResult {
        let mut result = CycleResult::new(format!("cycle-{}", description.len()));
        result.phase_reached = Phase::Measure;
        result.selected_desire = Some(Desire::new(description, 0.7, Domain::Code));
        result
    }

    fn write(log: &mut FrameLog, description: &str, iteration: u64) -> Frame {
        log.write_frame(
            &cycle_with(description),
            BTreeMap::new(),
            BTreeMap::new(),
            iteration,
            ResourceUsage::default(),
        )
        .unwrap()
    }

    #[test]
    fn first_frame_has_no_parent() {
        let mut log = FrameLog::new();
        let frame = write(&mut log, "learn to parse expressions", 0);
        assert_eq!(frame.sequence_number, 0);
        assert!(frame.parent_hash.is_none());
        assert!(frame.hash_matches());
    }

    #[test]
    fn chain_links_parent_to_content() {
        let mut log = FrameLog::new();
        let first = write(&mut log, "one", 0);
        let second = write(&mut log, "two", 1);
        assert_eq!(second.parent_hash.as_deref(), Some(first.content_hash.as_str()));
        assert_eq!(second.sequence_number, 1);
    }

    #[test]
    fn time_travel_indexes_from_newest() {
        let mut log = FrameLog::new();
        for i in 0..5 {
            write(&mut log, &format!("desire {}", i), i);
        }
        assert_eq!(log.time_travel(0).unwrap().sequence_number, 4);
        assert_eq!(log.time_travel(4).unwrap().sequence_number, 0);
        assert!(log.time_travel(5).is_none());
    }

    #[test]
    fn entropy_delta_zero_below_window() {
        let mut log = FrameLog::new();
        for i in 0..9 {
            write(&mut log, &format!("desire {}", i), i);
        }
        assert_eq!(log.compute_entropy_delta(10), 0.0);
    }

    #[test]
    fn entropy_delta_positive_when_novelty_rises() {
        let mut log = FrameLog::new();
        // First half: one-token descriptions. Second half: rich ones.
        for i in 0..5 {
            write(&mut log, "same", i);
        }
        for i in 5..10 {
            write(
                &mut log,
                &format!("explore completely different avenue number {} today", i),
                i,
            );
        }
        assert!(log.compute_entropy_delta(10) > 0.0);
    }

    #[test]
    fn odd_window_halves_are_adjacent() {
        let mut log = FrameLog::new();
        // Window 5, halves of 2. The middle frame is the only novel one;
        // it must land in the earlier half, not fall into a gap.
        write(&mut log, "same", 0);
        write(&mut log, "same", 1);
        write(&mut log, "alpha beta gamma delta epsilon zeta", 2);
        write(&mut log, "same", 3);
        write(&mut log, "same", 4);
        assert!(log.compute_entropy_delta(5) < 0.0);
    }

    #[test]
    fn circular_detection_requires_three_repeaters() {
        let mut log = FrameLog::new();
        // Two descriptions repeated 3+ times: pattern_count 2, not circular.
        for i in 0..3 {
            write(&mut log, "alpha pattern", i);
            write(&mut log, "beta pattern", i);
        }
        let report = log.detect_circular_patterns(50);
        assert_eq!(report.pattern_count, 2);
        assert!(!report.is_circular);

        // A third repeater tips it over.
        for i in 0..3 {
            write(&mut log, "gamma pattern", 10 + i);
        }
        let report = log.detect_circular_patterns(50);
        assert_eq!(report.pattern_count, 3);
        assert!(report.is_circular);
    }

    #[test]
    fn circular_detection_normalizes_case() {
        let mut log = FrameLog::new();
        for desc in ["Repeat Me", "repeat me", "REPEAT ME"] {
            write(&mut log, desc, 0);
        }
        let report = log.detect_circular_patterns(50);
        assert_eq!(report.pattern_count, 1);
        assert_eq!(report.repeated_descriptions, vec!["repeat me".to_string()]);
    }

    #[test]
    fn search_matches_description_and_heuristic() {
        let mut log = FrameLog::new();
        write(&mut log, "master borrow checker errors", 0);
        let mut cycle = cycle_with("unrelated");
        cycle.heuristic_crystallized = Some("prefer iterators over index loops".into());
        log.write_frame(&cycle, BTreeMap::new(), BTreeMap::new(), 1, ResourceUsage::default())
            .unwrap();

        assert_eq!(log.search_semantic("BORROW", 10).len(), 1);
        assert_eq!(log.search_semantic("iterators", 10).len(), 1);
        assert!(log.search_semantic("nonexistent", 10).is_empty());
    }
}
