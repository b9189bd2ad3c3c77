//! Scored result buffer shared by all engines.
//!
//! This module provides:
//! - `Candidate`: a single scored result (matched source or predicted symbol)
//! - `ResultSet`: the accumulation buffer with lazy, idempotent finalization
//!
//! Engines push candidates in whatever order their scan produces them and
//! mark the buffer dirty. The first getter after a dirty cycle finalizes:
//! sort by score descending, truncate to the result limit, rebuild the
//! value/score projections. Further getters are free.

use serde::{Deserialize, Serialize};

/// A single result with an associated score.
///
/// Scores are on a relative scale; higher is better. Fuzzy engines use raw
/// overlap strength (with `f32::INFINITY` as the exact-match sentinel before
/// normalization), predict engines use probabilities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<V> {
    pub value: V,
    pub score: f32,
}

impl<V> Candidate<V> {
    pub fn new(value: V, score: f32) -> Self {
        Candidate { value, score }
    }
}

/// Result buffer with a dirty flag and cached projections.
#[derive(Debug, Clone)]
pub struct ResultSet<V> {
    entries: Vec<Candidate<V>>,
    values: Vec<V>,
    scores: Vec<f32>,
    limit: usize,
    dirty: bool,
}

impl<V: Clone> ResultSet<V> {
    /// Create an empty result set keeping at most `limit` entries.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            values: Vec::new(),
            scores: Vec::new(),
            limit: limit.max(1),
            dirty: false,
        }
    }

    /// Maximum number of entries retained by `finalize`.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the result limit. Takes effect at the next finalization.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.dirty = true;
    }

    /// Empty the buffer and its projections.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.values.clear();
        self.scores.clear();
        self.dirty = true;
    }

    /// Append a candidate to the raw buffer.
    pub fn push(&mut self, candidate: Candidate<V>) {
        self.entries.push(candidate);
        self.dirty = true;
    }

    /// Replace the raw buffer wholesale (used by cached query paths).
    pub fn replace(&mut self, entries: Vec<Candidate<V>>) {
        self.entries = entries;
        self.values.clear();
        self.scores.clear();
        self.dirty = true;
    }

    /// Flag the buffer as needing finalization.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Sort, truncate and project. Idempotent: a clean buffer is untouched.
    ///
    /// Sorting is by score descending; `sort_by` is stable, so equal scores
    /// keep their insertion order.
    pub fn finalize(&mut self) {
        if !self.dirty {
            return;
        }
        self.entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if self.entries.len() > self.limit {
            self.entries.truncate(self.limit);
        }
        self.values.clear();
        self.scores.clear();
        for entry in &self.entries {
            self.values.push(entry.value.clone());
            self.scores.push(entry.score);
        }
        self.dirty = false;
    }

    /// Finalized entries, best first.
    pub fn entries(&mut self) -> &[Candidate<V>] {
        self.finalize();
        &self.entries
    }

    /// Finalized value projection.
    pub fn values(&mut self) -> &[V] {
        self.finalize();
        &self.values
    }

    /// Finalized score projection.
    pub fn scores(&mut self) -> &[f32] {
        self.finalize();
        &self.scores
    }

    /// Best entry, or `None` when empty.
    pub fn top(&mut self) -> Option<&Candidate<V>> {
        self.finalize();
        self.entries.first()
    }

    /// Best value, or `None` when empty.
    pub fn top_value(&mut self) -> Option<&V> {
        self.finalize();
        self.values.first()
    }

    /// Best score, or `0.0` when empty.
    pub fn top_score(&mut self) -> f32 {
        self.finalize();
        self.scores.first().copied().unwrap_or(0.0)
    }

    /// Number of finalized entries.
    pub fn len(&mut self) -> usize {
        self.finalize();
        self.entries.len()
    }

    /// True when no entries survive finalization.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

/// Normalize raw overlap strengths in place (fuzzy matchers).
///
/// An infinite strength marks an exact match: that entry becomes 1 and all
/// others 0. Otherwise every strength is divided by the finite total, so the
/// surviving strengths lie in [0, 1] and sum to 1 whenever any candidate
/// exists. An all-zero buffer is left untouched.
pub(crate) fn normalize_strengths<V>(entries: &mut [Candidate<V>]) {
    if let Some(winner) = entries.iter().position(|c| c.score.is_infinite()) {
        for (i, c) in entries.iter_mut().enumerate() {
            c.score = if i == winner { 1.0 } else { 0.0 };
        }
        return;
    }
    let total: f32 = entries.iter().map(|c| c.score).sum();
    if total > 0.0 {
        for c in entries.iter_mut() {
            c.score /= total;
        }
    }
}
