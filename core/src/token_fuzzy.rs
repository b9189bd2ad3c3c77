//! Fuzzy window matching over token sequences.
//!
//! The token-sequence counterpart of `NgramStringFuzzy`: trained sequences
//! form a lexicon addressed by index, every window of
//! `n_gram_min..=n_gram_max` consecutive tokens is keyed through the window
//! encoder into an inverted index, and queries accumulate `k*k` per shared
//! window under the same cap-on-creation policy.
//!
//! Differences from the string engine: sources are lexicon indices, exact
//! matching uses the full-sequence identity key, and no length gate is
//! applied (token-sequence lengths cluster too tightly for a ratio gate to
//! help).
//!
//! Tokens are any `Clone + PartialEq + Display` value; the `Display`
//! projection is the canonical key form.

use crate::candidate::{normalize_strengths, Candidate, ResultSet};
use crate::window::encode_window;
use crate::{clamp_orders, clamp_result_limit};
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::debug;

/// Type tag carried by exported token-fuzzy models.
pub const TOKEN_FUZZY_KIND: &str = "NgramTokenFuzzy";

const QUERY_CACHE_CAPACITY: usize = 64;

/// Exported token-fuzzy model: config, lexicon and index maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenFuzzyModel<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub n_gram_min: usize,
    pub n_gram_max: usize,
    pub max_results: usize,
    pub lexicon_sequences: Vec<Vec<T>>,
    pub exact_dict: AHashMap<String, usize>,
    pub ngram_dict: AHashMap<String, Vec<usize>>,
}

impl<T: Serialize + DeserializeOwned> TokenFuzzyModel<T> {
    /// Save the model to the given path using bincode.
    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }

    /// Load a model from a bincode file produced by `save_bincode`.
    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let model: Self = bincode::deserialize_from(reader)?;
        Ok(model)
    }
}

/// Fuzzy window matcher over a trained token-sequence lexicon.
pub struct NgramTokenFuzzy<T> {
    n_gram_min: usize,
    n_gram_max: usize,
    max_results: usize,
    lexicon: Vec<Vec<T>>,
    exact_index: AHashMap<String, usize>,
    gram_index: AHashMap<String, Vec<usize>>,
    results: ResultSet<Vec<T>>,
    last_input: Option<String>,
    cache: LruCache<String, Vec<Candidate<Vec<T>>>>,
    cache_hits: usize,
    cache_misses: usize,
}

impl<T: Clone + PartialEq + Display> NgramTokenFuzzy<T> {
    /// Create an engine with the given window range and result cap.
    /// Parameters are clamped to `1 <= n_min <= n_max`, `max_results >= 1`
    /// (zero falls back to 10).
    pub fn new(n_gram_min: usize, n_gram_max: usize, max_results: usize) -> Self {
        let (n_gram_min, n_gram_max) = clamp_orders(n_gram_min, n_gram_max);
        let max_results = clamp_result_limit(max_results);
        Self {
            n_gram_min,
            n_gram_max,
            max_results,
            lexicon: Vec::new(),
            exact_index: AHashMap::new(),
            gram_index: AHashMap::new(),
            results: ResultSet::with_limit(max_results),
            last_input: None,
            cache: LruCache::new(NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap()),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Construct from an `NgramConfig` (`case_sensitive` is ignored).
    pub fn with_config(config: &crate::NgramConfig) -> Self {
        let cfg = config.clamped();
        Self::new(cfg.n_gram_min, cfg.n_gram_max, cfg.max_results)
    }

    pub fn n_gram_min(&self) -> usize {
        self.n_gram_min
    }

    pub fn n_gram_max(&self) -> usize {
        self.n_gram_max
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Number of trained lexicon sequences.
    pub fn lexicon_len(&self) -> usize {
        self.lexicon.len()
    }

    /// Build the lexicon and inverted window index, replacing any prior
    /// index. Sequences with the same identity key are indexed once.
    pub fn train(&mut self, corpus: &[Vec<T>]) -> &mut Self {
        self.lexicon.clear();
        self.exact_index.clear();
        self.gram_index.clear();
        self.reset_query_state();

        let mut seen = AHashSet::new();
        for seq in corpus {
            let identity = encode_window(seq);
            if self.exact_index.contains_key(&identity) {
                continue;
            }
            let idx = self.lexicon.len();
            self.lexicon.push(seq.clone());
            self.exact_index.insert(identity, idx);

            seen.clear();
            for k in self.n_gram_min..=self.n_gram_max.min(seq.len()) {
                for start in 0..=(seq.len() - k) {
                    let key = encode_window(&seq[start..start + k]);
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    self.gram_index.entry(key).or_default().push(idx);
                }
            }
        }
        debug!(
            sequences = self.lexicon.len(),
            windows = self.gram_index.len(),
            "trained token fuzzy index"
        );
        self
    }

    /// Rank lexicon sequences against `input`, storing results in the
    /// buffer. Repeating the previous input is an idempotent no-op; other
    /// repeated queries are served from an LRU cache keyed by the encoded
    /// query identity.
    pub fn search(&mut self, input: &[T]) -> &mut Self {
        let identity = encode_window(input);
        if self.last_input.as_deref() == Some(identity.as_str()) {
            return self;
        }

        self.results.clear();
        self.last_input = Some(identity.clone());
        if input.is_empty() {
            return self;
        }

        if let Some(cached) = self.cache.get(&identity) {
            self.cache_hits += 1;
            self.results.replace(cached.clone());
            return self;
        }
        self.cache_misses += 1;

        let entries = self.match_query(input, &identity);
        self.cache.put(identity, entries.clone());
        self.results.replace(entries);
        self
    }

    /// Pure variant of `search`: computes a freshly allocated, normalized
    /// (unsorted) candidate set without mutating the engine.
    pub fn search_pure(&self, input: &[T]) -> Vec<Candidate<Vec<T>>> {
        if input.is_empty() {
            return Vec::new();
        }
        let identity = encode_window(input);
        self.match_query(input, &identity)
    }

    /// Search (when `input` is given) and return the best-matching
    /// sequence. With `None`, reads the current buffer for the cached
    /// input.
    pub fn search_best(&mut self, input: Option<&[T]>) -> Option<Vec<T>> {
        if let Some(q) = input {
            self.search(q);
        }
        self.top_value().cloned()
    }

    fn match_query(&self, input: &[T], identity: &str) -> Vec<Candidate<Vec<T>>> {
        let mut candidates: Vec<Candidate<Vec<T>>> = Vec::new();

        if let Some(&idx) = self.exact_index.get(identity) {
            if let Some(seq) = self.lexicon.get(idx) {
                candidates.push(Candidate::new(seq.clone(), f32::INFINITY));
                normalize_strengths(&mut candidates);
                return candidates;
            }
        }

        let len = input.len();
        let mut admitted: AHashMap<usize, usize> = AHashMap::new();
        let mut seen_windows: AHashSet<String> = AHashSet::new();

        for k in (self.n_gram_min..=self.n_gram_max.min(len)).rev() {
            let weight = (k * k) as f32;
            for start in 0..=(len - k) {
                let key = encode_window(&input[start..start + k]);
                if !seen_windows.insert(key.clone()) {
                    continue;
                }
                let Some(posting) = self.gram_index.get(&key) else {
                    continue;
                };
                for &src in posting {
                    if let Some(&i) = admitted.get(&src) {
                        candidates[i].score += weight;
                        continue;
                    }
                    if candidates.len() < self.max_results {
                        let Some(seq) = self.lexicon.get(src) else {
                            continue;
                        };
                        admitted.insert(src, candidates.len());
                        candidates.push(Candidate::new(seq.clone(), 1.0));
                    }
                }
            }
        }

        normalize_strengths(&mut candidates);
        candidates
    }

    /// Finalized result entries, best first.
    pub fn entries(&mut self) -> &[Candidate<Vec<T>>] {
        self.results.entries()
    }

    /// Finalized matched sequences, best first.
    pub fn values(&mut self) -> &[Vec<T>] {
        self.results.values()
    }

    /// Finalized strengths, best first.
    pub fn scores(&mut self) -> &[f32] {
        self.results.scores()
    }

    /// Best entry, or `None` when the last query had no results.
    pub fn top(&mut self) -> Option<&Candidate<Vec<T>>> {
        self.results.top()
    }

    /// Best matched sequence, or `None`.
    pub fn top_value(&mut self) -> Option<&Vec<T>> {
        self.results.top_value()
    }

    /// Best strength, or `0.0`.
    pub fn top_score(&mut self) -> f32 {
        self.results.top_score()
    }

    /// Export the model: type tag, config, lexicon and index maps.
    pub fn export(&self) -> TokenFuzzyModel<T> {
        TokenFuzzyModel {
            kind: TOKEN_FUZZY_KIND.to_string(),
            n_gram_min: self.n_gram_min,
            n_gram_max: self.n_gram_max,
            max_results: self.max_results,
            lexicon_sequences: self.lexicon.clone(),
            exact_dict: self.exact_index.clone(),
            ngram_dict: self.gram_index.clone(),
        }
    }

    /// Replace config, lexicon and index from an exported model.
    pub fn load(&mut self, model: TokenFuzzyModel<T>) -> Result<&mut Self> {
        if model.kind != TOKEN_FUZZY_KIND {
            bail!(
                "incompatible model type '{}', expected '{}'",
                model.kind,
                TOKEN_FUZZY_KIND
            );
        }
        let (n_min, n_max) = clamp_orders(model.n_gram_min, model.n_gram_max);
        self.n_gram_min = n_min;
        self.n_gram_max = n_max;
        self.max_results = clamp_result_limit(model.max_results);
        self.lexicon = model.lexicon_sequences;
        self.exact_index = model.exact_dict;
        self.gram_index = model.ngram_dict;
        self.results = ResultSet::with_limit(self.max_results);
        self.reset_query_state();
        debug!(
            sequences = self.lexicon.len(),
            windows = self.gram_index.len(),
            "loaded token fuzzy model"
        );
        Ok(self)
    }

    /// Query cache statistics as a (hits, misses) tuple.
    pub fn cache_stats(&self) -> (usize, usize) {
        (self.cache_hits, self.cache_misses)
    }

    /// Clear the query cache and its counters.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_hits = 0;
        self.cache_misses = 0;
    }

    fn reset_query_state(&mut self) {
        self.results.clear();
        self.last_input = None;
        self.clear_cache();
    }
}

impl<T: Clone + PartialEq + Display> Default for NgramTokenFuzzy<T> {
    fn default() -> Self {
        Self::new(3, 5, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IF: &str = "IF";
    const ID: &str = "ID";
    const ASSIGN: &str = "ASSIGN";
    const NUM: &str = "NUM";
    const SEMI: &str = "SEMI";
    const LP: &str = "LP";
    const RP: &str = "RP";

    fn seq(tokens: &[&'static str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn lexicon() -> Vec<Vec<String>> {
        vec![
            seq(&[IF, ID, ASSIGN, NUM, SEMI]),
            seq(&[IF, LP, ID, RP]),
            seq(&[ID, ASSIGN, NUM, SEMI]),
        ]
    }

    #[test]
    fn exact_sequence_is_the_single_entry() {
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 3, 10);
        engine.train(&lexicon());
        engine.search(&seq(&[IF, ID, ASSIGN, NUM, SEMI]));

        assert_eq!(engine.entries().len(), 1);
        assert_eq!(engine.top_value(), Some(&seq(&[IF, ID, ASSIGN, NUM, SEMI])));
        assert_eq!(engine.top_score(), 1.0);
    }

    #[test]
    fn longest_shared_window_wins() {
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 3, 10);
        engine.train(&lexicon());
        engine.search(&seq(&[IF, ID, ASSIGN]));

        assert_eq!(engine.top_value(), Some(&seq(&[IF, ID, ASSIGN, NUM, SEMI])));
        let sum: f32 = engine.scores().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        // every lexicon sequence shares at least one token with the query
        assert_eq!(engine.entries().len(), 3);
    }

    #[test]
    fn no_length_gate_admits_any_source_length() {
        let long: Vec<String> = (0..40).map(|i| format!("T{i}")).collect();
        let mut with_marker = seq(&[IF, ID]);
        with_marker.extend(long);

        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(2, 3, 10);
        engine.train(&[with_marker.clone()]);
        engine.search(&seq(&[IF, ID]));

        assert_eq!(engine.top_value(), Some(&with_marker));
    }

    #[test]
    fn empty_query_yields_no_results() {
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 3, 10);
        engine.train(&lexicon());
        engine.search(&[]);

        assert!(engine.entries().is_empty());
        assert_eq!(engine.top_score(), 0.0);
    }

    #[test]
    fn unchanged_input_is_a_noop() {
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 3, 10);
        engine.train(&lexicon());

        engine.search(&seq(&[IF, ID]));
        let first = engine.scores().to_vec();
        let stats = engine.cache_stats();
        engine.search(&seq(&[IF, ID]));

        assert_eq!(engine.scores(), first.as_slice());
        assert_eq!(engine.cache_stats(), stats);
    }

    #[test]
    fn cap_on_creation_admits_in_posting_order() {
        // five sequences share the window [A B]; with max_results 2 the two
        // trained first are the two admitted
        let corpus: Vec<Vec<String>> = (0..5)
            .map(|i| vec!["A".to_string(), "B".to_string(), format!("X{i}")])
            .collect();
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(2, 2, 2);
        engine.train(&corpus);
        engine.search(&[a(), b()]);

        assert_eq!(engine.values(), &corpus[0..2]);
    }

    fn a() -> String {
        "A".to_string()
    }

    fn b() -> String {
        "B".to_string()
    }

    #[test]
    fn integer_tokens_work() {
        let corpus = vec![vec![1u32, 2, 3, 4], vec![2, 3, 9], vec![7, 8]];
        let mut engine: NgramTokenFuzzy<u32> = NgramTokenFuzzy::new(2, 3, 10);
        engine.train(&corpus);
        engine.search(&[2, 3]);

        let values = engine.values().to_vec();
        assert!(values.contains(&vec![1, 2, 3, 4]));
        assert!(values.contains(&vec![2, 3, 9]));
        assert!(!values.contains(&vec![7, 8]));
    }

    #[test]
    fn window_keys_do_not_collide_across_sizes() {
        // "A|B" as one token must not match the window of the two tokens
        // "A" and "B"
        let corpus = vec![vec!["A|B".to_string()]];
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 2, 10);
        engine.train(&corpus);
        engine.search(&[a(), b()]);

        assert!(engine.entries().is_empty());
    }

    #[test]
    fn duplicate_sequences_index_once() {
        let corpus = vec![seq(&[IF, ID]), seq(&[IF, ID])];
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 2, 10);
        engine.train(&corpus);

        assert_eq!(engine.lexicon_len(), 1);
        let model = engine.export();
        for (key, posting) in &model.ngram_dict {
            assert_eq!(posting.len(), 1, "duplicate posting for window {key}");
        }
    }

    #[test]
    fn postings_reference_real_windows() {
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 3, 10);
        engine.train(&lexicon());

        let model = engine.export();
        for (key, posting) in &model.ngram_dict {
            for &idx in posting {
                let source = &model.lexicon_sequences[idx];
                let contained = (0..=source.len()).any(|start| {
                    (start..=source.len())
                        .any(|end| encode_window(&source[start..end]) == *key)
                });
                assert!(contained, "sequence {idx} lacks window {key}");
            }
        }
    }

    #[test]
    fn load_rejects_wrong_kind() {
        let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::new(1, 3, 10);
        engine.train(&lexicon());

        let mut model = engine.export();
        model.kind = "NgramStringFuzzy".to_string();

        let mut fresh: NgramTokenFuzzy<String> = NgramTokenFuzzy::default();
        assert!(fresh.load(model).is_err());
    }
}
