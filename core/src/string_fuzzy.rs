//! Fuzzy substring matching over a string lexicon.
//!
//! `NgramStringFuzzy` builds an inverted index from every substring of
//! length `n_gram_min..=n_gram_max` of each trained string to the strings
//! containing it, then ranks lexicon entries against a query by accumulated
//! gram overlap.
//!
//! Query pipeline:
//! 1. canonicalize (ASCII case fold unless case-sensitive); an unchanged
//!    input is an idempotent no-op
//! 2. exact lexicon hit short-circuits with a single dominating entry
//! 3. otherwise scan query grams from the largest size down, admitting new
//!    candidates only while below `max_results` (cap-on-creation) and
//!    accumulating `k*k` per sighting of an admitted candidate
//! 4. normalize strengths to a probability-like distribution
//!
//! Sources whose length falls outside `[75%, 125%]` of the query length are
//! discarded on first sight. Postings keep training insertion order, which
//! makes the cap-on-creation admission deterministic.

use crate::candidate::{normalize_strengths, Candidate, ResultSet};
use crate::{clamp_orders, clamp_result_limit, utils};
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::debug;

/// Type tag carried by exported string-fuzzy models.
pub const STRING_FUZZY_KIND: &str = "NgramStringFuzzy";

/// Capacity of the per-engine query result cache.
const QUERY_CACHE_CAPACITY: usize = 64;

/// Exported string-fuzzy model: config plus index maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringFuzzyModel {
    #[serde(rename = "type")]
    pub kind: String,
    pub n_gram_min: usize,
    pub n_gram_max: usize,
    pub max_results: usize,
    pub case_sense: bool,
    pub exact_set: AHashSet<String>,
    pub ngram_dict: AHashMap<String, Vec<String>>,
}

impl StringFuzzyModel {
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

/// Fuzzy substring matcher over a trained string lexicon.
#[derive(Debug)]
pub struct NgramStringFuzzy {
    n_gram_min: usize,
    n_gram_max: usize,
    max_results: usize,
    case_sense: bool,
    exact_set: AHashSet<String>,
    gram_index: AHashMap<String, Vec<String>>,
    results: ResultSet<String>,
    last_input: Option<String>,
    cache: LruCache<String, Vec<Candidate<String>>>,
    cache_hits: usize,
    cache_misses: usize,
}

impl NgramStringFuzzy {
    /// Create an engine with the given gram range, result cap and case policy.
    /// Parameters are clamped to `1 <= n_min <= n_max`, `max_results >= 1`
    /// (zero falls back to 10).
    pub fn new(n_gram_min: usize, n_gram_max: usize, max_results: usize, case_sensitive: bool) -> Self {
        let (n_gram_min, n_gram_max) = clamp_orders(n_gram_min, n_gram_max);
        let max_results = clamp_result_limit(max_results);
        Self {
            n_gram_min,
            n_gram_max,
            max_results,
            case_sense: case_sensitive,
            exact_set: AHashSet::new(),
            gram_index: AHashMap::new(),
            results: ResultSet::with_limit(max_results),
            last_input: None,
            cache: LruCache::new(NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap()),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Construct from an `NgramConfig`.
    pub fn with_config(config: &crate::NgramConfig) -> Self {
        let cfg = config.clamped();
        Self::new(cfg.n_gram_min, cfg.n_gram_max, cfg.max_results, cfg.case_sensitive)
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

    pub fn case_sensitive(&self) -> bool {
        self.case_sense
    }

    /// Build the inverted index from a lexicon, replacing any prior index.
    ///
    /// Each distinct canonical string is indexed once; a scratch set dedups
    /// grams per source, so postings stay duplicate-free and keep corpus
    /// insertion order.
    pub fn train<S: AsRef<str>>(&mut self, corpus: &[S]) -> &mut Self {
        self.exact_set.clear();
        self.gram_index.clear();
        self.reset_query_state();

        let mut seen = AHashSet::new();
        for raw in corpus {
            let source = utils::fold_case(raw.as_ref(), self.case_sense);
            if !self.exact_set.insert(source.clone()) {
                continue; // duplicate corpus entry, already indexed
            }
            let chars: Vec<char> = source.chars().collect();
            seen.clear();
            for k in self.n_gram_min..=self.n_gram_max.min(chars.len()) {
                for start in 0..=(chars.len() - k) {
                    let gram: String = chars[start..start + k].iter().collect();
                    if !seen.insert(gram.clone()) {
                        continue;
                    }
                    self.gram_index.entry(gram).or_default().push(source.clone());
                }
            }
        }
        debug!(
            sources = self.exact_set.len(),
            grams = self.gram_index.len(),
            "trained string fuzzy index"
        );
        self
    }

    /// Rank lexicon entries against `input`, storing results in the buffer.
    ///
    /// Repeating the previous input is an idempotent no-op; other repeated
    /// queries are served from an LRU cache of normalized candidate sets.
    pub fn search<S: AsRef<str>>(&mut self, input: S) -> &mut Self {
        let query = utils::fold_case(input.as_ref(), self.case_sense);
        if self.last_input.as_deref() == Some(query.as_str()) {
            return self;
        }

        self.results.clear();
        self.last_input = Some(query.clone());
        if query.is_empty() {
            return self;
        }

        if let Some(cached) = self.cache.get(&query) {
            self.cache_hits += 1;
            self.results.replace(cached.clone());
            return self;
        }
        self.cache_misses += 1;

        let entries = self.match_query(&query);
        self.cache.put(query, entries.clone());
        self.results.replace(entries);
        self
    }

    /// Pure variant of `search`: computes a freshly allocated, normalized
    /// (unsorted) candidate set without mutating the engine, enabling
    /// lock-free parallel reads of a trained model.
    pub fn search_pure(&self, input: &str) -> Vec<Candidate<String>> {
        let query = utils::fold_case(input, self.case_sense);
        if query.is_empty() {
            return Vec::new();
        }
        self.match_query(&query)
    }

    /// Search (when `input` is given) and return the best value. With
    /// `None`, reads the current buffer for the cached input.
    pub fn search_best(&mut self, input: Option<&str>) -> Option<String> {
        if let Some(q) = input {
            self.search(q);
        }
        self.top_value().cloned()
    }

    fn match_query(&self, query: &str) -> Vec<Candidate<String>> {
        let mut candidates: Vec<Candidate<String>> = Vec::new();

        if self.exact_set.contains(query) {
            // Dominating sentinel; normalization turns it into the single
            // strength-1 entry.
            candidates.push(Candidate::new(query.to_string(), f32::INFINITY));
            normalize_strengths(&mut candidates);
            return candidates;
        }

        let chars: Vec<char> = query.chars().collect();
        let qlen = chars.len();
        // Admissible source length range: [75%, 125%] of the query, floor 2.
        let len_lo = ((qlen as f32) * 0.75).floor() as usize;
        let len_lo = len_lo.max(2);
        let len_hi = ((qlen as f32) * 1.25).ceil() as usize;
        let len_hi = len_hi.max(2);

        let mut index_of: AHashMap<&str, usize> = AHashMap::new();
        let mut seen_grams: AHashSet<String> = AHashSet::new();

        for k in (self.n_gram_min..=self.n_gram_max.min(qlen)).rev() {
            let weight = (k * k) as f32;
            for start in 0..=(qlen - k) {
                let gram: String = chars[start..start + k].iter().collect();
                if !seen_grams.insert(gram.clone()) {
                    continue;
                }
                let Some(posting) = self.gram_index.get(&gram) else {
                    continue;
                };
                for source in posting {
                    if let Some(&i) = index_of.get(source.as_str()) {
                        candidates[i].score += weight;
                        continue;
                    }
                    let slen = source.chars().count();
                    if slen < len_lo || slen > len_hi {
                        continue;
                    }
                    if candidates.len() < self.max_results {
                        index_of.insert(source.as_str(), candidates.len());
                        candidates.push(Candidate::new(source.clone(), 1.0));
                    }
                }
            }
        }

        normalize_strengths(&mut candidates);
        candidates
    }

    /// Finalized result entries, best first.
    pub fn entries(&mut self) -> &[Candidate<String>] {
        self.results.entries()
    }

    /// Finalized matched strings, best first.
    pub fn values(&mut self) -> &[String] {
        self.results.values()
    }

    /// Finalized strengths, best first.
    pub fn scores(&mut self) -> &[f32] {
        self.results.scores()
    }

    /// Best entry, or `None` when the last query had no results.
    pub fn top(&mut self) -> Option<&Candidate<String>> {
        self.results.top()
    }

    /// Best matched string, or `None`.
    pub fn top_value(&mut self) -> Option<&String> {
        self.results.top_value()
    }

    /// Best strength, or `0.0`.
    pub fn top_score(&mut self) -> f32 {
        self.results.top_score()
    }

    /// Export the model: type tag, config and index maps.
    pub fn export(&self) -> StringFuzzyModel {
        StringFuzzyModel {
            kind: STRING_FUZZY_KIND.to_string(),
            n_gram_min: self.n_gram_min,
            n_gram_max: self.n_gram_max,
            max_results: self.max_results,
            case_sense: self.case_sense,
            exact_set: self.exact_set.clone(),
            ngram_dict: self.gram_index.clone(),
        }
    }

    /// Replace config and index from an exported model.
    ///
    /// A wrong type tag is a recoverable error and leaves the engine
    /// untouched. Config fields are clamped to the usual invariants.
    pub fn load(&mut self, model: StringFuzzyModel) -> Result<&mut Self> {
        if model.kind != STRING_FUZZY_KIND {
            bail!(
                "incompatible model type '{}', expected '{}'",
                model.kind,
                STRING_FUZZY_KIND
            );
        }
        let (n_min, n_max) = clamp_orders(model.n_gram_min, model.n_gram_max);
        self.n_gram_min = n_min;
        self.n_gram_max = n_max;
        self.max_results = clamp_result_limit(model.max_results);
        self.case_sense = model.case_sense;
        self.exact_set = model.exact_set;
        self.gram_index = model.ngram_dict;
        self.results = ResultSet::with_limit(self.max_results);
        self.reset_query_state();
        debug!(grams = self.gram_index.len(), "loaded string fuzzy model");
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

impl Default for NgramStringFuzzy {
    fn default() -> Self {
        Self::new(3, 5, 10, false)
    }
}
