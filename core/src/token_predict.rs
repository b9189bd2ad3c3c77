//! Next-token prediction from variable-order token-window contexts.
//!
//! The token counterpart of `NgramStringPredict`: contexts are windows of
//! preceding tokens keyed through the window encoder, and the predicted
//! symbol is a whole token. Orders are blended linearly with weight equal
//! to the context length.

use crate::candidate::{Candidate, ResultSet};
use crate::context::ContextTable;
use crate::window::encode_window;
use crate::{clamp_orders, clamp_result_limit};
use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

/// Type tag carried by exported token-predict models.
pub const TOKEN_PREDICT_KIND: &str = "NgramTokenPredict";

/// Exported token-predict model: config plus the context table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPredictModel<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub n_gram_min: usize,
    pub n_gram_max: usize,
    pub max_results: usize,
    pub context_dict: ContextTable<T>,
}

impl<T: Serialize + DeserializeOwned> TokenPredictModel<T> {
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

/// Next-token predictor over a trained corpus of token sequences.
pub struct NgramTokenPredict<T> {
    n_gram_min: usize,
    n_gram_max: usize,
    max_results: usize,
    contexts: ContextTable<T>,
    results: ResultSet<T>,
    last_input: Option<String>,
}

impl<T: Clone + PartialEq + Display> NgramTokenPredict<T> {
    /// Create a predictor. Parameters are clamped to `1 <= n_min <= n_max`,
    /// `max_results >= 1` (zero falls back to 10).
    pub fn new(n_gram_min: usize, n_gram_max: usize, max_results: usize) -> Self {
        let (n_gram_min, n_gram_max) = clamp_orders(n_gram_min, n_gram_max);
        let max_results = clamp_result_limit(max_results);
        Self {
            n_gram_min,
            n_gram_max,
            max_results,
            contexts: ContextTable::new(),
            results: ResultSet::with_limit(max_results),
            last_input: None,
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

    /// Build the context table from a corpus of sequences, replacing any
    /// prior table.
    pub fn train(&mut self, corpus: &[Vec<T>]) -> &mut Self {
        self.contexts.clear();
        self.results.clear();
        self.last_input = None;

        for seq in corpus {
            for p in 1..seq.len() {
                for k in self.n_gram_min..=self.n_gram_max.min(p) {
                    let context = encode_window(&seq[p - k..p]);
                    self.contexts.observe(context, &seq[p]);
                }
            }
        }
        debug!(contexts = self.contexts.len(), "trained token predict model");
        self
    }

    /// Predict the next token after `prefix`, storing results in the
    /// buffer. An unchanged prefix is an idempotent no-op.
    pub fn predict(&mut self, prefix: &[T]) -> &mut Self {
        let identity = encode_window(prefix);
        if self.last_input.as_deref() == Some(identity.as_str()) {
            return self;
        }

        self.results.clear();
        self.last_input = Some(identity);

        for candidate in self.blend(prefix) {
            self.results.push(candidate);
        }
        self
    }

    /// Pure variant of `predict`: returns a freshly allocated (unsorted)
    /// probability distribution without mutating the engine.
    pub fn predict_pure(&self, prefix: &[T]) -> Vec<Candidate<T>> {
        self.blend(prefix)
    }

    /// Predict (when `prefix` is given) and return the most likely token.
    /// With `None`, reads the current buffer for the cached prefix.
    pub fn predict_best(&mut self, prefix: Option<&[T]>) -> Option<T> {
        if let Some(p) = prefix {
            self.predict(p);
        }
        self.top_value().cloned()
    }

    /// Blend all matching context orders into one distribution. Scores are
    /// accumulated keyed by the token projection, which fixes the emission
    /// order.
    fn blend(&self, prefix: &[T]) -> Vec<Candidate<T>> {
        let len = prefix.len();
        let mut scores: BTreeMap<String, (T, f32)> = BTreeMap::new();
        let mut total_weight = 0.0f32;

        for k in self.n_gram_min..=self.n_gram_max {
            if k > len {
                break;
            }
            let context = encode_window(&prefix[len - k..]);
            let Some(entry) = self.contexts.get(&context) else {
                continue;
            };
            if entry.total == 0 {
                continue;
            }
            let weight = k as f32;
            total_weight += weight;
            for (symbol, count) in &entry.counts {
                let slot = scores
                    .entry(symbol.to_string())
                    .or_insert_with(|| (symbol.clone(), 0.0));
                slot.1 += weight * (*count as f32) / (entry.total as f32);
            }
        }

        if total_weight == 0.0 {
            return Vec::new();
        }
        scores
            .into_values()
            .map(|(symbol, score)| Candidate::new(symbol, score / total_weight))
            .collect()
    }

    /// Finalized result entries, most probable first.
    pub fn entries(&mut self) -> &[Candidate<T>] {
        self.results.entries()
    }

    /// Finalized predicted tokens, most probable first.
    pub fn values(&mut self) -> &[T] {
        self.results.values()
    }

    /// Finalized probabilities, most probable first.
    pub fn scores(&mut self) -> &[f32] {
        self.results.scores()
    }

    /// Best entry, or `None` when the last prefix had no prediction.
    pub fn top(&mut self) -> Option<&Candidate<T>> {
        self.results.top()
    }

    /// Most likely next token, or `None`.
    pub fn top_value(&mut self) -> Option<&T> {
        self.results.top_value()
    }

    /// Probability of the most likely token, or `0.0`.
    pub fn top_score(&mut self) -> f32 {
        self.results.top_score()
    }

    /// Export the model: type tag, config and context table.
    pub fn export(&self) -> TokenPredictModel<T> {
        TokenPredictModel {
            kind: TOKEN_PREDICT_KIND.to_string(),
            n_gram_min: self.n_gram_min,
            n_gram_max: self.n_gram_max,
            max_results: self.max_results,
            context_dict: self.contexts.clone(),
        }
    }

    /// Replace config and context table from an exported model.
    pub fn load(&mut self, model: TokenPredictModel<T>) -> Result<&mut Self> {
        if model.kind != TOKEN_PREDICT_KIND {
            bail!(
                "incompatible model type '{}', expected '{}'",
                model.kind,
                TOKEN_PREDICT_KIND
            );
        }
        let (n_min, n_max) = clamp_orders(model.n_gram_min, model.n_gram_max);
        self.n_gram_min = n_min;
        self.n_gram_max = n_max;
        self.max_results = clamp_result_limit(model.max_results);
        self.contexts = model.context_dict;
        self.results = ResultSet::with_limit(self.max_results);
        self.last_input = None;
        debug!(contexts = self.contexts.len(), "loaded token predict model");
        Ok(self)
    }
}

impl<T: Clone + PartialEq + Display> Default for NgramTokenPredict<T> {
    fn default() -> Self {
        Self::new(3, 25, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(tokens: &[&'static str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn statement_corpus() -> Vec<Vec<String>> {
        let num = seq(&["IF", "ID", "ASSIGN", "NUM", "SEMI"]);
        let str_ = seq(&["IF", "ID", "ASSIGN", "STR", "SEMI"]);
        vec![num.clone(), num.clone(), num, str_]
    }

    #[test]
    fn blends_orders_into_observed_ratio() {
        // NUM follows [IF ID ASSIGN] in 3 of 4 sequences at every order
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());
        engine.predict(&seq(&["IF", "ID", "ASSIGN"]));

        let entries = engine.entries().to_vec();
        assert_eq!(entries[0].value, "NUM");
        assert!((entries[0].score - 0.75).abs() < 1e-5);
        assert_eq!(entries[1].value, "STR");
        assert!((entries[1].score - 0.25).abs() < 1e-5);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());
        engine.predict(&seq(&["IF", "ID"]));

        assert!(!engine.entries().is_empty());
        let sum: f32 = engine.scores().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn min_order_gates_short_prefixes() {
        // n_min = 3 needs a three-token context; shorter prefixes predict
        // nothing
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(3, 4, 10);
        engine.train(&statement_corpus());

        engine.predict(&seq(&["IF", "ID"]));
        assert!(engine.entries().is_empty());

        engine.predict(&seq(&["IF", "ID", "ASSIGN"]));
        assert_eq!(engine.predict_best(None), Some("NUM".to_string()));
    }

    #[test]
    fn unseen_context_yields_no_results() {
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());
        engine.predict(&seq(&["SEMI"]));

        assert!(engine.entries().is_empty());
        assert_eq!(engine.top_score(), 0.0);
    }

    #[test]
    fn empty_prefix_yields_no_results() {
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());
        engine.predict(&[]);

        assert!(engine.entries().is_empty());
    }

    #[test]
    fn unchanged_prefix_is_a_noop() {
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());

        engine.predict(&seq(&["IF", "ID"]));
        let first = engine.scores().to_vec();
        engine.predict(&seq(&["IF", "ID"]));
        assert_eq!(engine.scores(), first.as_slice());
    }

    #[test]
    fn integer_tokens_work() {
        let corpus = vec![vec![1u32, 2, 3], vec![1, 2, 3], vec![1, 2, 4]];
        let mut engine: NgramTokenPredict<u32> = NgramTokenPredict::new(1, 2, 10);
        engine.train(&corpus);
        engine.predict(&[1, 2]);

        assert_eq!(engine.top_value(), Some(&3));
        let sum: f32 = engine.scores().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn context_totals_match_counts() {
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());

        let model = engine.export();
        for (context, entry) in model.context_dict.iter() {
            let sum: u32 = entry.counts.iter().map(|(_, c)| *c).sum();
            assert_eq!(entry.total, sum, "bad total for context {context}");
        }
    }

    #[test]
    fn load_rejects_wrong_kind() {
        let mut engine: NgramTokenPredict<String> = NgramTokenPredict::new(1, 4, 10);
        engine.train(&statement_corpus());

        let mut model = engine.export();
        model.kind = "NgramStringPredict".to_string();

        let mut fresh: NgramTokenPredict<String> = NgramTokenPredict::default();
        assert!(fresh.load(model).is_err());
    }
}
