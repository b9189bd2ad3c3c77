//! Next-character prediction from variable-order character contexts.
//!
//! Training records, for every position of every corpus string and every
//! context length in `n_gram_min..=n_gram_max`, which character followed
//! that context. Prediction blends all matching orders linearly, weighting
//! each order by its context length, so longer matched contexts dominate
//! without any backoff smoothing.

use crate::candidate::{Candidate, ResultSet};
use crate::context::ContextTable;
use crate::{clamp_orders, clamp_result_limit, utils};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

/// Type tag carried by exported string-predict models.
pub const STRING_PREDICT_KIND: &str = "NgramStringPredict";

/// Exported string-predict model: config plus the context table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringPredictModel {
    #[serde(rename = "type")]
    pub kind: String,
    pub n_gram_min: usize,
    pub n_gram_max: usize,
    pub max_results: usize,
    pub case_sense: bool,
    pub context_dict: ContextTable<char>,
}

impl StringPredictModel {
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

/// Next-character predictor over a trained corpus.
pub struct NgramStringPredict {
    n_gram_min: usize,
    n_gram_max: usize,
    max_results: usize,
    case_sense: bool,
    contexts: ContextTable<char>,
    results: ResultSet<char>,
    last_input: Option<String>,
}

impl NgramStringPredict {
    /// Create a predictor. Parameters are clamped to `1 <= n_min <= n_max`,
    /// `max_results >= 1` (zero falls back to 10).
    pub fn new(n_gram_min: usize, n_gram_max: usize, max_results: usize, case_sensitive: bool) -> Self {
        let (n_gram_min, n_gram_max) = clamp_orders(n_gram_min, n_gram_max);
        let max_results = clamp_result_limit(max_results);
        Self {
            n_gram_min,
            n_gram_max,
            max_results,
            case_sense: case_sensitive,
            contexts: ContextTable::new(),
            results: ResultSet::with_limit(max_results),
            last_input: None,
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

    /// Build the context table from a corpus, replacing any prior table.
    pub fn train<S: AsRef<str>>(&mut self, corpus: &[S]) -> &mut Self {
        self.contexts.clear();
        self.results.clear();
        self.last_input = None;

        for raw in corpus {
            let text = utils::fold_case(raw.as_ref(), self.case_sense);
            let chars: Vec<char> = text.chars().collect();
            for p in 1..chars.len() {
                for k in self.n_gram_min..=self.n_gram_max.min(p) {
                    let context: String = chars[p - k..p].iter().collect();
                    self.contexts.observe(context, &chars[p]);
                }
            }
        }
        debug!(contexts = self.contexts.len(), "trained string predict model");
        self
    }

    /// Predict the next character after `prefix`, storing results in the
    /// buffer. An unchanged prefix is an idempotent no-op.
    pub fn predict<S: AsRef<str>>(&mut self, prefix: S) -> &mut Self {
        let prefix = utils::fold_case(prefix.as_ref(), self.case_sense);
        if self.last_input.as_deref() == Some(prefix.as_str()) {
            return self;
        }

        self.results.clear();
        self.last_input = Some(prefix.clone());

        let chars: Vec<char> = prefix.chars().collect();
        for candidate in self.blend(&chars) {
            self.results.push(candidate);
        }
        self
    }

    /// Pure variant of `predict`: returns a freshly allocated (unsorted)
    /// probability distribution without mutating the engine.
    pub fn predict_pure(&self, prefix: &str) -> Vec<Candidate<char>> {
        let prefix = utils::fold_case(prefix, self.case_sense);
        let chars: Vec<char> = prefix.chars().collect();
        self.blend(&chars)
    }

    /// Predict (when `prefix` is given) and return the most likely
    /// character. With `None`, reads the current buffer for the cached
    /// prefix.
    pub fn predict_best(&mut self, prefix: Option<&str>) -> Option<char> {
        if let Some(p) = prefix {
            self.predict(p);
        }
        self.top_value().copied()
    }

    /// Blend all matching context orders into one distribution.
    ///
    /// Each order `k` with a known context contributes its conditional
    /// distribution scaled by `k`; the accumulated scores are divided by
    /// the total weight, so emitted probabilities sum to 1.
    fn blend(&self, chars: &[char]) -> Vec<Candidate<char>> {
        let len = chars.len();
        let mut scores: BTreeMap<char, f32> = BTreeMap::new();
        let mut total_weight = 0.0f32;

        for k in self.n_gram_min..=self.n_gram_max {
            if k > len {
                break;
            }
            let context: String = chars[len - k..].iter().collect();
            let Some(entry) = self.contexts.get(&context) else {
                continue;
            };
            if entry.total == 0 {
                continue;
            }
            let weight = k as f32;
            total_weight += weight;
            for (symbol, count) in &entry.counts {
                *scores.entry(*symbol).or_insert(0.0) +=
                    weight * (*count as f32) / (entry.total as f32);
            }
        }

        if total_weight == 0.0 {
            return Vec::new();
        }
        scores
            .into_iter()
            .map(|(symbol, score)| Candidate::new(symbol, score / total_weight))
            .collect()
    }

    /// Finalized result entries, most probable first.
    pub fn entries(&mut self) -> &[Candidate<char>] {
        self.results.entries()
    }

    /// Finalized predicted characters, most probable first.
    pub fn values(&mut self) -> &[char] {
        self.results.values()
    }

    /// Finalized probabilities, most probable first.
    pub fn scores(&mut self) -> &[f32] {
        self.results.scores()
    }

    /// Best entry, or `None` when the last prefix had no prediction.
    pub fn top(&mut self) -> Option<&Candidate<char>> {
        self.results.top()
    }

    /// Most likely next character, or `None`.
    pub fn top_value(&mut self) -> Option<&char> {
        self.results.top_value()
    }

    /// Probability of the most likely character, or `0.0`.
    pub fn top_score(&mut self) -> f32 {
        self.results.top_score()
    }

    /// Export the model: type tag, config and context table.
    pub fn export(&self) -> StringPredictModel {
        StringPredictModel {
            kind: STRING_PREDICT_KIND.to_string(),
            n_gram_min: self.n_gram_min,
            n_gram_max: self.n_gram_max,
            max_results: self.max_results,
            case_sense: self.case_sense,
            context_dict: self.contexts.clone(),
        }
    }

    /// Replace config and context table from an exported model.
    pub fn load(&mut self, model: StringPredictModel) -> Result<&mut Self> {
        if model.kind != STRING_PREDICT_KIND {
            bail!(
                "incompatible model type '{}', expected '{}'",
                model.kind,
                STRING_PREDICT_KIND
            );
        }
        let (n_min, n_max) = clamp_orders(model.n_gram_min, model.n_gram_max);
        self.n_gram_min = n_min;
        self.n_gram_max = n_max;
        self.max_results = clamp_result_limit(model.max_results);
        self.case_sense = model.case_sense;
        self.contexts = model.context_dict;
        self.results = ResultSet::with_limit(self.max_results);
        self.last_input = None;
        debug!(contexts = self.contexts.len(), "loaded string predict model");
        Ok(self)
    }
}

impl Default for NgramStringPredict {
    fn default() -> Self {
        Self::new(1, 25, 10, true)
    }
}
