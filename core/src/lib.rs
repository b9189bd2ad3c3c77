//! libngram-core
//!
//! In-memory n-gram engines for fuzzy lexicon matching and next-symbol
//! prediction, over plain strings and over arbitrary token sequences.
//!
//! Four engines share one architecture: an inverted index (fuzzy) or a
//! context table (predict) built by `train`, queried synchronously, with a
//! lazily finalized result buffer.
//!
//! Public API:
//! - `NgramStringFuzzy` - substring-overlap ranking over a string lexicon
//! - `NgramStringPredict` - next-character prediction from a prefix
//! - `NgramTokenFuzzy` - window-overlap ranking over token sequences
//! - `NgramTokenPredict` - next-token prediction from a token prefix
//! - `Candidate` / `ResultSet` - the shared scored-result core
//! - `NgramConfig` - configuration with TOML load/save helpers

use serde::{Deserialize, Serialize};

pub mod candidate;
pub use candidate::{Candidate, ResultSet};

pub mod context;
pub use context::{ContextEntry, ContextTable};

pub mod window;
pub use window::encode_window;

pub mod string_fuzzy;
pub use string_fuzzy::{NgramStringFuzzy, StringFuzzyModel, STRING_FUZZY_KIND};

pub mod string_predict;
pub use string_predict::{NgramStringPredict, StringPredictModel, STRING_PREDICT_KIND};

pub mod token_fuzzy;
pub use token_fuzzy::{NgramTokenFuzzy, TokenFuzzyModel, TOKEN_FUZZY_KIND};

pub mod token_predict;
pub use token_predict::{NgramTokenPredict, TokenPredictModel, TOKEN_PREDICT_KIND};

/// Fallback result limit applied when a configured limit is zero.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Engine configuration.
///
/// All four engines are constructed from the same parameter set;
/// `case_sensitive` only affects the string engines. Values are clamped to
/// the engine invariants (`1 <= n_gram_min <= n_gram_max`,
/// `max_results >= 1`) at construction and load, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgramConfig {
    /// Smallest gram/context length indexed.
    pub n_gram_min: usize,
    /// Largest gram/context length indexed.
    pub n_gram_max: usize,
    /// Result-set size cap. `0` falls back to `DEFAULT_MAX_RESULTS`.
    pub max_results: usize,
    /// String engines only: when false, corpus and queries are ASCII
    /// case-folded before all operations.
    pub case_sensitive: bool,
}

impl Default for NgramConfig {
    fn default() -> Self {
        Self {
            n_gram_min: 3,
            n_gram_max: 5,
            max_results: DEFAULT_MAX_RESULTS,
            case_sensitive: false,
        }
    }
}

impl NgramConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NgramConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Copy with all fields clamped to the engine invariants.
    pub fn clamped(&self) -> Self {
        let (n_gram_min, n_gram_max) = clamp_orders(self.n_gram_min, self.n_gram_max);
        Self {
            n_gram_min,
            n_gram_max,
            max_results: clamp_result_limit(self.max_results),
            case_sensitive: self.case_sensitive,
        }
    }
}

/// Clamp an order range to `1 <= min <= max`.
pub(crate) fn clamp_orders(n_min: usize, n_max: usize) -> (usize, usize) {
    let n_min = n_min.max(1);
    let n_max = n_max.max(n_min);
    (n_min, n_max)
}

/// Clamp a result limit: zero falls back to the default.
pub(crate) fn clamp_result_limit(max_results: usize) -> usize {
    if max_results == 0 {
        DEFAULT_MAX_RESULTS
    } else {
        max_results
    }
}

/// Utility helpers.
pub mod utils {
    /// ASCII case folding applied to corpus and query strings when an
    /// engine is case-insensitive. Input is otherwise treated as an opaque
    /// sequence of code points.
    pub fn fold_case(s: &str, case_sensitive: bool) -> String {
        if case_sensitive {
            s.to_string()
        } else {
            s.to_ascii_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_clamps_invalid_fields() {
        let cfg = NgramConfig {
            n_gram_min: 0,
            n_gram_max: 0,
            max_results: 0,
            case_sensitive: true,
        }
        .clamped();
        assert_eq!(cfg.n_gram_min, 1);
        assert_eq!(cfg.n_gram_max, 1);
        assert_eq!(cfg.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn config_clamps_inverted_range() {
        let (lo, hi) = clamp_orders(6, 2);
        assert_eq!((lo, hi), (6, 6));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = NgramConfig {
            n_gram_min: 2,
            n_gram_max: 4,
            max_results: 5,
            case_sensitive: true,
        };
        let text = cfg.to_toml_string().unwrap();
        let back = NgramConfig::from_toml_str(&text).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn config_toml_missing_fields_use_defaults() {
        let cfg = NgramConfig::from_toml_str("n_gram_max = 7\n").unwrap();
        assert_eq!(cfg.n_gram_max, 7);
        assert_eq!(cfg.n_gram_min, NgramConfig::default().n_gram_min);
        assert_eq!(cfg.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn fold_case_is_ascii_only() {
        assert_eq!(utils::fold_case("AbC", false), "abc");
        assert_eq!(utils::fold_case("AbC", true), "AbC");
        // non-ASCII passes through untouched
        assert_eq!(utils::fold_case("ÄbÇ", false), "ÄbÇ");
    }
}
