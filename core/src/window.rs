// core/src/window.rs
//
// Deterministic key encoding for token windows and prediction contexts.
// A window of tokens is keyed as "<len>:<tok0>|<tok1>|...|<tokN-1>" using
// each token's Display projection. The length prefix keeps windows of
// different sizes from colliding after joining.

use std::fmt::Display;

/// Encode a window of tokens into its canonical string key.
pub fn encode_window<T: Display>(tokens: &[T]) -> String {
    let mut key = String::new();
    key.push_str(&tokens.len().to_string());
    key.push(':');
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 {
            key.push('|');
        }
        key.push_str(&tok.to_string());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_length_and_tokens() {
        let toks = ["IF", "ID", "ASSIGN"];
        assert_eq!(encode_window(&toks), "3:IF|ID|ASSIGN");
    }

    #[test]
    fn empty_window() {
        let toks: [&str; 0] = [];
        assert_eq!(encode_window(&toks), "0:");
    }

    #[test]
    fn length_prefix_disambiguates() {
        // A single token containing the joiner must not collide with the
        // two-token window it would otherwise render as.
        let joined = ["a|b"];
        let split = ["a", "b"];
        assert_ne!(encode_window(&joined), encode_window(&split));
    }

    #[test]
    fn works_for_integers() {
        let toks = [10u32, 20, 30];
        assert_eq!(encode_window(&toks), "3:10|20|30");
    }
}
