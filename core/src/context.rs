// core/src/context.rs
//
// Next-symbol statistics for the predict engines.
// Maps a context key (the preceding symbols, rendered to a string) to the
// distribution of symbols observed immediately after that context.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Distribution of next symbols observed after one context.
///
/// Counts are kept as a symbol/count pair vector scanned linearly; context
/// distributions are small (one entry per distinct continuation), so a map
/// per entry would cost more than it saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry<S> {
    pub counts: Vec<(S, u32)>,
    pub total: u32,
}

impl<S> Default for ContextEntry<S> {
    fn default() -> Self {
        Self {
            counts: Vec::new(),
            total: 0,
        }
    }
}

impl<S: Clone + PartialEq> ContextEntry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation of `symbol` after this context.
    pub fn increment(&mut self, symbol: &S) {
        match self.counts.iter_mut().find(|(s, _)| s == symbol) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((symbol.clone(), 1)),
        }
        self.total += 1;
    }

    /// Observed count for one symbol (0 when unseen).
    pub fn count(&self, symbol: &S) -> u32 {
        self.counts
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }
}

/// Context key -> next-symbol distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTable<S> {
    data: AHashMap<String, ContextEntry<S>>,
}

impl<S> Default for ContextTable<S> {
    fn default() -> Self {
        Self {
            data: AHashMap::new(),
        }
    }
}

impl<S: Clone + PartialEq> ContextTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `context -> symbol` observation.
    pub fn observe(&mut self, context: String, symbol: &S) {
        self.data.entry(context).or_default().increment(symbol);
    }

    /// Distribution for a context, if any observation exists.
    pub fn get(&self, context: &str) -> Option<&ContextEntry<S>> {
        self.data.get(context)
    }

    /// Number of distinct contexts.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Iterate over all (context, distribution) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextEntry<S>)> {
        self.data.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_tracks_counts_and_total() {
        let mut entry: ContextEntry<char> = ContextEntry::new();
        entry.increment(&'l');
        entry.increment(&'l');
        entry.increment(&'p');

        assert_eq!(entry.count(&'l'), 2);
        assert_eq!(entry.count(&'p'), 1);
        assert_eq!(entry.count(&'x'), 0);
        assert_eq!(entry.total, 3);
    }

    #[test]
    fn total_equals_sum_of_counts() {
        let mut table: ContextTable<char> = ContextTable::new();
        for sym in ['a', 'b', 'a', 'c', 'a'] {
            table.observe("ctx".to_string(), &sym);
        }
        let entry = table.get("ctx").unwrap();
        let sum: u32 = entry.counts.iter().map(|(_, c)| *c).sum();
        assert_eq!(entry.total, sum);
        assert_eq!(entry.total, 5);
    }

    #[test]
    fn contexts_are_independent() {
        let mut table: ContextTable<String> = ContextTable::new();
        table.observe("2:a|b".to_string(), &"x".to_string());
        table.observe("1:b".to_string(), &"y".to_string());

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("2:a|b").unwrap().count(&"x".to_string()), 1);
        assert_eq!(table.get("2:a|b").unwrap().count(&"y".to_string()), 0);
        assert!(table.get("3:a|b|c").is_none());
    }
}
