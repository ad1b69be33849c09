//! Manual match overrides
//!
//! Pairs of names an operator has declared identical. Keys are normalized
//! names and every pair is stored in both directions, so an override fires
//! regardless of which side of a match the names appear on.

use super::normalize::normalize_name;
use crate::config::OverridePair;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    pairs: HashMap<String, HashSet<String>>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[OverridePair]) -> Self {
        let mut table = Self::new();
        for pair in pairs {
            table.insert(&pair.left, &pair.right);
        }
        table
    }

    pub fn insert(&mut self, a: &str, b: &str) {
        let a = normalize_name(a);
        let b = normalize_name(b);
        if a.is_empty() || b.is_empty() {
            return;
        }
        self.pairs.entry(a.clone()).or_default().insert(b.clone());
        self.pairs.entry(b).or_default().insert(a);
    }

    /// True when `a` and `b` were declared identical, in either order
    pub fn is_override(&self, a: &str, b: &str) -> bool {
        let a = normalize_name(a);
        let b = normalize_name(b);
        self.pairs.get(&a).is_some_and(|partners| partners.contains(&b))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        // Each pair is stored twice
        self.pairs.values().map(HashSet::len).sum::<usize>() / 2
    }
}
