//! Entity Matcher
//!
//! Pairs records for the same real-world park or entity across two sources.
//! Both matchers share one greedy, best-first algorithm:
//!
//! 1. Walk the left list in input order
//! 2. Accept a manual override hit immediately (confidence 1.0)
//! 3. Otherwise score every unconsumed right candidate and accept the best
//!    one if it strictly exceeds the threshold
//! 4. A matched candidate is marked consumed and never offered again
//!
//! Matching is pure over its inputs and deterministic: ties between
//! candidates go to the earliest right item, ties between claimants go to
//! the earliest left item.

pub mod entity_matcher;
pub mod geo;
pub mod normalize;
pub mod overrides;
pub mod park_matcher;

pub use entity_matcher::EntityMatcher;
pub use normalize::{name_similarity, normalize_name};
pub use overrides::OverrideTable;
pub use park_matcher::ParkMatcher;

use crate::types::{EntityMetadata, MatchMethod, MatchResult, MatchedPair, ParkMetadata};

/// Record that can take part in greedy matching
pub trait Matchable: Clone {
    /// Display name used for override lookups
    fn match_name(&self) -> &str;

    /// Whether two records may be paired at all
    fn compatible_with(&self, _other: &Self) -> bool {
        true
    }
}

impl Matchable for ParkMetadata {
    fn match_name(&self) -> &str {
        &self.name
    }
}

impl Matchable for EntityMetadata {
    fn match_name(&self) -> &str {
        &self.name
    }

    fn compatible_with(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type
    }
}

/// Greedy one-to-one matching over a consumed-marker set
pub(crate) fn greedy_match<T, F>(
    left: &[T],
    right: &[T],
    threshold: f64,
    overrides: &OverrideTable,
    score: F,
) -> MatchResult<T>
where
    T: Matchable,
    F: Fn(&T, &T) -> f64,
{
    let mut consumed = vec![false; right.len()];
    let mut result = MatchResult::default();

    for item in left {
        let override_hit = (!overrides.is_empty())
            .then(|| {
                right.iter().enumerate().position(|(idx, candidate)| {
                    !consumed[idx]
                        && item.compatible_with(candidate)
                        && overrides.is_override(item.match_name(), candidate.match_name())
                })
            })
            .flatten();

        if let Some(idx) = override_hit {
            consumed[idx] = true;
            result.matched.push(MatchedPair {
                left: item.clone(),
                right: right[idx].clone(),
                confidence: 1.0,
                method: MatchMethod::ManualOverride,
            });
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in right.iter().enumerate() {
            if consumed[idx] || !item.compatible_with(candidate) {
                continue;
            }
            let s = score(item, candidate);
            if best.map_or(true, |(_, best_score)| s > best_score) {
                best = Some((idx, s));
            }
        }

        match best {
            Some((idx, confidence)) if confidence > threshold => {
                consumed[idx] = true;
                result.matched.push(MatchedPair {
                    left: item.clone(),
                    right: right[idx].clone(),
                    confidence,
                    method: MatchMethod::Fuzzy,
                });
            }
            _ => result.left_only.push(item.clone()),
        }
    }

    result.right_only = right
        .iter()
        .zip(&consumed)
        .filter(|(_, taken)| !**taken)
        .map(|(candidate, _)| candidate.clone())
        .collect();

    result
}
