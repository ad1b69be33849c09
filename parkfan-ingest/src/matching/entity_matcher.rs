//! Entity matching within one park
//!
//! Only entities of the same type are compared. With coordinates on both
//! sides the score is `0.8 * name + 0.2 * geo` where geo decays linearly to
//! zero at 1 km; otherwise the name similarity is the whole score.

use super::geo::{haversine_km, linear_decay};
use super::normalize::name_similarity;
use super::{greedy_match, OverrideTable};
use crate::config::MatchingConfig;
use crate::types::{EntityMetadata, MatchResult};
use tracing::debug;

pub const DEFAULT_ENTITY_THRESHOLD: f64 = 0.8;

const NAME_WEIGHT: f64 = 0.8;
const GEO_WEIGHT: f64 = 0.2;
const GEO_RADIUS_KM: f64 = 1.0;

/// Match confidence in [0, 1]; 0 for entities of different types
pub fn score_entities(a: &EntityMetadata, b: &EntityMetadata) -> f64 {
    if a.entity_type != b.entity_type {
        return 0.0;
    }

    let name = name_similarity(&a.name, &b.name);
    let score = match (a.coordinates(), b.coordinates()) {
        (Some(pa), Some(pb)) => {
            NAME_WEIGHT * name + GEO_WEIGHT * linear_decay(haversine_km(pa, pb), GEO_RADIUS_KM)
        }
        _ => name,
    };
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct EntityMatcher {
    threshold: f64,
    overrides: OverrideTable,
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ENTITY_THRESHOLD,
            overrides: OverrideTable::new(),
        }
    }
}

impl EntityMatcher {
    pub fn new(threshold: f64, overrides: OverrideTable) -> Self {
        Self { threshold, overrides }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.entity_threshold, OverrideTable::from_pairs(&config.overrides))
    }

    /// Pair entities of `left` with same-typed entities of `right`
    pub fn match_entities(
        &self,
        left: &[EntityMetadata],
        right: &[EntityMetadata],
    ) -> MatchResult<EntityMetadata> {
        let result = greedy_match(left, right, self.threshold, &self.overrides, score_entities);
        debug!(
            left = left.len(),
            right = right.len(),
            matched = result.matched.len(),
            "Matched entities"
        );
        result
    }
}
