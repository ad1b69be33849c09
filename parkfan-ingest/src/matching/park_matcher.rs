//! Park matching across sources
//!
//! Score with coordinates on both sides:
//! `0.5 * name + country(±0.15) + timezone(±0.05) + 0.3 * geo`
//!
//! Without coordinates the geo term is dropped and the name weight becomes
//! 0.8, so a strong name match alone can clear the threshold. Known and
//! differing continents veto the pair outright.

use super::geo::{corrected_distance_km, linear_decay};
use super::normalize::{country_code, name_similarity, resolve_continent};
use super::{greedy_match, OverrideTable};
use crate::config::MatchingConfig;
use crate::types::{MatchResult, ParkMetadata};
use tracing::debug;

pub const DEFAULT_PARK_THRESHOLD: f64 = 0.75;

const NAME_WEIGHT_WITH_GEO: f64 = 0.5;
const NAME_WEIGHT_WITHOUT_GEO: f64 = 0.8;
const COUNTRY_WEIGHT: f64 = 0.15;
const TIMEZONE_WEIGHT: f64 = 0.05;
const GEO_WEIGHT: f64 = 0.3;

const SAME_COUNTRY_RADIUS_KM: f64 = 50.0;
const OTHER_COUNTRY_RADIUS_KM: f64 = 500.0;

/// +1 match, -1 mismatch, 0 when either side is unknown
fn agreement<T: PartialEq>(a: Option<T>, b: Option<T>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a == b => 1.0,
        (Some(_), Some(_)) => -1.0,
        _ => 0.0,
    }
}

fn timezone_key(tz: Option<&str>) -> Option<String> {
    tz.map(|t| t.trim().to_ascii_lowercase()).filter(|t| !t.is_empty())
}

/// Match confidence in [0, 1] for two parks from different sources
pub fn score_parks(a: &ParkMetadata, b: &ParkMetadata) -> f64 {
    let continent_a = resolve_continent(a.continent.as_deref(), a.country.as_deref());
    let continent_b = resolve_continent(b.continent.as_deref(), b.country.as_deref());
    if let (Some(ca), Some(cb)) = (continent_a, continent_b) {
        if ca != cb {
            return 0.0;
        }
    }

    let name = name_similarity(&a.name, &b.name);
    let country = agreement(
        a.country.as_deref().and_then(country_code),
        b.country.as_deref().and_then(country_code),
    );
    let timezone = agreement(
        timezone_key(a.timezone.as_deref()),
        timezone_key(b.timezone.as_deref()),
    );

    let score = match (a.coordinates(), b.coordinates()) {
        (Some(pa), Some(pb)) => {
            let radius = if country > 0.0 {
                SAME_COUNTRY_RADIUS_KM
            } else {
                OTHER_COUNTRY_RADIUS_KM
            };
            let geo = linear_decay(corrected_distance_km(pa, pb), radius);
            NAME_WEIGHT_WITH_GEO * name
                + COUNTRY_WEIGHT * country
                + TIMEZONE_WEIGHT * timezone
                + GEO_WEIGHT * geo
        }
        _ => NAME_WEIGHT_WITHOUT_GEO * name + COUNTRY_WEIGHT * country + TIMEZONE_WEIGHT * timezone,
    };

    score.clamp(0.0, 1.0)
}

/// Park matcher with its threshold and override table
#[derive(Debug, Clone)]
pub struct ParkMatcher {
    threshold: f64,
    overrides: OverrideTable,
}

impl Default for ParkMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PARK_THRESHOLD,
            overrides: OverrideTable::new(),
        }
    }
}

impl ParkMatcher {
    pub fn new(threshold: f64, overrides: OverrideTable) -> Self {
        Self { threshold, overrides }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.park_threshold, OverrideTable::from_pairs(&config.overrides))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Pair parks of `left` with parks of `right`
    pub fn match_parks(
        &self,
        left: &[ParkMetadata],
        right: &[ParkMetadata],
    ) -> MatchResult<ParkMetadata> {
        let result = greedy_match(left, right, self.threshold, &self.overrides, score_parks);
        debug!(
            left = left.len(),
            right = right.len(),
            matched = result.matched.len(),
            left_only = result.left_only.len(),
            right_only = result.right_only.len(),
            "Matched parks"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchMethod;

    fn park(source: &str, id: &str, name: &str) -> ParkMetadata {
        ParkMetadata::new(source, id, name)
    }

    fn located(
        source: &str,
        id: &str,
        name: &str,
        country: Option<&str>,
        lat: f64,
        lon: f64,
    ) -> ParkMetadata {
        let mut p = park(source, id, name);
        p.country = country.map(String::from);
        p.latitude = Some(lat);
        p.longitude = Some(lon);
        p
    }

    #[test]
    fn test_close_parks_with_similar_names_match() {
        let mut a = located("s1", "1", "Movie Park Germany", Some("Germany"), 51.6206, 6.9731);
        a.continent = Some("Europe".into());
        let mut b = located("s2", "99", "Movie Park Germani", Some("Deutschland"), 51.6230, 6.9760);
        b.continent = Some("europe".into());

        assert!(name_similarity(&a.name, &b.name) > 0.9);
        let result = ParkMatcher::default().match_parks(&[a], &[b]);

        assert_eq!(result.matched.len(), 1);
        assert!(result.matched[0].confidence > 0.9, "got {}", result.matched[0].confidence);
        assert_eq!(result.matched[0].method, MatchMethod::Fuzzy);
    }

    #[test]
    fn test_continent_veto() {
        let mut a = located("s1", "1", "Legoland", None, 55.7353, 9.1264);
        a.continent = Some("Europe".into());
        let mut b = located("s2", "2", "Legoland", None, 55.7353, 9.1264);
        b.continent = Some("North America".into());

        assert_eq!(score_parks(&a, &b), 0.0);
        let result = ParkMatcher::default().match_parks(&[a], &[b]);
        assert!(result.matched.is_empty());
    }

    #[test]
    fn test_continent_from_country_vetoes() {
        let mut a = park("s1", "1", "Legoland Resort");
        a.country = Some("Japan".into());
        let mut b = park("s2", "2", "Legoland Resort");
        b.continent = Some("Europe".into());
        assert_eq!(score_parks(&a, &b), 0.0);
    }

    #[test]
    fn test_name_alone_clears_threshold() {
        let a = park("s1", "1", "Efteling");
        let b = park("s2", "2", "Efteling");
        let score = score_parks(&a, &b);
        assert!((score - 0.8).abs() < 1e-9);
        assert_eq!(ParkMatcher::default().match_parks(&[a], &[b]).matched.len(), 1);
    }

    #[test]
    fn test_country_mismatch_penalized() {
        let mut a = park("s1", "1", "Sea World");
        a.country = Some("United States".into());
        let mut b = park("s2", "2", "Sea World");
        b.country = Some("Australia".into());
        b.continent = None;
        // Different continents resolved from the countries
        assert_eq!(score_parks(&a, &b), 0.0);

        let mut c = park("s2", "3", "Sea World");
        c.country = Some("Canada".into());
        let score = score_parks(&a, &c);
        assert!((score - (0.8 - 0.15)).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_timezone_contributes() {
        let mut a = park("s1", "1", "Efteling");
        a.timezone = Some("Europe/Amsterdam".into());
        let mut b = park("s2", "2", "Efteling");
        b.timezone = Some("europe/amsterdam".into());
        assert!((score_parks(&a, &b) - 0.85).abs() < 1e-9);

        b.timezone = Some("Europe/Berlin".into());
        assert!((score_parks(&a, &b) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_flipped_longitude_still_matches() {
        let a = located("s1", "1", "Magic Kingdom Park", Some("United States"), 28.4177, -81.5812);
        let b = located("s2", "2", "Magic Kingdom", Some("USA"), 28.4177, 81.5812);
        let result = ParkMatcher::default().match_parks(&[a], &[b]);
        assert_eq!(result.matched.len(), 1);
    }

    #[test]
    fn test_far_apart_parks_do_not_match() {
        let a = located("s1", "1", "Six Flags Over Texas", Some("US"), 32.7555, -97.0703);
        let b = located("s2", "2", "Six Flags Over Georgia", Some("US"), 33.7702, -84.5514);
        let result = ParkMatcher::default().match_parks(&[a], &[b]);
        assert!(result.matched.is_empty());
        assert_eq!(result.left_only.len(), 1);
        assert_eq!(result.right_only.len(), 1);
    }

    #[test]
    fn test_threshold_is_strict() {
        let a = park("s1", "1", "Efteling");
        let b = park("s2", "2", "Efteling");
        let matcher = ParkMatcher::new(score_parks(&a, &b), OverrideTable::new());
        assert!(matcher.match_parks(&[a], &[b]).matched.is_empty());
    }

    #[test]
    fn test_override_from_config() {
        let config = MatchingConfig {
            overrides: vec![crate::config::OverridePair {
                left: "Walt Disney Studios Park".into(),
                right: "Disney Adventure World".into(),
            }],
            ..MatchingConfig::default()
        };
        let a = park("s1", "1", "Walt Disney Studios Park");
        let b = park("s2", "2", "Disney Adventure World");

        let result = ParkMatcher::from_config(&config).match_parks(&[a], &[b]);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].method, MatchMethod::ManualOverride);
    }

    #[test]
    fn test_earlier_left_item_claims_first() {
        let left = vec![park("s1", "1", "Efteling"), park("s1", "2", "Efteling")];
        let right = vec![park("s2", "9", "Efteling")];
        let result = ParkMatcher::default().match_parks(&left, &right);

        assert_eq!(result.matched[0].left.external_id, "1");
        assert_eq!(result.left_only[0].external_id, "2");
    }
}
