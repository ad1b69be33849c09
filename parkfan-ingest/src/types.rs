//! Core types and the Source Adapter trait
//!
//! Every upstream provider is normalized into these shapes before matching
//! or merging:
//! - `ParkMetadata` / `EntityMetadata` - static discovery data, one per (source, item)
//! - `LiveDataResponse` - one per source per fetch cycle, consumed by the resolver
//! - `MatchResult` - output of exactly one pairwise match operation

use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enumerations
// ============================================================================

/// Granularity of an in-park entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Attraction,
    Show,
    Restaurant,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Attraction => write!(f, "attraction"),
            EntityType::Show => write!(f, "show"),
            EntityType::Restaurant => write!(f, "restaurant"),
        }
    }
}

/// Shared operating status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveStatus {
    Operating,
    Down,
    Closed,
    Refurbishment,
}

impl std::fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveStatus::Operating => write!(f, "OPERATING"),
            LiveStatus::Down => write!(f, "DOWN"),
            LiveStatus::Closed => write!(f, "CLOSED"),
            LiveStatus::Refurbishment => write!(f, "REFURBISHMENT"),
        }
    }
}

/// Queue variants reported by richer sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueType {
    Standby,
    SingleRider,
    ReturnTime,
    PaidReturnTime,
    BoardingGroup,
}

// ============================================================================
// Static metadata
// ============================================================================

/// Park as reported by one source, before merging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkMetadata {
    pub external_id: String,
    pub source: String,
    pub name: String,
    pub country: Option<String>,
    pub continent: Option<String>,
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub destination_id: Option<String>,
}

impl ParkMetadata {
    /// Minimal park record; optional fields start empty
    pub fn new(source: &str, external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            source: source.to_string(),
            name: name.into(),
            country: None,
            continent: None,
            timezone: None,
            latitude: None,
            longitude: None,
            destination_id: None,
        }
    }

    /// Coordinates when present, finite, in range, and not the (0, 0) placeholder
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        valid_coordinates(self.latitude, self.longitude)
    }
}

/// Attraction, show, or restaurant as reported by one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    pub external_id: String,
    pub source: String,
    pub name: String,
    pub entity_type: EntityType,
    pub park_external_id: Option<String>,
    pub land_external_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EntityMetadata {
    pub fn new(
        source: &str,
        external_id: impl Into<String>,
        name: impl Into<String>,
        entity_type: EntityType,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            source: source.to_string(),
            name: name.into(),
            entity_type,
            park_external_id: None,
            land_external_id: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        valid_coordinates(self.latitude, self.longitude)
    }
}

fn valid_coordinates(lat: Option<f64>, lon: Option<f64>) -> Option<(f64, f64)> {
    let (lat, lon) = (lat?, lon?);
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    if lat == 0.0 && lon == 0.0 {
        return None;
    }
    Some((lat, lon))
}

// ============================================================================
// Live data
// ============================================================================

/// One queue of an entity (standby, single rider, virtual queue, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDetail {
    pub queue_type: QueueType,
    pub wait_time: Option<u32>,
    pub return_start: Option<DateTime<Utc>>,
    pub return_end: Option<DateTime<Utc>>,
    pub state: Option<String>,
    pub price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub showtime_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningInfo {
    pub wait_time: Option<u32>,
    pub accepts_reservations: Option<bool>,
}

/// Live state of one entity from one source (or merged across sources)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLiveData {
    pub external_id: String,
    pub source: String,
    pub entity_type: EntityType,
    pub name: String,
    pub status: LiveStatus,
    pub wait_time: Option<u32>,
    pub land_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queues: Vec<QueueDetail>,
    pub showtimes: Option<Vec<Showtime>>,
    pub dining_info: Option<DiningInfo>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Sources that contributed to this record (filled by the resolver)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<String>,
}

impl EntityLiveData {
    pub fn new(
        source: &str,
        external_id: impl Into<String>,
        name: impl Into<String>,
        entity_type: EntityType,
        status: LiveStatus,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            source: source.to_string(),
            entity_type,
            name: name.into(),
            status,
            wait_time: None,
            land_external_id: None,
            queues: Vec::new(),
            showtimes: None,
            dining_info: None,
            last_updated: None,
            provenance: Vec::new(),
        }
    }
}

/// Themed area grouping entities (only some sources report lands)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Land {
    pub external_id: String,
    pub name: String,
    pub entity_external_ids: Vec<String>,
}

/// Park-wide crowd estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdLevel {
    /// Percentage-like crowd index as reported upstream
    pub level: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One opening window (e.g. regular day, early entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingHours {
    pub hours_type: String,
    pub opening_time: DateTime<Utc>,
    pub closing_time: DateTime<Utc>,
}

/// Everything one source knows about a park right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDataResponse {
    pub source: String,
    pub park_external_id: String,
    pub entities: Vec<EntityLiveData>,
    pub lands: Option<Vec<Land>>,
    pub crowd_level: Option<CrowdLevel>,
    pub operating_hours: Option<Vec<OperatingHours>>,
    pub fetched_at: DateTime<Utc>,
}

impl LiveDataResponse {
    pub fn empty(source: &str, park_external_id: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            park_external_id: park_external_id.into(),
            entities: Vec::new(),
            lands: None,
            crowd_level: None,
            operating_hours: None,
            fetched_at: parkfan_common::time::now(),
        }
    }
}

// ============================================================================
// Matching output
// ============================================================================

/// How a pair was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ManualOverride,
    Fuzzy,
}

/// One accepted 1:1 pairing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair<T> {
    pub left: T,
    pub right: T,
    /// Confidence in (threshold, 1.0]
    pub confidence: f64,
    pub method: MatchMethod,
}

/// Output of exactly one pairwise match operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult<T> {
    pub matched: Vec<MatchedPair<T>>,
    pub left_only: Vec<T>,
    pub right_only: Vec<T>,
}

impl<T> Default for MatchResult<T> {
    fn default() -> Self {
        Self {
            matched: Vec::new(),
            left_only: Vec::new(),
            right_only: Vec::new(),
        }
    }
}

// ============================================================================
// Source Adapter trait
// ============================================================================

/// Static feature flags declared by each adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCapabilities {
    pub has_schedules: bool,
    pub has_shows: bool,
    pub has_restaurants: bool,
    pub has_lands: bool,
    pub has_forecasts: bool,
    pub has_multiple_queue_types: bool,
}

/// One upstream data provider normalized into the shared schema
///
/// Adapters classify failures into `SourceError` variants and retry transient
/// ones themselves; callers only see errors after retries are exhausted.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used for provenance and mappings
    fn source_id(&self) -> &'static str;

    /// Static 1-10 richness hint; tie-break only, never hard precedence
    fn completeness_score(&self) -> u8;

    fn capabilities(&self) -> SourceCapabilities;

    /// Whether this source can report entities of `entity_type`
    fn supports(&self, entity_type: EntityType) -> bool {
        let caps = self.capabilities();
        match entity_type {
            EntityType::Attraction => true,
            EntityType::Show => caps.has_shows,
            EntityType::Restaurant => caps.has_restaurants,
        }
    }

    async fn fetch_all_parks(&self) -> Result<Vec<ParkMetadata>, SourceError>;

    async fn fetch_park_entities(
        &self,
        park_external_id: &str,
    ) -> Result<Vec<EntityMetadata>, SourceError>;

    async fn fetch_park_live_data(
        &self,
        park_external_id: &str,
    ) -> Result<LiveDataResponse, SourceError>;

    /// Cheap reachability check; the orchestrator maps errors to `false`
    async fn health_check(&self) -> Result<bool, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_coordinates_are_invalid() {
        let mut park = ParkMetadata::new("wiki", "p1", "Origin Park");
        park.latitude = Some(0.0);
        park.longitude = Some(0.0);
        assert!(park.coordinates().is_none());
    }

    #[test]
    fn test_out_of_range_coordinates_are_invalid() {
        let mut park = ParkMetadata::new("wiki", "p1", "Broken Park");
        park.latitude = Some(95.0);
        park.longitude = Some(10.0);
        assert!(park.coordinates().is_none());
    }

    #[test]
    fn test_missing_longitude_is_invalid() {
        let mut entity = EntityMetadata::new("wiki", "e1", "Ride", EntityType::Attraction);
        entity.latitude = Some(48.26);
        assert!(entity.coordinates().is_none());
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&LiveStatus::Refurbishment).unwrap();
        assert_eq!(json, "\"REFURBISHMENT\"");
    }
}
