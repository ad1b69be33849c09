//! Queue-Times adapter
//!
//! Lands source (completeness 6). Parks come grouped by operating company
//! with country, continent, coordinates and timezone; live rides come grouped
//! into lands. Every entity is reported as an attraction and status is a
//! plain open/closed flag.
//!
//! # API Reference
//! - `GET /parks.json` - companies with their parks
//! - `GET /parks/{id}/queue_times.json` - lands with rides, plus unthemed rides

use crate::config::SourceSettings;
use crate::error::SourceError;
use crate::sources::http::HttpClient;
use crate::sources::retry::{with_backoff, RetryPolicy};
use crate::sources::{map_status, QUEUE_TIMES};
use crate::types::{
    EntityLiveData, EntityMetadata, EntityType, Land, LiveDataResponse, LiveStatus, ParkMetadata,
    SourceAdapter, SourceCapabilities,
};
use async_trait::async_trait;
use chrono::Utc;
use parkfan_common::time::parse_rfc3339;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://queue-times.com";

const STATUS_TABLE: &[(&str, LiveStatus)] = &[
    ("open", LiveStatus::Operating),
    ("closed", LiveStatus::Closed),
];

// ============================================================================
// Upstream payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct QtCompany {
    #[serde(default)]
    parks: Vec<QtPark>,
}

#[derive(Debug, Deserialize)]
struct QtPark {
    id: u64,
    name: String,
    country: Option<String>,
    continent: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QtQueueTimes {
    #[serde(default)]
    lands: Vec<QtLand>,
    #[serde(default)]
    rides: Vec<QtRide>,
}

#[derive(Debug, Deserialize)]
struct QtLand {
    id: u64,
    name: String,
    #[serde(default)]
    rides: Vec<QtRide>,
}

#[derive(Debug, Deserialize)]
struct QtRide {
    id: u64,
    name: String,
    is_open: bool,
    wait_time: Option<u32>,
    last_updated: Option<String>,
}

/// Coordinates arrive as strings ("49.8") or numbers depending on the park
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<NumOrString>::deserialize(deserializer)? {
        Some(NumOrString::Num(v)) => Some(v),
        Some(NumOrString::Str(s)) => s.trim().parse().ok(),
        None => None,
    })
}

// ============================================================================
// Adapter
// ============================================================================

pub struct QueueTimesAdapter {
    http: HttpClient,
    retry: RetryPolicy,
}

impl QueueTimesAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: HttpClient::new(QUEUE_TIMES, base_url, settings.timeout())?,
            retry: RetryPolicy::from(settings),
        })
    }

    async fn get<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T, SourceError> {
        let http = &self.http;
        with_backoff(QUEUE_TIMES, operation, self.retry, move || async move {
            http.get_json(path, &[]).await
        })
        .await
    }

    async fn queue_times(&self, park_external_id: &str) -> Result<QtQueueTimes, SourceError> {
        let path = format!("/parks/{}/queue_times.json", park_external_id);
        self.get("queue times", &path).await
    }
}

/// Rides paired with the land they belong to (`None` for unthemed rides)
fn rides_with_lands(payload: &QtQueueTimes) -> impl Iterator<Item = (Option<u64>, &QtRide)> {
    payload
        .lands
        .iter()
        .flat_map(|land| land.rides.iter().map(move |r| (Some(land.id), r)))
        .chain(payload.rides.iter().map(|r| (None, r)))
}

fn convert_ride(land_id: Option<u64>, ride: &QtRide) -> EntityLiveData {
    let raw_status = if ride.is_open { "open" } else { "closed" };
    let status = map_status(QUEUE_TIMES, STATUS_TABLE, raw_status);

    let mut live = EntityLiveData::new(
        QUEUE_TIMES,
        ride.id.to_string(),
        ride.name.clone(),
        EntityType::Attraction,
        status,
    );
    // Closed rides report 0, which is not a real wait
    live.wait_time = ride.wait_time.filter(|_| ride.is_open);
    live.land_external_id = land_id.map(|id| id.to_string());
    live.last_updated = ride.last_updated.as_deref().and_then(parse_rfc3339);
    live
}

fn convert_lands(payload: &QtQueueTimes) -> Vec<Land> {
    payload
        .lands
        .iter()
        .map(|land| Land {
            external_id: land.id.to_string(),
            name: land.name.clone(),
            entity_external_ids: land.rides.iter().map(|r| r.id.to_string()).collect(),
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for QueueTimesAdapter {
    fn source_id(&self) -> &'static str {
        QUEUE_TIMES
    }

    fn completeness_score(&self) -> u8 {
        6
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            has_lands: true,
            ..SourceCapabilities::default()
        }
    }

    async fn fetch_all_parks(&self) -> Result<Vec<ParkMetadata>, SourceError> {
        let companies: Vec<QtCompany> = self.get("parks", "/parks.json").await?;

        let parks: Vec<ParkMetadata> = companies
            .into_iter()
            .flat_map(|c| c.parks)
            .map(|p| {
                let mut meta = ParkMetadata::new(QUEUE_TIMES, p.id.to_string(), p.name);
                meta.country = p.country;
                meta.continent = p.continent;
                meta.latitude = p.latitude;
                meta.longitude = p.longitude;
                meta.timezone = p.timezone;
                meta
            })
            .collect();

        info!(source = QUEUE_TIMES, parks = parks.len(), "Fetched parks");
        Ok(parks)
    }

    async fn fetch_park_entities(
        &self,
        park_external_id: &str,
    ) -> Result<Vec<EntityMetadata>, SourceError> {
        let payload = self.queue_times(park_external_id).await?;

        let entities: Vec<EntityMetadata> = rides_with_lands(&payload)
            .map(|(land_id, ride)| {
                let mut meta = EntityMetadata::new(
                    QUEUE_TIMES,
                    ride.id.to_string(),
                    ride.name.clone(),
                    EntityType::Attraction,
                );
                meta.park_external_id = Some(park_external_id.to_string());
                meta.land_external_id = land_id.map(|id| id.to_string());
                meta
            })
            .collect();

        debug!(source = QUEUE_TIMES, park_id = park_external_id, entities = entities.len(), "Fetched entities");
        Ok(entities)
    }

    async fn fetch_park_live_data(
        &self,
        park_external_id: &str,
    ) -> Result<LiveDataResponse, SourceError> {
        let payload = self.queue_times(park_external_id).await?;

        let mut response = LiveDataResponse::empty(QUEUE_TIMES, park_external_id);
        response.entities = rides_with_lands(&payload)
            .map(|(land_id, ride)| convert_ride(land_id, ride))
            .collect();
        let lands = convert_lands(&payload);
        response.lands = (!lands.is_empty()).then_some(lands);
        response.fetched_at = Utc::now();
        Ok(response)
    }

    async fn health_check(&self) -> Result<bool, SourceError> {
        let companies: Vec<QtCompany> = self.get("health", "/parks.json").await?;
        Ok(!companies.is_empty())
    }
}
