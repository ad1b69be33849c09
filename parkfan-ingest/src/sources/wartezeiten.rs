//! Wartezeiten.app adapter
//!
//! Crowd-level source (completeness 4). Reports wait times with its own
//! status vocabulary, a park-wide crowd level, and opening times. The
//! upstream enforces a strict per-minute quota, so every request runs under
//! a `RateGovernor`; an upstream 429 blocks the source for every process
//! sharing the same `SharedState`.
//!
//! # API Reference
//! - `GET /v1/parks` (header `language`)
//! - `GET /v1/waitingtimes` (headers `park`, `language`)
//! - `GET /v1/crowdlevel` (header `park`)
//! - `GET /v1/openingtimes` (header `park`)

use crate::config::SourceSettings;
use crate::error::SourceError;
use crate::quota::{RateGovernor, SharedState};
use crate::sources::http::HttpClient;
use crate::sources::retry::{with_backoff, RetryPolicy};
use crate::sources::{map_status, WARTEZEITEN};
use crate::types::{
    CrowdLevel, EntityLiveData, EntityMetadata, EntityType, LiveDataResponse, LiveStatus,
    OperatingHours, ParkMetadata, SourceAdapter, SourceCapabilities,
};
use async_trait::async_trait;
use chrono::Utc;
use parkfan_common::time::parse_rfc3339;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.wartezeiten.app";
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
const LANGUAGE: &str = "en";

const STATUS_TABLE: &[(&str, LiveStatus)] = &[
    ("opened", LiveStatus::Operating),
    ("virtualqueue", LiveStatus::Operating),
    ("maintenance", LiveStatus::Down),
    ("closedice", LiveStatus::Closed),
    ("closedweather", LiveStatus::Closed),
    ("closed", LiveStatus::Closed),
    ("refurbishment", LiveStatus::Refurbishment),
];

// ============================================================================
// Upstream payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct WzPark {
    id: String,
    name: String,
    land: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WzWaitingTime {
    code: String,
    name: String,
    waitingtime: Option<u32>,
    status: String,
    datetime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WzCrowdLevel {
    crowd_level: f64,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WzOpeningTime {
    opened_today: bool,
    open_from: Option<String>,
    closed_from: Option<String>,
}

// ============================================================================
// Adapter
// ============================================================================

pub struct WartezeitenAdapter {
    http: HttpClient,
    retry: RetryPolicy,
    governor: RateGovernor,
}

impl WartezeitenAdapter {
    pub fn new(settings: &SourceSettings, shared: Arc<dyn SharedState>) -> Result<Self, SourceError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let per_minute = settings
            .requests_per_minute
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE);

        Ok(Self {
            http: HttpClient::new(WARTEZEITEN, base_url, settings.timeout())?,
            retry: RetryPolicy::from(settings),
            governor: RateGovernor::new(WARTEZEITEN, per_minute, settings.block_duration(), shared),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        park: Option<&str>,
    ) -> Result<T, SourceError> {
        let http = &self.http;
        let governor = &self.governor;
        with_backoff(WARTEZEITEN, operation, self.retry, move || async move {
            governor
                .call(move || async move {
                    match park {
                        Some(park) => {
                            http.get_json(path, &[("park", park), ("language", LANGUAGE)])
                                .await
                        }
                        None => http.get_json(path, &[("language", LANGUAGE)]).await,
                    }
                })
                .await
        })
        .await
    }

    async fn waiting_times(&self, park_external_id: &str) -> Result<Vec<WzWaitingTime>, SourceError> {
        self.get("waiting times", "/v1/waitingtimes", Some(park_external_id))
            .await
    }

    /// Optional extras must not fail the whole live fetch
    async fn optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        park_external_id: &str,
    ) -> Option<T> {
        match self.get(operation, path, Some(park_external_id)).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(source = WARTEZEITEN, park_id = park_external_id, operation, error = %e, "Optional data unavailable");
                None
            }
        }
    }
}

fn convert_waiting_time(item: WzWaitingTime) -> EntityLiveData {
    let status = map_status(WARTEZEITEN, STATUS_TABLE, &item.status);
    let mut live = EntityLiveData::new(WARTEZEITEN, item.code, item.name, EntityType::Attraction, status);
    live.wait_time = item.waitingtime.filter(|_| status == LiveStatus::Operating);
    live.last_updated = item.datetime.as_deref().and_then(parse_rfc3339);
    live
}

fn convert_opening_times(times: Vec<WzOpeningTime>) -> Option<Vec<OperatingHours>> {
    let hours: Vec<OperatingHours> = times
        .into_iter()
        .filter(|t| t.opened_today)
        .filter_map(|t| {
            Some(OperatingHours {
                hours_type: "OPERATING".to_string(),
                opening_time: parse_rfc3339(t.open_from.as_deref()?)?,
                closing_time: parse_rfc3339(t.closed_from.as_deref()?)?,
            })
        })
        .collect();
    (!hours.is_empty()).then_some(hours)
}

#[async_trait]
impl SourceAdapter for WartezeitenAdapter {
    fn source_id(&self) -> &'static str {
        WARTEZEITEN
    }

    fn completeness_score(&self) -> u8 {
        4
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            has_schedules: true,
            ..SourceCapabilities::default()
        }
    }

    async fn fetch_all_parks(&self) -> Result<Vec<ParkMetadata>, SourceError> {
        let parks: Vec<WzPark> = self.get("parks", "/v1/parks", None).await?;
        let parks: Vec<ParkMetadata> = parks
            .into_iter()
            .map(|p| {
                let mut meta = ParkMetadata::new(WARTEZEITEN, p.id, p.name);
                meta.country = p.land;
                meta
            })
            .collect();

        info!(source = WARTEZEITEN, parks = parks.len(), "Fetched parks");
        Ok(parks)
    }

    async fn fetch_park_entities(
        &self,
        park_external_id: &str,
    ) -> Result<Vec<EntityMetadata>, SourceError> {
        let entities: Vec<EntityMetadata> = self
            .waiting_times(park_external_id)
            .await?
            .into_iter()
            .map(|w| {
                let mut meta = EntityMetadata::new(WARTEZEITEN, w.code, w.name, EntityType::Attraction);
                meta.park_external_id = Some(park_external_id.to_string());
                meta
            })
            .collect();

        debug!(source = WARTEZEITEN, park_id = park_external_id, entities = entities.len(), "Fetched entities");
        Ok(entities)
    }

    async fn fetch_park_live_data(
        &self,
        park_external_id: &str,
    ) -> Result<LiveDataResponse, SourceError> {
        let waits = self.waiting_times(park_external_id).await?;

        let mut response = LiveDataResponse::empty(WARTEZEITEN, park_external_id);
        response.entities = waits.into_iter().map(convert_waiting_time).collect();

        response.crowd_level = self
            .optional::<WzCrowdLevel>("crowd level", "/v1/crowdlevel", park_external_id)
            .await
            .map(|c| CrowdLevel {
                level: c.crowd_level,
                timestamp: c.timestamp.as_deref().and_then(parse_rfc3339),
            });

        response.operating_hours = self
            .optional::<Vec<WzOpeningTime>>("opening times", "/v1/openingtimes", park_external_id)
            .await
            .and_then(convert_opening_times);

        response.fetched_at = Utc::now();
        Ok(response)
    }

    async fn health_check(&self) -> Result<bool, SourceError> {
        // A blocked source is unhealthy without spending quota on a request
        self.governor.ensure_open().await?;
        let parks: Vec<WzPark> = self.get("health", "/v1/parks", None).await?;
        Ok(!parks.is_empty())
    }
}
