//! ThemeParks.wiki adapter
//!
//! Richest source (completeness 10): destinations with parks, typed entity
//! trees, live data with multiple queue types, showtimes, dining availability,
//! and schedules.
//!
//! # API Reference
//! - `GET /destinations` - destinations with their park ids
//! - `GET /entity/{id}` - entity document (timezone, location)
//! - `GET /entity/{id}/children` - attractions, shows, restaurants of a park
//! - `GET /entity/{id}/live` - live status and queues
//! - `GET /entity/{id}/schedule` - operating hours
//!
//! No hard quota; requests are spaced by an in-process politeness limiter.

use crate::config::SourceSettings;
use crate::error::SourceError;
use crate::sources::http::HttpClient;
use crate::sources::retry::{with_backoff, RetryPolicy};
use crate::sources::{map_status, THEMEPARKS_WIKI};
use crate::types::{
    DiningInfo, EntityLiveData, EntityMetadata, EntityType, LiveDataResponse, LiveStatus,
    OperatingHours, ParkMetadata, QueueDetail, QueueType, Showtime, SourceAdapter,
    SourceCapabilities,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parkfan_common::time::parse_rfc3339;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.themeparks.wiki/v1";

const POLITENESS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

/// Park documents fetched in parallel during discovery
const PARK_DETAIL_CONCURRENCY: usize = 4;

const STATUS_TABLE: &[(&str, LiveStatus)] = &[
    ("OPERATING", LiveStatus::Operating),
    ("DOWN", LiveStatus::Down),
    ("CLOSED", LiveStatus::Closed),
    ("REFURBISHMENT", LiveStatus::Refurbishment),
];

// ============================================================================
// Upstream payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct DestinationsResponse {
    destinations: Vec<WikiDestination>,
}

#[derive(Debug, Deserialize)]
struct WikiDestination {
    id: String,
    #[serde(default)]
    parks: Vec<WikiParkRef>,
}

#[derive(Debug, Deserialize)]
struct WikiParkRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiEntityDoc {
    timezone: Option<String>,
    location: Option<WikiLocation>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct WikiLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    children: Vec<WikiChild>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiChild {
    id: String,
    name: String,
    entity_type: String,
    parent_id: Option<String>,
    location: Option<WikiLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveResponse {
    #[serde(default)]
    live_data: Vec<WikiLive>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiLive {
    id: String,
    name: String,
    entity_type: String,
    status: Option<String>,
    last_updated: Option<String>,
    queue: Option<HashMap<String, WikiQueue>>,
    showtimes: Option<Vec<WikiShowtime>>,
    dining_availability: Option<Vec<WikiDining>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiQueue {
    wait_time: Option<f64>,
    state: Option<String>,
    return_start: Option<String>,
    return_end: Option<String>,
    price: Option<WikiPrice>,
}

#[derive(Debug, Deserialize)]
struct WikiPrice {
    formatted: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiShowtime {
    #[serde(rename = "type")]
    showtime_type: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiDining {
    wait_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    schedule: Vec<WikiScheduleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikiScheduleEntry {
    date: String,
    #[serde(rename = "type")]
    entry_type: String,
    opening_time: String,
    closing_time: String,
}

// ============================================================================
// Adapter
// ============================================================================

pub struct ThemeParksWikiAdapter {
    http: HttpClient,
    retry: RetryPolicy,
    limiter: DefaultDirectRateLimiter,
}

impl ThemeParksWikiAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            http: HttpClient::new(THEMEPARKS_WIKI, base_url, settings.timeout())?,
            retry: RetryPolicy::from(settings),
            limiter: RateLimiter::direct(Quota::per_second(POLITENESS_PER_SECOND)),
        })
    }

    async fn get<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T, SourceError> {
        let http = &self.http;
        let limiter = &self.limiter;
        with_backoff(THEMEPARKS_WIKI, operation, self.retry, move || async move {
            limiter.until_ready().await;
            http.get_json(path, &[]).await
        })
        .await
    }

    /// Park document lookup; failures degrade to a name-only record
    async fn park_details(&self, destination_id: String, park: WikiParkRef) -> ParkMetadata {
        let mut meta = ParkMetadata::new(THEMEPARKS_WIKI, park.id.clone(), park.name);
        meta.destination_id = Some(destination_id);

        match self
            .get::<WikiEntityDoc>("park details", &format!("/entity/{}", park.id))
            .await
        {
            Ok(doc) => {
                meta.timezone = doc.timezone;
                if let Some(location) = doc.location {
                    meta.latitude = location.latitude;
                    meta.longitude = location.longitude;
                }
            }
            Err(e) => {
                warn!(source = THEMEPARKS_WIKI, park_id = %park.id, error = %e, "Park details unavailable");
            }
        }
        meta
    }

    async fn fetch_hours(&self, park_external_id: &str) -> Option<Vec<OperatingHours>> {
        let path = format!("/entity/{}/schedule", park_external_id);
        match self.get::<ScheduleResponse>("schedule", &path).await {
            Ok(schedule) => {
                let hours = current_day_hours(&schedule.schedule);
                (!hours.is_empty()).then_some(hours)
            }
            Err(e) => {
                warn!(source = THEMEPARKS_WIKI, park_id = park_external_id, error = %e, "Schedule unavailable");
                None
            }
        }
    }
}

fn entity_type(raw: &str) -> Option<EntityType> {
    match raw.to_ascii_uppercase().as_str() {
        "ATTRACTION" => Some(EntityType::Attraction),
        "SHOW" => Some(EntityType::Show),
        "RESTAURANT" => Some(EntityType::Restaurant),
        _ => None,
    }
}

fn queue_type(raw: &str) -> Option<QueueType> {
    match raw {
        "STANDBY" => Some(QueueType::Standby),
        "SINGLE_RIDER" => Some(QueueType::SingleRider),
        "RETURN_TIME" => Some(QueueType::ReturnTime),
        "PAID_RETURN_TIME" => Some(QueueType::PaidReturnTime),
        "BOARDING_GROUP" => Some(QueueType::BoardingGroup),
        _ => None,
    }
}

fn minutes(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
}

fn convert_live(item: WikiLive) -> Option<EntityLiveData> {
    let entity_type = entity_type(&item.entity_type)?;
    let status = item
        .status
        .as_deref()
        .map(|s| map_status(THEMEPARKS_WIKI, STATUS_TABLE, s))
        .unwrap_or(LiveStatus::Closed);

    let mut queues: Vec<QueueDetail> = item
        .queue
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, q)| {
            Some(QueueDetail {
                queue_type: queue_type(&key)?,
                wait_time: minutes(q.wait_time),
                return_start: q.return_start.as_deref().and_then(parse_rfc3339),
                return_end: q.return_end.as_deref().and_then(parse_rfc3339),
                state: q.state,
                price: q.price.and_then(|p| p.formatted),
            })
        })
        .collect();
    queues.sort_by_key(|q| q.queue_type as u8);

    let wait_time = queues
        .iter()
        .find(|q| q.queue_type == QueueType::Standby)
        .and_then(|q| q.wait_time);

    let showtimes = item.showtimes.map(|times| {
        times
            .into_iter()
            .map(|s| Showtime {
                showtime_type: s.showtime_type,
                start_time: s.start_time.as_deref().and_then(parse_rfc3339),
                end_time: s.end_time.as_deref().and_then(parse_rfc3339),
            })
            .collect()
    });

    let dining_info = item.dining_availability.map(|slots| DiningInfo {
        wait_time: slots.iter().filter_map(|d| minutes(d.wait_time)).min(),
        accepts_reservations: None,
    });

    let mut live = EntityLiveData::new(THEMEPARKS_WIKI, item.id, item.name, entity_type, status);
    live.wait_time = wait_time;
    live.queues = queues;
    live.showtimes = showtimes;
    live.dining_info = dining_info;
    live.last_updated = item.last_updated.as_deref().and_then(parse_rfc3339);
    Some(live)
}

/// Entries for the first schedule date that has not fully closed yet
fn current_day_hours(entries: &[WikiScheduleEntry]) -> Vec<OperatingHours> {
    let now = Utc::now();
    let parsed: Vec<(&str, OperatingHours)> = entries
        .iter()
        .filter_map(|e| {
            Some((
                e.date.as_str(),
                OperatingHours {
                    hours_type: e.entry_type.clone(),
                    opening_time: parse_rfc3339(&e.opening_time)?,
                    closing_time: parse_rfc3339(&e.closing_time)?,
                },
            ))
        })
        .collect();

    let Some(current_date) = parsed
        .iter()
        .find(|(_, h)| h.closing_time >= now)
        .map(|(date, _)| *date)
    else {
        return Vec::new();
    };

    parsed
        .into_iter()
        .filter(|(date, _)| *date == current_date)
        .map(|(_, hours)| hours)
        .collect()
}

#[async_trait]
impl SourceAdapter for ThemeParksWikiAdapter {
    fn source_id(&self) -> &'static str {
        THEMEPARKS_WIKI
    }

    fn completeness_score(&self) -> u8 {
        10
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            has_schedules: true,
            has_shows: true,
            has_restaurants: true,
            has_lands: false,
            has_forecasts: true,
            has_multiple_queue_types: true,
        }
    }

    async fn fetch_all_parks(&self) -> Result<Vec<ParkMetadata>, SourceError> {
        let response: DestinationsResponse = self.get("destinations", "/destinations").await?;

        let refs: Vec<(String, WikiParkRef)> = response
            .destinations
            .into_iter()
            .flat_map(|d| {
                let destination_id = d.id;
                d.parks
                    .into_iter()
                    .map(move |p| (destination_id.clone(), p))
            })
            .collect();

        let parks: Vec<ParkMetadata> = stream::iter(refs)
            .map(|(destination_id, park)| self.park_details(destination_id, park))
            .buffered(PARK_DETAIL_CONCURRENCY)
            .collect()
            .await;

        info!(source = THEMEPARKS_WIKI, parks = parks.len(), "Fetched parks");
        Ok(parks)
    }

    async fn fetch_park_entities(
        &self,
        park_external_id: &str,
    ) -> Result<Vec<EntityMetadata>, SourceError> {
        let path = format!("/entity/{}/children", park_external_id);
        let response: ChildrenResponse = self.get("children", &path).await?;

        let entities: Vec<EntityMetadata> = response
            .children
            .into_iter()
            .filter_map(|child| {
                let entity_type = entity_type(&child.entity_type)?;
                let mut meta = EntityMetadata::new(THEMEPARKS_WIKI, child.id, child.name, entity_type);
                meta.park_external_id = child
                    .parent_id
                    .or_else(|| Some(park_external_id.to_string()));
                if let Some(location) = child.location {
                    meta.latitude = location.latitude;
                    meta.longitude = location.longitude;
                }
                Some(meta)
            })
            .collect();

        debug!(source = THEMEPARKS_WIKI, park_id = park_external_id, entities = entities.len(), "Fetched entities");
        Ok(entities)
    }

    async fn fetch_park_live_data(
        &self,
        park_external_id: &str,
    ) -> Result<LiveDataResponse, SourceError> {
        let path = format!("/entity/{}/live", park_external_id);
        let live: LiveResponse = self.get("live", &path).await?;

        let mut response = LiveDataResponse::empty(THEMEPARKS_WIKI, park_external_id);
        response.entities = live.live_data.into_iter().filter_map(convert_live).collect();
        response.operating_hours = self.fetch_hours(park_external_id).await;
        response.fetched_at = Utc::now();
        Ok(response)
    }

    async fn health_check(&self) -> Result<bool, SourceError> {
        let response: DestinationsResponse = self.get("health", "/destinations").await?;
        Ok(!response.destinations.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_item(json: serde_json::Value) -> WikiLive {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_source_identity() {
        let adapter = ThemeParksWikiAdapter::new(&SourceSettings::default()).unwrap();
        assert_eq!(adapter.source_id(), THEMEPARKS_WIKI);
        assert_eq!(adapter.completeness_score(), 10);
        assert!(adapter.supports(EntityType::Restaurant));
    }

    #[test]
    fn test_convert_live_prefers_standby_wait() {
        let item = live_item(serde_json::json!({
            "id": "ride-1",
            "name": "Taron",
            "entityType": "ATTRACTION",
            "status": "OPERATING",
            "lastUpdated": "2024-06-01T10:00:00Z",
            "queue": {
                "SINGLE_RIDER": { "waitTime": 10 },
                "STANDBY": { "waitTime": 35 }
            }
        }));
        let live = convert_live(item).unwrap();
        assert_eq!(live.status, LiveStatus::Operating);
        assert_eq!(live.wait_time, Some(35));
        assert_eq!(live.queues.len(), 2);
        assert_eq!(live.queues[0].queue_type, QueueType::Standby);
        assert!(live.last_updated.is_some());
    }

    #[test]
    fn test_convert_live_unknown_status_is_closed() {
        let item = live_item(serde_json::json!({
            "id": "ride-2",
            "name": "Mystery",
            "entityType": "ATTRACTION",
            "status": "WEATHER_DELAY"
        }));
        assert_eq!(convert_live(item).unwrap().status, LiveStatus::Closed);
    }

    #[test]
    fn test_convert_live_skips_non_entities() {
        let item = live_item(serde_json::json!({
            "id": "hotel-1",
            "name": "Hotel Ling Bao",
            "entityType": "HOTEL",
            "status": "OPERATING"
        }));
        assert!(convert_live(item).is_none());
    }

    #[test]
    fn test_current_day_hours_skips_past_days() {
        let entries = vec![
            WikiScheduleEntry {
                date: "2000-01-01".into(),
                entry_type: "OPERATING".into(),
                opening_time: "2000-01-01T09:00:00Z".into(),
                closing_time: "2000-01-01T18:00:00Z".into(),
            },
            WikiScheduleEntry {
                date: "2999-01-01".into(),
                entry_type: "OPERATING".into(),
                opening_time: "2999-01-01T09:00:00Z".into(),
                closing_time: "2999-01-01T18:00:00Z".into(),
            },
            WikiScheduleEntry {
                date: "2999-01-01".into(),
                entry_type: "EXTRA_HOURS".into(),
                opening_time: "2999-01-01T08:00:00Z".into(),
                closing_time: "2999-01-01T09:00:00Z".into(),
            },
        ];
        let hours = current_day_hours(&entries);
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].hours_type, "OPERATING");
    }
}
