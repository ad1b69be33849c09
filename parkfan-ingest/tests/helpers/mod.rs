//! Shared fixtures for integration tests
//!
//! `MockSource` is a scripted `SourceAdapter`: each operation returns a
//! canned result and counts how often it was called.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parkfan_ingest::types::{
    EntityLiveData, EntityMetadata, EntityType, LiveDataResponse, LiveStatus, ParkMetadata,
    SourceCapabilities,
};
use parkfan_ingest::{SourceAdapter, SourceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct MockSource {
    pub id: &'static str,
    pub completeness: u8,
    pub parks: Result<Vec<ParkMetadata>, SourceError>,
    pub entities: Result<Vec<EntityMetadata>, SourceError>,
    pub live: Result<LiveDataResponse, SourceError>,
    pub healthy: Result<bool, SourceError>,
    pub live_calls: AtomicUsize,
}

impl MockSource {
    pub fn new(id: &'static str, completeness: u8) -> Self {
        Self {
            id,
            completeness,
            parks: Ok(Vec::new()),
            entities: Ok(Vec::new()),
            live: Ok(LiveDataResponse::empty(id, "unused")),
            healthy: Ok(true),
            live_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_parks(mut self, parks: Vec<ParkMetadata>) -> Self {
        self.parks = Ok(parks);
        self
    }

    pub fn with_entities(mut self, entities: Vec<EntityMetadata>) -> Self {
        self.entities = Ok(entities);
        self
    }

    pub fn with_live(mut self, live: LiveDataResponse) -> Self {
        self.live = Ok(live);
        self
    }

    /// Every operation fails with an exhausted-retries error
    pub fn failing(mut self) -> Self {
        let err = SourceError::unavailable(self.id, "connection reset");
        self.parks = Err(err.clone());
        self.entities = Err(err.clone());
        self.live = Err(err.clone());
        self.healthy = Err(err);
        self
    }

    pub fn blocked(mut self) -> Self {
        self.live = Err(SourceError::QuotaExceeded {
            source_id: self.id.to_string(),
            retry_after: std::time::Duration::from_secs(900),
        });
        self
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn source_id(&self) -> &'static str {
        self.id
    }

    fn completeness_score(&self) -> u8 {
        self.completeness
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::default()
    }

    async fn fetch_all_parks(&self) -> Result<Vec<ParkMetadata>, SourceError> {
        self.parks.clone()
    }

    async fn fetch_park_entities(&self, _: &str) -> Result<Vec<EntityMetadata>, SourceError> {
        self.entities.clone()
    }

    async fn fetch_park_live_data(&self, _: &str) -> Result<LiveDataResponse, SourceError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        self.live.clone()
    }

    async fn health_check(&self) -> Result<bool, SourceError> {
        self.healthy.clone()
    }
}

pub fn as_adapter(source: &Arc<MockSource>) -> Arc<dyn SourceAdapter> {
    source.clone()
}

pub fn park(source: &str, id: &str, name: &str) -> ParkMetadata {
    ParkMetadata::new(source, id, name)
}

pub fn park_in(source: &str, id: &str, name: &str, country: &str) -> ParkMetadata {
    let mut p = ParkMetadata::new(source, id, name);
    p.country = Some(country.to_string());
    p
}

pub fn attraction(source: &str, id: &str, name: &str) -> EntityMetadata {
    EntityMetadata::new(source, id, name, EntityType::Attraction)
}

pub fn fixed_time(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap()
}

pub fn ride(source: &str, id: &str, name: &str, wait: Option<u32>) -> EntityLiveData {
    let mut e = EntityLiveData::new(source, id, name, EntityType::Attraction, LiveStatus::Operating);
    e.wait_time = wait;
    e.last_updated = Some(fixed_time(0));
    e
}

pub fn live(source: &str, park_id: &str, entities: Vec<EntityLiveData>) -> LiveDataResponse {
    let mut r = LiveDataResponse::empty(source, park_id);
    r.entities = entities;
    r.fetched_at = fixed_time(1);
    r
}

pub fn ids(pairs: &[(&str, &str)]) -> std::collections::HashMap<String, String> {
    pairs
        .iter()
        .map(|(s, id)| (s.to_string(), id.to_string()))
        .collect()
}
