//! Mappings and collaborator contracts
//!
//! A `Mapping` ties one source's external id to an internal park or entity.
//! Matching proposes them; a `MappingStore` persists them under a
//! (source, external id) uniqueness constraint. Follow-up work is handed to a
//! `JobSink` as opaque `JobItem`s; the scheduler itself lives elsewhere.
//!
//! In-memory implementations of both contracts back the CLI and the tests.

use crate::error::{IngestError, IngestResult};
use crate::types::{EntityMetadata, EntityType, MatchMethod, MatchedPair, ParkMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Mapping
// ============================================================================

/// Kind of internal record a mapping points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappedType {
    Park,
    Attraction,
    Show,
    Restaurant,
}

impl From<EntityType> for MappedType {
    fn from(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Attraction => MappedType::Attraction,
            EntityType::Show => MappedType::Show,
            EntityType::Restaurant => MappedType::Restaurant,
        }
    }
}

/// How a mapping was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    ManualOverride,
    Fuzzy,
    /// Record known to one source only
    SingleSource,
}

impl From<MatchMethod> for MappingMethod {
    fn from(method: MatchMethod) -> Self {
        match method {
            MatchMethod::ManualOverride => MappingMethod::ManualOverride,
            MatchMethod::Fuzzy => MappingMethod::Fuzzy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub internal_entity_id: Uuid,
    pub internal_entity_type: MappedType,
    /// Internal park the entity belongs to (None for park mappings)
    pub park_internal_id: Option<Uuid>,
    pub external_source: String,
    pub external_entity_id: String,
    pub confidence: f64,
    pub method: MappingMethod,
    /// Operator-confirmed; never replaced by an unverified proposal
    pub verified: bool,
}

impl Mapping {
    fn key(&self) -> (String, String) {
        (self.external_source.clone(), self.external_entity_id.clone())
    }
}

/// Mappings for both sides of an accepted park match
pub fn propose_park_mappings(internal_id: Uuid, pair: &MatchedPair<ParkMetadata>) -> Vec<Mapping> {
    let method = MappingMethod::from(pair.method);
    [&pair.left, &pair.right]
        .into_iter()
        .map(|park| Mapping {
            internal_entity_id: internal_id,
            internal_entity_type: MappedType::Park,
            park_internal_id: None,
            external_source: park.source.clone(),
            external_entity_id: park.external_id.clone(),
            confidence: pair.confidence,
            method,
            verified: method == MappingMethod::ManualOverride,
        })
        .collect()
}

/// Mappings for both sides of an accepted entity match
pub fn propose_entity_mappings(
    internal_id: Uuid,
    park_internal_id: Uuid,
    pair: &MatchedPair<EntityMetadata>,
) -> Vec<Mapping> {
    let method = MappingMethod::from(pair.method);
    [&pair.left, &pair.right]
        .into_iter()
        .map(|entity| Mapping {
            internal_entity_id: internal_id,
            internal_entity_type: entity.entity_type.into(),
            park_internal_id: Some(park_internal_id),
            external_source: entity.source.clone(),
            external_entity_id: entity.external_id.clone(),
            confidence: pair.confidence,
            method,
            verified: method == MappingMethod::ManualOverride,
        })
        .collect()
}

/// Mapping for a park only one source knows about
pub fn single_park_mapping(internal_id: Uuid, park: &ParkMetadata) -> Mapping {
    Mapping {
        internal_entity_id: internal_id,
        internal_entity_type: MappedType::Park,
        park_internal_id: None,
        external_source: park.source.clone(),
        external_entity_id: park.external_id.clone(),
        confidence: 1.0,
        method: MappingMethod::SingleSource,
        verified: false,
    }
}

/// Mapping for an entity only one source knows about
pub fn single_entity_mapping(
    internal_id: Uuid,
    park_internal_id: Uuid,
    entity: &EntityMetadata,
) -> Mapping {
    Mapping {
        internal_entity_id: internal_id,
        internal_entity_type: entity.entity_type.into(),
        park_internal_id: Some(park_internal_id),
        external_source: entity.source.clone(),
        external_entity_id: entity.external_id.clone(),
        confidence: 1.0,
        method: MappingMethod::SingleSource,
        verified: false,
    }
}

// ============================================================================
// Persistence contract
// ============================================================================

#[derive(Debug, Error)]
pub enum MappingStoreError {
    /// Another writer inserted the same (source, external id) first
    #[error("duplicate mapping for {source_id}/{external_id}")]
    Duplicate {
        source_id: String,
        external_id: String,
    },

    #[error("mapping store failure: {0}")]
    Backend(String),
}

impl From<MappingStoreError> for IngestError {
    fn from(err: MappingStoreError) -> Self {
        IngestError::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_mapping_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Mapping>, MappingStoreError>;

    /// Insert or update on (source, external id); returns the stored row
    async fn upsert_mapping(&self, mapping: Mapping) -> Result<Mapping, MappingStoreError>;

    /// Entity mappings belonging to an internal park
    async fn find_entities_by_park(
        &self,
        park_internal_id: Uuid,
    ) -> Result<Vec<Mapping>, MappingStoreError>;
}

/// Internal id already assigned to any of the given (source, external id) keys
pub async fn existing_internal_id<'a, I>(
    store: &dyn MappingStore,
    keys: I,
) -> IngestResult<Option<Uuid>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (source, external_id) in keys {
        if let Some(mapping) = store.find_mapping_by_external_id(source, external_id).await? {
            return Ok(Some(mapping.internal_entity_id));
        }
    }
    Ok(None)
}

/// Upsert every mapping; a lost duplicate-key race counts as success
pub async fn record_mappings(
    store: &dyn MappingStore,
    mappings: Vec<Mapping>,
) -> IngestResult<usize> {
    let mut stored = 0;
    for mapping in mappings {
        match store.upsert_mapping(mapping).await {
            Ok(_) => stored += 1,
            Err(MappingStoreError::Duplicate {
                source_id,
                external_id,
            }) => {
                debug!(source = %source_id, external_id = %external_id, "Concurrent mapping insert, keeping existing row");
                stored += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(stored)
}

/// Mapping store held in memory
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    rows: RwLock<HashMap<(String, String), Mapping>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Mapping> {
        self.rows.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn find_mapping_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Mapping>, MappingStoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(source.to_string(), external_id.to_string()))
            .cloned())
    }

    async fn upsert_mapping(&self, mapping: Mapping) -> Result<Mapping, MappingStoreError> {
        let mut rows = self.rows.write().await;
        let stored = match rows.get(&mapping.key()) {
            // Verified rows are only replaced by verified rows
            Some(existing) if existing.verified && !mapping.verified => existing.clone(),
            _ => {
                rows.insert(mapping.key(), mapping.clone());
                mapping
            }
        };
        Ok(stored)
    }

    async fn find_entities_by_park(
        &self,
        park_internal_id: Uuid,
    ) -> Result<Vec<Mapping>, MappingStoreError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Mapping> = rows
            .values()
            .filter(|m| m.park_internal_id == Some(park_internal_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(found)
    }
}

// ============================================================================
// Job contract
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Re-run mapping reconciliation for a park known to several sources
    ResyncMappings {
        park_name: String,
        /// source id -> external park id
        external_ids: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub kind: JobKind,
    /// Higher runs first
    pub priority: u8,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl JobItem {
    pub fn new(kind: JobKind, priority: u8) -> Self {
        Self {
            kind,
            priority,
            attempts: 0,
            enqueued_at: parkfan_common::time::now(),
        }
    }
}

#[async_trait]
pub trait JobSink: Send + Sync {
    async fn enqueue(&self, job: JobItem) -> IngestResult<()>;
}

/// FIFO job queue held in memory
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<JobItem>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Remove and return every queued job, highest priority first
    pub async fn drain(&self) -> Vec<JobItem> {
        let mut jobs = std::mem::take(&mut *self.jobs.lock().await);
        // Stable sort keeps FIFO order within one priority
        jobs.sort_by(|a, b| b.priority.cmp(&a.priority));
        jobs
    }
}

#[async_trait]
impl JobSink for InMemoryJobQueue {
    async fn enqueue(&self, job: JobItem) -> IngestResult<()> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}
