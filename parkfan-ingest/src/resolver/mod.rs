//! Conflict Resolver
//!
//! Merges the live data that several sources reported for one park into a
//! single `LiveDataResponse`.
//!
//! # Field strategies
//! - **Lands / crowd level**: taken from the source that provides them
//! - **Operating hours**: first non-empty list in priority order; a differing
//!   lower-priority list is logged, never merged
//! - **Entities**: keyed by normalized name, seeded from the richest source;
//!   wait times resolved by consensus over every contributing source
//!
//! Source order inside the input map never affects the result. Only the
//! configured priority does.

pub mod consensus;
pub mod validation;

pub use consensus::{consensus, resolve_wait, round_to_step, WaitSample};
pub use validation::{HoursDiscrepancy, WaitDiscrepancy};

use crate::config::ResolverConfig;
use crate::error::{IngestError, IngestResult};
use crate::matching::normalize_name;
use crate::types::{EntityLiveData, LiveDataResponse};
use consensus::WaitAccumulator;
use std::collections::HashMap;
use tracing::{debug, info};

/// Source label carried by merged responses
pub const AGGREGATED_SOURCE: &str = "aggregated";

/// Merged response plus everything the validators noticed
#[derive(Debug, Clone)]
pub struct Resolution {
    pub response: LiveDataResponse,
    pub wait_discrepancies: Vec<WaitDiscrepancy>,
    pub hours_discrepancies: Vec<HoursDiscrepancy>,
}

/// Entity under construction with its wait-time samples
struct MergedEntity {
    live: EntityLiveData,
    waits: WaitAccumulator,
}

impl MergedEntity {
    fn seed(source: &str, mut live: EntityLiveData, observed_at: chrono::DateTime<chrono::Utc>) -> Self {
        let mut waits = WaitAccumulator::default();
        waits.push(source, live.wait_time, observed_at);
        live.provenance = vec![source.to_string()];
        Self { live, waits }
    }

    /// Fold another source's view of the same entity into this one
    fn absorb(&mut self, source: &str, other: EntityLiveData, observed_at: chrono::DateTime<chrono::Utc>) {
        self.live.provenance.push(source.to_string());
        self.waits.push(source, other.wait_time, observed_at);

        let live = &mut self.live;
        if live.queues.is_empty() {
            live.queues = other.queues;
        }
        if live.showtimes.is_none() {
            live.showtimes = other.showtimes;
        }
        if live.dining_info.is_none() {
            live.dining_info = other.dining_info;
        }
        if live.land_external_id.is_none() {
            live.land_external_id = other.land_external_id;
        }
        live.last_updated = live.last_updated.max(other.last_updated);
    }

    fn has_source(&self, source: &str) -> bool {
        self.live.provenance.iter().any(|s| s == source)
    }
}

#[derive(Debug, Clone)]
pub struct ConflictResolver {
    config: ResolverConfig,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl ConflictResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Merge per-source results into one response
    ///
    /// # Errors
    /// `NoDataAvailable` when the map is empty. Any single source suffices.
    pub fn aggregate(
        &self,
        source_results: HashMap<String, LiveDataResponse>,
    ) -> IngestResult<LiveDataResponse> {
        self.resolve(source_results).map(|r| r.response)
    }

    /// Like `aggregate`, also returning the validation reports
    pub fn resolve(
        &self,
        source_results: HashMap<String, LiveDataResponse>,
    ) -> IngestResult<Resolution> {
        self.resolve_ranked(source_results, &[])
    }

    /// `resolve` with the caller's source ranking taking precedence over
    /// the configured priority
    pub fn resolve_ranked(
        &self,
        source_results: HashMap<String, LiveDataResponse>,
        ranking: &[&str],
    ) -> IngestResult<Resolution> {
        let ordered = self.order_by_priority(source_results, ranking);
        let Some((_, richest)) = ordered.first() else {
            return Err(IngestError::NoDataAvailable("unknown".to_string()));
        };

        let park_external_id = richest.park_external_id.clone();
        let fetched_at = ordered
            .iter()
            .map(|(_, r)| r.fetched_at)
            .max()
            .unwrap_or(richest.fetched_at);
        let sources: Vec<String> = ordered.iter().map(|(s, _)| s.clone()).collect();

        let lands = ordered.iter().find_map(|(_, r)| r.lands.clone());
        let crowd_level = ordered.iter().find_map(|(_, r)| r.crowd_level.clone());
        let (operating_hours, hours_discrepancies) = self.pick_hours(&ordered);

        let mut wait_discrepancies = Vec::new();
        let entities = self.merge_entities(ordered, &mut wait_discrepancies);

        info!(
            park_id = %park_external_id,
            sources = ?sources,
            entities = entities.len(),
            wait_discrepancies = wait_discrepancies.len(),
            "Aggregated live data"
        );

        Ok(Resolution {
            response: LiveDataResponse {
                source: AGGREGATED_SOURCE.to_string(),
                park_external_id,
                entities,
                lands,
                crowd_level,
                operating_hours,
                fetched_at,
            },
            wait_discrepancies,
            hours_discrepancies,
        })
    }

    /// Explicit ranking, then configured priority, then id order
    fn order_by_priority(
        &self,
        mut results: HashMap<String, LiveDataResponse>,
        ranking: &[&str],
    ) -> Vec<(String, LiveDataResponse)> {
        let mut ordered = Vec::with_capacity(results.len());
        let configured = self.config.priority.iter().map(String::as_str);
        for source in ranking.iter().copied().chain(configured) {
            if let Some(response) = results.remove(source) {
                ordered.push((source.to_string(), response));
            }
        }

        let mut rest: Vec<(String, LiveDataResponse)> = results.into_iter().collect();
        rest.sort_by(|a, b| a.0.cmp(&b.0));
        ordered.extend(rest);
        ordered
    }

    fn pick_hours(
        &self,
        ordered: &[(String, LiveDataResponse)],
    ) -> (Option<Vec<crate::types::OperatingHours>>, Vec<HoursDiscrepancy>) {
        let mut with_hours = ordered.iter().filter_map(|(source, r)| {
            r.operating_hours
                .as_ref()
                .filter(|h| !h.is_empty())
                .map(|h| (source, h))
        });

        let Some((kept_source, kept)) = with_hours.next() else {
            return (None, Vec::new());
        };

        let discrepancies = with_hours
            .filter_map(|(source, hours)| validation::check_hours(kept_source, kept, source, hours))
            .collect();

        (Some(kept.clone()), discrepancies)
    }

    fn merge_entities(
        &self,
        ordered: Vec<(String, LiveDataResponse)>,
        discrepancies: &mut Vec<WaitDiscrepancy>,
    ) -> Vec<EntityLiveData> {
        let mut merged: Vec<MergedEntity> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for (source, response) in ordered {
            let fetched_at = response.fetched_at;
            for entity in response.entities {
                let observed_at = entity.last_updated.unwrap_or(fetched_at);
                let key = normalize_name(&entity.name);

                match by_key.get(&key).copied() {
                    Some(idx) if !merged[idx].has_source(&source) => {
                        merged[idx].absorb(&source, entity, observed_at);
                    }
                    Some(_) => {
                        // Same name twice within one source: keep both apart
                        debug!(source = %source, entity = %entity.name, "Duplicate entity name within source");
                        merged.push(MergedEntity::seed(&source, entity, observed_at));
                    }
                    None => {
                        by_key.insert(key, merged.len());
                        merged.push(MergedEntity::seed(&source, entity, observed_at));
                    }
                }
            }
        }

        let window = chrono::Duration::minutes(i64::from(self.config.validation_window_minutes));
        merged
            .into_iter()
            .map(|MergedEntity { mut live, waits }| {
                if waits.samples().len() >= 2 {
                    if let Some(report) = validation::check_wait_times(
                        &live.name,
                        waits.samples(),
                        window,
                        self.config.discrepancy_threshold_minutes,
                    ) {
                        discrepancies.push(report);
                    }
                }
                live.wait_time = waits.resolve(self.config.wait_time_rounding);
                live
            })
            .collect()
    }
}
