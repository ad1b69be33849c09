//! Orchestrator
//!
//! Fans out to every registered source and fans back in with per-source
//! error isolation: a failing, slow or blocked source never cancels its
//! siblings. Every cross-source call completes when its slowest task does.
//!
//! Matching always anchors on the primary source, the registered source
//! ranked first by the configured priority. Registration order is ignored.

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult, SourceError};
use crate::mapping::{
    existing_internal_id, propose_entity_mappings, propose_park_mappings, record_mappings,
    single_entity_mapping, single_park_mapping, JobItem, JobKind, JobSink, MappingStore,
};
use crate::matching::{EntityMatcher, ParkMatcher};
use crate::quota::SharedState;
use crate::resolver::{ConflictResolver, Resolution};
use crate::sources::build_adapters;
use crate::types::{EntityMetadata, LiveDataResponse, MatchResult, MatchedPair, ParkMetadata, SourceAdapter};
use futures::future::join_all;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Priority of follow-up mapping resync jobs
pub const RESYNC_PRIORITY: u8 = 5;

// ============================================================================
// Discovery output
// ============================================================================

/// One real-world park as seen by several sources
#[derive(Debug, Clone)]
pub struct ParkGroup {
    /// Record every match in the group was made against
    pub anchor: ParkMetadata,
    /// Accepted matches with `anchor` on the left
    pub matches: Vec<MatchedPair<ParkMetadata>>,
}

impl ParkGroup {
    fn new(anchor: ParkMetadata) -> Self {
        Self {
            anchor,
            matches: Vec::new(),
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &ParkMetadata> {
        std::iter::once(&self.anchor).chain(self.matches.iter().map(|m| &m.right))
    }

    /// source id -> external park id
    pub fn external_ids(&self) -> BTreeMap<String, String> {
        self.members()
            .map(|p| (p.source.clone(), p.external_id.clone()))
            .collect()
    }

    /// Weakest link of the group
    pub fn confidence(&self) -> f64 {
        self.matches
            .iter()
            .map(|m| m.confidence)
            .fold(1.0, f64::min)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParkDiscovery {
    pub primary_source: Option<String>,
    /// Primary park matched by at least one secondary
    pub fully_matched: Vec<ParkGroup>,
    /// Secondaries matched with each other but not with the primary
    pub cross_matched: Vec<ParkGroup>,
    /// Parks known to one source only
    pub single_source: Vec<ParkMetadata>,
    pub failed_sources: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityDiscovery {
    /// Highest-priority source that returned entities
    pub anchor_source: Option<String>,
    pub anchor_entities: Vec<EntityMetadata>,
    /// Secondary source id -> match against the anchor entities
    pub matches: BTreeMap<String, MatchResult<EntityMetadata>>,
    pub failed_sources: Vec<String>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    priority: Vec<String>,
    park_matcher: ParkMatcher,
    entity_matcher: EntityMatcher,
    resolver: ConflictResolver,
    jobs: Option<Arc<dyn JobSink>>,
}

impl Orchestrator {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            adapters: Vec::new(),
            priority: config.resolver.priority.clone(),
            park_matcher: ParkMatcher::from_config(&config.matching),
            entity_matcher: EntityMatcher::from_config(&config.matching),
            resolver: ConflictResolver::new(config.resolver.clone()),
            jobs: None,
        }
    }

    /// Orchestrator with every adapter enabled in `config` registered
    ///
    /// # Errors
    /// `Source` when an adapter cannot build its HTTP client.
    pub fn from_config(config: &IngestConfig, shared: Arc<dyn SharedState>) -> IngestResult<Self> {
        let mut orchestrator = Self::new(config);
        for adapter in build_adapters(config, shared)? {
            orchestrator.register_source(adapter);
        }
        Ok(orchestrator)
    }

    /// Emit follow-up jobs to `sink`
    pub fn with_job_sink(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.jobs = Some(sink);
        self
    }

    /// Register an adapter; a second adapter with the same id is ignored
    pub fn register_source(&mut self, adapter: Arc<dyn SourceAdapter>) -> bool {
        let id = adapter.source_id();
        if self.adapters.iter().any(|a| a.source_id() == id) {
            debug!(source = id, "Source already registered");
            return false;
        }
        info!(source = id, completeness = adapter.completeness_score(), "Registered source");
        self.adapters.push(adapter);
        true
    }

    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// Registered adapters, primary first
    ///
    /// Ranked by configured priority, then completeness score, then id.
    pub fn ranked_sources(&self) -> Vec<Arc<dyn SourceAdapter>> {
        let mut ranked = self.adapters.clone();
        ranked.sort_by_key(|a| {
            let position = self
                .priority
                .iter()
                .position(|p| p == a.source_id())
                .unwrap_or(usize::MAX);
            (position, Reverse(a.completeness_score()), a.source_id())
        });
        ranked
    }

    pub fn primary_source(&self) -> Option<&'static str> {
        self.ranked_sources().first().map(|a| a.source_id())
    }

    // ------------------------------------------------------------------------
    // Park discovery
    // ------------------------------------------------------------------------

    /// Fetch every source's park list and reconcile them into groups
    pub async fn discover_all_parks(&self) -> ParkDiscovery {
        let ranked = self.ranked_sources();
        let Some(primary) = ranked.first() else {
            warn!("Park discovery with no registered sources");
            return ParkDiscovery::default();
        };

        let fetches = ranked.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let id = adapter.source_id();
                match adapter.fetch_all_parks().await {
                    Ok(parks) => {
                        debug!(source = id, parks = parks.len(), "Fetched park list");
                        (id, Some(parks))
                    }
                    Err(e) => {
                        log_source_failure(id, "park discovery", &e);
                        (id, None)
                    }
                }
            }
        });
        let results = join_all(fetches).await;

        let mut discovery = ParkDiscovery {
            primary_source: Some(primary.source_id().to_string()),
            ..ParkDiscovery::default()
        };
        let mut lists: Vec<(&'static str, Vec<ParkMetadata>)> = Vec::with_capacity(results.len());
        for (id, parks) in results {
            if parks.is_none() {
                discovery.failed_sources.push(id.to_string());
            }
            lists.push((id, parks.unwrap_or_default()));
        }

        let mut lists = lists.into_iter();
        let (_, primary_parks) = lists.next().unwrap_or_default();
        let secondaries: Vec<(&'static str, Vec<ParkMetadata>)> = lists.collect();

        // Primary pass: each secondary independently against the primary
        let mut groups: Vec<ParkGroup> = primary_parks.iter().cloned().map(ParkGroup::new).collect();
        let mut leftovers: Vec<(&'static str, Vec<ParkMetadata>)> = Vec::with_capacity(secondaries.len());
        for (id, parks) in secondaries {
            let result = self.park_matcher.match_parks(&primary_parks, &parks);
            for pair in result.matched {
                if let Some(group) = groups
                    .iter_mut()
                    .find(|g| g.anchor.external_id == pair.left.external_id)
                {
                    group.matches.push(pair);
                }
            }
            leftovers.push((id, result.right_only));
        }

        for group in groups {
            if group.matches.is_empty() {
                discovery.single_source.push(group.anchor);
            } else {
                discovery.fully_matched.push(group);
            }
        }

        // Second pass: leftovers of the secondaries against each other
        let (cross, singles) = self.cross_match(leftovers);
        discovery.cross_matched = cross;
        discovery.single_source.extend(singles);

        info!(
            primary = primary.source_id(),
            fully_matched = discovery.fully_matched.len(),
            cross_matched = discovery.cross_matched.len(),
            single_source = discovery.single_source.len(),
            failed = ?discovery.failed_sources,
            "Park discovery complete"
        );

        self.enqueue_resync(&discovery).await;
        discovery
    }

    fn cross_match(
        &self,
        mut remaining: Vec<(&'static str, Vec<ParkMetadata>)>,
    ) -> (Vec<ParkGroup>, Vec<ParkMetadata>) {
        let mut groups: Vec<ParkGroup> = Vec::new();
        let mut grouped: HashSet<(String, String)> = HashSet::new();

        for i in 0..remaining.len() {
            for j in (i + 1)..remaining.len() {
                let result = self.park_matcher.match_parks(&remaining[i].1, &remaining[j].1);
                for pair in result.matched {
                    grouped.insert((pair.left.source.clone(), pair.left.external_id.clone()));
                    let existing = groups.iter_mut().find(|g| {
                        g.anchor.source == pair.left.source
                            && g.anchor.external_id == pair.left.external_id
                    });
                    match existing {
                        Some(group) => group.matches.push(pair),
                        None => {
                            let mut group = ParkGroup::new(pair.left.clone());
                            group.matches.push(pair);
                            groups.push(group);
                        }
                    }
                }
                remaining[j].1 = result.right_only;
            }
        }

        let singles = remaining
            .into_iter()
            .flat_map(|(_, parks)| parks)
            .filter(|p| !grouped.contains(&(p.source.clone(), p.external_id.clone())))
            .collect();

        (groups, singles)
    }

    async fn enqueue_resync(&self, discovery: &ParkDiscovery) {
        let Some(sink) = &self.jobs else {
            return;
        };

        for group in discovery.fully_matched.iter().chain(&discovery.cross_matched) {
            let job = JobItem::new(
                JobKind::ResyncMappings {
                    park_name: group.anchor.name.clone(),
                    external_ids: group.external_ids(),
                },
                RESYNC_PRIORITY,
            );
            if let Err(e) = sink.enqueue(job).await {
                warn!(park = %group.anchor.name, error = %e, "Failed to enqueue mapping resync");
            }
        }
    }

    /// Store mappings for every group and single-source park
    ///
    /// Existing internal ids are reused when any member is already mapped.
    pub async fn persist_park_mappings(
        &self,
        store: &dyn MappingStore,
        discovery: &ParkDiscovery,
    ) -> IngestResult<usize> {
        let mut mappings = Vec::new();

        for group in discovery.fully_matched.iter().chain(&discovery.cross_matched) {
            let keys = group
                .members()
                .map(|p| (p.source.as_str(), p.external_id.as_str()));
            let internal_id = existing_internal_id(store, keys)
                .await?
                .unwrap_or_else(Uuid::new_v4);
            mappings.extend(
                group
                    .matches
                    .iter()
                    .flat_map(|pair| propose_park_mappings(internal_id, pair)),
            );
        }

        for park in &discovery.single_source {
            let key = [(park.source.as_str(), park.external_id.as_str())];
            let internal_id = existing_internal_id(store, key)
                .await?
                .unwrap_or_else(Uuid::new_v4);
            mappings.push(single_park_mapping(internal_id, park));
        }

        let stored = record_mappings(store, mappings).await?;
        info!(mappings = stored, "Persisted park mappings");
        Ok(stored)
    }

    // ------------------------------------------------------------------------
    // Entity discovery
    // ------------------------------------------------------------------------

    /// Fetch entity lists for one park and match each secondary to the anchor
    pub async fn discover_park_entities(
        &self,
        source_ids: &HashMap<String, String>,
    ) -> EntityDiscovery {
        let ranked: Vec<(Arc<dyn SourceAdapter>, String)> = self
            .ranked_sources()
            .into_iter()
            .filter_map(|a| source_ids.get(a.source_id()).map(|id| (a, id.clone())))
            .collect();

        let fetches = ranked.into_iter().map(|(adapter, park_id)| async move {
            let id = adapter.source_id();
            match adapter.fetch_park_entities(&park_id).await {
                Ok(entities) => (id, Some(entities)),
                Err(e) => {
                    log_source_failure(id, "entity discovery", &e);
                    (id, None)
                }
            }
        });

        let mut discovery = EntityDiscovery::default();
        let mut lists: Vec<(&'static str, Vec<EntityMetadata>)> = Vec::new();
        for (id, entities) in join_all(fetches).await {
            match entities {
                Some(entities) => lists.push((id, entities)),
                None => discovery.failed_sources.push(id.to_string()),
            }
        }

        let mut lists = lists.into_iter();
        let Some((anchor_id, anchor_entities)) = lists.next() else {
            return discovery;
        };

        for (id, entities) in lists {
            let result = self.entity_matcher.match_entities(&anchor_entities, &entities);
            debug!(
                anchor = anchor_id,
                source = id,
                matched = result.matched.len(),
                "Matched park entities"
            );
            discovery.matches.insert(id.to_string(), result);
        }

        discovery.anchor_source = Some(anchor_id.to_string());
        discovery.anchor_entities = anchor_entities;
        discovery
    }

    /// Store entity mappings for one park
    pub async fn persist_entity_mappings(
        &self,
        store: &dyn MappingStore,
        park_internal_id: Uuid,
        discovery: &EntityDiscovery,
    ) -> IngestResult<usize> {
        let existing: HashMap<(String, String), Uuid> = store
            .find_entities_by_park(park_internal_id)
            .await?
            .into_iter()
            .map(|m| ((m.external_source, m.external_entity_id), m.internal_entity_id))
            .collect();
        let lookup = |e: &EntityMetadata| existing.get(&(e.source.clone(), e.external_id.clone())).copied();

        // Anchor ids first: reuse the anchor's own mapping or any matched partner's
        let mut anchor_ids: HashMap<&str, Uuid> = HashMap::new();
        for entity in &discovery.anchor_entities {
            let partner_id = discovery
                .matches
                .values()
                .flat_map(|r| &r.matched)
                .filter(|pair| pair.left.external_id == entity.external_id)
                .find_map(|pair| lookup(&pair.right));
            let id = lookup(entity).or(partner_id).unwrap_or_else(Uuid::new_v4);
            anchor_ids.insert(entity.external_id.as_str(), id);
        }

        let mut mappings = Vec::new();
        let mut matched_anchors: HashSet<&str> = HashSet::new();
        for result in discovery.matches.values() {
            for pair in &result.matched {
                let Some(id) = anchor_ids.get(pair.left.external_id.as_str()).copied() else {
                    continue;
                };
                matched_anchors.insert(pair.left.external_id.as_str());
                mappings.extend(propose_entity_mappings(id, park_internal_id, pair));
            }
            for entity in &result.right_only {
                let id = lookup(entity).unwrap_or_else(Uuid::new_v4);
                mappings.push(single_entity_mapping(id, park_internal_id, entity));
            }
        }
        for entity in &discovery.anchor_entities {
            if matched_anchors.contains(entity.external_id.as_str()) {
                continue;
            }
            if let Some(id) = anchor_ids.get(entity.external_id.as_str()).copied() {
                mappings.push(single_entity_mapping(id, park_internal_id, entity));
            }
        }

        record_mappings(store, mappings).await
    }

    // ------------------------------------------------------------------------
    // Live data
    // ------------------------------------------------------------------------

    /// Fetch live data from every source that knows this park and merge it
    ///
    /// # Errors
    /// `NoDataAvailable` when no source knows the park or every attempt failed.
    pub async fn fetch_live_data(
        &self,
        park_id: &str,
        source_ids: &HashMap<String, String>,
    ) -> IngestResult<LiveDataResponse> {
        self.fetch_live_resolution(park_id, source_ids)
            .await
            .map(|r| r.response)
    }

    /// `fetch_live_data` plus the resolver's discrepancy reports
    pub async fn fetch_live_resolution(
        &self,
        park_id: &str,
        source_ids: &HashMap<String, String>,
    ) -> IngestResult<Resolution> {
        let attempts: Vec<(Arc<dyn SourceAdapter>, String)> = self
            .adapters
            .iter()
            .filter_map(|a| {
                source_ids
                    .get(a.source_id())
                    .map(|external_id| (Arc::clone(a), external_id.clone()))
            })
            .collect();

        if attempts.is_empty() {
            warn!(park_id, "No registered source knows this park");
            return Err(IngestError::NoDataAvailable(park_id.to_string()));
        }

        let fetches = attempts.into_iter().map(|(adapter, external_id)| async move {
            let id = adapter.source_id();
            match adapter.fetch_park_live_data(&external_id).await {
                Ok(response) => Some((id.to_string(), response)),
                Err(e) => {
                    log_source_failure(id, "live data", &e);
                    None
                }
            }
        });

        let results: HashMap<String, LiveDataResponse> =
            join_all(fetches).await.into_iter().flatten().collect();

        if results.is_empty() {
            warn!(park_id, "Every source failed to return live data");
            return Err(IngestError::NoDataAvailable(park_id.to_string()));
        }

        debug!(park_id, sources = results.len(), "Resolving live data");
        let ranked = self.ranked_sources();
        let ranking: Vec<&str> = ranked.iter().map(|a| a.source_id()).collect();
        self.resolver.resolve_ranked(results, &ranking)
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    /// Health of every registered source; errors count as unhealthy
    pub async fn check_health(&self) -> HashMap<String, bool> {
        let checks = self.adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let id = adapter.source_id();
                let healthy = match adapter.health_check().await {
                    Ok(healthy) => healthy,
                    Err(e) => {
                        log_source_failure(id, "health check", &e);
                        false
                    }
                };
                (id.to_string(), healthy)
            }
        });

        join_all(checks).await.into_iter().collect()
    }
}

fn log_source_failure(source_id: &str, operation: &str, error: &SourceError) {
    if error.is_blocked() {
        info!(source = source_id, operation, error = %error, "Source skipped while blocked");
    } else {
        warn!(source = source_id, operation, error = %error, "Source failed (isolated)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceCapabilities;
    use async_trait::async_trait;

    struct StubSource {
        id: &'static str,
        completeness: u8,
    }

    #[async_trait]
    impl SourceAdapter for StubSource {
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
            Ok(vec![ParkMetadata::new(self.id, "1", "Efteling")])
        }

        async fn fetch_park_entities(&self, _: &str) -> Result<Vec<EntityMetadata>, SourceError> {
            Ok(Vec::new())
        }

        async fn fetch_park_live_data(&self, id: &str) -> Result<LiveDataResponse, SourceError> {
            Ok(LiveDataResponse::empty(self.id, id))
        }

        async fn health_check(&self) -> Result<bool, SourceError> {
            Err(SourceError::unavailable(self.id, "down"))
        }
    }

    fn stub(id: &'static str, completeness: u8) -> Arc<dyn SourceAdapter> {
        Arc::new(StubSource { id, completeness })
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut orchestrator = Orchestrator::new(&IngestConfig::default());
        assert!(orchestrator.register_source(stub("queue-times", 6)));
        assert!(!orchestrator.register_source(stub("queue-times", 6)));
        assert_eq!(orchestrator.source_count(), 1);
    }

    #[test]
    fn test_primary_ignores_registration_order() {
        let mut orchestrator = Orchestrator::new(&IngestConfig::default());
        orchestrator.register_source(stub("wartezeiten", 4));
        orchestrator.register_source(stub("queue-times", 6));
        orchestrator.register_source(stub("themeparks-wiki", 10));

        assert_eq!(orchestrator.primary_source(), Some("themeparks-wiki"));
        let ids: Vec<_> = orchestrator.ranked_sources().iter().map(|a| a.source_id()).collect();
        assert_eq!(ids, vec!["themeparks-wiki", "queue-times", "wartezeiten"]);
    }

    #[test]
    fn test_unconfigured_sources_ranked_by_completeness() {
        let mut orchestrator = Orchestrator::new(&IngestConfig::default());
        orchestrator.register_source(stub("beta", 3));
        orchestrator.register_source(stub("alpha", 7));
        orchestrator.register_source(stub("queue-times", 6));

        let ids: Vec<_> = orchestrator.ranked_sources().iter().map(|a| a.source_id()).collect();
        assert_eq!(ids, vec!["queue-times", "alpha", "beta"]);
    }

    #[test]
    fn test_from_config_registers_enabled_sources() {
        let mut config = IngestConfig::default();
        config.sources.queue_times.enabled = false;

        let shared: Arc<dyn SharedState> = Arc::new(crate::quota::InMemorySharedState::new());
        let orchestrator = Orchestrator::from_config(&config, shared).unwrap();

        assert_eq!(orchestrator.source_count(), 2);
        assert_eq!(orchestrator.primary_source(), Some("themeparks-wiki"));
    }

    #[tokio::test]
    async fn test_health_error_maps_to_false() {
        let mut orchestrator = Orchestrator::new(&IngestConfig::default());
        orchestrator.register_source(stub("queue-times", 6));

        let health = orchestrator.check_health().await;
        assert_eq!(health.get("queue-times"), Some(&false));
    }

    #[tokio::test]
    async fn test_live_data_without_known_ids_fails() {
        let mut orchestrator = Orchestrator::new(&IngestConfig::default());
        orchestrator.register_source(stub("queue-times", 6));

        let err = orchestrator
            .fetch_live_data("park-1", &HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no live data available for park park-1");
    }

    #[tokio::test]
    async fn test_discovery_without_sources_is_empty() {
        let orchestrator = Orchestrator::new(&IngestConfig::default());
        let discovery = orchestrator.discover_all_parks().await;
        assert!(discovery.primary_source.is_none());
        assert!(discovery.single_source.is_empty());
    }
}
