//! Source adapters
//!
//! One adapter per upstream provider, each implementing `SourceAdapter`:
//! 1. **themeparks_wiki** - richest source: entities, queues, showtimes, schedules
//! 2. **queue_times** - parks with geo metadata, rides grouped into lands
//! 3. **wartezeiten** - wait times and crowd levels, strict quota (Rate Governor)
//!
//! Shared plumbing: `http` (status classification), `retry` (exponential
//! backoff), and the status vocabulary lookup below.

pub mod http;
pub mod queue_times;
pub mod retry;
pub mod themeparks_wiki;
pub mod wartezeiten;

pub use queue_times::QueueTimesAdapter;
pub use retry::{with_backoff, RetryPolicy};
pub use themeparks_wiki::ThemeParksWikiAdapter;
pub use wartezeiten::WartezeitenAdapter;

use crate::config::IngestConfig;
use crate::error::SourceError;
use crate::quota::SharedState;
use crate::types::{LiveStatus, SourceAdapter};
use std::sync::Arc;
use tracing::{info, warn};

/// Source id of the richest (primary) source
pub const THEMEPARKS_WIKI: &str = "themeparks-wiki";
/// Source id of the lands source
pub const QUEUE_TIMES: &str = "queue-times";
/// Source id of the crowd-level source
pub const WARTEZEITEN: &str = "wartezeiten";

/// Translate an upstream status string through a finite lookup table
///
/// Matching ignores case and surrounding whitespace. Unknown values fail
/// closed to `Closed` with a warning.
pub fn map_status(source_id: &str, table: &[(&str, LiveStatus)], raw: &str) -> LiveStatus {
    let key = raw.trim();
    table
        .iter()
        .find(|(upstream, _)| upstream.eq_ignore_ascii_case(key))
        .map(|(_, status)| *status)
        .unwrap_or_else(|| {
            warn!(source = source_id, status = raw, "Unknown upstream status, treating as CLOSED");
            LiveStatus::Closed
        })
}

/// Build every enabled adapter from config
pub fn build_adapters(
    config: &IngestConfig,
    shared: Arc<dyn SharedState>,
) -> Result<Vec<Arc<dyn SourceAdapter>>, SourceError> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if config.sources.themeparks_wiki.enabled {
        adapters.push(Arc::new(ThemeParksWikiAdapter::new(
            &config.sources.themeparks_wiki,
        )?));
    }
    if config.sources.queue_times.enabled {
        adapters.push(Arc::new(QueueTimesAdapter::new(&config.sources.queue_times)?));
    }
    if config.sources.wartezeiten.enabled {
        adapters.push(Arc::new(WartezeitenAdapter::new(
            &config.sources.wartezeiten,
            shared,
        )?));
    }

    info!(
        count = adapters.len(),
        sources = ?adapters.iter().map(|a| a.source_id()).collect::<Vec<_>>(),
        "Source adapters initialized"
    );
    Ok(adapters)
}
