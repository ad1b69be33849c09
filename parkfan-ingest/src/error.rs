//! Error types for parkfan-ingest
//!
//! Upstream failures are classified at the adapter boundary so that callers
//! can decide between retrying, skipping, or surfacing them:
//! - `UpstreamUnavailable` - network/5xx/timeout, retried with backoff
//! - `UpstreamRejected` - 4xx, surfaced immediately
//! - `QuotaExceeded` - 429 or an active cool-down, callers skip the source
//!
//! `IngestError::NoDataAvailable` is the only error the orchestrator raises
//! by itself.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by a single source adapter
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Network failure, timeout, or 5xx response
    #[error("{source_id} unavailable: {reason}")]
    UpstreamUnavailable { source_id: String, reason: String },

    /// 4xx response other than 429 (bad parameters, unknown id)
    #[error("{source_id} rejected request ({status}): {reason}")]
    UpstreamRejected {
        source_id: String,
        status: u16,
        reason: String,
    },

    /// Upstream quota exhausted; the source is blocked for the cool-down
    #[error("{source_id} blocked by quota cool-down ({} s remaining)", retry_after.as_secs())]
    QuotaExceeded {
        source_id: String,
        retry_after: Duration,
    },

    /// Response body did not match the expected shape
    #[error("{source_id} parse error: {reason}")]
    Parse { source_id: String, reason: String },

    /// Shared state backend failure
    #[error("shared state error: {0}")]
    SharedState(String),
}

impl SourceError {
    /// Whether the failure is worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::UpstreamUnavailable { .. })
    }

    /// Whether the source is in a quota cool-down
    pub fn is_blocked(&self) -> bool {
        matches!(self, SourceError::QuotaExceeded { .. })
    }

    pub fn unavailable(source_id: &str, reason: impl Into<String>) -> Self {
        SourceError::UpstreamUnavailable {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(source_id: &str, reason: impl Into<String>) -> Self {
        SourceError::Parse {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the orchestrator, resolver, and collaborator contracts
#[derive(Debug, Error)]
pub enum IngestError {
    /// Every attempted source failed for one fetch
    #[error("no live data available for park {0}")]
    NoDataAvailable(String),

    /// Single-source failure surfaced to the caller
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Mapping store failure (other than benign duplicate-key races)
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;
