//! parkfan-ingest library
//!
//! Multi-source theme-park data ingestion: adapters normalize each upstream,
//! the matcher pairs parks and entities across sources, the resolver merges
//! live data, and the orchestrator fans out over all of them with per-source
//! failure isolation. Strict upstream quotas are enforced by `quota`.

pub mod config;
pub mod error;
pub mod mapping;
pub mod matching;
pub mod orchestrator;
pub mod quota;
pub mod resolver;
pub mod sources;
pub mod types;

pub use crate::config::IngestConfig;
pub use crate::error::{IngestError, IngestResult, SourceError};
pub use crate::orchestrator::{EntityDiscovery, Orchestrator, ParkDiscovery, ParkGroup};
pub use crate::resolver::ConflictResolver;
pub use crate::types::SourceAdapter;
