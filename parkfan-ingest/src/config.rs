//! Configuration for parkfan-ingest
//!
//! Loaded from `parkfan.toml` with priority: `--config` → `PARKFAN_CONFIG` →
//! `~/.config/parkfan/parkfan.toml` → compiled defaults. Per-source base URLs
//! can additionally be overridden through `PARKFAN_<SOURCE>_BASE_URL`.

use crate::sources::{QUEUE_TIMES, THEMEPARKS_WIKI, WARTEZEITEN};
use parkfan_common::config::{load_toml_config, ConfigPathResolver, LoggingConfig};
use parkfan_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Config file name under the parkfan config directory
pub const CONFIG_FILE_NAME: &str = "parkfan.toml";

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV_VAR: &str = "PARKFAN_CONFIG";

/// Top-level ingest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub logging: LoggingConfig,
    pub matching: MatchingConfig,
    pub resolver: ResolverConfig,
    pub sources: SourcesConfig,
}

/// A manual park/entity pairing, keyed by name on both sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Parks must score strictly above this to match
    pub park_threshold: f64,
    /// Entities must score strictly above this to match
    pub entity_threshold: f64,
    pub overrides: Vec<OverridePair>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            park_threshold: 0.75,
            entity_threshold: 0.8,
            overrides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolved wait times are multiples of this many minutes
    pub wait_time_rounding: u32,
    /// Cross-source wait-time spread that triggers a warning
    pub discrepancy_threshold_minutes: u32,
    /// Only compare values whose timestamps are this close
    pub validation_window_minutes: u32,
    /// Source ids, richest first
    pub priority: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            wait_time_rounding: 5,
            discrepancy_threshold_minutes: 15,
            validation_window_minutes: 10,
            priority: vec![
                THEMEPARKS_WIKI.to_string(),
                QUEUE_TIMES.to_string(),
                WARTEZEITEN.to_string(),
            ],
        }
    }
}

/// Per-source HTTP, retry and quota settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub enabled: bool,
    /// Overrides the adapter's built-in base URL
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Total attempts for transient failures (first try included)
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Hard upstream quota per rolling minute, if the source has one
    pub requests_per_minute: Option<u32>,
    /// Cool-down after an upstream 429
    pub block_minutes: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 500,
            requests_per_minute: None,
            block_minutes: 15,
        }
    }
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_minutes * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    #[serde(rename = "themeparks-wiki")]
    pub themeparks_wiki: SourceSettings,
    #[serde(rename = "queue-times")]
    pub queue_times: SourceSettings,
    pub wartezeiten: SourceSettings,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            themeparks_wiki: SourceSettings::default(),
            queue_times: SourceSettings::default(),
            wartezeiten: SourceSettings {
                requests_per_minute: Some(60),
                ..SourceSettings::default()
            },
        }
    }
}

impl IngestConfig {
    /// Resolve, load, apply env overrides, and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let resolver = ConfigPathResolver::new(CONFIG_FILE_NAME, CONFIG_ENV_VAR);
        let path = resolver.resolve(cli_path);
        let mut config: IngestConfig = load_toml_config(path.as_deref())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Settings for a known source id
    pub fn source(&self, source_id: &str) -> Option<&SourceSettings> {
        match source_id {
            THEMEPARKS_WIKI => Some(&self.sources.themeparks_wiki),
            QUEUE_TIMES => Some(&self.sources.queue_times),
            WARTEZEITEN => Some(&self.sources.wartezeiten),
            _ => None,
        }
    }

    fn apply_env_overrides(&mut self) {
        let targets = [
            ("PARKFAN_THEMEPARKS_WIKI_BASE_URL", &mut self.sources.themeparks_wiki),
            ("PARKFAN_QUEUE_TIMES_BASE_URL", &mut self.sources.queue_times),
            ("PARKFAN_WARTEZEITEN_BASE_URL", &mut self.sources.wartezeiten),
        ];
        for (var, settings) in targets {
            if let Ok(url) = std::env::var(var) {
                if !url.trim().is_empty() {
                    info!(var, url = %url, "Base URL overridden from environment");
                    settings.base_url = Some(url);
                }
            }
        }
    }

    /// Reject settings the matcher and resolver cannot honor
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("matching.park_threshold", self.matching.park_threshold),
            ("matching.entity_threshold", self.matching.entity_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.resolver.wait_time_rounding == 0 {
            return Err(Error::Config(
                "resolver.wait_time_rounding must be positive".to_string(),
            ));
        }

        if let Some(unknown) = self
            .resolver
            .priority
            .iter()
            .find(|id| self.source(id).is_none())
        {
            return Err(Error::Config(format!(
                "resolver.priority names unknown source '{}'",
                unknown
            )));
        }

        for (id, settings) in [
            (THEMEPARKS_WIKI, &self.sources.themeparks_wiki),
            (QUEUE_TIMES, &self.sources.queue_times),
            (WARTEZEITEN, &self.sources.wartezeiten),
        ] {
            if settings.max_attempts == 0 {
                return Err(Error::Config(format!(
                    "sources.{}.max_attempts must be at least 1",
                    id
                )));
            }
            if settings.requests_per_minute == Some(0) {
                return Err(Error::Config(format!(
                    "sources.{}.requests_per_minute must be positive",
                    id
                )));
            }
        }

        Ok(())
    }
}
