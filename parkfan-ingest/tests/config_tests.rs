//! Tests for loading and validating the ingest configuration
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PARKFAN_*_BASE_URL are marked with #[serial].

use parkfan_common::Error;
use parkfan_ingest::config::OverridePair;
use parkfan_ingest::sources::{QUEUE_TIMES, WARTEZEITEN};
use parkfan_ingest::IngestConfig;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("parkfan.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
[logging]
level = "parkfan_ingest=debug"
json = true

[matching]
park_threshold = 0.8

[[matching.overrides]]
left = "Disneyland Park"
right = "Disneyland Paris"

[resolver]
wait_time_rounding = 10
priority = ["queue-times", "wartezeiten"]

[sources.queue-times]
base_url = "http://localhost:9000"
max_attempts = 5

[sources.wartezeiten]
requests_per_minute = 30
"#,
    );

    let config = IngestConfig::load(Some(&path)).unwrap();

    assert_eq!(config.logging.level, "parkfan_ingest=debug");
    assert!(config.logging.json);
    assert_eq!(config.matching.park_threshold, 0.8);
    // Unset keys keep their defaults
    assert_eq!(config.matching.entity_threshold, 0.8);
    assert_eq!(
        config.matching.overrides,
        vec![OverridePair {
            left: "Disneyland Park".to_string(),
            right: "Disneyland Paris".to_string(),
        }]
    );
    assert_eq!(config.resolver.wait_time_rounding, 10);
    assert_eq!(config.resolver.priority, vec![QUEUE_TIMES, WARTEZEITEN]);

    let queue_times = config.source(QUEUE_TIMES).unwrap();
    assert_eq!(queue_times.base_url.as_deref(), Some("http://localhost:9000"));
    assert_eq!(queue_times.max_attempts, 5);
    assert_eq!(config.sources.wartezeiten.requests_per_minute, Some(30));
    assert_eq!(config.sources.wartezeiten.block_minutes, 15);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = IngestConfig::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();

    assert_eq!(config.matching.park_threshold, 0.75);
    assert_eq!(config.sources.wartezeiten.requests_per_minute, Some(60));
    assert!(config.source("unknown-source").is_none());
}

#[test]
#[serial]
fn test_env_overrides_base_url() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        "[sources.queue-times]\nbase_url = \"http://from-file\"\n",
    );

    env::set_var("PARKFAN_QUEUE_TIMES_BASE_URL", "http://from-env");
    let result = IngestConfig::load(Some(&path));
    env::remove_var("PARKFAN_QUEUE_TIMES_BASE_URL");

    let config = result.unwrap();
    assert_eq!(
        config.sources.queue_times.base_url.as_deref(),
        Some("http://from-env")
    );
    assert!(config.sources.themeparks_wiki.base_url.is_none());
}

#[test]
#[serial]
fn test_blank_env_override_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        "[sources.queue-times]\nbase_url = \"http://from-file\"\n",
    );

    env::set_var("PARKFAN_QUEUE_TIMES_BASE_URL", "  ");
    let result = IngestConfig::load(Some(&path));
    env::remove_var("PARKFAN_QUEUE_TIMES_BASE_URL");

    assert_eq!(
        result.unwrap().sources.queue_times.base_url.as_deref(),
        Some("http://from-file")
    );
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let cases = [
        "[matching]\npark_threshold = 1.5\n",
        "[matching]\nentity_threshold = 0.0\n",
        "[resolver]\nwait_time_rounding = 0\n",
        "[resolver]\npriority = [\"queue-times\", \"captain-coaster\"]\n",
        "[sources.themeparks-wiki]\nmax_attempts = 0\n",
        "[sources.wartezeiten]\nrequests_per_minute = 0\n",
    ];

    for body in cases {
        let path = write_config(&temp_dir, body);
        match IngestConfig::load(Some(&path)) {
            Err(Error::Config(_)) => {}
            other => panic!("expected config error for {:?}, got {:?}", body, other),
        }
    }
}

#[test]
#[serial]
fn test_malformed_toml_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, "[matching\npark_threshold = ");

    assert!(matches!(IngestConfig::load(Some(&path)), Err(Error::Config(_))));
}
