//! Adapter HTTP behavior against local mock servers
//!
//! Covers the error taxonomy at the network boundary: transient failures are
//! retried, client errors are not, and a 429 blocks the quota-governed source
//! without further requests.

use parkfan_ingest::config::SourceSettings;
use parkfan_ingest::quota::{InMemorySharedState, SharedState};
use parkfan_ingest::sources::{QueueTimesAdapter, ThemeParksWikiAdapter, WartezeitenAdapter};
use parkfan_ingest::types::{LiveStatus, QueueType};
use parkfan_ingest::{SourceAdapter, SourceError};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> SourceSettings {
    SourceSettings {
        base_url: Some(server.uri()),
        timeout_secs: 5,
        max_attempts: 3,
        initial_backoff_ms: 1,
        ..SourceSettings::default()
    }
}

fn queue_times_payload() -> serde_json::Value {
    json!({
        "lands": [{
            "id": 7,
            "name": "Klugheim",
            "rides": [
                { "id": 102, "name": "Taron", "is_open": true, "wait_time": 35,
                  "last_updated": "2024-06-01T10:00:00.000Z" }
            ]
        }],
        "rides": []
    })
}

// ============================================================================
// Retry policy
// ============================================================================

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parks/56/queue_times.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/parks/56/queue_times.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queue_times_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = QueueTimesAdapter::new(&settings_for(&server)).unwrap();
    let live = adapter.fetch_park_live_data("56").await.unwrap();

    assert_eq!(live.entities.len(), 1);
    assert_eq!(live.entities[0].wait_time, Some(35));
    assert_eq!(live.lands.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_retries_exhaust_into_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parks/56/queue_times.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let adapter = QueueTimesAdapter::new(&settings_for(&server)).unwrap();
    let err = adapter.fetch_park_live_data("56").await.unwrap_err();

    assert!(matches!(err, SourceError::UpstreamUnavailable { .. }));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parks/999/queue_times.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("park not found"))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = QueueTimesAdapter::new(&settings_for(&server)).unwrap();
    let err = adapter.fetch_park_live_data("999").await.unwrap_err();

    match err {
        SourceError::UpstreamRejected { status, .. } => assert_eq!(status, 404),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parks/56/queue_times.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = QueueTimesAdapter::new(&settings_for(&server)).unwrap();
    let err = adapter.fetch_park_live_data("56").await.unwrap_err();

    assert!(matches!(err, SourceError::Parse { .. }));
}

// ============================================================================
// Quota-governed source
// ============================================================================

#[tokio::test]
async fn test_rate_limited_source_blocks_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/waitingtimes"))
        .and(header("park", "phantasialand"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let shared: Arc<dyn SharedState> = Arc::new(InMemorySharedState::new());
    let adapter = WartezeitenAdapter::new(&settings_for(&server), shared.clone()).unwrap();

    let first = adapter.fetch_park_live_data("phantasialand").await.unwrap_err();
    assert!(first.is_blocked());

    // Later calls fail before any request goes out
    let second = adapter.fetch_park_live_data("phantasialand").await.unwrap_err();
    assert!(second.is_blocked());
    assert!(!adapter.health_check().await.is_ok());

    // The block is shared with every instance using the same store
    let sibling = WartezeitenAdapter::new(&settings_for(&server), shared).unwrap();
    assert!(sibling.fetch_park_live_data("phantasialand").await.unwrap_err().is_blocked());
}

#[tokio::test]
async fn test_wartezeiten_live_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/waitingtimes"))
        .and(header("park", "phantasialand"))
        .and(header("language", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": "taron", "name": "Taron", "waitingtime": 30, "status": "opened",
              "datetime": "2024-06-01T12:00:00+02:00" },
            { "code": "raik", "name": "Raik", "waitingtime": 0, "status": "closedweather",
              "datetime": "2024-06-01T12:00:00+02:00" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/crowdlevel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crowd_level": 63.5, "timestamp": "2024-06-01T12:00:00+02:00"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/openingtimes"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let shared: Arc<dyn SharedState> = Arc::new(InMemorySharedState::new());
    let adapter = WartezeitenAdapter::new(&settings_for(&server), shared).unwrap();
    let live = adapter.fetch_park_live_data("phantasialand").await.unwrap();

    assert_eq!(live.entities.len(), 2);
    assert_eq!(live.entities[0].status, LiveStatus::Operating);
    assert_eq!(live.entities[0].wait_time, Some(30));
    assert_eq!(live.entities[1].status, LiveStatus::Closed);
    assert_eq!(live.entities[1].wait_time, None);
    assert_eq!(live.crowd_level.map(|c| c.level), Some(63.5));
    // Failed optional extras are simply absent
    assert!(live.operating_hours.is_none());
}

// ============================================================================
// Richest source
// ============================================================================

#[tokio::test]
async fn test_themeparks_wiki_live_queues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entity/park-1/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "liveData": [
                {
                    "id": "ride-1",
                    "name": "Taron",
                    "entityType": "ATTRACTION",
                    "status": "OPERATING",
                    "lastUpdated": "2024-06-01T10:00:00Z",
                    "queue": {
                        "STANDBY": { "waitTime": 40 },
                        "SINGLE_RIDER": { "waitTime": 10 }
                    }
                },
                {
                    "id": "show-1",
                    "name": "Crazy Bats Show",
                    "entityType": "SHOW",
                    "status": "CLOSED",
                    "showtimes": [
                        { "type": "Performance Time", "startTime": "2024-06-01T14:00:00Z",
                          "endTime": "2024-06-01T14:30:00Z" }
                    ]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entity/park-1/schedule"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = ThemeParksWikiAdapter::new(&settings_for(&server)).unwrap();
    let live = adapter.fetch_park_live_data("park-1").await.unwrap();

    assert_eq!(live.entities.len(), 2);
    let taron = &live.entities[0];
    assert_eq!(taron.wait_time, Some(40));
    assert!(taron
        .queues
        .iter()
        .any(|q| q.queue_type == QueueType::SingleRider && q.wait_time == Some(10)));
    assert_eq!(live.entities[1].showtimes.as_ref().map(Vec::len), Some(1));
    assert!(live.operating_hours.is_none());
}

#[tokio::test]
async fn test_themeparks_wiki_park_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/destinations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinations": [
                {
                    "id": "dest-phl",
                    "name": "Phantasialand",
                    "parks": [{ "id": "park-1", "name": "Phantasialand" }]
                },
                {
                    "id": "dest-ep",
                    "name": "Europa-Park Resort",
                    "parks": [
                        { "id": "park-2", "name": "Europa-Park" },
                        { "id": "park-3", "name": "Rulantica" }
                    ]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entity/park-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timezone": "Europe/Berlin",
            "location": { "latitude": 50.798, "longitude": 6.879 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entity/park-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timezone": "Europe/Berlin"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entity/park-3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = ThemeParksWikiAdapter::new(&settings_for(&server)).unwrap();
    let parks = adapter.fetch_all_parks().await.unwrap();

    // Destination order is kept and a missing detail document degrades to name only
    let ids: Vec<&str> = parks.iter().map(|p| p.external_id.as_str()).collect();
    assert_eq!(ids, vec!["park-1", "park-2", "park-3"]);
    assert_eq!(parks[0].timezone.as_deref(), Some("Europe/Berlin"));
    assert_eq!(parks[0].coordinates(), Some((50.798, 6.879)));
    assert_eq!(parks[1].destination_id.as_deref(), Some("dest-ep"));
    assert!(parks[1].coordinates().is_none());
    assert_eq!(parks[2].name, "Rulantica");
    assert!(parks[2].timezone.is_none());
}
