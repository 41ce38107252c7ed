//! Integration tests for the batching client against a mock Caldera server.
//!
//! These tests exercise the live HTTP path end to end: header construction,
//! wire shapes on `/users/track`, failure handling, and the campaign
//! metadata endpoints.

use std::sync::Arc;

use caldera_sink::campaigns::CampaignsClient;
use caldera_sink::{CalderaClient, Config, Error, NoopTransport};
use chrono::{DateTime, TimeZone, Utc};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config(endpoint: &str) -> Config {
    let mut config = Config::new(endpoint, "cs-test-key");
    config.pause_ms = 0;
    config
}

fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()
}

fn track_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "attributes_processed": 0,
        "events_processed": 0,
        "message": "success"
    }))
}

#[tokio::test]
async fn flush_posts_bearer_authenticated_batch() {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/track"))
        .and(header("authorization", "Bearer cs-test-key"))
        .and(header("content-type", "application/json"))
        .respond_with(track_ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = CalderaClient::new(test_config(&server.uri())).unwrap();

    let user = client.user("user-1").unwrap().set("plan", "pro");
    client.enqueue(user).await.unwrap();
    let user = client.user("user-2").unwrap().update_existing_only(true);
    client.enqueue(user).await.unwrap();

    client.flush().await.unwrap();
    assert_eq!(client.pending_users(), 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = requests[0].body_json().unwrap();
    let attributes = body["attributes"].as_array().unwrap();
    assert_eq!(attributes.len(), 2);
    assert_eq!(attributes[0]["external_id"], "user-1");
    assert_eq!(attributes[0]["plan"], "pro");
    assert_eq!(attributes[1]["external_id"], "user-2");
    assert_eq!(attributes[1]["_update_existing_only"], true);
    // Only the user list goes out in a user flush
    assert!(body.get("events").is_none());
}

#[tokio::test]
async fn auto_flush_at_capacity_sends_one_event_batch() {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/track"))
        .respond_with(track_ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.batch_size = 3;
    let mut client = CalderaClient::new(config).unwrap();

    for i in 0..3 {
        let event = client
            .event(format!("user-{}", i), "page_view", test_time())
            .unwrap()
            .set("path", "/pricing");
        client.enqueue(event).await.unwrap();
    }

    // The third enqueue flushed the full queue without an explicit call
    assert_eq!(client.pending_events(), 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = requests[0].body_json().unwrap();
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["external_id"], "user-0");
    assert_eq!(events[0]["name"], "page_view");
    assert_eq!(events[0]["time"], "2026-03-01T12:30:00Z");
    assert_eq!(events[0]["properties"]["path"], "/pricing");
}

#[tokio::test]
async fn api_error_retains_queue_and_resend_is_identical() {
    init_logging();
    let server = MockServer::start().await;

    // First call fails, the retry lands
    Mock::given(method("POST"))
        .and(path("/users/track"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/track"))
        .respond_with(track_ok())
        .mount(&server)
        .await;

    let mut client = CalderaClient::new(test_config(&server.uri())).unwrap();

    for i in 0..2 {
        let user = client.user(format!("user-{}", i)).unwrap();
        client.enqueue(user).await.unwrap();
    }

    let err = client.flush().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert_eq!(client.pending_users(), 2);
    assert_eq!(client.stats().api_failures, 1);

    client.flush().await.unwrap();
    assert_eq!(client.pending_users(), 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: serde_json::Value = requests[0].body_json().unwrap();
    let second: serde_json::Value = requests[1].body_json().unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn connection_failure_maps_to_transport_error() {
    init_logging();

    // Nothing listens here
    let mut config = test_config("http://127.0.0.1:9");
    config.timeout_secs = 2;
    let mut client = CalderaClient::new(config).unwrap();

    let user = client.user("user-1").unwrap();
    client.enqueue(user).await.unwrap();

    let err = client.flush().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(client.pending_users(), 1);
}

#[tokio::test]
async fn dry_run_clears_queues_without_network_calls() {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/track"))
        .respond_with(track_ok())
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.send = false;
    let mut client = CalderaClient::new(config).unwrap();

    for i in 0..5 {
        let event = client
            .event(format!("user-{}", i), "page_view", test_time())
            .unwrap();
        client.enqueue(event).await.unwrap();
    }
    assert_eq!(client.pending_events(), 5);

    client.flush().await.unwrap();

    // Cleared exactly as a live flush would, with zero requests made
    assert_eq!(client.pending_events(), 0);
    assert_eq!(client.stats().events_sent, 5);
    server.verify().await;
}

#[tokio::test]
async fn dry_run_records_what_would_have_been_sent() {
    init_logging();

    let transport = Arc::new(NoopTransport::new());
    let mut config = test_config("https://rest.caldera.example");
    config.send = false;
    let mut client = CalderaClient::with_transport(config, transport.clone()).unwrap();

    let user = client.user("user-1").unwrap().set("plan", "pro");
    client.enqueue(user).await.unwrap();
    client.flush().await.unwrap();

    let recorded = transport.recorded().await;
    assert_eq!(recorded.len(), 1);

    let body = serde_json::to_value(&recorded[0]).unwrap();
    assert_eq!(body["attributes"][0]["external_id"], "user-1");
    assert_eq!(body["attributes"][0]["plan"], "pro");
}

#[tokio::test]
async fn campaigns_list_parses_response() {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/campaigns/list"))
        .and(header("authorization", "Bearer cs-test-key"))
        .and(query_param("include_archived", "true"))
        .and(query_param("sort_order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "campaigns": [
                {"id": "c-1", "name": "Welcome", "is_api_campaign": true, "tags": ["crm"]},
                {"id": "c-2", "name": "Digest"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let campaigns = CampaignsClient::new(&test_config(&server.uri()))
        .unwrap()
        .list(true, true)
        .await
        .unwrap();

    assert_eq!(campaigns.len(), 2);
    assert_eq!(campaigns[0].id, "c-1");
    assert!(campaigns[0].is_api);
    assert_eq!(campaigns[1].name, "Digest");
}

#[tokio::test]
async fn campaigns_data_series_passes_query_params() {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/campaigns/data_series"))
        .and(query_param("campaign_id", "c-1"))
        .and(query_param("length", "7"))
        .and(query_param("ending_at", "2026-03-01T12:30:00+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"time": "2026-03-01", "sent": 120}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = CampaignsClient::new(&test_config(&server.uri()))
        .unwrap()
        .data_series("c-1", 7, Some(test_time()))
        .await
        .unwrap();

    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["sent"], 120);
}

#[tokio::test]
async fn campaigns_api_error_propagates() {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/campaigns/details"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = CampaignsClient::new(&test_config(&server.uri()))
        .unwrap()
        .details("c-1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 401, .. }));
}
