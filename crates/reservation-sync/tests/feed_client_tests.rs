//! HTTP feed client tests against a mock channel-manager API.

use std::time::Duration;

use chrono::NaiveDate;
use reservation_sync::models::SyncWindow;
use reservation_sync::{FeedConfig, FeedError, HttpFeedClient, ReservationFeed, RetryError, RetryPolicy};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> SyncWindow {
    SyncWindow::starting(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

fn entry(id: i64, departure: &str) -> Value {
    json!({
        "id": id,
        "listingMapId": 12,
        "listingName": "Apt Centro",
        "status": "new",
        "arrivalDate": "2024-06-01",
        "departureDate": departure,
        "adults": 2,
        "guestName": "Ana"
    })
}

fn page(entries: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "result": entries }))
}

fn client(server: &MockServer, page_size: u32, attempts: u32) -> HttpFeedClient {
    let config = FeedConfig {
        base_url: server.uri(),
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        page_size,
        request_timeout: Duration::from_secs(5),
        ..FeedConfig::default()
    };
    HttpFeedClient::new(
        config,
        RetryPolicy::new(attempts, Duration::ZERO, Duration::from_secs(5)),
    )
    .unwrap()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/accessTokens"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "tok-123"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pages_until_short_page_and_dedups() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .and(header("authorization", "Bearer tok-123"))
        .and(query_param("departureStartDate", "2024-06-01"))
        .and(query_param("departureEndDate", "2024-06-15"))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "0"))
        .respond_with(page(vec![entry(501, "2024-06-05"), entry(502, "2024-06-06")]))
        .expect(1)
        .mount(&server)
        .await;

    // The second page repeats 502, as happens when bookings shift between pages.
    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .and(query_param("offset", "2"))
        .respond_with(page(vec![entry(502, "2024-06-06")]))
        .expect(1)
        .mount(&server)
        .await;

    let batch = client(&server, 2, 1).fetch(window()).await.unwrap();

    let ids: Vec<_> = batch.reservations.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(ids, ["501", "502"]);
    assert!(batch.rejected.is_empty());
    assert_eq!(batch.reservations[0].listing_name.as_deref(), Some("Apt Centro"));
}

#[tokio::test]
async fn test_malformed_entry_is_rejected_alone() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .respond_with(page(vec![
            entry(501, "2024-06-05"),
            json!({ "id": 503, "status": "new" }),
            entry(504, "not-a-date"),
        ]))
        .mount(&server)
        .await;

    let batch = client(&server, 100, 1).fetch(window()).await.unwrap();

    assert_eq!(batch.reservations.len(), 1);
    assert_eq!(batch.rejected.len(), 2);
    assert!(batch.rejected.iter().any(|m| m.contains("503")));
    assert!(batch.rejected.iter().any(|m| m.contains("504")));
}

#[tokio::test]
async fn test_rejected_credentials_are_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/accessTokens"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .respond_with(page(vec![]))
        .expect(0)
        .mount(&server)
        .await;

    let result = client(&server, 100, 3).fetch(window()).await;

    match result {
        Err(RetryError::Permanent {
            error: FeedError::Auth(message),
            ..
        }) => assert!(message.contains("401")),
        other => panic!("expected an auth failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let result = client(&server, 100, 3).fetch(window()).await;

    match result {
        Err(RetryError::Exhausted { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, FeedError::Api { status: 502, .. }));
        }
        other => panic!("expected retry exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .respond_with(page(vec![entry(501, "2024-06-05")]))
        .mount(&server)
        .await;

    let batch = client(&server, 100, 2).fetch(window()).await.unwrap();
    assert_eq!(batch.reservations.len(), 1);
}

#[tokio::test]
async fn test_static_token_skips_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/accessTokens"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .and(header("authorization", "Bearer static-token"))
        .respond_with(page(vec![entry(501, "2024-06-05")]))
        .expect(1)
        .mount(&server)
        .await;

    let config = FeedConfig {
        base_url: server.uri(),
        api_token: Some("static-token".to_string()),
        ..FeedConfig::default()
    };
    let client = HttpFeedClient::new(config, RetryPolicy::default()).unwrap();

    let batch = client.fetch(window()).await.unwrap();
    assert_eq!(batch.reservations.len(), 1);
}

#[tokio::test]
async fn test_failed_envelope_is_an_api_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "fail",
            "message": "listing filter invalid"
        })))
        .mount(&server)
        .await;

    let result = client(&server, 100, 1).fetch(window()).await;

    match result {
        Err(RetryError::Permanent {
            error: FeedError::Api { message, .. },
            ..
        }) => assert_eq!(message, "listing filter invalid"),
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[test]
fn test_client_requires_credentials() {
    let result = HttpFeedClient::new(FeedConfig::default(), RetryPolicy::default());
    assert!(matches!(result, Err(FeedError::Config(_))));
}
