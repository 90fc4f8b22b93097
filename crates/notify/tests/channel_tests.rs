//! Integration tests for the webhook-based channels.

use chrono::{NaiveDate, Utc};
use notify::{ChannelError, NotifyChannel, NotifyEvent, SlackChannel, WebhookChannel};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rescheduled_event() -> NotifyEvent {
    NotifyEvent::ScheduleChanged {
        cleaner_id: "cleaner-9".to_string(),
        task_id: "task-3".to_string(),
        property_name: "Casa Azul".to_string(),
        previous_date: NaiveDate::from_ymd_opt(2024, 7, 10).unwrap(),
        new_date: NaiveDate::from_ymd_opt(2024, 7, 12).unwrap(),
        reservation_id: Some("777".to_string()),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn webhook_posts_recipient_and_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(serde_json::json!({
            "recipient": "cleaner-9",
            "event": { "type": "schedule_changed", "new_date": "2024-07-12" }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let channel = WebhookChannel::new(
        format!("{}/notify", server.uri()),
        Some("secret".to_string()),
    );

    channel.send(&rescheduled_event()).await.unwrap();
}

#[tokio::test]
async fn webhook_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let channel = WebhookChannel::new(server.uri(), None);
    let err = channel.send(&rescheduled_event()).await.unwrap_err();

    assert!(matches!(err, ChannelError::Rejected { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn slack_rate_limit_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let channel = SlackChannel::new(server.uri());
    let err = channel.send(&rescheduled_event()).await.unwrap_err();

    assert!(matches!(
        err,
        ChannelError::RateLimited {
            retry_after_secs: 7
        }
    ));
}

#[tokio::test]
async fn slack_client_error_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
        .mount(&server)
        .await;

    let channel = SlackChannel::new(server.uri());
    let err = channel.send(&rescheduled_event()).await.unwrap_err();

    assert!(!err.is_transient());
}
