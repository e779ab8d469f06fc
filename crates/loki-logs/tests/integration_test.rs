// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use loki_logs::{
    aggregator::Aggregator,
    backoff::{Backoff, BackoffConfig},
    batch::Entry,
    config::Config,
    credentials::Credentials,
    encoder,
    errors::FlushError,
    flusher::Flusher,
    labels::LabelSet,
    logger::{Logger, LokiLogger},
};
use mockito::{Matcher, Server};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PUSH_PATH: &str = "/loki/api/v1/push";

fn labels() -> LabelSet {
    LabelSet::from_iter([("application", "checkout"), ("environment", "test")])
}

fn test_config(url: &str) -> Config {
    Config {
        backoff: BackoffConfig {
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            max_retries: 10,
        },
        ..Config::new(url, labels())
    }
}

fn fast_backoff() -> Backoff {
    Backoff::new(test_config("http://unused").backoff)
}

#[tokio::test]
async fn test_retries_on_503_until_success() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("POST", PUSH_PATH)
        .with_status(503)
        .with_body("service unavailable")
        .expect(2)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", PUSH_PATH)
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let flusher = Flusher::new(&test_config(&server.url()));
    let mut backoff = fast_backoff();
    let result = flusher
        .send_with_backoff(b"payload".to_vec(), &CancellationToken::new(), &mut backoff)
        .await;

    assert!(result.is_ok());
    assert_eq!(backoff.num_retries(), 2);
    unavailable.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_retries_on_429() {
    let mut server = Server::new_async().await;
    let throttled = server
        .mock("POST", PUSH_PATH)
        .with_status(429)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", PUSH_PATH)
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let flusher = Flusher::new(&test_config(&server.url()));
    let mut backoff = fast_backoff();
    let result = flusher
        .send_with_backoff(b"payload".to_vec(), &CancellationToken::new(), &mut backoff)
        .await;

    assert!(result.is_ok());
    assert_eq!(backoff.num_retries(), 1);
    throttled.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_404_fails_without_retry() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH_PATH)
        .with_status(404)
        .with_body("404 page not found")
        .expect(1)
        .create_async()
        .await;

    let flusher = Flusher::new(&test_config(&server.url()));
    let mut backoff = fast_backoff();
    let result = flusher
        .send_with_backoff(b"payload".to_vec(), &CancellationToken::new(), &mut backoff)
        .await;

    match result {
        Err(FlushError::Status { status, message }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "404 page not found");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
    assert_eq!(backoff.num_retries(), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_persistent_500_exhausts_retry_budget() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH_PATH)
        .with_status(500)
        .with_body("internal error")
        .expect(11)
        .create_async()
        .await;

    let flusher = Flusher::new(&test_config(&server.url()));
    let mut backoff = fast_backoff();
    let result = flusher
        .send_with_backoff(b"payload".to_vec(), &CancellationToken::new(), &mut backoff)
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        err.to_string(),
        "server returned HTTP status 500 Internal Server Error: internal error"
    );
    assert_eq!(backoff.num_retries(), 10);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_bearer_token_takes_precedence_over_basic_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH_PATH)
        .match_header("authorization", "Bearer secret-token")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let mut config = test_config(&server.url());
    config.credentials = Credentials::resolve(
        Some("secret-token".to_string()),
        Some("user".to_string()),
        Some("pass".to_string()),
    )
    .expect("credentials should resolve");

    let flusher = Flusher::new(&config);
    let result = flusher
        .send(b"payload".to_vec(), &CancellationToken::new())
        .await;

    assert!(result.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_threshold_flush_end_to_end() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH_PATH)
        .match_header("content-type", "application/x-protobuf")
        .match_request(|request| {
            let Ok(body) = request.body() else {
                return false;
            };
            let Ok(push) = encoder::decode(body) else {
                return false;
            };
            push.streams.len() == 1
                && push.streams[0].labels == r#"{application="checkout", environment="test"}"#
                && push.streams[0]
                    .entries
                    .iter()
                    .map(|e| e.line.as_str())
                    .eq(["a", "b"])
        })
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let config = Config {
        batch_size: 1,
        ..test_config(&server.url())
    };
    let mut aggregator = Aggregator::new(
        &config,
        Arc::new(Flusher::new(&config)),
        CancellationToken::new(),
    );

    aggregator
        .add(Entry::new(labels(), "a", chrono::Utc::now()))
        .await
        .expect("first add should not flush");
    assert_eq!(aggregator.size(), 1);

    aggregator
        .add(Entry::new(labels(), "b", chrono::Utc::now()))
        .await
        .expect("second add should flush");
    assert!(aggregator.is_empty());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_logger_ships_logs_api_payload() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH_PATH)
        .match_request(|request| {
            let Ok(body) = request.body() else {
                return false;
            };
            let Ok(push) = encoder::decode(body) else {
                return false;
            };
            let Some(stream) = push.streams.first() else {
                return false;
            };
            let lines: Vec<&str> = stream.entries.iter().map(|e| e.line.as_str()).collect();
            push.streams.len() == 1
                && stream.labels == r#"{application="checkout", environment="test"}"#
                && lines
                    == [
                        r#""hello from the handler\n""#,
                        r#"{"type":"platform.start","time":"2024-05-01T10:00:01Z","record":{"requestId":"abc"}}"#,
                    ]
                && stream.entries[0].timestamp.as_ref().map(|t| t.seconds) == Some(1_714_557_600)
        })
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let logger = LokiLogger::new(
        Arc::new(test_config(&server.url())),
        CancellationToken::new(),
    );
    let payload = r#"[
        {"time": "2024-05-01T10:00:00Z", "type": "function", "record": "hello from the handler\n"},
        {"time": "2024-05-01T10:00:01Z", "type": "platform.start", "record": {"requestId": "abc"}}
    ]"#;

    logger.send_log(payload).await.expect("send_log should succeed");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_logger_splits_large_payload_into_several_pushes() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Exact(PUSH_PATH.to_string()))
        .with_status(204)
        .expect(3)
        .create_async()
        .await;

    // Each line is `"xxxxxxxxxx"` (12 bytes); threshold 20 flushes every second line.
    let config = Config {
        batch_size: 20,
        ..test_config(&server.url())
    };
    let logger = LokiLogger::new(Arc::new(config), CancellationToken::new());
    let records: Vec<String> = (0..5)
        .map(|_| r#"{"type":"function","time":"2024-05-01T10:00:00Z","record":"xxxxxxxxxx"}"#.to_string())
        .collect();
    let payload = format!("[{}]", records.join(","));

    logger.send_log(&payload).await.expect("send_log should succeed");
    mock.assert_async().await;
}
