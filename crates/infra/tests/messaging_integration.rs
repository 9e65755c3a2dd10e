//! Messaging client against a fake Web API
//!
//! The fake answers HTTP 200 with `ok: false` the way the real API does, so
//! these tests cover the body-to-status translation end to end.

mod support;

use custops_common::CircuitState;
use custops_infra::{ConfiguredClient, Disposition, IntegrationError, MessagingClient};
use serde_json::json;
use support::{fast_resilience, messaging_config, request_count, request_json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> MessagingClient {
    MessagingClient::from_config(&messaging_config(server), &fast_resilience()).expect("client")
}

fn api_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": code }))
}

#[tokio::test]
async fn test_send_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channel": "C024BE91L",
            "ts": "1714565400.000200",
            "message": { "text": "New urgent ticket #42" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client(&server)
        .send_message("#support", "New urgent ticket #42")
        .await
        .expect("message posted");

    assert_eq!(receipt.channel, "C024BE91L");
    assert_eq!(receipt.ts, "1714565400.000200");
    let body = request_json(&server, 0).await;
    assert_eq!(body, json!({ "channel": "#support", "text": "New urgent ticket #42" }));
}

#[tokio::test]
async fn test_revoked_token_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(api_error("invalid_auth")).expect(1).mount(&server).await;

    let err = client(&server).send_message("#support", "hi").await.unwrap_err();
    assert!(matches!(err, IntegrationError::Authentication { .. }));
    assert_eq!(err.disposition(), Disposition::OperatorActionRequired);
}

#[tokio::test]
async fn test_unknown_channel_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(api_error("channel_not_found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.send_message("#nope", "hi").await.unwrap_err();

    assert!(matches!(err, IntegrationError::NotFound { .. }));
    assert_eq!(client.caller().breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_ratelimited_body_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(api_error("ratelimited")).up_to_n_times(1).mount(&server).await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "channel": "C1", "ts": "1.2" })),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let receipt = client.send_message("C1", "retry me").await.expect("posted after throttling");

    assert_eq!(receipt.ts, "1.2");
    assert_eq!(request_count(&server).await, 2);
    assert_eq!(client.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_http_429_honors_retry_after_then_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&server)
        .await;

    let client = MessagingClient::from_config(
        &messaging_config(&server),
        &custops_infra::config::ResilienceSettings { max_retries: 1, ..fast_resilience() },
    )
    .unwrap();

    let err = client.send_message("C1", "hello").await.unwrap_err();
    assert!(matches!(err, IntegrationError::RateLimited { attempts: 2, .. }), "got {err:?}");
    assert_eq!(err.disposition(), Disposition::Deferred);
}

#[tokio::test]
async fn test_lookup_user_by_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users.lookupByEmail"))
        .and(query_param("email", "ada@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "user": {
                "id": "W012A3CDE",
                "name": "ada",
                "real_name": "Ada Lovelace",
                "is_bot": false,
                "profile": { "email": "ada@example.com" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = client(&server).lookup_user_by_email("ada@example.com").await.expect("user");
    assert_eq!(user.id, "W012A3CDE");
    assert_eq!(user.real_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_lookup_unknown_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(api_error("users_not_found")).mount(&server).await;

    let err = client(&server).lookup_user_by_email("ghost@example.com").await.unwrap_err();
    assert!(matches!(err, IntegrationError::NotFound { .. }));
}

#[tokio::test]
async fn test_malformed_email_rejected_locally() {
    let server = MockServer::start().await;

    let err = client(&server).lookup_user_by_email("not-an-email").await.unwrap_err();
    assert!(matches!(err, IntegrationError::InvalidRequest { .. }));
    assert_eq!(request_count(&server).await, 0);
}
