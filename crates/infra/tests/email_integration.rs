//! Email client against a fake v3 mail API

mod support;

use custops_domain::{EmailAddress, EmailMessage, TemplateEmail};
use custops_infra::{ConfiguredClient, EmailClient, IntegrationError};
use serde_json::json;
use support::{email_config, fast_resilience, request_count, request_json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> EmailClient {
    EmailClient::from_config(&email_config(server), &fast_resilience()).expect("client")
}

fn address(value: &str) -> EmailAddress {
    EmailAddress::parse(value).expect("valid address")
}

#[tokio::test]
async fn test_send_email_returns_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.test"))
        .respond_with(ResponseTemplate::new(202).insert_header("X-Message-Id", "msg-123"))
        .expect(1)
        .mount(&server)
        .await;

    let message = EmailMessage::text(address("cust@example.com"), "Your ticket", "We are on it.");
    let receipt = client(&server).send_email(&message).await.expect("accepted");

    assert_eq!(receipt.message_id.as_deref(), Some("msg-123"));
    assert_eq!(receipt.recipients, 1);

    let body = request_json(&server, 0).await;
    assert_eq!(body["from"], json!({ "email": "support@acme.io", "name": "Acme Support" }));
    assert_eq!(body["personalizations"][0]["to"], json!([{ "email": "cust@example.com" }]));
    assert_eq!(body["content"], json!([{ "type": "text/plain", "value": "We are on it." }]));
}

#[tokio::test]
async fn test_send_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let template = TemplateEmail::new(address("cust@example.com"), "d-renewal").with_data("days_left", 7);
    let receipt = client(&server).send_template(&template).await.expect("accepted");

    assert_eq!(receipt.message_id, None);
    let body = request_json(&server, 0).await;
    assert_eq!(body["template_id"], "d-renewal");
    assert_eq!(body["personalizations"][0]["dynamic_template_data"]["days_left"], 7);
}

/// Over-quota 403s are throttling and retried; other 403s are auth failures.
#[tokio::test]
async fn test_quota_403_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"errors":[{"message":"rate limit exceeded"}]}"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(202)).mount(&server).await;

    let message = EmailMessage::text(address("cust@example.com"), "Hi", "Body");
    client(&server).send_email(&message).await.expect("accepted after throttling");
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_forbidden_403_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("access forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let message = EmailMessage::text(address("cust@example.com"), "Hi", "Body");
    let err = client(&server).send_email(&message).await.unwrap_err();
    assert!(matches!(err, IntegrationError::Authentication { .. }));
}

#[tokio::test]
async fn test_message_without_body_rejected_locally() {
    let server = MockServer::start().await;
    let message = EmailMessage {
        to: vec![address("cust@example.com")],
        subject: "Hi".to_string(),
        text_body: None,
        html_body: Some("   ".to_string()),
    };

    let client = client(&server);
    let err = client.send_email(&message).await.unwrap_err();
    assert!(matches!(err, IntegrationError::InvalidRequest { .. }));
    assert_eq!(request_count(&server).await, 0);
    assert!(client.is_configured());
}
