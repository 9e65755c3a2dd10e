#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, OnceLock};

use custops_infra::config::{
    AnalyticsConfig, EmailConfig, MessagingConfig, ResilienceSettings, SecretString,
    TicketingConfig,
};
use wiremock::MockServer;

/// Millisecond backoff so retry tests finish quickly on real time.
pub fn fast_resilience() -> ResilienceSettings {
    ResilienceSettings {
        failure_threshold: 3,
        cooldown_secs: 60,
        max_retries: 3,
        base_delay_ms: 5,
        backoff_multiplier: 2.0,
        max_delay_ms: 20,
        ..Default::default()
    }
}

pub fn ticketing_config(server: &MockServer) -> TicketingConfig {
    TicketingConfig {
        base_url: Some(format!("{}/api/v2", server.uri())),
        email: Some("agent@acme.io".to_string()),
        api_token: Some(SecretString::new("zd-secret")),
        ..Default::default()
    }
}

pub fn messaging_config(server: &MockServer) -> MessagingConfig {
    MessagingConfig {
        base_url: format!("{}/api", server.uri()),
        bot_token: Some(SecretString::new("xoxb-test")),
        ..Default::default()
    }
}

pub fn analytics_config(server: &MockServer) -> AnalyticsConfig {
    AnalyticsConfig {
        ingest_url: server.uri(),
        query_url: format!("{}/api/2.0", server.uri()),
        project_token: Some(SecretString::new("mp-token")),
        api_secret: Some(SecretString::new("mp-secret")),
        ..Default::default()
    }
}

pub fn email_config(server: &MockServer) -> EmailConfig {
    EmailConfig {
        base_url: format!("{}/v3", server.uri()),
        api_key: Some(SecretString::new("SG.test")),
        from_address: Some("support@acme.io".to_string()),
        from_name: Some("Acme Support".to_string()),
        ..Default::default()
    }
}

/// Serializes tests that mutate process environment variables.
pub fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// JSON body of the `index`-th request the server received.
pub async fn request_json(server: &MockServer, index: usize) -> serde_json::Value {
    let requests = server.received_requests().await.expect("request recording enabled");
    serde_json::from_slice(&requests[index].body).expect("request body is JSON")
}

pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |requests| requests.len())
}
