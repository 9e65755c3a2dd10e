//! Product analytics client (Mixpanel-style)
//!
//! Ingestion (`track`, `engage`) authenticates with the project token in the
//! payload. Profile reads go through the query API with the API secret as
//! basic-auth username, and report an unknown user as 404.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use custops_common::CommonResult;
use custops_domain::{validate_properties, AnalyticsEvent, DomainError, Properties, UserProfile};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::caller::{decode, ResilientCaller};
use super::{ConfiguredClient, Platform, Setup};
use crate::config::{AnalyticsConfig, ResilienceSettings, SecretString};
use crate::errors::{IntegrationError, IntegrationResult};
use crate::http::{HttpTransport, PlatformFailure, PlatformResponse};

#[derive(Debug, Clone)]
struct Connection {
    ingest: HttpTransport,
    query: HttpTransport,
    project_token: SecretString,
    api_secret: Option<SecretString>,
}

/// `verbose=1` ingestion reply
#[derive(Debug, Deserialize)]
struct IngestStatus {
    status: i64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EngageQuery {
    #[serde(default)]
    results: Vec<EngageRecord>,
}

#[derive(Debug, Deserialize)]
struct EngageRecord {
    #[serde(rename = "$distinct_id")]
    distinct_id: String,
    #[serde(rename = "$properties", default)]
    properties: Properties,
}

impl From<EngageRecord> for UserProfile {
    fn from(record: EngageRecord) -> Self {
        let last_seen = record.properties.get("$last_seen").and_then(Value::as_str).and_then(parse_timestamp);
        Self { distinct_id: record.distinct_id, properties: record.properties, last_seen }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    setup: Setup<Connection>,
    caller: ResilientCaller,
}

impl AnalyticsClient {
    pub fn from_config(config: &AnalyticsConfig, resilience: &ResilienceSettings) -> CommonResult<Self> {
        let caller = ResilientCaller::new(Platform::Analytics, resilience)?;
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let setup = match (config.unconfigured_reason(), config.project_token.as_ref()) {
            (None, Some(token)) => Setup::Ready(Connection {
                ingest: HttpTransport::builder(&config.ingest_url).timeout(timeout).build()?,
                query: HttpTransport::builder(&config.query_url).timeout(timeout).build()?,
                project_token: token.clone(),
                api_secret: config.api_secret.clone().filter(|secret| !secret.is_blank()),
            }),
            (Some(reason), _) => Setup::Unconfigured(reason),
            (None, None) => Setup::Unconfigured("project_token missing".to_string()),
        };

        Ok(Self { setup, caller })
    }

    #[instrument(skip_all, fields(platform = "analytics", event = %event.name))]
    pub async fn track_event(&self, event: &AnalyticsEvent) -> IntegrationResult<()> {
        let conn = self.setup.ready(Platform::Analytics)?;
        event.validate().map_err(|err| IntegrationError::invalid_request(Platform::Analytics, err))?;

        let mut properties = event.properties.clone();
        properties.insert("token".into(), json!(conn.project_token.expose()));
        properties.insert("distinct_id".into(), json!(event.distinct_id));
        properties.insert("time".into(), json!(event.time.timestamp_millis()));
        properties.insert("$insert_id".into(), json!(event.insert_id.simple().to_string()));
        let payload = json!([{ "event": event.name, "properties": properties }]);

        let response = self
            .caller
            .call("track_event", || ingest(conn, "track", &payload))
            .await?;
        check_ingest(&response)
    }

    /// Set profile properties on `user_id`
    #[instrument(skip(self, properties), fields(platform = "analytics"))]
    pub async fn identify(&self, user_id: &str, properties: &Properties) -> IntegrationResult<()> {
        let conn = self.setup.ready(Platform::Analytics)?;
        if user_id.trim().is_empty() {
            return Err(IntegrationError::invalid_request(Platform::Analytics, DomainError::empty("distinct_id")));
        }
        validate_properties(properties).map_err(|err| IntegrationError::invalid_request(Platform::Analytics, err))?;

        let payload = json!([{
            "$token": conn.project_token.expose(),
            "$distinct_id": user_id,
            "$set": properties,
        }]);

        let response = self.caller.call("identify", || ingest(conn, "engage", &payload)).await?;
        check_ingest(&response)
    }

    #[instrument(skip(self), fields(platform = "analytics"))]
    pub async fn user_profile(&self, user_id: &str) -> IntegrationResult<UserProfile> {
        let conn = self.setup.ready(Platform::Analytics)?;
        let secret = conn
            .api_secret
            .as_ref()
            .ok_or_else(|| IntegrationError::not_configured(Platform::Analytics, "api_secret missing"))?;
        if user_id.trim().is_empty() {
            return Err(IntegrationError::invalid_request(Platform::Analytics, DomainError::empty("distinct_id")));
        }

        let response = self
            .caller
            .call("user_profile", || {
                let request = conn
                    .query
                    .request(Method::GET, "engage")
                    .basic_auth(secret.expose(), Some(""))
                    .query(&[("distinct_id", user_id)]);
                lookup(conn, request)
            })
            .await?;

        let query: EngageQuery = decode(Platform::Analytics, &response)?;
        query
            .results
            .into_iter()
            .next()
            .map(UserProfile::from)
            .ok_or_else(|| IntegrationError::invalid_response(Platform::Analytics, "profile query returned no results"))
    }
}

impl ConfiguredClient for AnalyticsClient {
    fn platform(&self) -> Platform {
        Platform::Analytics
    }

    fn is_configured(&self) -> bool {
        self.setup.is_ready()
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }
}

async fn ingest(conn: &Connection, path: &str, payload: &Value) -> Result<PlatformResponse, PlatformFailure> {
    let request = conn.ingest.request(Method::POST, path).query(&[("verbose", "1")]).json(payload);
    conn.ingest.execute(request).await
}

/// Execute a profile query, reporting an empty result set as 404
async fn lookup(conn: &Connection, request: reqwest::RequestBuilder) -> Result<PlatformResponse, PlatformFailure> {
    let response = conn.query.execute(request).await?;
    match serde_json::from_str::<EngageQuery>(&response.body) {
        Ok(query) if query.results.is_empty() => Err(PlatformFailure::http(404, "no profile for distinct_id")),
        _ => Ok(response),
    }
}

fn check_ingest(response: &PlatformResponse) -> IntegrationResult<()> {
    let status: IngestStatus = decode(Platform::Analytics, response)?;
    if status.status == 1 {
        debug!("ingestion accepted");
        Ok(())
    } else {
        Err(IntegrationError::invalid_response(
            Platform::Analytics,
            status.error.unwrap_or_else(|| format!("ingestion status {}", status.status)),
        ))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok().map(|ts| ts.and_utc()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_profile_record_conversion() {
        let record: EngageRecord = serde_json::from_value(json!({
            "$distinct_id": "acct-7",
            "$properties": { "$last_seen": "2024-05-01T12:30:00", "plan": "pro" }
        }))
        .unwrap();

        let profile = UserProfile::from(record);
        assert_eq!(profile.distinct_id, "acct-7");
        assert_eq!(profile.properties["plan"], "pro");
        assert_eq!(profile.last_seen, Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()));
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-05-01T12:30:00Z").is_some());
        assert!(parse_timestamp("2024-05-01T12:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
