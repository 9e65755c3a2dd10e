//! Product analytics types (Mixpanel-style)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MAX_EVENT_NAME_LENGTH, MAX_EVENT_PROPERTIES};
use crate::errors::{require_text, DomainError, DomainResult};

pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One tracked event
///
/// `insert_id` lets the platform deduplicate an event delivered twice by a
/// retried request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub distinct_id: String,
    pub time: DateTime<Utc>,
    pub insert_id: Uuid,
    #[serde(default)]
    pub properties: Properties,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, distinct_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distinct_id: distinct_id.into(),
            time: Utc::now(),
            insert_id: Uuid::new_v4(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("event name", &self.name, MAX_EVENT_NAME_LENGTH)?;
        require_text("distinct_id", &self.distinct_id, MAX_EVENT_NAME_LENGTH)?;
        validate_properties(&self.properties)
    }
}

/// Stored profile of an identified user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub distinct_id: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

pub fn validate_properties(properties: &Properties) -> DomainResult<()> {
    if properties.len() > MAX_EVENT_PROPERTIES {
        return Err(DomainError::too_long("properties", MAX_EVENT_PROPERTIES, properties.len()));
    }
    if properties.keys().any(|key| key.trim().is_empty()) {
        return Err(DomainError::empty("property name"));
    }
    Ok(())
}
