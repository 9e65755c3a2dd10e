//! Configuration types
//!
//! Every section deserializes with defaults, so a TOML file only needs the
//! credentials of the platforms actually in use:
//!
//! ```toml
//! [resilience]
//! failure_threshold = 5
//! cooldown_secs = 60
//!
//! [messaging]
//! bot_token = "xoxb-..."
//!
//! [messaging.resilience]
//! max_retries = 1
//! ```

use std::time::Duration;

use custops_common::{CircuitBreakerConfig, CommonError, CommonResult, Jitter, RetryPolicy};
use serde::{Deserialize, Serialize};

use super::secret::SecretString;
use crate::integrations::Platform;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Root configuration for all platform integrations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub logging: LoggingConfig,
    /// Defaults for every platform without its own override
    pub resilience: ResilienceSettings,
    pub ticketing: TicketingConfig,
    pub messaging: MessagingConfig,
    pub analytics: AnalyticsConfig,
    pub email: EmailConfig,
}

impl IntegrationsConfig {
    /// Effective resilience settings for `platform`
    pub fn resilience_for(&self, platform: Platform) -> &ResilienceSettings {
        let overridden = match platform {
            Platform::Ticketing => self.ticketing.resilience.as_ref(),
            Platform::Messaging => self.messaging.resilience.as_ref(),
            Platform::Analytics => self.analytics.resilience.as_ref(),
            Platform::Email => self.email.resilience.as_ref(),
        };
        overridden.unwrap_or(&self.resilience)
    }

    pub fn validate(&self) -> CommonResult<()> {
        self.resilience.validate()?;
        for platform in Platform::ALL {
            self.resilience_for(platform).validate().map_err(|err| {
                CommonError::config_field(format!("{platform}.resilience"), err.to_string())
            })?;
        }
        Ok(())
    }
}

/// Breaker and retry tuning for one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: JitterMode,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
            max_retries: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: JitterMode::None,
        }
    }
}

impl ResilienceSettings {
    pub fn validate(&self) -> CommonResult<()> {
        self.breaker_config()?.validate()?;
        self.retry_policy().validate()
    }

    pub fn breaker_config(&self) -> CommonResult<CircuitBreakerConfig> {
        CircuitBreakerConfig::builder()
            .failure_threshold(self.failure_threshold)
            .cooldown(Duration::from_secs(self.cooldown_secs))
            .build()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterMode {
    #[default]
    None,
    Full,
    Equal,
}

impl From<JitterMode> for Jitter {
    fn from(mode: JitterMode) -> Self {
        match mode {
            JitterMode::None => Jitter::None,
            JitterMode::Full => Jitter::Full,
            JitterMode::Equal => Jitter::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Zendesk-style helpdesk: agent email plus API token
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketingConfig {
    pub enabled: bool,
    /// Account subdomain, used when `base_url` is not set
    pub subdomain: Option<String>,
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<SecretString>,
    pub request_timeout_secs: u64,
    pub resilience: Option<ResilienceSettings>,
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subdomain: None,
            base_url: None,
            email: None,
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            resilience: None,
        }
    }
}

impl TicketingConfig {
    pub fn api_base(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.subdomain.as_ref().map(|sub| format!("https://{sub}.zendesk.com/api/v2")))
    }

    /// Why the client cannot be used, if it cannot
    pub fn unconfigured_reason(&self) -> Option<String> {
        if !self.enabled {
            return Some("disabled in configuration".to_string());
        }
        if self.api_base().is_none() {
            return Some("subdomain or base_url missing".to_string());
        }
        if self.email.as_deref().map_or(true, |email| email.trim().is_empty()) {
            return Some("email missing".to_string());
        }
        missing_secret("api_token", self.api_token.as_ref())
    }
}

/// Slack-style Web API: bot token
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub bot_token: Option<SecretString>,
    pub request_timeout_secs: u64,
    pub resilience: Option<ResilienceSettings>,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://slack.com/api".to_string(),
            bot_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            resilience: None,
        }
    }
}

impl MessagingConfig {
    pub fn unconfigured_reason(&self) -> Option<String> {
        if !self.enabled {
            return Some("disabled in configuration".to_string());
        }
        missing_secret("bot_token", self.bot_token.as_ref())
    }
}

/// Mixpanel-style analytics
///
/// The project token authorizes ingestion (`track`, `engage`); profile reads
/// go to the query API and need the API secret.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub ingest_url: String,
    pub query_url: String,
    pub project_token: Option<SecretString>,
    pub api_secret: Option<SecretString>,
    pub request_timeout_secs: u64,
    pub resilience: Option<ResilienceSettings>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ingest_url: "https://api.mixpanel.com".to_string(),
            query_url: "https://mixpanel.com/api/2.0".to_string(),
            project_token: None,
            api_secret: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            resilience: None,
        }
    }
}

impl AnalyticsConfig {
    pub fn unconfigured_reason(&self) -> Option<String> {
        if !self.enabled {
            return Some("disabled in configuration".to_string());
        }
        missing_secret("project_token", self.project_token.as_ref())
    }
}

/// SendGrid-style email API: API key plus verified sender
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub request_timeout_secs: u64,
    pub resilience: Option<ResilienceSettings>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.sendgrid.com/v3".to_string(),
            api_key: None,
            from_address: None,
            from_name: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            resilience: None,
        }
    }
}

impl EmailConfig {
    pub fn unconfigured_reason(&self) -> Option<String> {
        if !self.enabled {
            return Some("disabled in configuration".to_string());
        }
        if self.from_address.as_deref().map_or(true, |from| from.trim().is_empty()) {
            return Some("from_address missing".to_string());
        }
        missing_secret("api_key", self.api_key.as_ref())
    }
}

fn missing_secret(name: &str, secret: Option<&SecretString>) -> Option<String> {
    match secret {
        Some(secret) if !secret.is_blank() => None,
        _ => Some(format!("{name} missing")),
    }
}
