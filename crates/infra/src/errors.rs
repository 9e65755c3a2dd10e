//! Errors returned by the platform clients
//!
//! Every client method returns [`IntegrationError`]. Callers either match on
//! the variant or ask for its [`Disposition`] to decide what to tell the user.

use std::fmt;
use std::time::Duration;

use custops_common::{ErrorDisposition, ErrorSeverity, ResilienceError};
use custops_domain::DomainError;
use thiserror::Error;

use crate::http::PlatformFailure;
use crate::integrations::Platform;

/// Result type for platform client calls
pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Failure of a platform client call
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Credentials or endpoint missing; the platform was never contacted
    #[error("{platform} integration is not configured: {reason}")]
    NotConfigured { platform: Platform, reason: String },

    /// Rejected locally before any network call
    #[error("invalid {platform} request: {source}")]
    InvalidRequest {
        platform: Platform,
        #[source]
        source: DomainError,
    },

    /// Circuit open; the platform was not contacted
    #[error(
        "{platform} is temporarily unavailable{}",
        .retry_after.map_or_else(String::new, |d| format!(" (retry in {}s)", d.as_secs()))
    )]
    Unavailable { platform: Platform, retry_after: Option<Duration> },

    #[error("{platform} rejected the credentials: {source}")]
    Authentication {
        platform: Platform,
        #[source]
        source: PlatformFailure,
    },

    #[error("{platform} resource not found: {source}")]
    NotFound {
        platform: Platform,
        #[source]
        source: PlatformFailure,
    },

    #[error("{platform} kept throttling after {attempts} attempt(s): {source}")]
    RateLimited {
        platform: Platform,
        attempts: u32,
        retry_after: Option<Duration>,
        #[source]
        source: PlatformFailure,
    },

    #[error("{platform} call failed after {attempts} attempt(s): {source}")]
    TransientExhausted {
        platform: Platform,
        attempts: u32,
        #[source]
        source: PlatformFailure,
    },

    #[error("{platform} call cancelled")]
    Cancelled { platform: Platform },

    /// A 2xx response whose body could not be understood
    #[error("{platform} returned an unexpected response: {message}")]
    InvalidResponse { platform: Platform, message: String },
}

/// What a business tool should do with a failed integration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Platform temporarily unavailable; record the work and try later
    Deferred,
    /// Credentials rotated or revoked, or the platform's contract changed
    OperatorActionRequired,
    /// The request itself is wrong (missing resource, invalid input)
    RequestRejected,
    /// The integration has not been set up
    ConfigurationRequired,
    /// The caller gave up
    Aborted,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deferred => write!(f, "integration temporarily unavailable, request deferred"),
            Self::OperatorActionRequired => write!(f, "operator action required"),
            Self::RequestRejected => write!(f, "request rejected"),
            Self::ConfigurationRequired => write!(f, "integration not configured"),
            Self::Aborted => write!(f, "request aborted"),
        }
    }
}

impl IntegrationError {
    pub fn not_configured(platform: Platform, reason: impl Into<String>) -> Self {
        Self::NotConfigured { platform, reason: reason.into() }
    }

    pub fn invalid_request(platform: Platform, source: DomainError) -> Self {
        Self::InvalidRequest { platform, source }
    }

    pub fn invalid_response(platform: Platform, message: impl fmt::Display) -> Self {
        Self::InvalidResponse { platform, message: message.to_string() }
    }

    /// Attach the platform to a terminal resilience error
    pub fn from_resilience(platform: Platform, error: ResilienceError<PlatformFailure>) -> Self {
        match error {
            ResilienceError::CircuitOpen { retry_after } => Self::Unavailable { platform, retry_after },
            ResilienceError::Authentication { source } => Self::Authentication { platform, source },
            ResilienceError::NotFound { source } => Self::NotFound { platform, source },
            ResilienceError::RateLimited { attempts, retry_after, source } => {
                Self::RateLimited { platform, attempts, retry_after, source }
            }
            ResilienceError::RetriesExhausted { attempts, source } => {
                Self::TransientExhausted { platform, attempts, source }
            }
            ResilienceError::Cancelled => Self::Cancelled { platform },
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::NotConfigured { platform, .. }
            | Self::InvalidRequest { platform, .. }
            | Self::Unavailable { platform, .. }
            | Self::Authentication { platform, .. }
            | Self::NotFound { platform, .. }
            | Self::RateLimited { platform, .. }
            | Self::TransientExhausted { platform, .. }
            | Self::Cancelled { platform }
            | Self::InvalidResponse { platform, .. } => *platform,
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Unavailable { .. } | Self::RateLimited { .. } | Self::TransientExhausted { .. } => {
                Disposition::Deferred
            }
            Self::Authentication { .. } | Self::InvalidResponse { .. } => {
                Disposition::OperatorActionRequired
            }
            Self::NotFound { .. } | Self::InvalidRequest { .. } => Disposition::RequestRejected,
            Self::NotConfigured { .. } => Disposition::ConfigurationRequired,
            Self::Cancelled { .. } => Disposition::Aborted,
        }
    }

    /// Short machine-friendly name, used as the `error_type` log field
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "not_configured",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Unavailable { .. } => "unavailable",
            Self::Authentication { .. } => "authentication",
            Self::NotFound { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::TransientExhausted { .. } => "transient_exhausted",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}

impl ErrorDisposition for IntegrationError {
    fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Deferred
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Authentication { .. } => ErrorSeverity::Critical,
            Self::NotConfigured { .. } | Self::InvalidResponse { .. } => ErrorSeverity::Error,
            Self::Unavailable { .. } | Self::RateLimited { .. } | Self::TransientExhausted { .. } => {
                ErrorSeverity::Warning
            }
            Self::NotFound { .. } | Self::InvalidRequest { .. } | Self::Cancelled { .. } => {
                ErrorSeverity::Info
            }
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Unavailable { retry_after, .. } => *retry_after,
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
