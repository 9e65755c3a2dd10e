//! Common error types and utilities shared by the custops crates
//!
//! This module provides the error vocabulary every other layer composes with.
//!
//! # Error Handling Architecture
//!
//! 1. **`CommonError`**: the handful of error patterns that appear in more
//!    than one crate (configuration, serialization, internal)
//!
//! 2. **`ErrorDisposition` trait**: a standard interface describing how an
//!    error should be treated (retryability, severity, criticality, suggested
//!    retry delay)
//!
//! 3. **`ErrorSeverity` enum**: severity levels used to pick a log level when
//!    an error is finally reported
//!
//! ## Composition
//!
//! Crate-specific errors embed `CommonError` rather than duplicating it:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum LoaderError {
//!     #[error("config file missing: {0}")]
//!     Missing(PathBuf),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Resource not found, cancelled work |
//! | **Warning** | Degraded but operational | Rate limiting, circuit open, exhausted retries |
//! | **Error** | Failure requiring attention | Invalid input, missing configuration |
//! | **Critical** | Operator must act | Rejected credentials, internal invariant broken |

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple crates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error in field '{}': {}", field, message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorDisposition for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } | Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Short machine-friendly name, used as the `error_type` log field.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Describes how an error should be treated once it reaches a boundary
///
/// Implemented by every error type that crosses a crate boundary so callers
/// can make retry, logging and alerting decisions without matching on
/// concrete variants.
pub trait ErrorDisposition {
    /// Whether trying the same request again later could succeed
    fn is_retryable(&self) -> bool;

    /// Severity used for logging and alerting
    fn severity(&self) -> ErrorSeverity;

    /// Whether an operator must intervene (rotate credentials, fix a bug)
    fn is_critical(&self) -> bool;

    /// Suggested delay before the caller tries again, if one is known
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(CommonError::config("missing").to_string(), "Configuration error: missing");
        assert_eq!(
            CommonError::config_field("api_key", "must not be empty").to_string(),
            "Configuration error in field 'api_key': must not be empty"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }

    #[test]
    fn test_common_errors_are_not_retryable() {
        let errors = [
            CommonError::config("x"),
            CommonError::serialization_format("JSON", "eof"),
            CommonError::internal("bug"),
        ];
        for err in &errors {
            assert!(!err.is_retryable(), "{err} should not be retryable");
            assert_eq!(err.retry_after(), None);
        }
        assert!(CommonError::internal("bug").is_critical());
        assert!(!CommonError::config("x").is_critical());
    }

    #[test]
    fn test_toml_error_conversion() {
        let parsed: Result<toml::Value, _> = toml::from_str("not = [valid");
        let err: CommonError = parsed.unwrap_err().into();
        assert_eq!(err.error_type_name(), "serialization");
        assert!(err.to_string().contains("TOML"));
    }
}
