//! Validation errors raised before a request is sent to a platform

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input that no platform would accept
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainError {
    #[error("{field} must not be empty")]
    EmptyField { field: String },

    #[error("{field} exceeds {max} (got {actual})")]
    TooLong { field: String, max: usize, actual: usize },

    #[error("invalid email address: {value}")]
    InvalidEmail { value: String },

    #[error("invalid {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl DomainError {
    pub fn empty(field: impl Into<String>) -> Self {
        Self::EmptyField { field: field.into() }
    }

    pub fn too_long(field: impl Into<String>, max: usize, actual: usize) -> Self {
        Self::TooLong { field: field.into(), max, actual }
    }

    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue { field: field.into(), value: value.into() }
    }

    /// Field the error refers to, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::EmptyField { field } | Self::TooLong { field, .. } | Self::InvalidValue { field, .. } => {
                Some(field)
            }
            Self::InvalidEmail { .. } => None,
        }
    }
}

/// Result type alias for domain validation
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Reject blank values and values longer than `max` characters
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::empty(field));
    }
    let length = value.chars().count();
    if length > max {
        return Err(DomainError::too_long(field, max, length));
    }
    Ok(())
}
