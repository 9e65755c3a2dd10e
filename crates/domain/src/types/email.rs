//! Transactional email types (SendGrid-style)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_EMAIL_RECIPIENTS, MAX_EMAIL_SUBJECT_LENGTH};
use crate::errors::{require_text, DomainError, DomainResult};

/// Structural address check: one `@`, a non-empty local part and a dotted
/// domain, no whitespace.
pub fn validate_email(value: &str) -> DomainResult<()> {
    let invalid = || DomainError::InvalidEmail { value: value.to_string() };

    if value.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let dotted = domain.split('.').count() >= 2 && domain.split('.').all(|label| !label.is_empty());
    if !dotted {
        return Err(invalid());
    }
    Ok(())
}

/// A syntactically valid email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        validate_email(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EmailAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(address: EmailAddress) -> Self {
        address.0
    }
}

/// Plain email with text and/or HTML body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<EmailAddress>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

impl EmailMessage {
    pub fn text(to: EmailAddress, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { to: vec![to], subject: subject.into(), text_body: Some(body.into()), html_body: None }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_recipients(&self.to)?;
        require_text("subject", &self.subject, MAX_EMAIL_SUBJECT_LENGTH)?;
        let has_body = [&self.text_body, &self.html_body]
            .into_iter()
            .flatten()
            .any(|body| !body.trim().is_empty());
        if !has_body {
            return Err(DomainError::empty("body"));
        }
        Ok(())
    }
}

/// Email rendered by the platform from a stored template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEmail {
    pub to: Vec<EmailAddress>,
    pub template_id: String,
    #[serde(default)]
    pub dynamic_data: serde_json::Map<String, serde_json::Value>,
}

impl TemplateEmail {
    pub fn new(to: EmailAddress, template_id: impl Into<String>) -> Self {
        Self { to: vec![to], template_id: template_id.into(), dynamic_data: serde_json::Map::new() }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.dynamic_data.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_recipients(&self.to)?;
        if self.template_id.trim().is_empty() {
            return Err(DomainError::empty("template_id"));
        }
        Ok(())
    }
}

/// Acceptance receipt; delivery itself is asynchronous on the platform side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    /// Platform message id, when the platform returns one
    pub message_id: Option<String>,
    pub recipients: usize,
}

fn validate_recipients(to: &[EmailAddress]) -> DomainResult<()> {
    if to.is_empty() {
        return Err(DomainError::empty("to"));
    }
    if to.len() > MAX_EMAIL_RECIPIENTS {
        return Err(DomainError::too_long("to", MAX_EMAIL_RECIPIENTS, to.len()));
    }
    Ok(())
}
