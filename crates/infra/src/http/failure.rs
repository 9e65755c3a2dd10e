//! Transport-level failure description
//!
//! [`PlatformFailure`] is the error type every platform operation returns to
//! the retry executor. It carries exactly what the status classifier needs:
//! the HTTP status (absent for network failures), the platform's requested
//! delay, and whether the platform signalled throttling outside of a 429.

use std::fmt;
use std::time::Duration;

use custops_common::FailureSignal;
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Longest response-body excerpt kept in a failure message
const MAX_MESSAGE_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFailure {
    pub status: Option<u16>,
    pub message: String,
    pub retry_after: Option<Duration>,
    pub throttled: bool,
}

impl PlatformFailure {
    /// Non-2xx response
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: truncate(message.into()), retry_after: None, throttled: false }
    }

    /// Connection failure, timeout, or body read error
    pub fn network(message: impl Into<String>) -> Self {
        Self { status: None, message: truncate(message.into()), retry_after: None, throttled: false }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Mark the failure as a throttling signal
    pub fn into_throttled(mut self) -> Self {
        self.throttled = true;
        self
    }

    /// Case-insensitive search of the message (response body excerpt)
    pub fn message_mentions(&self, needles: &[&str]) -> bool {
        let message = self.message.to_ascii_lowercase();
        needles.iter().any(|needle| message.contains(needle))
    }

    pub(crate) fn from_reqwest(error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timed out: {error}")
        } else if error.is_connect() {
            format!("connection failed: {error}")
        } else {
            format!("http transport error: {error}")
        };
        Self::network(message)
    }
}

impl fmt::Display for PlatformFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) if self.message.is_empty() => write!(f, "HTTP {status}"),
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for PlatformFailure {}

impl FailureSignal for PlatformFailure {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    fn is_throttled(&self) -> bool {
        self.throttled
    }
}

/// Parse a `Retry-After` header given in whole seconds
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(mut message: String) -> String {
    if let Some((index, _)) = message.char_indices().nth(MAX_MESSAGE_CHARS) {
        message.truncate(index);
        message.push_str("...");
    }
    message
}

#[cfg(test)]
mod tests {
    use custops_common::{ErrorClassification, ErrorClassifier, StatusClassifier};
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("17"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(17)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(PlatformFailure::http(503, "").to_string(), "HTTP 503");
        assert_eq!(PlatformFailure::http(404, "no such ticket").to_string(), "HTTP 404: no such ticket");
        assert_eq!(PlatformFailure::network("connection reset").to_string(), "connection reset");
    }

    #[test]
    fn test_long_messages_truncated() {
        let failure = PlatformFailure::http(500, "x".repeat(2_000));
        assert_eq!(failure.message.chars().count(), MAX_MESSAGE_CHARS + 3);
        assert!(failure.message.ends_with("..."));
    }

    #[test]
    fn test_classification_via_signal() {
        let throttled = PlatformFailure::http(422, "Rate limit exceeded")
            .with_retry_after(Some(Duration::from_secs(2)))
            .into_throttled();
        assert_eq!(
            StatusClassifier.classify(&throttled),
            ErrorClassification::RetryableRateLimit { retry_after: Some(Duration::from_secs(2)) }
        );
        assert_eq!(
            StatusClassifier.classify(&PlatformFailure::network("timed out")),
            ErrorClassification::RetryableTransient
        );
        assert!(throttled.message_mentions(&["rate limit"]));
    }
}
