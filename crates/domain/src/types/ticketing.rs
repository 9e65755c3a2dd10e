//! Support ticket types (Zendesk-style)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_COMMENT_LENGTH, MAX_TICKET_SUBJECT_LENGTH, MAX_TICKET_TAGS};
use crate::errors::{require_text, DomainError, DomainResult};
use crate::impl_domain_status_conversions;
use crate::types::email::validate_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Hold,
    Solved,
    Closed,
}

impl_domain_status_conversions!(TicketStatus {
    New => "new",
    Open => "open",
    Pending => "pending",
    Hold => "hold",
    Solved => "solved",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl_domain_status_conversions!(TicketPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

/// Ticket as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    #[serde(default)]
    pub requester_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Ticket to be opened on behalf of a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub requester_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NewTicket {
    pub fn new(
        subject: impl Into<String>,
        description: impl Into<String>,
        requester_email: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            description: description.into(),
            requester_email: requester_email.into(),
            priority: None,
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: TicketPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("subject", &self.subject, MAX_TICKET_SUBJECT_LENGTH)?;
        require_text("description", &self.description, MAX_COMMENT_LENGTH)?;
        validate_email(&self.requester_email)?;
        validate_tags(&self.tags)
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.status.is_none() && self.priority.is_none() && self.tags.is_none()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::empty("ticket update"));
        }
        if let Some(subject) = &self.subject {
            require_text("subject", subject, MAX_TICKET_SUBJECT_LENGTH)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        Ok(())
    }
}

/// Comment appended to an existing ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    pub body: String,
    /// Visible to the requester when true, internal note otherwise
    pub public: bool,
}

impl TicketComment {
    pub fn public(body: impl Into<String>) -> Self {
        Self { body: body.into(), public: true }
    }

    pub fn internal(body: impl Into<String>) -> Self {
        Self { body: body.into(), public: false }
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("comment", &self.body, MAX_COMMENT_LENGTH)
    }
}

fn validate_tags(tags: &[String]) -> DomainResult<()> {
    if tags.len() > MAX_TICKET_TAGS {
        return Err(DomainError::too_long("tags", MAX_TICKET_TAGS, tags.len()));
    }
    if let Some(tag) = tags.iter().find(|tag| tag.trim().is_empty() || tag.contains(char::is_whitespace)) {
        return Err(DomainError::invalid("tag", tag.as_str()));
    }
    Ok(())
}
