//! Team chat types (Slack-style)

use serde::{Deserialize, Serialize};

use crate::constants::MAX_MESSAGE_LENGTH;
use crate::errors::{require_text, DomainResult};

/// Message posted to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: channel.into(), text: text.into() }
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("channel", &self.channel, 80)?;
        require_text("text", &self.text, MAX_MESSAGE_LENGTH)
    }
}

/// Confirmation of a posted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    /// Channel id the platform resolved the message to
    pub channel: String,
    /// Platform timestamp identifying the message
    pub ts: String,
}

/// Workspace member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}
