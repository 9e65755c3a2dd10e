//! Field limits enforced before requests leave the process

pub const MAX_TICKET_SUBJECT_LENGTH: usize = 255;
pub const MAX_TICKET_TAGS: usize = 50;
pub const MAX_COMMENT_LENGTH: usize = 65_536;

// Slack-style chat limits
pub const MAX_MESSAGE_LENGTH: usize = 40_000;

pub const MAX_EVENT_NAME_LENGTH: usize = 255;
pub const MAX_EVENT_PROPERTIES: usize = 255;

pub const MAX_EMAIL_RECIPIENTS: usize = 1_000;
pub const MAX_EMAIL_SUBJECT_LENGTH: usize = 998;
