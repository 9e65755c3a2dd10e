//! Payload types, one module per platform

pub mod analytics;
pub mod email;
pub mod messaging;
pub mod ticketing;

pub use analytics::{validate_properties, AnalyticsEvent, Properties, UserProfile};
pub use email::{validate_email, EmailAddress, EmailMessage, EmailReceipt, TemplateEmail};
pub use messaging::{ChatMessage, ChatUser, MessageReceipt};
pub use ticketing::{NewTicket, Ticket, TicketComment, TicketPriority, TicketStatus, TicketUpdate};
