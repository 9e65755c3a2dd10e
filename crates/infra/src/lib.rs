//! # Custops Infrastructure
//!
//! Everything that touches the outside world.
//!
//! This crate contains:
//! - Configuration loading (environment variables, TOML/JSON files)
//! - Logging bootstrap on `tracing-subscriber`
//! - The HTTP transport shared by every platform client
//! - Ticketing, messaging, analytics and email clients, each routing its
//!   calls through its own circuit breaker and retry executor
//!
//! ## Architecture
//! - Resilience primitives come from `custops-common`
//! - Payload types and input validation come from `custops-domain`
//! - Clients are built once from [`config::IntegrationsConfig`] and passed by
//!   reference; there is no global client state

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use config::IntegrationsConfig;
pub use errors::{Disposition, IntegrationError, IntegrationResult};
pub use http::{HttpTransport, PlatformFailure, PlatformResponse};
pub use integrations::{
    AnalyticsClient, ConfiguredClient, EmailClient, IntegrationClients, MessagingClient,
    Platform, PlatformHealth, ResilientCaller, TicketingClient,
};
