//! Platform integrations
//!
//! Each client owns one [`ResilientCaller`] (a circuit breaker plus retry
//! executor built from its [`ResilienceSettings`](crate::config::ResilienceSettings))
//! and an [`HttpTransport`](crate::http::HttpTransport) per endpoint. Calls
//! flow like this:
//!
//! ```text
//! client method
//!   ├─ credentials missing? ──> IntegrationError::NotConfigured
//!   ├─ domain validation    ──> IntegrationError::InvalidRequest
//!   └─ ResilientCaller::call
//!        └─ RetryExecutor (breaker gate, classify, backoff)
//!             └─ HttpTransport::execute (one HTTP request)
//! ```

mod analytics;
mod caller;
mod email;
mod messaging;
mod registry;
mod ticketing;

use std::fmt;
use std::time::Duration;

use custops_common::CircuitState;

pub use analytics::AnalyticsClient;
pub use caller::ResilientCaller;
pub use email::EmailClient;
pub use messaging::MessagingClient;
pub use registry::IntegrationClients;
pub use ticketing::TicketingClient;

use crate::errors::{IntegrationError, IntegrationResult};

/// External platform behind one client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Ticketing,
    Messaging,
    Analytics,
    Email,
}

impl Platform {
    pub const ALL: [Platform; 4] =
        [Platform::Ticketing, Platform::Messaging, Platform::Analytics, Platform::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticketing => "ticketing",
            Self::Messaging => "messaging",
            Self::Analytics => "analytics",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one client's readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformHealth {
    pub platform: Platform,
    pub configured: bool,
    pub circuit_state: CircuitState,
    pub failure_count: u32,
    /// Time until a probe is admitted, while the circuit is open
    pub remaining_cooldown: Option<Duration>,
}

/// Common surface of every platform client
pub trait ConfiguredClient {
    fn platform(&self) -> Platform;

    /// Whether credentials are present; unconfigured clients fail every call
    /// with [`IntegrationError::NotConfigured`] without touching the breaker
    fn is_configured(&self) -> bool;

    fn caller(&self) -> &ResilientCaller;

    fn circuit_state(&self) -> CircuitState {
        self.caller().circuit_state()
    }

    fn health(&self) -> PlatformHealth {
        let breaker = self.caller().breaker();
        PlatformHealth {
            platform: self.platform(),
            configured: self.is_configured(),
            circuit_state: breaker.state(),
            failure_count: breaker.failure_count(),
            remaining_cooldown: breaker.remaining_cooldown(),
        }
    }
}

/// Connection details of a client, or the reason it has none
#[derive(Debug, Clone)]
pub(crate) enum Setup<T> {
    Ready(T),
    Unconfigured(String),
}

impl<T> Setup<T> {
    pub(crate) fn ready(&self, platform: Platform) -> IntegrationResult<&T> {
        match self {
            Self::Ready(connection) => Ok(connection),
            Self::Unconfigured(reason) => Err(IntegrationError::not_configured(platform, reason.clone())),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}
