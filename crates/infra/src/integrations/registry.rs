use custops_common::CommonResult;
use tracing::info;

use super::{
    AnalyticsClient, ConfiguredClient, EmailClient, MessagingClient, Platform, PlatformHealth,
    TicketingClient,
};
use crate::config::IntegrationsConfig;

/// All platform clients, built once at startup and passed by reference
#[derive(Debug, Clone)]
pub struct IntegrationClients {
    ticketing: TicketingClient,
    messaging: MessagingClient,
    analytics: AnalyticsClient,
    email: EmailClient,
}

impl IntegrationClients {
    /// Build every client
    ///
    /// Platforms without credentials still get a client; it reports
    /// `NotConfigured` on every call.
    ///
    /// # Errors
    /// Invalid resilience settings, base URLs, or sender address.
    pub fn from_config(config: &IntegrationsConfig) -> CommonResult<Self> {
        config.validate()?;

        let clients = Self {
            ticketing: TicketingClient::from_config(
                &config.ticketing,
                config.resilience_for(Platform::Ticketing),
            )?,
            messaging: MessagingClient::from_config(
                &config.messaging,
                config.resilience_for(Platform::Messaging),
            )?,
            analytics: AnalyticsClient::from_config(
                &config.analytics,
                config.resilience_for(Platform::Analytics),
            )?,
            email: EmailClient::from_config(&config.email, config.resilience_for(Platform::Email))?,
        };

        let configured: Vec<&str> =
            clients.configured_platforms().iter().map(Platform::as_str).collect();
        info!(configured = ?configured, "integration clients ready");
        Ok(clients)
    }

    pub fn ticketing(&self) -> &TicketingClient {
        &self.ticketing
    }

    pub fn messaging(&self) -> &MessagingClient {
        &self.messaging
    }

    pub fn analytics(&self) -> &AnalyticsClient {
        &self.analytics
    }

    pub fn email(&self) -> &EmailClient {
        &self.email
    }

    pub fn client(&self, platform: Platform) -> &dyn ConfiguredClient {
        match platform {
            Platform::Ticketing => &self.ticketing,
            Platform::Messaging => &self.messaging,
            Platform::Analytics => &self.analytics,
            Platform::Email => &self.email,
        }
    }

    pub fn configured_platforms(&self) -> Vec<Platform> {
        Platform::ALL.into_iter().filter(|platform| self.client(*platform).is_configured()).collect()
    }

    /// Configured flag and breaker state of every platform
    pub fn health_summary(&self) -> Vec<PlatformHealth> {
        Platform::ALL.into_iter().map(|platform| self.client(platform).health()).collect()
    }
}
