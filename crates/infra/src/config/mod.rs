//! Configuration loading and management
//!
//! This module provides the integration settings and the utilities for
//! loading them from environment variables and files.

pub mod loader;
mod secret;
mod settings;

pub use loader::{load, load_from_env, load_from_file, load_from_str, probe_config_paths};
pub use secret::SecretString;
pub use settings::{
    AnalyticsConfig, EmailConfig, IntegrationsConfig, JitterMode, LogFormat, LoggingConfig,
    MessagingConfig, ResilienceSettings, TicketingConfig,
};
