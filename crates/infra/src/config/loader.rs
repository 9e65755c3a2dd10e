//! Configuration loader
//!
//! Loads integration configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. `CUSTOPS_CONFIG` names a file: load that file
//! 2. Otherwise, if any platform credential is set in the environment, load
//!    from environment variables; an invalid value there is returned as is
//! 3. Otherwise, probe the standard file locations
//!
//! Files are TOML or JSON, detected by extension.
//!
//! ## Environment Variables
//! - `CUSTOPS_LOG_LEVEL`, `CUSTOPS_LOG_FORMAT` (`pretty`/`json`/`compact`)
//! - `CUSTOPS_FAILURE_THRESHOLD`, `CUSTOPS_COOLDOWN_SECS`,
//!   `CUSTOPS_MAX_RETRIES`, `CUSTOPS_BASE_DELAY_MS`,
//!   `CUSTOPS_BACKOFF_MULTIPLIER`, `CUSTOPS_MAX_DELAY_MS`, `CUSTOPS_JITTER`
//! - `CUSTOPS_TICKETING_SUBDOMAIN`, `CUSTOPS_TICKETING_BASE_URL`,
//!   `CUSTOPS_TICKETING_EMAIL`, `CUSTOPS_TICKETING_API_TOKEN`
//! - `CUSTOPS_MESSAGING_BASE_URL`, `CUSTOPS_MESSAGING_BOT_TOKEN`
//! - `CUSTOPS_ANALYTICS_INGEST_URL`, `CUSTOPS_ANALYTICS_QUERY_URL`,
//!   `CUSTOPS_ANALYTICS_PROJECT_TOKEN`, `CUSTOPS_ANALYTICS_API_SECRET`
//! - `CUSTOPS_EMAIL_BASE_URL`, `CUSTOPS_EMAIL_API_KEY`,
//!   `CUSTOPS_EMAIL_FROM_ADDRESS`, `CUSTOPS_EMAIL_FROM_NAME`
//! - `CUSTOPS_<PLATFORM>_ENABLED` (true/false) for each platform
//!
//! ## File Locations
//! The loader probes, in order: `./custops.toml`, `./custops.json`,
//! `./config/custops.toml`, `./config/custops.json`, then the same names next
//! to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use custops_common::{CommonError, CommonResult};

use super::secret::SecretString;
use super::settings::{IntegrationsConfig, JitterMode, LogFormat};

/// Names a config file explicitly
pub const CONFIG_PATH_VAR: &str = "CUSTOPS_CONFIG";

const CREDENTIAL_VARS: [&str; 5] = [
    "CUSTOPS_TICKETING_API_TOKEN",
    "CUSTOPS_MESSAGING_BOT_TOKEN",
    "CUSTOPS_ANALYTICS_PROJECT_TOKEN",
    "CUSTOPS_EMAIL_API_KEY",
    "CUSTOPS_ANALYTICS_API_SECRET",
];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CommonError::Config` if no source yields a valid configuration.
pub fn load() -> CommonResult<IntegrationsConfig> {
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        return load_from_file(Some(PathBuf::from(path)));
    }

    let env = |key: &str| std::env::var(key).ok();
    if !has_credentials(&env) {
        tracing::debug!("No platform credentials in environment, trying file");
        return load_from_file(None);
    }

    // Credentials in the environment commit to it; a bad value is an error
    let config = load_from_lookup(env)?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from the process environment
///
/// # Errors
/// Returns `CommonError::Config` when no platform credential is set or a
/// variable has an invalid value.
pub fn load_from_env() -> CommonResult<IntegrationsConfig> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary variable source
///
/// `lookup` returns the value of a variable, or `None` when unset.
pub fn load_from_lookup<F>(lookup: F) -> CommonResult<IntegrationsConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if !has_credentials(&var) {
        return Err(CommonError::config(
            "No platform credentials found in environment variables",
        ));
    }

    let mut config = IntegrationsConfig::default();

    if let Some(level) = var("CUSTOPS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = var("CUSTOPS_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }

    let resilience = &mut config.resilience;
    set_parsed(&var, "CUSTOPS_FAILURE_THRESHOLD", &mut resilience.failure_threshold)?;
    set_parsed(&var, "CUSTOPS_COOLDOWN_SECS", &mut resilience.cooldown_secs)?;
    set_parsed(&var, "CUSTOPS_MAX_RETRIES", &mut resilience.max_retries)?;
    set_parsed(&var, "CUSTOPS_BASE_DELAY_MS", &mut resilience.base_delay_ms)?;
    set_parsed(&var, "CUSTOPS_BACKOFF_MULTIPLIER", &mut resilience.backoff_multiplier)?;
    set_parsed(&var, "CUSTOPS_MAX_DELAY_MS", &mut resilience.max_delay_ms)?;
    if let Some(jitter) = var("CUSTOPS_JITTER") {
        resilience.jitter = parse_jitter(&jitter)?;
    }

    let ticketing = &mut config.ticketing;
    ticketing.enabled = env_bool(&var, "CUSTOPS_TICKETING_ENABLED", true);
    ticketing.subdomain = var("CUSTOPS_TICKETING_SUBDOMAIN");
    ticketing.base_url = var("CUSTOPS_TICKETING_BASE_URL");
    ticketing.email = var("CUSTOPS_TICKETING_EMAIL");
    ticketing.api_token = var("CUSTOPS_TICKETING_API_TOKEN").map(SecretString::from);

    let messaging = &mut config.messaging;
    messaging.enabled = env_bool(&var, "CUSTOPS_MESSAGING_ENABLED", true);
    if let Some(url) = var("CUSTOPS_MESSAGING_BASE_URL") {
        messaging.base_url = url;
    }
    messaging.bot_token = var("CUSTOPS_MESSAGING_BOT_TOKEN").map(SecretString::from);

    let analytics = &mut config.analytics;
    analytics.enabled = env_bool(&var, "CUSTOPS_ANALYTICS_ENABLED", true);
    if let Some(url) = var("CUSTOPS_ANALYTICS_INGEST_URL") {
        analytics.ingest_url = url;
    }
    if let Some(url) = var("CUSTOPS_ANALYTICS_QUERY_URL") {
        analytics.query_url = url;
    }
    analytics.project_token = var("CUSTOPS_ANALYTICS_PROJECT_TOKEN").map(SecretString::from);
    analytics.api_secret = var("CUSTOPS_ANALYTICS_API_SECRET").map(SecretString::from);

    let email = &mut config.email;
    email.enabled = env_bool(&var, "CUSTOPS_EMAIL_ENABLED", true);
    if let Some(url) = var("CUSTOPS_EMAIL_BASE_URL") {
        email.base_url = url;
    }
    email.api_key = var("CUSTOPS_EMAIL_API_KEY").map(SecretString::from);
    email.from_address = var("CUSTOPS_EMAIL_FROM_ADDRESS");
    email.from_name = var("CUSTOPS_EMAIL_FROM_NAME");

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations
/// (see [`probe_config_paths`]).
///
/// # Errors
/// Returns `CommonError::Config` if the file is missing, unreadable or fails
/// validation, and `CommonError::Serialization` if it is malformed.
pub fn load_from_file(path: Option<PathBuf>) -> CommonResult<IntegrationsConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommonError::config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse TOML configuration text
///
/// # Errors
/// Returns `CommonError::Serialization` on invalid TOML and
/// `CommonError::Config` on failed validation.
pub fn load_from_str(contents: &str) -> CommonResult<IntegrationsConfig> {
    let config: IntegrationsConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration by file extension (`.toml` or `.json`)
fn parse_config(contents: &str, path: &Path) -> CommonResult<IntegrationsConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => load_from_str(contents),
        "json" => {
            let config: IntegrationsConfig = serde_json::from_str(contents)?;
            config.validate()?;
            Ok(config)
        }
        _ => Err(CommonError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] =
        ["custops.toml", "custops.json", "config/custops.toml", "config/custops.json"];

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn has_credentials<F>(lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    CREDENTIAL_VARS
        .iter()
        .any(|key| lookup(key).is_some_and(|value| !value.trim().is_empty()))
}

fn set_parsed<T, F>(var: &F, key: &str, target: &mut T) -> CommonResult<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| CommonError::config_field(key, format!("invalid value '{raw}': {e}")))?;
    }
    Ok(())
}

/// Parse a boolean variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool<F>(var: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_log_format(value: &str) -> CommonResult<LogFormat> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        "compact" => Ok(LogFormat::Compact),
        other => Err(CommonError::config_field(
            "CUSTOPS_LOG_FORMAT",
            format!("expected pretty, json or compact, got '{other}'"),
        )),
    }
}

fn parse_jitter(value: &str) -> CommonResult<JitterMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(JitterMode::None),
        "full" => Ok(JitterMode::Full),
        "equal" => Ok(JitterMode::Equal),
        other => Err(CommonError::config_field(
            "CUSTOPS_JITTER",
            format!("expected none, full or equal, got '{other}'"),
        )),
    }
}
