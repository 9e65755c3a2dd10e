//! Team chat client (Slack-style Web API)
//!
//! The Web API reports most failures as HTTP 200 with `{"ok": false, "error":
//! "<code>"}`. Those bodies are translated into the status the classifier
//! understands before the retry executor sees them:
//!
//! | error code | treated as |
//! |---|---|
//! | `invalid_auth`, `not_authed`, `account_inactive`, `token_revoked` | 401 |
//! | `channel_not_found`, `users_not_found`, `user_not_found` | 404 |
//! | `ratelimited` | throttle signal |
//! | anything else | transient |

use std::time::Duration;

use custops_common::CommonResult;
use custops_domain::{validate_email, ChatMessage, ChatUser, MessageReceipt};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::caller::{decode, ResilientCaller};
use super::{ConfiguredClient, Platform, Setup};
use crate::config::{MessagingConfig, ResilienceSettings, SecretString};
use crate::errors::{IntegrationError, IntegrationResult};
use crate::http::{HttpTransport, PlatformFailure, PlatformResponse};

#[derive(Debug, Clone)]
struct Connection {
    transport: HttpTransport,
    bot_token: SecretString,
}

/// Common part of every Web API response
#[derive(Debug, Deserialize)]
struct ApiStatus {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    email: Option<String>,
}

impl From<SlackUser> for ChatUser {
    fn from(user: SlackUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            real_name: user.real_name,
            email: user.profile.email,
            is_bot: user.is_bot,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessagingClient {
    setup: Setup<Connection>,
    caller: ResilientCaller,
}

impl MessagingClient {
    pub fn from_config(config: &MessagingConfig, resilience: &ResilienceSettings) -> CommonResult<Self> {
        let caller = ResilientCaller::new(Platform::Messaging, resilience)?;

        let setup = match (config.unconfigured_reason(), config.bot_token.as_ref()) {
            (None, Some(token)) => Setup::Ready(Connection {
                transport: HttpTransport::builder(&config.base_url)
                    .timeout(Duration::from_secs(config.request_timeout_secs))
                    .build()?,
                bot_token: token.clone(),
            }),
            (Some(reason), _) => Setup::Unconfigured(reason),
            (None, None) => Setup::Unconfigured("bot_token missing".to_string()),
        };

        Ok(Self { setup, caller })
    }

    /// Post `text` to `channel` (id or `#name`)
    #[instrument(skip(self, text), fields(platform = "messaging"))]
    pub async fn send_message(&self, channel: &str, text: &str) -> IntegrationResult<MessageReceipt> {
        let conn = self.setup.ready(Platform::Messaging)?;
        let message = ChatMessage::new(channel, text);
        message.validate().map_err(|err| IntegrationError::invalid_request(Platform::Messaging, err))?;

        let payload = json!({ "channel": message.channel, "text": message.text });
        let response = self
            .caller
            .call("send_message", || {
                let request = conn
                    .transport
                    .request(Method::POST, "chat.postMessage")
                    .bearer_auth(conn.bot_token.expose())
                    .json(&payload);
                send(conn, request)
            })
            .await?;

        let receipt: MessageReceipt = decode(Platform::Messaging, &response)?;
        debug!(channel = %receipt.channel, ts = %receipt.ts, "message posted");
        Ok(receipt)
    }

    #[instrument(skip(self, email), fields(platform = "messaging"))]
    pub async fn lookup_user_by_email(&self, email: &str) -> IntegrationResult<ChatUser> {
        let conn = self.setup.ready(Platform::Messaging)?;
        validate_email(email).map_err(|err| IntegrationError::invalid_request(Platform::Messaging, err))?;

        let response = self
            .caller
            .call("lookup_user_by_email", || {
                let request = conn
                    .transport
                    .request(Method::GET, "users.lookupByEmail")
                    .bearer_auth(conn.bot_token.expose())
                    .query(&[("email", email)]);
                send(conn, request)
            })
            .await?;

        Ok(decode::<LookupResponse>(Platform::Messaging, &response)?.user.into())
    }
}

impl ConfiguredClient for MessagingClient {
    fn platform(&self) -> Platform {
        Platform::Messaging
    }

    fn is_configured(&self) -> bool {
        self.setup.is_ready()
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }
}

async fn send(
    conn: &Connection,
    request: reqwest::RequestBuilder,
) -> Result<PlatformResponse, PlatformFailure> {
    let response = conn.transport.execute(request).await?;
    match serde_json::from_str::<ApiStatus>(&response.body) {
        Ok(ApiStatus { ok: false, error }) => Err(translate_error(error.as_deref().unwrap_or("unknown_error"))),
        // Bodies that do not parse are reported by the decoder as invalid responses
        _ => Ok(response),
    }
}

fn translate_error(code: &str) -> PlatformFailure {
    match code {
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" => {
            PlatformFailure::http(401, code)
        }
        "channel_not_found" | "users_not_found" | "user_not_found" => PlatformFailure::http(404, code),
        "ratelimited" => PlatformFailure::http(200, code).into_throttled(),
        _ => PlatformFailure::http(200, code),
    }
}
