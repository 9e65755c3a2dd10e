//! Transactional email client (SendGrid-style v3 API)
//!
//! The platform rejects over-quota senders with `403` and a body that names
//! the rate limit; that case is a throttle signal, every other 403 an auth
//! failure.

use std::time::Duration;

use custops_common::{CommonError, CommonResult};
use custops_domain::{EmailAddress, EmailMessage, EmailReceipt, TemplateEmail};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::caller::ResilientCaller;
use super::{ConfiguredClient, Platform, Setup};
use crate::config::{EmailConfig, ResilienceSettings, SecretString};
use crate::errors::{IntegrationError, IntegrationResult};
use crate::http::{HttpTransport, PlatformFailure, PlatformResponse};

const MESSAGE_ID_HEADER: &str = "x-message-id";
const THROTTLE_MARKERS: [&str; 3] = ["rate limit", "too many", "quota"];

#[derive(Debug, Clone)]
struct Connection {
    transport: HttpTransport,
    api_key: SecretString,
    from: Value,
}

#[derive(Debug, Clone)]
pub struct EmailClient {
    setup: Setup<Connection>,
    caller: ResilientCaller,
}

impl EmailClient {
    pub fn from_config(config: &EmailConfig, resilience: &ResilienceSettings) -> CommonResult<Self> {
        let caller = ResilientCaller::new(Platform::Email, resilience)?;

        let setup = match (config.unconfigured_reason(), config.api_key.as_ref(), config.from_address.as_deref()) {
            (None, Some(api_key), Some(from_address)) => {
                let from_address = EmailAddress::parse(from_address)
                    .map_err(|err| CommonError::config_field("email.from_address", err.to_string()))?;
                let mut from = json!({ "email": from_address });
                if let Some(name) = &config.from_name {
                    from["name"] = json!(name);
                }
                Setup::Ready(Connection {
                    transport: HttpTransport::builder(&config.base_url)
                        .timeout(Duration::from_secs(config.request_timeout_secs))
                        .build()?,
                    api_key: api_key.clone(),
                    from,
                })
            }
            (Some(reason), _, _) => Setup::Unconfigured(reason),
            (None, _, _) => Setup::Unconfigured("api_key or from_address missing".to_string()),
        };

        Ok(Self { setup, caller })
    }

    #[instrument(skip_all, fields(platform = "email", recipients = message.to.len()))]
    pub async fn send_email(&self, message: &EmailMessage) -> IntegrationResult<EmailReceipt> {
        let conn = self.setup.ready(Platform::Email)?;
        message.validate().map_err(|err| IntegrationError::invalid_request(Platform::Email, err))?;

        let mut content = Vec::new();
        if let Some(text) = &message.text_body {
            content.push(json!({ "type": "text/plain", "value": text }));
        }
        if let Some(html) = &message.html_body {
            content.push(json!({ "type": "text/html", "value": html }));
        }
        let payload = json!({
            "personalizations": [{ "to": recipients(&message.to) }],
            "from": conn.from,
            "subject": message.subject,
            "content": content,
        });

        let response = self.caller.call("send_email", || send(conn, &payload)).await?;
        Ok(receipt(&response, message.to.len()))
    }

    #[instrument(skip_all, fields(platform = "email", template_id = %template.template_id))]
    pub async fn send_template(&self, template: &TemplateEmail) -> IntegrationResult<EmailReceipt> {
        let conn = self.setup.ready(Platform::Email)?;
        template.validate().map_err(|err| IntegrationError::invalid_request(Platform::Email, err))?;

        let payload = json!({
            "personalizations": [{
                "to": recipients(&template.to),
                "dynamic_template_data": template.dynamic_data,
            }],
            "from": conn.from,
            "template_id": template.template_id,
        });

        let response = self.caller.call("send_template", || send(conn, &payload)).await?;
        Ok(receipt(&response, template.to.len()))
    }
}

impl ConfiguredClient for EmailClient {
    fn platform(&self) -> Platform {
        Platform::Email
    }

    fn is_configured(&self) -> bool {
        self.setup.is_ready()
    }

    fn caller(&self) -> &ResilientCaller {
        &self.caller
    }
}

fn recipients(to: &[EmailAddress]) -> Vec<Value> {
    to.iter().map(|address| json!({ "email": address })).collect()
}

fn receipt(response: &PlatformResponse, recipients: usize) -> EmailReceipt {
    let message_id = response.header(MESSAGE_ID_HEADER).map(str::to_string);
    info!(message_id = message_id.as_deref().unwrap_or("-"), recipients, "email accepted");
    EmailReceipt { message_id, recipients }
}

async fn send(conn: &Connection, payload: &Value) -> Result<PlatformResponse, PlatformFailure> {
    let request = conn
        .transport
        .request(Method::POST, "mail/send")
        .bearer_auth(conn.api_key.expose())
        .json(payload);
    conn.transport.execute(request).await.map_err(translate_failure)
}

fn translate_failure(failure: PlatformFailure) -> PlatformFailure {
    if failure.status == Some(403) && failure.message_mentions(&THROTTLE_MARKERS) {
        failure.into_throttled()
    } else {
        failure
    }
}
