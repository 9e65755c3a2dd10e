//! Helpdesk client (Zendesk-style REST API)
//!
//! Authenticates with `{agent_email}/token` basic auth. The helpdesk
//! occasionally throttles bulk writes with a `422` whose body names the rate
//! limit instead of a `429`; those are treated as rate-limit signals.

use std::time::Duration;

use custops_common::CommonResult;
use custops_domain::{NewTicket, Ticket, TicketComment, TicketUpdate};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::caller::{decode, ResilientCaller};
use super::{ConfiguredClient, Platform, Setup};
use crate::config::{ResilienceSettings, SecretString, TicketingConfig};
use crate::errors::{IntegrationError, IntegrationResult};
use crate::http::{HttpTransport, PlatformFailure, PlatformResponse};

const THROTTLE_MARKERS: [&str; 3] = ["rate limit", "throttl", "too many requests"];

#[derive(Debug, Clone)]
struct Connection {
    transport: HttpTransport,
    username: String,
    api_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct TicketEnvelope {
    ticket: Ticket,
}

#[derive(Debug, Clone)]
pub struct TicketingClient {
    setup: Setup<Connection>,
    caller: ResilientCaller,
}

impl TicketingClient {
    pub fn from_config(config: &TicketingConfig, resilience: &ResilienceSettings) -> CommonResult<Self> {
        let caller = ResilientCaller::new(Platform::Ticketing, resilience)?;

        let setup = match (config.unconfigured_reason(), config.api_base()) {
            (None, Some(base_url)) => Setup::Ready(Connection {
                transport: HttpTransport::builder(base_url)
                    .timeout(Duration::from_secs(config.request_timeout_secs))
                    .build()?,
                username: format!("{}/token", config.email.as_deref().unwrap_or_default()),
                api_token: config.api_token.clone().unwrap_or_else(|| SecretString::new("")),
            }),
            (Some(reason), _) => Setup::Unconfigured(reason),
            (None, None) => Setup::Unconfigured("subdomain or base_url missing".to_string()),
        };

        Ok(Self { setup, caller })
    }

    #[instrument(skip_all, fields(platform = "ticketing"))]
    pub async fn create_ticket(&self, ticket: &NewTicket) -> IntegrationResult<Ticket> {
        let conn = self.setup.ready(Platform::Ticketing)?;
        ticket.validate().map_err(|err| IntegrationError::invalid_request(Platform::Ticketing, err))?;

        let mut body = json!({
            "subject": ticket.subject,
            "comment": { "body": ticket.description },
            "requester": { "email": ticket.requester_email },
        });
        if let Some(priority) = ticket.priority {
            body["priority"] = json!(priority);
        }
        if !ticket.tags.is_empty() {
            body["tags"] = json!(ticket.tags);
        }
        let payload = json!({ "ticket": body });

        let response = self
            .caller
            .call("create_ticket", || send(conn, Method::POST, "tickets.json".to_string(), Some(&payload)))
            .await?;
        let created = decode::<TicketEnvelope>(Platform::Ticketing, &response)?.ticket;

        info!(ticket_id = created.id, "ticket created");
        Ok(created)
    }

    #[instrument(skip(self), fields(platform = "ticketing"))]
    pub async fn get_ticket(&self, id: u64) -> IntegrationResult<Ticket> {
        let conn = self.setup.ready(Platform::Ticketing)?;
        let path = format!("tickets/{id}.json");

        let response = self.caller.call("get_ticket", || send(conn, Method::GET, path.clone(), None)).await?;
        Ok(decode::<TicketEnvelope>(Platform::Ticketing, &response)?.ticket)
    }

    #[instrument(skip(self, update), fields(platform = "ticketing"))]
    pub async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> IntegrationResult<Ticket> {
        let conn = self.setup.ready(Platform::Ticketing)?;
        update.validate().map_err(|err| IntegrationError::invalid_request(Platform::Ticketing, err))?;

        let path = format!("tickets/{id}.json");
        let payload = json!({ "ticket": update });

        let response = self
            .caller
            .call("update_ticket", || send(conn, Method::PUT, path.clone(), Some(&payload)))
            .await?;
        Ok(decode::<TicketEnvelope>(Platform::Ticketing, &response)?.ticket)
    }

    /// Append a public reply or internal note; returns the updated ticket
    #[instrument(skip(self, comment), fields(platform = "ticketing", public = comment.public))]
    pub async fn add_comment(&self, id: u64, comment: &TicketComment) -> IntegrationResult<Ticket> {
        let conn = self.setup.ready(Platform::Ticketing)?;
        comment.validate().map_err(|err| IntegrationError::invalid_request(Platform::Ticketing, err))?;

        let path = format!("tickets/{id}.json");
        let payload = json!({ "ticket": { "comment": { "body": comment.body, "public": comment.public } } });

        let response = self
            .caller
            .call("add_comment", || send(conn, Method::PUT, path.clone(), Some(&payload)))
            .await?;
        Ok(decode::<TicketEnvelope>(Platform::Ticketing, &response)?.ticket)
    }
}

impl ConfiguredClient for TicketingClient {
    fn platform(&self) -> Platform {
        Platform::Ticketing
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
    method: Method,
    path: String,
    body: Option<&Value>,
) -> Result<PlatformResponse, PlatformFailure> {
    let mut request = conn
        .transport
        .request(method, &path)
        .basic_auth(&conn.username, Some(conn.api_token.expose()));
    if let Some(body) = body {
        request = request.json(body);
    }
    conn.transport.execute(request).await.map_err(translate_failure)
}

fn translate_failure(failure: PlatformFailure) -> PlatformFailure {
    if failure.status == Some(422) && failure.message_mentions(&THROTTLE_MARKERS) {
        failure.into_throttled()
    } else {
        failure
    }
}
