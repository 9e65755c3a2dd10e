use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use custops_common::{CommonError, CommonResult};

use super::failure::{parse_retry_after, PlatformFailure};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Single-attempt HTTP transport bound to one platform's base URL.
///
/// Retrying and circuit breaking happen one layer up, in the resilient caller;
/// this type only turns one request into either a [`PlatformResponse`] or a
/// [`PlatformFailure`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    /// Start building a transport for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request builder for `path`, relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.client.request(method, url)
    }

    /// Send exactly one request.
    ///
    /// Non-2xx statuses come back as a [`PlatformFailure`] carrying the status,
    /// a body excerpt and any `Retry-After` delay.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<PlatformResponse, PlatformFailure> {
        let request_id = Uuid::new_v4().to_string();
        let request = builder
            .header(REQUEST_ID_HEADER, &request_id)
            .build()
            .map_err(|err| PlatformFailure::from_reqwest(&err))?;

        let method = request.method().clone();
        let path = request.url().path().to_string();
        debug!(%method, %path, %request_id, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(|err| {
            debug!(%method, %path, %request_id, error = %err, "HTTP request failed");
            PlatformFailure::from_reqwest(&err)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|err| PlatformFailure::from_reqwest(&err))?;
        debug!(%method, %path, %request_id, status = status.as_u16(), "received HTTP response");

        if status.is_success() {
            Ok(PlatformResponse { status, headers, body })
        } else {
            Err(PlatformFailure::http(status.as_u16(), body)
                .with_retry_after(parse_retry_after(&headers)))
        }
    }
}

/// Successful response with the body already read
#[derive(Debug, Clone)]
pub struct PlatformResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl PlatformResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl HttpTransportBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("custops/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn build(self) -> CommonResult<HttpTransport> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|err| CommonError::config_field("base_url", format!("invalid base url: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CommonError::config_field(
                "base_url",
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        if self.timeout.is_zero() {
            return Err(CommonError::config_field("timeout", "must be greater than zero"));
        }

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .no_proxy()
            .build()
            .map_err(|err| CommonError::internal(format!("failed to build http client: {err}")))?;

        Ok(HttpTransport { client, base_url: self.base_url.trim_end_matches('/').to_string() })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport(uri: &str) -> HttpTransport {
        HttpTransport::builder(uri).timeout(Duration::from_secs(2)).build().expect("transport")
    }

    #[tokio::test]
    async fn returns_successful_response_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/1.json"))
            .and(header_exists("x-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&format!("{}/api/v2/", server.uri()));
        let response = transport
            .execute(transport.request(Method::GET, "/tickets/1.json"))
            .await
            .expect("response");

        assert_eq!(response.status, StatusCode::OK);
        let body: serde_json::Value = response.json().expect("json");
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn does_not_retry_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("Retry-After", "7")
                    .set_body_string("maintenance"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server.uri());
        let failure = transport.execute(transport.request(Method::GET, "status")).await.unwrap_err();

        assert_eq!(failure.status, Some(503));
        assert_eq!(failure.retry_after, Some(Duration::from_secs(7)));
        assert_eq!(failure.message, "maintenance");
    }

    #[tokio::test]
    async fn network_failure_has_no_status() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = transport(&format!("http://{addr}"));
        let failure = transport.execute(transport.request(Method::GET, "ping")).await.unwrap_err();

        assert_eq!(failure.status, None);
        assert!(failure.message.to_lowercase().contains("connection failed"));
    }

    #[test]
    fn rejects_invalid_base_urls() {
        assert!(HttpTransport::builder("not a url").build().is_err());
        assert!(HttpTransport::builder("ftp://example.com").build().is_err());
        assert!(HttpTransport::builder("https://example.com")
            .timeout(Duration::ZERO)
            .build()
            .is_err());
    }
}
