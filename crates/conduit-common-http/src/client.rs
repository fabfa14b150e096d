//! `reqwest`-backed transport.

use async_trait::async_trait;
use conduit_common_config::TransportConfig;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::{AttemptTimeout, Transport, TransportError};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            user_agent: default_user_agent(),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

impl From<&TransportConfig> for HttpConfig {
    fn from(config: &TransportConfig) -> Self {
        let user_agent = if config.user_agent.is_empty() {
            default_user_agent()
        } else {
            config.user_agent.clone()
        };

        Self {
            connect_timeout: Duration::from_secs_f64(config.connect_timeout.max(0.0)),
            request_timeout: Duration::from_secs_f64(config.request_timeout.max(0.0)),
            user_agent,
            pool_max_idle_per_host: config.pool_max_idle_per_host,
            gzip: config.gzip,
        }
    }
}

fn default_user_agent() -> String {
    format!("conduit/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a configured HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<Client, TransportError> {
    let builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.gzip);

    builder.build().map_err(|e| TransportError::InvalidRequest {
        message: format!("failed to build HTTP client: {}", e),
    })
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_builder() {
            TransportError::InvalidRequest { message }
        } else if e.is_connect() {
            TransportError::Connection {
                message,
                source: Some(Box::new(e)),
            }
        } else {
            TransportError::Read {
                message,
                source: Some(Box::new(e)),
            }
        }
    }
}

/// Transport that sends requests with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Create a transport with default config.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a transport with custom config.
    pub fn with_config(config: &HttpConfig) -> Result<Self, TransportError> {
        let inner = build_client(config)?;
        Ok(Self { inner })
    }

    /// Wrap an existing client.
    pub fn from_client(inner: Client) -> Self {
        Self { inner }
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: AttemptTimeout,
    ) -> Result<HttpResponse, TransportError> {
        tracing::trace!(method = %request.method, url = %request.url, "sending request");

        // reqwest only exposes a whole-request timeout per call; the connect
        // limit is a client setting.
        let mut builder = self
            .inner
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(timeout.read);

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| TransportError::Read {
            message: format!("failed to read response body: {}", e),
            source: Some(Box::new(e)),
        })?;

        tracing::trace!(status, url = %request.url, "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
