//! The transport abstraction the pipeline sends requests through.

use async_trait::async_trait;
use std::time::Duration;

use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Boxed error source carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Credentials were refused. Never retried.
    Authentication,
    /// The request never reached the server.
    Connection,
    /// The request was sent but reading the response failed.
    Transport,
    /// The server answered with a retryable status code.
    RetryableStatus,
    /// The request could not be built. Never retried.
    InvalidRequest,
}

/// Timeouts applied to a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTimeout {
    /// Time allowed to establish a connection.
    pub connect: Duration,
    /// Time allowed to read the response once the request is sent.
    pub read: Duration,
}

impl Default for AttemptTimeout {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(300),
            read: Duration::from_secs(300),
        }
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("transport failed after send: {message}")]
    Read {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl TransportError {
    /// A failure raised before any bytes reached the server.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// A failure raised after the request was sent.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
            source: None,
        }
    }

    /// A credential failure.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// A request that could not be built.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Classification used by the retry policy.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Connection { .. } => FailureClass::Connection,
            Self::Read { .. } => FailureClass::Transport,
            Self::Authentication { .. } => FailureClass::Authentication,
            Self::InvalidRequest { .. } => FailureClass::InvalidRequest,
        }
    }
}

/// Sends requests and provides the suspension primitive used between attempts.
///
/// One transport is typically shared by every request of a client, so
/// implementations must be safe for concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and read the full response.
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: AttemptTimeout,
    ) -> Result<HttpResponse, TransportError>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}
