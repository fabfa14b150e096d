//! Configuration types.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// Retry policy configuration.
    pub retry: RetryConfig,
    /// Long-running operation polling configuration.
    pub polling: PollingConfig,
    /// HTTP transport configuration.
    pub transport: TransportConfig,
}

/// Retry policy configuration.
///
/// All durations are expressed in (fractional) seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of retries allowed. Takes precedence over other counts.
    pub total: u32,
    /// Retries on errors raised before the request reached the server.
    pub connect: u32,
    /// Retries on errors raised after the request was sent.
    pub read: u32,
    /// Retries on retryable status codes.
    pub status: u32,
    /// Backoff factor applied between attempts.
    pub backoff_factor: f64,
    /// Upper bound on a single backoff sleep.
    pub backoff_max: f64,
    /// Absolute time budget for a logical request. `<= 0` disables it.
    pub timeout: f64,
    /// How backoff grows between attempts.
    pub mode: RetryMode,
    /// Status codes retried in addition to the defaults.
    pub retry_on_status_codes: Vec<u16>,
    /// Methods considered safe to retry after the request was sent.
    pub retry_on_methods: Vec<String>,
    /// Per-attempt connection timeout.
    pub connection_timeout: f64,
    /// Per-attempt read timeout.
    pub read_timeout: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            total: 10,
            connect: 3,
            read: 3,
            status: 3,
            backoff_factor: 0.8,
            backoff_max: 120.0,
            timeout: 0.0,
            mode: RetryMode::Exponential,
            retry_on_status_codes: Vec::new(),
            retry_on_methods: ["HEAD", "GET", "PUT", "DELETE", "OPTIONS", "TRACE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            connection_timeout: 300.0,
            read_timeout: 300.0,
        }
    }
}

/// Backoff growth mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// `backoff_factor * 2^(retry - 1)`.
    #[default]
    Exponential,
    /// `backoff_factor` every time.
    Fixed,
}

/// Long-running operation polling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between polls when the service gives no hint (seconds).
    pub interval: f64,
    /// Which response holds the final result of the operation.
    pub final_state_via: Option<FinalStateVia>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: 30.0,
            final_state_via: None,
        }
    }
}

/// Where the final result of a long-running operation is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalStateVia {
    /// The `Azure-AsyncOperation` header chain.
    AzureAsyncOperation,
    /// The `Location` header.
    Location,
    /// The URL of the initiating request.
    OriginalUri,
    /// The `Operation-Location` header chain.
    OperationLocation,
}

impl FinalStateVia {
    /// Wire name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureAsyncOperation => "azure-async-operation",
            Self::Location => "location",
            Self::OriginalUri => "original-uri",
            Self::OperationLocation => "operation-location",
        }
    }

    /// Parse from the wire name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "azure-async-operation" => Some(Self::AzureAsyncOperation),
            "location" => Some(Self::Location),
            "original-uri" => Some(Self::OriginalUri),
            "operation-location" => Some(Self::OperationLocation),
            _ => None,
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection timeout (seconds).
    pub connect_timeout: f64,
    /// Whole-request timeout (seconds).
    pub request_timeout: f64,
    /// User agent string. Empty means the built-in default.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 10.0,
            request_timeout: 300.0,
            user_agent: String::new(),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}
