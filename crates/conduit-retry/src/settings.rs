//! Retry configuration resolved for a single logical request.

use conduit_common_config::{RetryConfig, RetryMode};
use conduit_common_http::Method;
use std::collections::HashSet;
use std::time::Duration;

use crate::backoff::secs;
use crate::classify::DEFAULT_RETRY_STATUS_CODES;

/// Per-call overrides of the policy's configuration.
///
/// Every field left as `None` falls back to the policy default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryOptions {
    pub retry_total: Option<u32>,
    pub retry_connect: Option<u32>,
    pub retry_read: Option<u32>,
    pub retry_status: Option<u32>,
    pub retry_backoff_factor: Option<f64>,
    pub retry_backoff_max: Option<Duration>,
    pub retry_mode: Option<RetryMode>,
    /// Absolute budget for the logical request. `Duration::ZERO` disables it.
    pub timeout: Option<Duration>,
    /// Methods retried after the request was sent. Replaces the default set.
    pub retry_on_methods: Option<Vec<Method>>,
    /// Status codes retried in addition to the defaults.
    pub retry_on_status_codes: Option<Vec<u16>>,
    /// Force the request to be treated as idempotent (or not), regardless of
    /// its method.
    pub idempotent: Option<bool>,
    pub connection_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that allow exactly one attempt.
    pub fn no_retries() -> Self {
        Self::new().total(0)
    }

    pub fn total(mut self, total: u32) -> Self {
        self.retry_total = Some(total);
        self
    }

    pub fn connect(mut self, connect: u32) -> Self {
        self.retry_connect = Some(connect);
        self
    }

    pub fn read(mut self, read: u32) -> Self {
        self.retry_read = Some(read);
        self
    }

    pub fn status(mut self, status: u32) -> Self {
        self.retry_status = Some(status);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.retry_backoff_factor = Some(factor);
        self
    }

    pub fn backoff_max(mut self, max: Duration) -> Self {
        self.retry_backoff_max = Some(max);
        self
    }

    pub fn mode(mut self, mode: RetryMode) -> Self {
        self.retry_mode = Some(mode);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_on_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.retry_on_methods = Some(methods.into_iter().collect());
        self
    }

    pub fn retry_on_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_on_status_codes = Some(codes.into_iter().collect());
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }
}

/// Fully resolved, immutable retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub total: u32,
    pub connect: u32,
    pub read: u32,
    pub status: u32,
    pub backoff_factor: f64,
    pub backoff_max: Duration,
    pub mode: RetryMode,
    /// `None` means no absolute deadline.
    pub timeout: Option<Duration>,
    pub retry_on_status_codes: HashSet<u16>,
    pub retry_on_methods: HashSet<Method>,
    pub idempotent: Option<bool>,
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetrySettings {
    /// Resolve settings from configuration.
    ///
    /// Method names that are not valid HTTP tokens are skipped with a warning.
    pub fn from_config(config: &RetryConfig) -> Self {
        let retry_on_methods = config
            .retry_on_methods
            .iter()
            .filter_map(|name| match Method::from_bytes(name.to_ascii_uppercase().as_bytes()) {
                Ok(method) => Some(method),
                Err(_) => {
                    tracing::warn!(method = %name, "ignoring invalid retry method");
                    None
                }
            })
            .collect();

        Self {
            total: config.total,
            connect: config.connect,
            read: config.read,
            status: config.status,
            backoff_factor: config.backoff_factor,
            backoff_max: secs(config.backoff_max),
            mode: config.mode,
            timeout: Some(secs(config.timeout)).filter(|t| !t.is_zero()),
            retry_on_status_codes: DEFAULT_RETRY_STATUS_CODES
                .iter()
                .chain(config.retry_on_status_codes.iter())
                .copied()
                .collect(),
            retry_on_methods,
            idempotent: None,
            connection_timeout: secs(config.connection_timeout),
            read_timeout: secs(config.read_timeout),
        }
    }

    /// Apply per-call overrides on top of these settings.
    pub fn with_options(&self, options: &RetryOptions) -> Self {
        let mut settings = self.clone();

        if let Some(total) = options.retry_total {
            settings.total = total;
        }
        if let Some(connect) = options.retry_connect {
            settings.connect = connect;
        }
        if let Some(read) = options.retry_read {
            settings.read = read;
        }
        if let Some(status) = options.retry_status {
            settings.status = status;
        }
        if let Some(factor) = options.retry_backoff_factor {
            settings.backoff_factor = factor;
        }
        if let Some(max) = options.retry_backoff_max {
            settings.backoff_max = max;
        }
        if let Some(mode) = options.retry_mode {
            settings.mode = mode;
        }
        if let Some(timeout) = options.timeout {
            settings.timeout = Some(timeout).filter(|t| !t.is_zero());
        }
        if let Some(methods) = &options.retry_on_methods {
            settings.retry_on_methods = methods.iter().cloned().collect();
        }
        if let Some(codes) = &options.retry_on_status_codes {
            settings.retry_on_status_codes.extend(codes.iter().copied());
        }
        if options.idempotent.is_some() {
            settings.idempotent = options.idempotent;
        }
        if let Some(timeout) = options.connection_timeout {
            settings.connection_timeout = timeout;
        }
        if let Some(timeout) = options.read_timeout {
            settings.read_timeout = timeout;
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_config() {
        let settings = RetrySettings::default();
        assert_eq!(settings.total, 10);
        assert_eq!(settings.connect, 3);
        assert_eq!(settings.read, 3);
        assert_eq!(settings.status, 3);
        assert_eq!(settings.backoff_factor, 0.8);
        assert_eq!(settings.backoff_max, Duration::from_secs(120));
        assert_eq!(settings.timeout, None);
        assert_eq!(
            settings.retry_on_status_codes,
            HashSet::from([429, 500, 502, 503, 504])
        );
        assert!(settings.retry_on_methods.contains(&Method::GET));
        assert!(settings.retry_on_methods.contains(&Method::PUT));
        assert!(!settings.retry_on_methods.contains(&Method::POST));
        assert_eq!(settings.connection_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_config_status_codes_are_additions() {
        let config = RetryConfig {
            retry_on_status_codes: vec![408],
            timeout: 2.5,
            ..RetryConfig::default()
        };
        let settings = RetrySettings::from_config(&config);
        assert!(settings.retry_on_status_codes.contains(&408));
        assert!(settings.retry_on_status_codes.contains(&503));
        assert_eq!(settings.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_non_positive_timeout_disables_budget() {
        for timeout in [0.0, -5.0] {
            let config = RetryConfig {
                timeout,
                ..RetryConfig::default()
            };
            assert_eq!(RetrySettings::from_config(&config).timeout, None);
        }

        let settings = RetrySettings::default()
            .with_options(&RetryOptions::new().timeout(Duration::from_secs(3)))
            .with_options(&RetryOptions::new().timeout(Duration::ZERO));
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn test_lowercase_config_methods() {
        let config = RetryConfig {
            retry_on_methods: vec!["get".to_string(), "bad method".to_string()],
            ..RetryConfig::default()
        };
        let settings = RetrySettings::from_config(&config);
        assert_eq!(settings.retry_on_methods, HashSet::from([Method::GET]));
    }

    #[test]
    fn test_options_override() {
        let options = RetryOptions::new()
            .total(1)
            .connect(0)
            .read(5)
            .status(7)
            .backoff_factor(0.0)
            .backoff_max(Duration::from_secs(9))
            .mode(RetryMode::Fixed)
            .retry_on_methods([Method::POST])
            .retry_on_status_codes([418])
            .idempotent(false)
            .read_timeout(Duration::from_secs(1));

        let settings = RetrySettings::default().with_options(&options);
        assert_eq!(settings.total, 1);
        assert_eq!(settings.connect, 0);
        assert_eq!(settings.read, 5);
        assert_eq!(settings.status, 7);
        assert_eq!(settings.backoff_factor, 0.0);
        assert_eq!(settings.backoff_max, Duration::from_secs(9));
        assert_eq!(settings.mode, RetryMode::Fixed);
        assert_eq!(settings.retry_on_methods, HashSet::from([Method::POST]));
        assert!(settings.retry_on_status_codes.contains(&418));
        assert!(settings.retry_on_status_codes.contains(&429));
        assert_eq!(settings.idempotent, Some(false));
        assert_eq!(settings.read_timeout, Duration::from_secs(1));
        assert_eq!(settings.connection_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_no_retries() {
        let settings = RetrySettings::default().with_options(&RetryOptions::no_retries());
        assert_eq!(settings.total, 0);
    }
}
