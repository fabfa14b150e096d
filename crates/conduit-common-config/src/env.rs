//! Environment variable handling.

use crate::types::ConduitConfig;
use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    // Configuration
    pub const CONDUIT_CONFIG_PATH: &str = "CONDUIT_CONFIG_PATH";
    pub const CONDUIT_ENV: &str = "CONDUIT_ENV";
    pub const CONDUIT_LOG_LEVEL: &str = "CONDUIT_LOG_LEVEL";

    // Retry overrides
    pub const CONDUIT_RETRY_TOTAL: &str = "CONDUIT_RETRY_TOTAL";
    pub const CONDUIT_RETRY_CONNECT: &str = "CONDUIT_RETRY_CONNECT";
    pub const CONDUIT_RETRY_READ: &str = "CONDUIT_RETRY_READ";
    pub const CONDUIT_RETRY_STATUS: &str = "CONDUIT_RETRY_STATUS";
    pub const CONDUIT_RETRY_BACKOFF_FACTOR: &str = "CONDUIT_RETRY_BACKOFF_FACTOR";
    pub const CONDUIT_RETRY_BACKOFF_MAX: &str = "CONDUIT_RETRY_BACKOFF_MAX";
    pub const CONDUIT_RETRY_TIMEOUT: &str = "CONDUIT_RETRY_TIMEOUT";

    // Polling overrides
    pub const CONDUIT_POLLING_INTERVAL: &str = "CONDUIT_POLLING_INTERVAL";

    // Development
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Environment configuration.
pub struct Environment {
    _guard: (), // Prevent construction outside module
}

impl Environment {
    /// Initialize environment from .env files.
    pub fn init() -> Result<Self, EnvError> {
        // Later files override earlier ones
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::CONDUIT_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet {
            var: var.to_string(),
        })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Get a parsed variable (integers, floats).
    pub fn get_parsed<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: format!("cannot parse {:?}", v),
            }),
            Err(_) => Ok(None),
        }
    }
}

/// Apply `CONDUIT_*` overrides on top of a loaded configuration.
pub fn apply_env_overrides(config: &mut ConduitConfig) -> Result<(), EnvError> {
    let retry = &mut config.retry;

    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_TOTAL)? {
        retry.total = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_CONNECT)? {
        retry.connect = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_READ)? {
        retry.read = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_STATUS)? {
        retry.status = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_BACKOFF_FACTOR)? {
        retry.backoff_factor = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_BACKOFF_MAX)? {
        retry.backoff_max = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_RETRY_TIMEOUT)? {
        retry.timeout = v;
    }
    if let Some(v) = Environment::get_parsed(vars::CONDUIT_POLLING_INTERVAL)? {
        config.polling.interval = v;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_default() {
        let val = Environment::get_or("NONEXISTENT_VAR_12345", "default");
        assert_eq!(val, "default");
    }

    #[test]
    fn test_bool_parsing() {
        env::set_var("CONDUIT_TEST_BOOL", "true");
        assert_eq!(Environment::get_bool("CONDUIT_TEST_BOOL"), Some(true));
        env::set_var("CONDUIT_TEST_BOOL", "1");
        assert_eq!(Environment::get_bool("CONDUIT_TEST_BOOL"), Some(true));
        env::set_var("CONDUIT_TEST_BOOL", "false");
        assert_eq!(Environment::get_bool("CONDUIT_TEST_BOOL"), Some(false));
        env::remove_var("CONDUIT_TEST_BOOL");
    }

    #[test]
    fn test_parsed_values() {
        env::set_var("CONDUIT_TEST_INT", "42");
        let val: Option<u32> = Environment::get_parsed("CONDUIT_TEST_INT").unwrap();
        assert_eq!(val, Some(42));

        env::set_var("CONDUIT_TEST_INT", "invalid");
        let val: Result<Option<u32>, _> = Environment::get_parsed("CONDUIT_TEST_INT");
        assert!(val.is_err());

        env::remove_var("CONDUIT_TEST_INT");
        let val: Option<u32> = Environment::get_parsed("CONDUIT_TEST_INT").unwrap();
        assert_eq!(val, None);
    }

    #[test]
    fn test_require_missing() {
        let result = Environment::require("CONDUIT_SURELY_NOT_SET_4242");
        assert!(matches!(result, Err(EnvError::NotSet { .. })));
    }

    // Every override variable is exercised in one test so parallel tests
    // never observe each other's values.
    #[test]
    fn test_apply_env_overrides() {
        env::set_var(vars::CONDUIT_RETRY_TOTAL, "4");
        env::set_var(vars::CONDUIT_RETRY_CONNECT, "1");
        env::set_var(vars::CONDUIT_RETRY_READ, "0");
        env::set_var(vars::CONDUIT_RETRY_STATUS, "2");
        env::set_var(vars::CONDUIT_RETRY_BACKOFF_FACTOR, "0.25");
        env::set_var(vars::CONDUIT_RETRY_BACKOFF_MAX, "10");
        env::set_var(vars::CONDUIT_RETRY_TIMEOUT, "30.5");
        env::set_var(vars::CONDUIT_POLLING_INTERVAL, "1.5");

        let mut config = ConduitConfig::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.retry.total, 4);
        assert_eq!(config.retry.connect, 1);
        assert_eq!(config.retry.read, 0);
        assert_eq!(config.retry.status, 2);
        assert_eq!(config.retry.backoff_factor, 0.25);
        assert_eq!(config.retry.backoff_max, 10.0);
        assert_eq!(config.retry.timeout, 30.5);
        assert_eq!(config.polling.interval, 1.5);

        env::set_var(vars::CONDUIT_RETRY_TOTAL, "-3");
        let mut config = ConduitConfig::default();
        assert!(matches!(
            apply_env_overrides(&mut config),
            Err(EnvError::InvalidValue { .. })
        ));

        for var in [
            vars::CONDUIT_RETRY_TOTAL,
            vars::CONDUIT_RETRY_CONNECT,
            vars::CONDUIT_RETRY_READ,
            vars::CONDUIT_RETRY_STATUS,
            vars::CONDUIT_RETRY_BACKOFF_FACTOR,
            vars::CONDUIT_RETRY_BACKOFF_MAX,
            vars::CONDUIT_RETRY_TIMEOUT,
            vars::CONDUIT_POLLING_INTERVAL,
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_environment_init() {
        let result = Environment::init();
        assert!(result.is_ok());
    }

    #[test]
    fn test_dotenv_file_loading() {
        use std::fs;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "CONDUIT_TEST_DOTENV=from_dotenv\n").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::remove_var("CONDUIT_TEST_DOTENV");

        std::env::set_current_dir(dir.path()).unwrap();
        let _env = Environment::init().unwrap();

        assert_eq!(
            Environment::get("CONDUIT_TEST_DOTENV"),
            Some("from_dotenv".to_string())
        );

        std::env::set_current_dir(original_dir).unwrap();
        std::env::remove_var("CONDUIT_TEST_DOTENV");
    }
}
