//! Configuration file loading and parsing.

use crate::types::ConduitConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding the project configuration.
pub const CONFIG_DIR: &str = ".conduit";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the configuration file this loader reads.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load configuration from `.conduit/config.yaml`.
    pub fn load(&self) -> Result<ConduitConfig, ConfigError> {
        let config_path = self.config_path();

        if !config_path.exists() {
            return Ok(ConduitConfig::default());
        }

        self.load_file(&config_path)
    }

    /// Load configuration from an explicit file. The file must exist.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ConduitConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&contents)?;

        let config: ConduitConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        validate(&config)?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, config: &ConduitConfig) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_dir.join(CONFIG_FILE), yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
pub fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").map_err(|e| {
        ConfigError::ValidationError {
            message: e.to_string(),
        }
    })?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result = result.replace(full_match, &value);
    }

    Ok(result)
}

/// Validate configuration values.
pub fn validate(config: &ConduitConfig) -> Result<(), ConfigError> {
    let retry = &config.retry;

    let non_negative = [
        ("retry.backoff_factor", retry.backoff_factor),
        ("retry.backoff_max", retry.backoff_max),
        ("retry.connection_timeout", retry.connection_timeout),
        ("retry.read_timeout", retry.read_timeout),
        ("polling.interval", config.polling.interval),
        ("transport.connect_timeout", config.transport.connect_timeout),
        ("transport.request_timeout", config.transport.request_timeout),
    ];
    for (name, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::ValidationError {
                message: format!("{} must be a non-negative number", name),
            });
        }
    }

    if !retry.timeout.is_finite() {
        return Err(ConfigError::ValidationError {
            message: "retry.timeout must be a finite number".to_string(),
        });
    }

    if let Some(code) = retry
        .retry_on_status_codes
        .iter()
        .find(|c| !(100..=599).contains(*c))
    {
        return Err(ConfigError::ValidationError {
            message: format!("retry_on_status_codes contains invalid status {}", code),
        });
    }

    if let Some(method) = retry
        .retry_on_methods
        .iter()
        .find(|m| m.is_empty() || !m.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(ConfigError::ValidationError {
            message: format!("retry_on_methods contains invalid method {:?}", method),
        });
    }

    Ok(())
}
