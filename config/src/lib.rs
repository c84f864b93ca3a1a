//! # Configuration Management for pgnotify
//!
//! This crate provides the configuration structures shared by the pgnotify
//! workspace: where the database lives and how a notification listener behaves.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{DatabaseConfig, ListenConfig};
//!
//! let db_config = DatabaseConfig::new(
//!     "localhost".to_string(), 5432, "myapp".to_string(),
//!     "postgres".to_string(), "password".to_string(),
//! );
//!
//! let listen_config = ListenConfig::new(vec!["jobs".to_string()])
//!     .with_timeout_seconds(Some(2.5))
//!     .with_yield_on_timeout(true);
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [database]
//! host = "localhost"
//! port = 5432
//! database = "myapp"
//! username = "postgres"
//! password = "password"
//! connection_timeout_seconds = 30
//!
//! [listen]
//! channels = ["jobs", "jobs_priority"]
//! timeout_seconds = 5.0
//! yield_on_timeout = false
//! notifications_as_list = false
//! handle_signals = ["SIGINT", "SIGTERM"]
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from pgnotify.toml
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path, time::Duration};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./pgnotify.toml";
const CONFIG_PATH_VAR: &str = "PGNOTIFY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub listen: ListenConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Seconds allowed for opening the notification connection
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
    /// Reported to the server as `application_name`
    #[serde(default)]
    pub application_name: Option<String>,
}

/// Notification listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub channels: Vec<String>,
    /// Seconds to wait per cycle; `None` waits without a deadline,
    /// zero or negative polls without blocking.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub yield_on_timeout: bool,
    #[serde(default)]
    pub notifications_as_list: bool,
    /// Signal names (`"SIGINT"`, `"TERM"`) or numbers (`"15"`)
    #[serde(default = "default_handle_signals")]
    pub handle_signals: Vec<String>,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_timeout_seconds() -> Option<f64> {
    Some(5.0)
}

fn default_handle_signals() -> Vec<String> {
    vec!["SIGINT".to_string()]
}

impl AppConfig {
    /// Load configuration from TOML file specified in .env or defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = {
            // A missing .env file is fine, the variable may come from the environment
            match dotenvy::dotenv() {
                Ok(_) => {}
                Err(err) if err.not_found() => {}
                Err(err) => return Err(err.into()),
            }

            if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
                Self::from_file(&config_path)
            } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
                Self::from_file(DEFAULT_CONFIG_PATH)
            } else {
                Err(ConfigError::Invalid(format!(
                    "Config path must be specified in .env file as {} or in {} file",
                    CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH
                )))
            }
        }?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.listen.validate()
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    pub fn new(
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            host,
            port,
            database,
            username,
            password,
            connection_timeout_seconds: default_connection_timeout(),
            application_name: None,
        }
    }

    pub fn with_connection_timeout_seconds(mut self, connection_timeout_seconds: u64) -> Self {
        self.connection_timeout_seconds = connection_timeout_seconds;
        self
    }

    pub fn with_application_name(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = Some(application_name.into());
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid(
                "Database host cannot be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(
                "Database port cannot be zero".to_string(),
            ));
        }
        if self.database.is_empty() {
            return Err(ConfigError::Invalid(
                "Database name cannot be empty".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(ConfigError::Invalid(
                "Database username cannot be empty".to_string(),
            ));
        }
        if self.connection_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Database connection_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl ListenConfig {
    /// Create a listen configuration with default timeout and signal handling
    pub fn new(channels: Vec<String>) -> Self {
        Self {
            channels,
            timeout_seconds: default_timeout_seconds(),
            yield_on_timeout: false,
            notifications_as_list: false,
            handle_signals: default_handle_signals(),
        }
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: Option<f64>) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_yield_on_timeout(mut self, yield_on_timeout: bool) -> Self {
        self.yield_on_timeout = yield_on_timeout;
        self
    }

    pub fn with_notifications_as_list(mut self, notifications_as_list: bool) -> Self {
        self.notifications_as_list = notifications_as_list;
        self
    }

    pub fn with_handle_signals(mut self, handle_signals: Vec<String>) -> Self {
        self.handle_signals = handle_signals;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.iter().any(|c| c.is_empty()) {
            return Err(ConfigError::Invalid(
                "Listen channel names cannot be empty".to_string(),
            ));
        }
        if let Some(timeout) = self.timeout_seconds {
            if timeout.is_nan() {
                return Err(ConfigError::Invalid(
                    "Listen timeout_seconds must be a number".to_string(),
                ));
            }
        }
        if self.handle_signals.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "Listen handle_signals entries cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
