//! Service configuration.
//!
//! Layered the conventional way: a TOML file (`floodwatch.toml` next to the
//! binary, path overridable) supplies operational settings, `.env`/process
//! environment supplies secrets. `DATABASE_URL` from the environment always
//! wins over the file so deployments never commit credentials.
//!
//! A missing config file is not an error — every field has a documented
//! default and a bare `DATABASE_URL` is enough to run.

use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "floodwatch.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub evaluation: EvaluationConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "postgres://localhost/floodwatch".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Internal scheduler cadence driving evaluation, seconds. Evaluation
    /// frequency is decoupled from how often dashboard clients ask.
    pub tick_interval_secs: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            tick_interval_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Push-relay endpoint. Fan-out is disabled when unset or `enabled`
    /// is false.
    pub push_url: Option<String>,
    /// Recipient ids handed to the relay. Stand-in for the external
    /// user-record store.
    pub recipients: Vec<String>,
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        NotifyConfig {
            push_url: None,
            recipients: Vec::new(),
            enabled: false,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: "debug", "info", "warn", "error".
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config file unreadable: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config file invalid: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load from the default path, tolerating a missing file.
    pub fn load_default() -> Result<Config, ConfigError> {
        Config::load(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path`, then apply environment overrides. A missing file
    /// yields the defaults; an unreadable or malformed file is an error.
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        // Make .env visible before the overrides below.
        dotenv::dotenv().ok();

        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => {
                toml::from_str::<Config>(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database.url = url;
            }
        }

        Ok(config)
    }
}
