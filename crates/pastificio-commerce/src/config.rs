//! # Back-Office Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PASTIFICIO_DB_PATH=/var/lib/pastificio/pastificio.db               │
//! │     PASTIFICIO_PORT=8080                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/backoffice/backoffice.toml (Linux)                       │
//! │     ~/Library/Application Support/com.pastificio.backoffice/... (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "pastificio.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8080
//!
//! [sales]
//! recent_limit = 50
//! max_lines = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use pastificio_core::MAX_LINES;
use pastificio_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path. Created on first start.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for SQLite's write lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pastificio.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address (default: 127.0.0.1, the shop's back-office machine).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Sales Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Default size of the "recent sales" list.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,

    /// Cap on distinct lines per sale or order.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

fn default_recent_limit() -> u32 {
    50
}

fn default_max_lines() -> usize {
    100
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            recent_limit: default_recent_limit(),
            max_lines: default_max_lines(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete back-office configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackOfficeConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub sales: SalesSettings,
}

impl BackOfficeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (backoffice.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading back-office config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }

        if self.sales.recent_limit == 0 {
            return Err(ConfigError::Invalid(
                "sales.recent_limit must be greater than 0".into(),
            ));
        }

        if self.sales.max_lines == 0 || self.sales.max_lines > MAX_LINES {
            return Err(ConfigError::Invalid(format!(
                "sales.max_lines must be between 1 and {}",
                MAX_LINES
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PASTIFICIO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("PASTIFICIO_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %max, "Ignoring invalid PASTIFICIO_MAX_CONNECTIONS"),
            }
        }

        if let Ok(addr) = std::env::var("PASTIFICIO_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("PASTIFICIO_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    debug!(port, "Overriding port from environment");
                    self.server.port = port;
                }
                Err(_) => warn!(value = %port, "Ignoring invalid PASTIFICIO_PORT"),
            }
        }

        if let Ok(limit) = std::env::var("PASTIFICIO_RECENT_LIMIT") {
            match limit.parse::<u32>() {
                Ok(limit) => self.sales.recent_limit = limit,
                Err(_) => warn!(value = %limit, "Ignoring invalid PASTIFICIO_RECENT_LIMIT"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pastificio", "backoffice")
            .map(|dirs| dirs.config_dir().join("backoffice.toml"))
    }

    /// Pool settings for [`pastificio_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BackOfficeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.sales.recent_limit, 50);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: BackOfficeConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "127.0.0.1");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = BackOfficeConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 2;
        config.sales.max_lines = MAX_LINES + 1;
        assert!(config.validate().is_err());

        config.sales.max_lines = 10;
        config.database.path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&BackOfficeConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[sales]"));
    }

    #[test]
    fn test_db_config() {
        let mut config = BackOfficeConfig::default();
        config.database.max_connections = 3;
        config.database.busy_timeout_ms = 250;
        let db = config.db_config();
        assert_eq!(db.max_connections, 3);
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
    }
}
