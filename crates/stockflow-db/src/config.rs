//! # Stockflow Configuration
//!
//! Configuration for the database layer and the document lifecycle engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKFLOW_DB_PATH=/var/lib/stockflow/stockflow.db                  │
//! │     STOCKFLOW_MAX_CONNECTIONS=8                                        │
//! │     STOCKFLOW_QUOTE_VALIDITY_DAYS=15                                   │
//! │     STOCKFLOW_MAX_RETRIES=3                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockflow/stockflow.toml (Linux)                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/stockflow/stockflow.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! quote_validity_days = 7
//! max_retries = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::retry::RetryPolicy;
use stockflow_core::DEFAULT_QUOTE_VALIDITY_DAYS;

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a writer waits on SQLite's lock before giving up.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "stockflow", "stockflow")
        .map(|dirs| dirs.data_dir().join("stockflow.db"))
        .unwrap_or_else(|| PathBuf::from("stockflow.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// `[ledger]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Validity of quotes created without an expiration date.
    #[serde(default = "default_quote_validity")]
    pub quote_validity_days: u32,

    /// Retries of a transaction that hit a lock conflict. 0 disables retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_quote_validity() -> u32 {
    DEFAULT_QUOTE_VALIDITY_DAYS
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    20
}

fn default_max_backoff() -> u64 {
    500
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            quote_validity_days: default_quote_validity(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Stockflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockflowConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl StockflowConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stockflow.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading stockflow config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load stockflow config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::Config(
                "database.min_connections cannot exceed max_connections".into(),
            ));
        }
        if self.ledger.quote_validity_days == 0 {
            return Err(DbError::Config(
                "ledger.quote_validity_days must be at least 1".into(),
            ));
        }
        if self.ledger.initial_backoff_ms > self.ledger.max_backoff_ms {
            return Err(DbError::Config(
                "ledger.initial_backoff_ms cannot exceed max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Applies `STOCKFLOW_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("STOCKFLOW_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("STOCKFLOW_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %value, "Ignoring invalid STOCKFLOW_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("STOCKFLOW_QUOTE_VALIDITY_DAYS") {
            match value.parse::<u32>() {
                Ok(days) => self.ledger.quote_validity_days = days,
                Err(_) => warn!(value = %value, "Ignoring invalid STOCKFLOW_QUOTE_VALIDITY_DAYS"),
            }
        }

        if let Some(value) = lookup("STOCKFLOW_MAX_RETRIES") {
            match value.parse::<u32>() {
                Ok(retries) => self.ledger.max_retries = retries,
                Err(_) => warn!(value = %value, "Ignoring invalid STOCKFLOW_MAX_RETRIES"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockflow", "stockflow")
            .map(|dirs| dirs.config_dir().join("stockflow.toml"))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Pool and ledger settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .retry_policy(self.retry_policy())
            .quote_validity_days(self.ledger.quote_validity_days)
    }

    /// Retry policy for lock conflicts.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.ledger.max_retries,
            initial_backoff: Duration::from_millis(self.ledger.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.ledger.max_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StockflowConfig::default();
        assert_eq!(config.ledger.quote_validity_days, 7);
        assert_eq!(config.ledger.max_retries, 5);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StockflowConfig::from_toml(
            r#"
            [ledger]
            quote_validity_days = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger.quote_validity_days, 15);
        assert_eq!(config.ledger.initial_backoff_ms, 20);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = StockflowConfig::from_toml("[ledger\nmax_retries = ").unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("STOCKFLOW_DB_PATH", "/tmp/override.db"),
            ("STOCKFLOW_MAX_CONNECTIONS", "8"),
            ("STOCKFLOW_QUOTE_VALIDITY_DAYS", "not-a-number"),
            ("STOCKFLOW_MAX_RETRIES", "2"),
        ]
        .into_iter()
        .collect();

        let mut config = StockflowConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.ledger.quote_validity_days, 7);
        assert_eq!(config.ledger.max_retries, 2);
    }

    #[test]
    fn test_validation() {
        let mut config = StockflowConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = StockflowConfig::default();
        config.ledger.quote_validity_days = 0;
        assert!(config.validate().is_err());

        let mut config = StockflowConfig::default();
        config.ledger.initial_backoff_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversions() {
        let config = StockflowConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(20));

        let db = config.db_config();
        assert_eq!(db.busy_timeout, Duration::from_millis(5_000));

        let mut config = StockflowConfig::default();
        config.ledger.quote_validity_days = 10;
        config.ledger.max_retries = 1;
        let db = config.db_config();
        assert_eq!(db.quote_validity_days, 10);
        assert_eq!(db.retry.max_retries, 1);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&StockflowConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[ledger]"));
    }
}
