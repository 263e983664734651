//! Session configuration
//!
//! Every field has a default, so an empty JSON object or an empty environment
//! yields a usable configuration. Environment variables use the `DATASET_`
//! prefix and the upper-cased field name (e.g. `DATASET_SAMPLE_ROWS`).

use crate::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one dataset session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Pool size; 1 keeps the session on a single logical connection
    pub max_connections: u32,

    /// How long to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Per-statement timeout; None means statements run to completion
    pub query_timeout_secs: Option<u64>,

    /// Catalog schema to introspect (None = dialect default)
    pub schema: Option<String>,

    /// Rows fetched when previewing a created view
    pub sample_rows: usize,

    /// Rows fetched when profiling a dataset
    pub profile_rows: usize,

    /// Table holding dataset registry records
    pub registry_table: String,

    /// Require the join field to be a column of both joined tables
    pub strict_join_fields: bool,

    /// Require each join clause to start from an already introduced table
    pub require_connected_chain: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_connections: 1,
            acquire_timeout_secs: 30,
            query_timeout_secs: None,
            schema: None,
            sample_rows: 5,
            profile_rows: 1000,
            registry_table: "DU_Datasets".to_string(),
            strict_join_fields: false,
            require_connected_chain: false,
        }
    }
}

impl DatasetConfig {
    /// Parse configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self, DatabaseError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DatabaseError::ConfigError(format!("invalid JSON config: {}", e)))?;
        config.validated()
    }

    /// Read configuration from `DATASET_*` environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, test maps)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DatabaseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("DATASET_MAX_CONNECTIONS") {
            config.max_connections = parse_number("DATASET_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DATASET_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout_secs = parse_number("DATASET_ACQUIRE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("DATASET_QUERY_TIMEOUT_SECS") {
            config.query_timeout_secs = Some(parse_number("DATASET_QUERY_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("DATASET_SCHEMA") {
            config.schema = Some(v);
        }
        if let Some(v) = lookup("DATASET_SAMPLE_ROWS") {
            config.sample_rows = parse_number("DATASET_SAMPLE_ROWS", &v)?;
        }
        if let Some(v) = lookup("DATASET_PROFILE_ROWS") {
            config.profile_rows = parse_number("DATASET_PROFILE_ROWS", &v)?;
        }
        if let Some(v) = lookup("DATASET_REGISTRY_TABLE") {
            config.registry_table = v;
        }
        if let Some(v) = lookup("DATASET_STRICT_JOIN_FIELDS") {
            config.strict_join_fields = parse_flag("DATASET_STRICT_JOIN_FIELDS", &v)?;
        }
        if let Some(v) = lookup("DATASET_REQUIRE_CONNECTED_CHAIN") {
            config.require_connected_chain = parse_flag("DATASET_REQUIRE_CONNECTED_CHAIN", &v)?;
        }

        config.validated()
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    fn validated(self) -> Result<Self, DatabaseError> {
        if self.max_connections == 0 {
            return Err(DatabaseError::ConfigError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.sample_rows == 0 || self.profile_rows == 0 {
            return Err(DatabaseError::ConfigError(
                "sample_rows and profile_rows must be at least 1".to_string(),
            ));
        }
        // The registry table name is interpolated into SQL
        crate::validate::validate_identifier(&self.registry_table)
            .map_err(|e| DatabaseError::ConfigError(format!("registry_table: {}", e)))?;
        if let Some(schema) = &self.schema {
            crate::validate::validate_identifier(schema)
                .map_err(|e| DatabaseError::ConfigError(format!("schema: {}", e)))?;
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DatabaseError> {
    value
        .trim()
        .parse()
        .map_err(|_| DatabaseError::ConfigError(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, DatabaseError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DatabaseError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}
