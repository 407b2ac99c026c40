//! Application configuration module
//!
//! Handles loading configuration from `.env` and environment variables.
//! Command-line flags override anything loaded here.

use crate::synthesis::patterns::qualified;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load environment variables: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Where applied migrations are recorded on the target database
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryTableConfig {
    pub schema: String,
    pub table: String,
}

impl HistoryTableConfig {
    /// `[schema].[table]`
    pub fn qualified(&self) -> String {
        qualified(&self.schema, &self.table)
    }
}

impl Default for HistoryTableConfig {
    fn default() -> Self {
        Self {
            schema: "dbo".to_string(),
            table: "MigrationHistory".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Also split generated scripts into per-object segments
    pub segment: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("migrations"),
            segment: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Target database for `USE [...]`; scripts omit it when unset
    pub database: Option<String>,
    /// Recorded in script headers and segment manifests
    pub actor: String,
    pub history: HistoryTableConfig,
    pub output: OutputConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            actor: "unknown".to_string(),
            history: HistoryTableConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists; a malformed file is still an error
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let history = HistoryTableConfig {
            schema: lookup("MIGRATION_HISTORY_SCHEMA").unwrap_or(defaults.history.schema),
            table: lookup("MIGRATION_HISTORY_TABLE").unwrap_or(defaults.history.table),
        };
        if history.schema.trim().is_empty() || history.table.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "MIGRATION_HISTORY_SCHEMA and MIGRATION_HISTORY_TABLE must not be empty".to_string(),
            ));
        }

        let segment = match lookup("MIGRATION_SEGMENT") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!("MIGRATION_SEGMENT must be a boolean, got '{}'", raw))
            })?,
            None => defaults.output.segment,
        };

        let output = OutputConfig {
            directory: lookup("MIGRATION_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output.directory),
            segment,
        };

        Ok(Self {
            database: lookup("MIGRATION_DATABASE").filter(|db| !db.trim().is_empty()),
            actor: lookup("MIGRATION_ACTOR")
                .or_else(|| lookup("USER"))
                .or_else(|| lookup("USERNAME"))
                .unwrap_or(defaults.actor),
            history,
            output,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
