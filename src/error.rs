//! Error handling module
//!
//! Provides unified error types for the migration engine.
//!
//! Synthesis itself is best-effort and never fails: unparseable definitions
//! degrade to inline `-- ...` comments. Errors here come from the boundaries
//! (loading batches, reading/writing files) and from the script assembler,
//! which is the only layer allowed to abort a generation run.

use crate::config::ConfigError;
use thiserror::Error;
use tracing::error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Script generation aborted. `partial_script` is the text produced so far,
    /// already terminated with a `ROLLBACK TRANSACTION` line.
    #[error("Generation of migration {migration_id} failed: {message}")]
    Generation {
        migration_id: String,
        partial_script: String,
        message: String,
    },

    #[error("Segment file missing: {0}")]
    MissingSegment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MigrationError {
    /// Log the error with the context a reviewer needs to hand-fix the batch
    pub fn log(&self) {
        match self {
            MigrationError::Generation {
                migration_id,
                partial_script,
                message,
            } => {
                error!(
                    "Migration {} aborted after {} lines: {}",
                    migration_id,
                    partial_script.lines().count(),
                    message
                );
            }
            other => error!("{}", other),
        }
    }
}

/// Result type alias for engine operations
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> MigrationError {
    MigrationError::Validation(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_message() {
        let err = MigrationError::Generation {
            migration_id: "20240101_000000_1table".to_string(),
            partial_script: "BEGIN TRANSACTION;\nROLLBACK TRANSACTION;".to_string(),
            message: "Column record without table".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Generation of migration 20240101_000000_1table failed: Column record without table"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: MigrationError = ConfigError::InvalidValue("MIGRATION_SEGMENT".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration value: MIGRATION_SEGMENT"
        );
    }

    #[test]
    fn test_validation_helper() {
        let err = validation_error("schema is empty");
        assert!(matches!(err, MigrationError::Validation(ref m) if m == "schema is empty"));
    }
}
