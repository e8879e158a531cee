//! Error types for rusty-wrds

use thiserror::Error;

/// Main error type for rusty-wrds
#[derive(Error, Debug)]
pub enum WrdsError {
    #[error("[{stage}] cannot connect to {target}: {message}")]
    Connection {
        stage: String,
        target: String,
        message: String,
    },

    #[error("[{stage}] schema mismatch in table {table}: column '{column}' is missing or unusable")]
    Schema {
        stage: String,
        table: String,
        column: String,
    },

    #[error("Store error on table {table}: {message}")]
    Store { table: String, message: String },

    #[error("Fetch failed for identifier {identifier}: {message}")]
    Fetch { identifier: i64, message: String },

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl WrdsError {
    pub fn connection(
        stage: impl Into<String>,
        target: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        WrdsError::Connection {
            stage: stage.into(),
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(
        stage: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        WrdsError::Schema {
            stage: stage.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn store(table: impl Into<String>, message: impl ToString) -> Self {
        WrdsError::Store {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Structural faults abort the run; everything else is recoverable
    /// at batch granularity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WrdsError::Connection { .. }
                | WrdsError::Schema { .. }
                | WrdsError::Store { .. }
                | WrdsError::InvalidIdentifier(_)
                | WrdsError::ConfigError(_)
                | WrdsError::IoError(_)
        )
    }
}

impl From<polars::error::PolarsError> for WrdsError {
    fn from(err: polars::error::PolarsError) -> Self {
        WrdsError::DataError(err.to_string())
    }
}

/// Result type alias for rusty-wrds operations
pub type Result<T> = std::result::Result<T, WrdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_stage_table_and_column() {
        let err = WrdsError::schema("monthly", "crsp.msf", "altprc");
        let msg = err.to_string();
        assert!(msg.contains("monthly"));
        assert!(msg.contains("crsp.msf"));
        assert!(msg.contains("altprc"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_fetch_error_is_recoverable() {
        let err = WrdsError::Fetch {
            identifier: 10001,
            message: "timeout".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("10001"));
    }

    #[test]
    fn test_connection_error_is_fatal() {
        let err = WrdsError::connection("connect", "/mnt/wrds", "no such directory");
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("[connect]"));
    }
}
