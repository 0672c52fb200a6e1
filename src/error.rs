//! Error types for the destination loader.

use thiserror::Error;

/// Main error type for load operations.
///
/// Every variant names the stage it originated from so operators can tell
/// configuration mistakes apart from data mistakes.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration error (missing table name, invalid YAML, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema discovery against the destination table failed
    #[error("Schema discovery failed for table {table}: {message}")]
    Schema { table: String, message: String },

    /// An input column could not be resolved to a destination descriptor
    #[error("Binding failed: input column '{0}' has no matching destination column")]
    UnresolvedColumn(String),

    /// Two input columns resolved to the same destination descriptor
    #[error("Binding failed: destination column '{0}' is bound more than once")]
    DuplicateBinding(String),

    /// A cell's value cannot be represented in the destination type
    #[error("Conversion failed for column '{column}': {message}")]
    Conversion { column: String, message: String },

    /// Destination connection could not be acquired or opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transaction begin/commit/rollback failure
    #[error("Transaction {action} failed: {message}")]
    Transaction { action: String, message: String },

    /// Load failed for the destination table
    #[error("Load failed for table {table}: {message}")]
    Load { table: String, message: String },

    /// Row source reported an error reading a cell or advancing a row
    #[error("Row source error: {0}")]
    Source(String),

    /// Destination database driver error
    #[error("Destination database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// IO error (config file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LoadError {
    /// Create a Schema error for a table.
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Conversion error for a column.
    pub fn conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Conversion {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a Transaction error for a begin/commit/rollback action.
    pub fn transaction(action: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Transaction {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create a Load error for a table.
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for load operations.
pub type Result<T> = std::result::Result<T, LoadError>;
