//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing credentials, bad engine name, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not establish a connection
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// The server is reachable but the named database does not exist
    #[error("Database \"{database}\" does not exist")]
    DatabaseNotExists { database: String },

    /// Source and destination belong to different engine families
    #[error("Engine mismatch: source is {source_engine}, destination is {destination_engine}")]
    EngineMismatch {
        source_engine: String,
        destination_engine: String,
    },

    /// Reading catalog metadata for an object failed
    #[error("Schema extraction failed for {object}: {message}")]
    Extraction { object: String, message: String },

    /// Executing DDL for an object against the destination failed
    #[error("Failed to create {object}: {message}")]
    Apply { object: String, message: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Row counts differ after the data stage
    #[error("Row count mismatch for {table}: source={source_rows}, dest={destination_rows}")]
    RowCountMismatch {
        table: String,
        source_rows: i64,
        destination_rows: i64,
    },

    /// Statement execution error with context
    #[error("Query error: {message}\n  Context: {context}")]
    Query { message: String, context: String },

    /// IO error (file operations, terminal prompts)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error naming the endpoint.
    pub fn connection(target: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a Query error with context about where it occurred.
    pub fn query(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Query {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Extraction error.
    pub fn extraction(object: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Extraction {
            object: object.into(),
            message: message.to_string(),
        }
    }

    /// Create an Apply error.
    pub fn apply(object: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Apply {
            object: object.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transfer error.
    pub fn transfer(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// True for the sentinel that drives the create-and-retry path.
    pub fn is_database_not_exists(&self) -> bool {
        matches!(self, MigrateError::DatabaseNotExists { .. })
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } | MigrateError::DatabaseNotExists { .. } => 3,
            MigrateError::EngineMismatch { .. } | MigrateError::RowCountMismatch { .. } => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
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

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_mismatch_message() {
        let err = MigrateError::RowCountMismatch {
            table: "users".into(),
            source_rows: 10,
            destination_rows: 9,
        };
        assert_eq!(
            err.to_string(),
            "Row count mismatch for users: source=10, dest=9"
        );
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_database_not_exists_sentinel() {
        let err = MigrateError::DatabaseNotExists {
            database: "shop".into(),
        };
        assert!(err.is_database_not_exists());
        assert!(!MigrateError::Config("x".into()).is_database_not_exists());
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing .env");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: missing .env"));
    }
}
