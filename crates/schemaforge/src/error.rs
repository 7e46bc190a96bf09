//! Error types for schema generation.

use thiserror::Error;

/// Main error type for schema introspection and generation.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Configuration error (invalid YAML, bad value for a recognized key, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The connection's driver tag is not one of the supported dialects.
    #[error("Unsupported driver '{0}'. Supported drivers: mysql, mariadb, pgsql, sqlite, sqlsrv")]
    UnsupportedDriver(String),

    /// A parser operation was invoked before a connection was attached.
    #[error("No database connection: {0}")]
    ConnectionMissing(String),

    /// The requested table is absent from the live catalog.
    #[error("Table '{0}' does not exist in the database")]
    TableNotFound(String),

    /// A catalog query failed, carrying the SQL text and the driver message.
    #[error("Catalog query failed: {message}\n  SQL: {sql}")]
    QueryFailed { sql: String, message: String },

    /// The foreign-key graph contains a cycle.
    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// A generated file already exists and overwrite was not requested.
    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    /// MySQL/PostgreSQL/SQLite driver error.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// SQL Server driver error.
    #[error("SQL Server error: {0}")]
    Tiberius(#[from] tiberius::error::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Create a QueryFailed error carrying the offending SQL.
    pub fn query(sql: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SchemaError::QueryFailed {
            sql: sql.into(),
            message: message.to_string(),
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

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            SchemaError::Config(_) | SchemaError::Yaml(_) | SchemaError::Json(_) => 1,
            SchemaError::CircularDependency { .. } => 2,
            SchemaError::TableNotFound(_) => 3,
            SchemaError::QueryFailed { .. } | SchemaError::Sqlx(_) | SchemaError::Tiberius(_) => 4,
            SchemaError::UnsupportedDriver(_) | SchemaError::ConnectionMissing(_) => 5,
            SchemaError::FileAlreadyExists(_) => 6,
            SchemaError::Io(_) => 7,
        }
    }
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_sql() {
        let err = SchemaError::query("SELECT 1", "syntax error");
        let msg = err.to_string();
        assert!(msg.contains("SELECT 1"));
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn test_circular_dependency_message_lists_cycle() {
        let err = SchemaError::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: a -> b -> a"
        );
    }

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(SchemaError::Config("x".into()).exit_code(), 1);
        assert_eq!(
            SchemaError::CircularDependency { cycle: vec![] }.exit_code(),
            2
        );
        assert_eq!(SchemaError::TableNotFound("t".into()).exit_code(), 3);
        assert_eq!(SchemaError::query("q", "m").exit_code(), 4);
        assert_eq!(SchemaError::UnsupportedDriver("oracle".into()).exit_code(), 5);
        assert_eq!(SchemaError::FileAlreadyExists("f".into()).exit_code(), 6);
        let io = SchemaError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), 7);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = SchemaError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let detailed = io.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("Caused by"));
    }
}
