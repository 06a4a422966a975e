//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration and query operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store could not be reached after the configured connect attempts.
    #[error("Could not connect to {target} after {attempts} attempt(s): {message}")]
    Connection {
        target: String,
        attempts: u32,
        message: String,
    },

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Destination key-value store error
    #[error("Key-value store error: {0}")]
    Store(#[from] redis::RedisError),

    /// A key holds a different primitive than the operation expects.
    #[error("Key {key} holds a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Stored fields could not be decoded into a typed record.
    #[error("Could not decode {key}: {message}")]
    Decode { key: String, message: String },

    /// A required migration write failed.
    #[error("Write failed for {key}: {message}")]
    Write { key: String, message: String },

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

impl MigrateError {
    /// Create a Connection error for a named store.
    pub fn connection(target: impl Into<String>, attempts: u32, message: impl ToString) -> Self {
        MigrateError::Connection {
            target: target.into(),
            attempts,
            message: message.to_string(),
        }
    }

    /// Create a Decode error
    pub fn decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Decode {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a Write error
    pub fn write(key: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Write {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this class of failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } => 3,
            MigrateError::Write { .. } => 4,
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
