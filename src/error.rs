//! Error types for agentic-memory.

use thiserror::Error;

/// Result type alias using agentic-memory's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memory operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error, including uniqueness and other constraint violations
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored or supplied JSON could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted value could not be interpreted
    #[error("Memory storage error: {0}")]
    MemoryStorage(String),

    /// Embedding provider failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a memory storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::MemoryStorage(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::config("embedding_dim must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: embedding_dim must be positive"
        );
    }
}
