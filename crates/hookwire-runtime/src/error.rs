//! Runtime error types

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the server runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error (validation, store, configuration)
    #[error(transparent)]
    Core(#[from] hookwire_core::Error),

    /// Outbound webhook request could not be completed
    #[error("delivery to {url} failed: {message}")]
    Delivery {
        /// Target URL
        url: String,
        /// Transport error description
        message: String,
    },

    /// Payload rejected by the producer schema
    #[error("payload validation failed: {}", errors.join("; "))]
    InvalidPayload {
        /// Every violation found
        errors: Vec<String>,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Server socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
