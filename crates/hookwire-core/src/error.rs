//! Error types for hookwire-core

use thiserror::Error;

/// Result type alias for hookwire-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hookwire-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration or definitions
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// Producer definition violates its schema rules
    #[error("invalid producer '{producer}': {}", errors.join("; "))]
    InvalidProducer {
        /// Producer name
        producer: String,
        /// Every violation found
        errors: Vec<String>,
    },

    /// Consumer mapping configuration is inconsistent
    #[error("invalid consumer '{consumer}': {}", errors.join("; "))]
    InvalidConsumer {
        /// Consumer name
        consumer: String,
        /// Every violation found
        errors: Vec<String>,
    },

    /// A mapping could not produce a value
    #[error("mapping error for '{key}': {message}")]
    Mapping {
        /// Consumer attribute key
        key: String,
        /// Description of the error
        message: String,
    },

    /// Expression rejected or failed during evaluation
    #[error(transparent)]
    Expression(#[from] crate::expression::ExpressionError),

    /// Producer lookup failed
    #[error("producer not found: {id}")]
    ProducerNotFound {
        /// Requested producer id
        id: String,
    },

    /// Consumer lookup failed
    #[error("consumer not found: {id}")]
    ConsumerNotFound {
        /// Requested consumer id
        id: String,
    },

    /// A record with the same id already exists
    #[error("{kind} already exists: {id}")]
    Conflict {
        /// Record kind (producer, consumer)
        kind: &'static str,
        /// Conflicting id
        id: String,
    },

    /// Storage backend failure
    #[error("store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
