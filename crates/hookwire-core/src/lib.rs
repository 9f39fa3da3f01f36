//! Hookwire Core Library
//!
//! This crate provides the core functionality for Hookwire:
//! - Producer schemas and consumer attribute mappings
//! - Payload and type validation
//! - The sandboxed mapping expression language
//! - Payload transformation
//! - Storage interface, in-memory store and delivery log
//! - Project configuration and definition files
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Producer   │────▶│  Validate   │────▶│  Transform  │────▶ consumer payload
//! │  payload    │     │  (schema)   │     │  (mappings) │
//! └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                │
//!                                         ┌──────▼──────┐
//!                                         │ Expression  │
//!                                         │  Evaluator  │
//!                                         └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hookwire_core::{transform_payload, validate_payload};
//!
//! let result = validate_payload(&payload, &producer);
//! if result.valid {
//!     let outbound = transform_payload(payload.as_object().unwrap(), &consumer, &producer);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod consumer;
pub mod error;
pub mod expression;
pub mod log;
pub mod producer;
pub mod store;
pub mod transform;
pub mod validate;

pub use config::{Config, Definitions, ProjectConfig};
pub use consumer::{Consumer, ConsumerAttribute, MappingType, NewConsumer};
pub use error::{Error, Result};
pub use expression::{Expression, ExpressionError, evaluate_expression, try_evaluate_expression};
pub use log::{DeliveryStatus, LogRing, WebhookLog};
pub use producer::{Attribute, AttributeType, NewProducer, Producer, Status};
pub use store::{MemoryStore, Store};
pub use transform::{MappingDiagnostic, transform_payload, transform_with_diagnostics};
pub use validate::{
    ValidationResult, apply_defaults, sample_payload, validate_consumer, validate_payload,
    validate_producer, validate_type, validate_type_name,
};

/// Generate a fresh record identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
