//! Hookwire Runtime
//!
//! This crate provides the server side of Hookwire: the HTTP API, the
//! dispatch pipeline and outbound webhook delivery.
//!
//! # Features
//!
//! - JSON HTTP API via axum
//! - Webhook delivery via reqwest
//! - PostgreSQL-backed store via sqlx
//!
//! # Usage
//!
//! ```rust,ignore
//! use hookwire_runtime::Runtime;
//!
//! let runtime = Runtime::new(config).await?;
//! runtime.seed().await?;
//! runtime.start(None, shutdown_signal()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delivery;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod http;
pub mod pg;

#[cfg(test)]
mod testing;

pub use delivery::{DeliveryResult, WebhookClient};
pub use dispatch::Dispatcher;
pub use engine::Runtime;
pub use error::{Error, Result};
pub use http::{AppState, router};
pub use pg::PgStore;
