//! Configuration parsing and validation
//!
//! This module handles loading the Hookwire project configuration and the
//! producer/consumer definition files that sit next to it.
//!
//! # Configuration Files
//!
//! - `hookwire.yaml` - Project root configuration
//! - `producers/*.yaml` - Producer definitions, one per file
//! - `consumers/*.yaml` - Consumer definitions, one per file
//!
//! Definition files are read in file-name order so seeding is
//! deterministic.
//!
//! # Example
//!
//! ```yaml
//! name: my-hooks
//! server:
//!   bind: 0.0.0.0:8080
//! store:
//!   kind: postgres
//!   url: postgres://localhost/hookwire
//! logs:
//!   capacity: 500
//! delivery:
//!   timeout_secs: 10
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::consumer::NewConsumer;
use crate::error::{Error, Result};
use crate::log::DEFAULT_LOG_CAPACITY;
use crate::producer::{NewProducer, Producer};
use crate::store::Store;
use crate::validate::{validate_consumer, validate_producer};

/// File name of the project configuration
pub const CONFIG_FILE: &str = "hookwire.yaml";

/// Root project configuration from `hookwire.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backing
    #[serde(default)]
    pub store: StoreConfig,

    /// Delivery log retention
    #[serde(default)]
    pub logs: LogsConfig,

    /// Outbound webhook client settings
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process-local store, lost on restart
    #[default]
    Memory,
    /// PostgreSQL database
    Postgres,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Backend kind
    #[serde(default)]
    pub kind: StoreKind,

    /// PostgreSQL connection URL (required for `postgres`)
    #[serde(default)]
    pub url: Option<String>,
}

/// Delivery log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Number of log entries retained
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

/// Outbound webhook client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Request timeout in seconds; no timeout when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// `User-Agent` header sent with deliveries
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("hookwire/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ProjectConfig {
    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                message: "project name must not be empty".to_string(),
            });
        }
        if self.store.kind == StoreKind::Postgres
            && self.store.url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(Error::ConfigInvalid {
                message: "store.url is required when store.kind is postgres".to_string(),
            });
        }
        if self.delivery.timeout_secs == Some(0) {
            return Err(Error::ConfigInvalid {
                message: "delivery.timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory or a `hookwire.yaml` path
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-hooks")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(CONFIG_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or(Path::new("."))
                    .to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;
        project.validate()?;

        Ok(Self { project, base_path })
    }

    /// Load all producer definitions from `producers/*.yaml`
    pub fn load_producers(&self) -> Result<Vec<NewProducer>> {
        read_yaml_dir(&self.base_path.join("producers"))
    }

    /// Load all consumer definitions from `consumers/*.yaml`
    pub fn load_consumers(&self) -> Result<Vec<NewConsumer>> {
        read_yaml_dir(&self.base_path.join("consumers"))
    }

    /// Load every definition file
    pub fn load_definitions(&self) -> Result<Definitions> {
        Ok(Definitions {
            producers: self.load_producers()?,
            consumers: self.load_consumers()?,
        })
    }
}

fn read_yaml_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let contents = std::fs::read_to_string(&path)?;
        let item = serde_yaml::from_str(&contents).map_err(|e| Error::ConfigInvalid {
            message: format!("{}: {}", path.display(), e),
        })?;
        tracing::debug!(path = %path.display(), "loaded definition");
        items.push(item);
    }
    Ok(items)
}

/// Producer and consumer definitions loaded from disk
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    /// Producer definitions in file-name order
    pub producers: Vec<NewProducer>,

    /// Consumer definitions in file-name order
    pub consumers: Vec<NewConsumer>,
}

impl Definitions {
    /// Run the save-time checks on every definition, collecting all errors.
    ///
    /// Consumers reference producers by their fixed `id`.
    pub fn check(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut producers: Vec<Producer> = Vec::new();

        for input in &self.producers {
            if let Err(e) = validate_producer(input) {
                errors.push(e.to_string());
            }
            match input.id.as_deref() {
                Some(id) if producers.iter().any(|p| p.id == id) => {
                    errors.push(format!("duplicate producer id: {id}"));
                }
                Some(_) => producers.push(Producer::create(input.clone())),
                None => {}
            }
        }

        let mut consumer_ids: Vec<&str> = Vec::new();
        for input in &self.consumers {
            if let Some(id) = input.id.as_deref() {
                if consumer_ids.contains(&id) {
                    errors.push(format!("duplicate consumer id: {id}"));
                }
                consumer_ids.push(id);
            }
            match producers.iter().find(|p| p.id == input.producer_id) {
                Some(producer) => {
                    if let Err(e) = validate_consumer(input, producer) {
                        errors.push(e.to_string());
                    }
                }
                None => errors.push(format!(
                    "consumer '{}' references unknown producer '{}'",
                    input.name, input.producer_id
                )),
            }
        }
        errors
    }

    /// Insert every definition into a store, producers first.
    ///
    /// Definitions whose fixed id already exists replace the stored
    /// record, so a persistent store can be re-seeded on every start.
    pub async fn seed(&self, store: &dyn Store) -> Result<()> {
        for input in &self.producers {
            let existing = match input.id.as_deref() {
                Some(id) => store.get_producer(id).await?,
                None => None,
            };
            let producer = match existing {
                Some(p) => store.update_producer(&p.id, input.clone()).await?,
                None => store.create_producer(input.clone()).await?,
            };
            tracing::info!(producer = %producer.id, name = %producer.name, "seeded producer");
        }
        for input in &self.consumers {
            let existing = match input.id.as_deref() {
                Some(id) => store.get_consumer(id).await?,
                None => None,
            };
            let consumer = match existing {
                Some(c) => store.update_consumer(&c.id, input.clone()).await?,
                None => store.create_consumer(input.clone()).await?,
            };
            tracing::info!(consumer = %consumer.id, name = %consumer.name, "seeded consumer");
        }
        Ok(())
    }
}
