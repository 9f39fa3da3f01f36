//! Server runtime

use std::future::Future;
use std::sync::Arc;

use hookwire_core::config::StoreKind;
use hookwire_core::{Config, MemoryStore, Store};
use tokio::net::TcpListener;

use crate::delivery::WebhookClient;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::http::{AppState, router};
use crate::pg::PgStore;

/// Runtime serving the HTTP API for one project
pub struct Runtime {
    config: Config,
    state: AppState,
    pg: Option<PgStore>,
}

impl Runtime {
    /// Open the configured store and build the dispatcher
    pub async fn new(config: Config) -> Result<Self> {
        let project = &config.project;
        let (store, pg): (Arc<dyn Store>, Option<PgStore>) = match project.store.kind {
            StoreKind::Memory => {
                tracing::debug!(capacity = project.logs.capacity, "using in-memory store");
                (
                    Arc::new(MemoryStore::with_log_capacity(project.logs.capacity)),
                    None,
                )
            }
            StoreKind::Postgres => {
                let url = project.store.url.as_deref().ok_or_else(|| {
                    hookwire_core::Error::ConfigInvalid {
                        message: "store.url is required when store.kind is postgres".to_string(),
                    }
                })?;
                let pg = PgStore::connect(url, project.logs.capacity).await?;
                (Arc::new(pg.clone()), Some(pg))
            }
        };
        Self::with_store(config, store, pg)
    }

    /// Build a runtime over an already-open store
    pub fn with_store(config: Config, store: Arc<dyn Store>, pg: Option<PgStore>) -> Result<Self> {
        let client = WebhookClient::new(&config.project.delivery)?;
        let state = AppState::new(Dispatcher::new(store, client));
        Ok(Self { config, state, pg })
    }

    /// Handler state shared by the routes
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Load definition files, reject them if any check fails, and seed
    /// the store. Returns the number of producers and consumers seeded.
    pub async fn seed(&self) -> Result<(usize, usize)> {
        let definitions = self.config.load_definitions()?;
        let errors = definitions.check();
        if !errors.is_empty() {
            return Err(Error::Core(hookwire_core::Error::ConfigInvalid {
                message: errors.join("; "),
            }));
        }
        definitions
            .seed(self.state.dispatcher().store().as_ref())
            .await?;
        Ok((definitions.producers.len(), definitions.consumers.len()))
    }

    /// Serve the API on `bind` (or the configured address) until `signal`
    /// resolves
    pub async fn start<F>(&self, bind: Option<&str>, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind = bind.unwrap_or(self.config.project.server.bind.as_str());
        let listener = TcpListener::bind(bind).await?;
        tracing::info!(
            project = %self.config.project.name,
            addr = %listener.local_addr()?,
            "Starting Hookwire runtime"
        );

        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(signal)
            .await?;
        Ok(())
    }

    /// Release the store's resources
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down Hookwire runtime");
        if let Some(pg) = &self.pg {
            pg.pool().close().await;
        }
        tracing::info!("Runtime shutdown complete");
        Ok(())
    }
}
