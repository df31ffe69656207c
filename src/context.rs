/// Application context and dependency injection
use crate::{api::views::Views, blob_store::BlobStore, config::ServerConfig, error::AppResult};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub blob_store: Arc<BlobStore>,
    pub views: Arc<Views>,
}

impl AppContext {
    /// Create a new application context from configuration
    ///
    /// The blob store is fully initialised (pool opened, migrations run)
    /// before this returns, so the router never sees a half-ready store.
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        let blob_store = BlobStore::open(&config.storage).await?;

        Self::with_store(config, blob_store)
    }

    /// Assemble a context around an already constructed store
    pub fn with_store(config: ServerConfig, blob_store: BlobStore) -> AppResult<Self> {
        Ok(Self {
            config: Arc::new(config),
            blob_store: Arc::new(blob_store),
            views: Arc::new(Views::new()?),
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!("http://localhost:{}", self.config.service.port)
    }
}
