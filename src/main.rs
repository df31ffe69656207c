/// imagebin - image upload server
///
/// Accepts image uploads from a browser form, stores them in a chunked
/// blob store, lists them on the home page and serves them back by name.

mod api;
mod blob_store;
mod config;
mod context;
mod db;
mod error;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load .env before the log filter is read
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagebin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("imagebin v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Store is connected and migrated before the listener binds
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}
