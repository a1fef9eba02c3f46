//! Service initialization

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tandem_core::Config;
use tandem_db::Store;
use tandem_infra::create_cache_backend;
use tandem_services::create_repository_host;

/// Initialize the cache, repository host and realtime services over `store`
pub fn initialize_services(config: &Config, store: Store) -> Result<Arc<AppState>> {
    let cache = create_cache_backend(config).context("Failed to initialize cache")?;
    tracing::info!(
        backend = cache.backend_name(),
        ttl_seconds = cache.default_ttl().as_secs(),
        "Cache initialized"
    );

    let repo_host =
        create_repository_host(config).context("Failed to initialize repository host")?;
    if config.webhooks_enabled() {
        tracing::info!("Repository webhooks will be registered on import");
    }

    let state = AppState::new(config.clone(), store, cache, repo_host);
    tracing::info!(
        outbound_buffer = config.ws_outbound_buffer,
        "Realtime connection manager initialized"
    );

    Ok(Arc::new(state))
}
