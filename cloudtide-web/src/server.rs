//! API server wiring
//!
//! Builds the shared state, starts the search provider sync loop, and serves
//! the JSON API until Ctrl-C.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use cloudtide_core::{CloudtideConfig, RuntimeSettings};
use cloudtide_search::{
    BroadcastSink, DEFAULT_PROVIDERS, HttpFetcher, ProviderCatalog, ProviderUpdate,
    ReloadCoordinator, SyncLoop, SyncState, spawn_sync_loop,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::WebError;
use crate::handlers::{
    api_configure, api_get_configure, api_search_status, api_search_url, api_state, health,
};

/// Buffered provider updates per subscriber.
const PROVIDER_UPDATE_CAPACITY: usize = 16;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Display name reported by `/api/state`.
    pub title: Arc<str>,
    /// Live engine settings edited through `/api/configure`.
    pub settings: RuntimeSettings,
    /// Provider sync state read by the search endpoints.
    pub sync: Arc<SyncState>,
}

impl AppState {
    /// Creates handler state from its parts.
    pub fn new(title: &str, settings: RuntimeSettings, sync: Arc<SyncState>) -> Self {
        Self {
            title: Arc::from(title),
            settings,
            sync,
        }
    }
}

/// Builds the API router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(api_state))
        .route("/api/search/status", get(api_search_status))
        .route("/api/search/url", get(api_search_url))
        .route("/api/configure", get(api_get_configure).post(api_configure))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the API server and the provider sync loop until Ctrl-C.
///
/// # Errors
/// - `WebError::Settings` - The engine settings or sync timings failed validation
/// - `WebError::Sync` - The bundled provider document was refused
/// - `WebError::Server` - The HTTP client could not be built
/// - `WebError::Io` - The listener could not be bound
pub async fn run_server(config: CloudtideConfig) -> Result<(), WebError> {
    config.validate()?;
    let settings = RuntimeSettings::new(config.engine.clone());

    let catalog = Arc::new(ProviderCatalog::new());
    let sync_state = Arc::new(SyncState::seeded(catalog.as_ref(), DEFAULT_PROVIDERS)?);
    let fetcher = HttpFetcher::new(&config.search_sync).map_err(|e| WebError::Server {
        reason: format!("failed to build HTTP client: {e}"),
    })?;

    let sink = BroadcastSink::new(PROVIDER_UPDATE_CAPACITY);
    tokio::spawn(log_provider_updates(sink.subscribe()));
    let coordinator = ReloadCoordinator::new(catalog, Arc::clone(&sync_state), Arc::new(sink));
    let sync = spawn_sync_loop(SyncLoop::new(
        &config.search_sync,
        Arc::new(fetcher),
        settings.clone(),
        coordinator,
    ));

    let state = AppState::new(&config.server.title, settings, sync_state);
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(address = %listener.local_addr()?, "Cloudtide server running");

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sync.stop().await;
    served?;
    Ok(())
}

/// Reports applied provider sets until the sink is dropped.
///
/// Returns the number of updates received.
async fn log_provider_updates(mut updates: broadcast::Receiver<ProviderUpdate>) -> u64 {
    let mut received = 0;
    loop {
        match updates.recv().await {
            Ok(update) => {
                received += 1;
                info!(
                    revision = update.revision,
                    providers = update.providers.len(),
                    "Search providers updated"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Provider update listener fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return received,
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
