//! JSON API handlers for published state, sync status and settings

use axum::extract::{Query, State};
use axum::response::Json;
use cloudtide_core::EngineConfig;
use cloudtide_search::SyncStatus;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::WebError;
use crate::server::AppState;

/// Query string of `GET /api/search/url`.
#[derive(Debug, Deserialize)]
pub struct SearchUrlQuery {
    /// Provider identifier, e.g. `tpb`
    pub provider: String,
    /// Search terms
    pub query: String,
    /// Page number; the provider template default applies when absent
    pub page: Option<u32>,
}

/// Rendered search request for one provider.
#[derive(Debug, Serialize)]
pub struct SearchUrl {
    /// Provider identifier
    pub provider: String,
    /// Display name of the provider
    pub name: String,
    /// Request URL with the query filled in
    pub url: String,
}

/// Liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Published state: the active search providers and where they came from.
pub async fn api_state(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.sync.snapshot();

    Json(json!({
        "title": state.title.as_ref(),
        "revision": snapshot.revision,
        "applied_at": snapshot.applied_at,
        "search_providers": snapshot.providers.as_ref(),
    }))
}

/// Current sync loop status.
pub async fn api_search_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status())
}

/// Current runtime settings.
pub async fn api_get_configure(State(state): State<AppState>) -> Json<EngineConfig> {
    Json(state.settings.snapshot())
}

/// Replaces the runtime settings. A new `SearchConfigURL` is used from the
/// next sync cycle on.
///
/// # Errors
/// - `WebError::Settings` - The settings failed validation and were not applied
pub async fn api_configure(
    State(state): State<AppState>,
    Json(next): Json<EngineConfig>,
) -> Result<Json<EngineConfig>, WebError> {
    state.settings.replace(next)?;
    Ok(Json(state.settings.snapshot()))
}

/// Renders the request URL a provider would use for a query.
///
/// # Errors
/// - `WebError::NotFound` - No active provider with that identifier
/// - `WebError::BadRequest` - The provider's template could not be rendered
pub async fn api_search_url(
    State(state): State<AppState>,
    Query(params): Query<SearchUrlQuery>,
) -> Result<Json<SearchUrl>, WebError> {
    if params.query.trim().is_empty() {
        return Err(WebError::BadRequest {
            reason: "query must not be empty".to_string(),
        });
    }

    let providers = state.sync.providers();
    let provider = providers
        .get(&params.provider)
        .ok_or_else(|| WebError::NotFound {
            resource: format!("provider '{}'", params.provider),
        })?;

    let url = provider.search_url(&params.query, params.page)?;
    Ok(Json(SearchUrl {
        provider: params.provider,
        name: provider.name.clone(),
        url,
    }))
}
