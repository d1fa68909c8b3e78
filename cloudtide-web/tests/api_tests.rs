//! HTTP API tests against a live listener.

use std::sync::Arc;

use cloudtide_core::RuntimeSettings;
use cloudtide_search::sync::normalize;
use cloudtide_search::{
    BroadcastSink, DEFAULT_PROVIDERS, ProviderCatalog, ReloadCoordinator, SyncState,
};
use cloudtide_web::{AppState, build_router};
use serde_json::{Value, json};

/// API server on an ephemeral port plus the state behind it.
struct ApiFixture {
    base_url: String,
    client: reqwest::Client,
    settings: RuntimeSettings,
    coordinator: ReloadCoordinator,
}

impl ApiFixture {
    async fn start() -> Self {
        let catalog = Arc::new(ProviderCatalog::new());
        let sync = Arc::new(SyncState::seeded(catalog.as_ref(), DEFAULT_PROVIDERS).unwrap());
        let settings = RuntimeSettings::default();
        let coordinator = ReloadCoordinator::new(
            catalog,
            Arc::clone(&sync),
            Arc::new(BroadcastSink::new(4)),
        );

        let router = build_router(AppState::new("Cloudtide", settings.clone(), sync));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{address}"),
            client: reqwest::Client::new(),
            settings,
            coordinator,
        }
    }

    async fn get(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_configure_round_trip() {
    let api = ApiFixture::start().await;

    let response = api
        .client
        .post(format!("{}/api/configure", api.base_url))
        .json(&json!({
            "AutoStart": false,
            "DownloadDirectory": "/srv/downloads",
            "IncomingPort": 6881,
            "SearchConfigURL": "https://mirror.example/providers.json"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let (status, body) = api.get("/api/configure").await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["AutoStart"], false);
    assert_eq!(body["IncomingPort"], 6881);
    assert_eq!(body["SearchConfigURL"], "https://mirror.example/providers.json");
    assert_eq!(
        api.settings.search_config_url().as_deref(),
        Some("https://mirror.example/providers.json")
    );
}

#[tokio::test]
async fn test_invalid_configure_is_rejected() {
    let api = ApiFixture::start().await;

    let response = api
        .client
        .post(format!("{}/api/configure", api.base_url))
        .json(&json!({ "IncomingPort": 0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid settings"));
    assert_eq!(api.settings.snapshot().incoming_port, 50007);

    let malformed = api
        .client
        .post(format!("{}/api/configure", api.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(malformed.status().is_client_error());
}

#[tokio::test]
async fn test_applied_providers_are_published() {
    let api = ApiFixture::start().await;

    let (_, before) = api.get("/api/state").await;
    assert_eq!(before["revision"], 0);
    assert!(before["search_providers"].get("tpb").is_some());

    let document = br#"{"nyaa": {"name": "Nyaa", "url": "https://nyaa.si/?q={{query}}&p={{page:1}}", "list": "tbody tr", "result": {"name": "td a"}}}"#;
    api.coordinator.apply(normalize(document).unwrap()).unwrap();

    let (_, after) = api.get("/api/state").await;
    assert_eq!(after["revision"], 1);
    assert_eq!(after["search_providers"].as_object().unwrap().len(), 1);
    assert_eq!(after["search_providers"]["nyaa"]["name"], "Nyaa");

    let (status, sync) = api.get("/api/search/status").await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(sync["revision"], 1);
    assert_eq!(sync["provider_count"], 1);
    assert_eq!(sync["phase"], "idle");
}

#[tokio::test]
async fn test_search_url_renders_provider_template() {
    let api = ApiFixture::start().await;

    let response = api
        .client
        .get(format!("{}/api/search/url", api.base_url))
        .query(&[("provider", "tpb"), ("query", "big buck bunny"), ("page", "2")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "The Pirate Bay");
    assert_eq!(
        body["url"],
        "https://thepiratebay.org/search/big+buck+bunny/2/7//"
    );
}
