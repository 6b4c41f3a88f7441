// Integration tests for the offline cache gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, Url};

use fit_tracker::cache::gateway::{CacheGateway, GatewayState};
use fit_tracker::cache::network::Network;
use fit_tracker::cache::storage::{CacheStorage, MemoryCacheStorage};
use fit_tracker::cache::{Request, Response};
use fit_tracker::config::CacheConfig;
use fit_tracker::{GatewayError, NetworkError};

const ORIGIN: &str = "https://fit.example";

/// Upstream that serves a fixed set of paths and can be switched offline.
#[derive(Clone, Default)]
struct FakeNetwork {
    pages: Arc<Mutex<HashMap<String, Response>>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FakeNetwork {
    fn with_app_assets() -> Self {
        let net = Self::default();
        for path in CacheConfig::default().manifest {
            let ct = if path.ends_with(".html") { "text/html" } else { "text/plain" };
            net.serve(&path, Response::new(200, Some(ct), format!("v1 {}", path)));
        }
        net
    }

    fn serve(&self, path: &str, response: Response) {
        self.pages.lock().insert(url(path).to_string(), response);
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable(request.url.to_string()));
        }
        Ok(self
            .pages
            .lock()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, None, "not found")))
    }
}

fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

fn config(version: &str) -> CacheConfig {
    CacheConfig {
        version: version.to_string(),
        origin: ORIGIN.to_string(),
        ..CacheConfig::default()
    }
}

async fn active_gateway(
    net: &FakeNetwork,
    storage: &MemoryCacheStorage,
) -> CacheGateway<FakeNetwork, MemoryCacheStorage> {
    let mut gateway = CacheGateway::new(&config("fittracker-v1"), net.clone(), storage.clone()).unwrap();
    assert_eq!(gateway.install().await.unwrap(), 5);
    gateway.activate().await.unwrap();
    gateway
}

#[tokio::test]
async fn offline_manifest_asset_is_served_from_precache() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;
    assert_eq!(gateway.state(), GatewayState::Active);

    net.set_offline(true);
    let resp = gateway.handle(&Request::get(url("/styles/fitness.css"))).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "v1 /styles/fitness.css");
}

#[tokio::test]
async fn offline_unknown_asset_is_a_network_error() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;

    net.set_offline(true);
    let err = gateway
        .handle(&Request::get(url("/icon/large.png")))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
}

#[tokio::test]
async fn cache_first_fetches_once_then_serves_the_copy() {
    let net = FakeNetwork::with_app_assets();
    net.serve("/icon/large.png", Response::new(200, Some("image/png"), "png"));
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;
    let before = net.calls();

    let req = Request::get(url("/icon/large.png"));
    gateway.handle(&req).await.unwrap();
    assert_eq!(net.calls(), before + 1);

    net.set_offline(true);
    assert_eq!(gateway.handle(&req).await.unwrap().body, "png");
    assert_eq!(net.calls(), before + 1);
}

#[tokio::test]
async fn error_responses_are_returned_but_not_cached() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;

    let resp = gateway.handle(&Request::get(url("/missing.js"))).await.unwrap();
    assert_eq!(resp.status, 404);
    assert!(storage
        .lookup("fittracker-v1", url("/missing.js").as_str())
        .await
        .is_none());
}

#[tokio::test]
async fn documents_prefer_the_network_and_refresh_the_cache() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;

    net.serve("/fitness.html", Response::new(200, Some("text/html"), "v2 page"));
    let page = gateway.handle(&Request::navigate(url("/fitness.html"))).await.unwrap();
    assert_eq!(page.body, "v2 page");

    net.set_offline(true);
    let page = gateway.handle(&Request::navigate(url("/fitness.html"))).await.unwrap();
    assert_eq!(page.body, "v2 page");
}

#[tokio::test]
async fn offline_navigation_falls_back_to_the_root_document() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;

    net.set_offline(true);
    let page = gateway.handle(&Request::navigate(url("/history"))).await.unwrap();
    assert_eq!(page.body, "v1 /fitness.html");
}

#[tokio::test]
async fn offline_navigation_without_root_document_fails() {
    let net = FakeNetwork::default();
    net.serve("/app.css", Response::new(200, None, "css"));
    let storage = MemoryCacheStorage::new();
    let mut gateway = CacheGateway::new(
        &CacheConfig {
            manifest: vec!["/app.css".to_string()],
            ..config("v1")
        },
        net.clone(),
        storage.clone(),
    )
    .unwrap();
    gateway.install().await.unwrap();
    gateway.activate().await.unwrap();

    net.set_offline(true);
    let err = gateway.handle(&Request::navigate(url("/"))).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
}

#[tokio::test]
async fn failed_install_commits_nothing() {
    let net = FakeNetwork::with_app_assets();
    net.pages.lock().remove(url("/manifest.json").as_str());
    let storage = MemoryCacheStorage::new();
    let mut gateway = CacheGateway::new(&config("fittracker-v1"), net.clone(), storage.clone()).unwrap();

    let err = gateway.install().await.unwrap_err();
    assert!(matches!(err, GatewayError::InstallFailed { .. }));
    assert_eq!(gateway.state(), GatewayState::Installing);
    assert!(storage.keys().await.is_empty());
    assert!(matches!(gateway.activate().await, Err(GatewayError::NotInstalled)));

    // The host retries once the asset is back.
    net.serve("/manifest.json", Response::new(200, None, "{}"));
    assert_eq!(gateway.install().await.unwrap(), 5);
    assert_eq!(storage.len("fittracker-v1"), 5);
}

#[tokio::test]
async fn activating_a_new_version_evicts_the_old_caches() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let _old = active_gateway(&net, &storage).await;
    storage.put("scratch", "https://fit.example/x", Response::new(200, None, "x")).await;

    let mut next = CacheGateway::new(&config("fittracker-v2"), net.clone(), storage.clone()).unwrap();
    next.install().await.unwrap();
    assert_eq!(storage.keys().await.len(), 3);

    let deleted = next.activate().await.unwrap();
    assert_eq!(deleted, vec!["fittracker-v1".to_string(), "scratch".to_string()]);
    assert_eq!(storage.keys().await, vec!["fittracker-v2".to_string()]);
}

#[tokio::test]
async fn non_get_and_cross_origin_requests_pass_through() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let gateway = active_gateway(&net, &storage).await;

    let post = Request::new(Method::POST, url("/scripts/fitness.js"));
    let foreign = Request::get(Url::parse("https://cdn.example/scripts/fitness.js").unwrap());
    assert!(!gateway.intercepts(&post));
    assert!(!gateway.intercepts(&foreign));

    net.set_offline(true);
    assert!(gateway.handle(&post).await.is_err());
    assert!(gateway.handle(&foreign).await.is_err());
}

#[tokio::test]
async fn nothing_is_intercepted_before_activation() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let mut gateway = CacheGateway::new(&config("fittracker-v1"), net.clone(), storage).unwrap();
    gateway.install().await.unwrap();

    assert!(!gateway.intercepts(&Request::get(url("/styles/fitness.css"))));
}

#[tokio::test]
async fn failed_reinstall_keeps_an_active_gateway_serving() {
    let net = FakeNetwork::with_app_assets();
    let storage = MemoryCacheStorage::new();
    let mut gateway = active_gateway(&net, &storage).await;

    net.set_offline(true);
    let err = gateway.install().await.unwrap_err();
    assert!(matches!(err, GatewayError::InstallFailed { .. }));
    assert_eq!(gateway.state(), GatewayState::Active);
    assert!(gateway.intercepts(&Request::get(url("/styles/fitness.css"))));

    let resp = gateway.handle(&Request::get(url("/styles/fitness.css"))).await.unwrap();
    assert_eq!(resp.body, "v1 /styles/fitness.css");

    // A successful refresh while active does not demote the gateway either.
    net.set_offline(false);
    assert_eq!(gateway.install().await.unwrap(), 5);
    assert_eq!(gateway.state(), GatewayState::Active);
}
