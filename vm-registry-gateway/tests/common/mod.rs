//! Common test utilities and helpers
//!
//! Provides an in-memory [`RegistryClient`] test double and a small axum
//! server that behaves like an npm registry, for tests that go through the
//! real HTTP client.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_test::TestServer;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use url::Url;
use vm_registry_gateway::upstream::UpstreamResult;
use vm_registry_gateway::{router, AppState, RegistryClient, RegistryResolver, UpstreamError};

pub const GATEWAY_URL: &str = "http://localhost:22000/";

/// Build a packument with one entry per `(version, tarball)` pair.
pub fn packument(name: &str, versions: &[(&str, &str)]) -> Value {
    let versions: Map<String, Value> = versions
        .iter()
        .map(|(version, tarball)| {
            (
                version.to_string(),
                json!({ "name": name, "version": version, "dist": { "tarball": tarball } }),
            )
        })
        .collect();

    json!({
        "name": name,
        "dist-tags": {},
        "versions": versions,
    })
}

/// In-memory registry that counts every call made to it.
pub struct MemoryRegistry {
    base: Url,
    packuments: HashMap<String, Value>,
    offline: bool,
    calls: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new(base: &str) -> Self {
        Self {
            base: Url::parse(base).expect("valid test registry URL"),
            packuments: HashMap::new(),
            offline: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_packument(mut self, name: &str, packument: Value) -> Self {
        self.packuments.insert(name.to_string(), packument);
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    fn base_url(&self) -> &Url {
        &self.base
    }

    async fn fetch_packument(&self, package: &str) -> UpstreamResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(UpstreamError::Unreachable("connection refused".to_string()));
        }
        self.packuments
            .get(package)
            .cloned()
            .ok_or(UpstreamError::Rejected { status: 404 })
    }

    async fn probe_version(&self, package: &str, version: &str) -> UpstreamResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(UpstreamError::Unreachable("connection refused".to_string()));
        }
        match self.packuments.get(package) {
            Some(packument) if packument["versions"].get(version).is_some() => Ok(()),
            _ => Err(UpstreamError::Rejected { status: 404 }),
        }
    }
}

/// Gateway in front of the given registries, default registry = first one.
pub fn gateway_server(registries: &[Arc<MemoryRegistry>]) -> TestServer {
    let clients: Vec<Arc<dyn RegistryClient>> = registries
        .iter()
        .map(|registry| registry.clone() as Arc<dyn RegistryClient>)
        .collect();
    let default = registries[0].base_url().clone();

    let resolver = RegistryResolver::new(clients, default, Duration::from_secs(2));
    let state = AppState::new(resolver, Url::parse(GATEWAY_URL).expect("valid gateway URL"));

    TestServer::new(router(Arc::new(state), false)).expect("Failed to create test server")
}

/// A running mock npm registry reachable over HTTP.
pub struct MockRegistry {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl MockRegistry {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockState {
    packuments: Arc<HashMap<String, Value>>,
    hits: Arc<AtomicUsize>,
}

/// Serve `packuments` on an ephemeral local port, below `base_path`.
pub async fn start_mock_registry(
    base_path: &str,
    packuments: HashMap<String, Value>,
) -> Result<MockRegistry> {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = MockState {
        packuments: Arc::new(packuments),
        hits: hits.clone(),
    };

    let routes = Router::new()
        .route("/{package}", get(mock_packument))
        .route("/{package}/{version}", get(mock_version))
        .with_state(state);

    let base_path = base_path.trim_end_matches('/');
    let app = if base_path.is_empty() {
        routes
    } else {
        Router::new().nest(base_path, routes)
    };

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(MockRegistry {
        url: format!("http://{addr}{base_path}/"),
        hits,
    })
}

async fn mock_packument(
    State(state): State<MockState>,
    Path(package): Path<String>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match state.packuments.get(&package) {
        Some(packument) => Json(packument.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response(),
    }
}

async fn mock_version(
    State(state): State<MockState>,
    Path((package, version)): Path<(String, String)>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match state
        .packuments
        .get(&package)
        .and_then(|packument| packument["versions"].get(&version))
    {
        Some(manifest) => Json(manifest.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response(),
    }
}
