//! HTTP server setup and route handlers.
//!
//! Every path except the gateway's own status endpoint goes through the
//! [`RegistryResolver`]: package requests are answered with a merged
//! packument or a redirect, everything else is redirected to the default
//! registry.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    config::GatewayConfig,
    resolver::{RegistryResolver, Resolution},
    state::AppState,
    upstream::{HttpRegistryClient, RegistryClient, UpstreamConfig},
    AppError, AppResult,
};

/// Build the gateway router.
pub fn router(state: Arc<AppState>, log_requests: bool) -> Router {
    let app = Router::new()
        .route("/-/gateway/status", get(status_handler))
        .fallback(resolve_handler)
        .with_state(state);

    if log_requests {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

/// Build the production state: one HTTP client per configured registry.
pub fn build_state(config: &GatewayConfig) -> AppResult<AppState> {
    let settings = config.registry_settings()?;
    let public_url = config.public_url()?;
    let upstream_config = UpstreamConfig {
        timeout: config.upstream_timeout(),
        ..Default::default()
    };

    let registries: Vec<Arc<dyn RegistryClient>> =
        HttpRegistryClient::for_registries(&settings.registries, &upstream_config)?
            .into_iter()
            .map(|client| Arc::new(client) as Arc<dyn RegistryClient>)
            .collect();

    let resolver = RegistryResolver::new(
        registries,
        settings.default_registry,
        config.upstream_timeout(),
    );

    Ok(AppState::new(resolver, public_url))
}

pub async fn run_server(config: GatewayConfig) -> Result<()> {
    info!("Starting registry gateway");

    let state = Arc::new(build_state(&config).map_err(|e| {
        error!(code = e.error_code().as_str(), details = ?e.details(), error = %e, "Failed to build gateway state");
        e
    })?);
    let app = router(state.clone(), config.log_requests);

    let listener = TcpListener::bind((config.address.as_str(), config.port))
        .await
        .map_err(|e| {
            error!(address = %config.address, port = %config.port, error = %e, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}:{}: {}", config.address, config.port, e)
        })?;

    print_banner(&state);
    info!(addr = ?listener.local_addr().ok(), "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!("Server error: {}", e)
        })?;

    eprintln!("\nShutting down");
    info!("Gateway stopped");
    Ok(())
}

fn print_banner(state: &AppState) {
    let public_url = &state.public_url;
    let registries: Vec<String> = state
        .resolver
        .registries()
        .iter()
        .map(|registry| registry.base_url().to_string())
        .collect();

    println!("🚀 Registry gateway is running");
    println!();
    println!("📦 Using registries:       {}", registries.join(", "));
    println!("🏠 Using default registry: {}", state.resolver.default_registry());
    println!("🌐 Listening on:           {}", public_url);
    println!();
    println!("🔧 To use:");
    println!("   npm config set registry {}", public_url);
    println!();
    println!("^C to close server");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let request_url = state.request_url(uri.path(), uri.query());

    // Writes are never aggregated; the default registry deals with them.
    if method != Method::GET && method != Method::HEAD {
        let location = crate::rewrite::rewrite_base(&request_url, state.resolver.default_registry());
        info!(method = %method, location = %location, "Redirecting non-read request");
        return Resolution::Redirect(location).into_response();
    }

    state.resolver.resolve(&request_url).await.into_response()
}

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registries: Vec<_> = state
        .resolver
        .registries()
        .iter()
        .enumerate()
        .map(|(priority, registry)| json!({ "priority": priority, "url": registry.base_url().as_str() }))
        .collect();

    Json(json!({
        "status": "ok",
        "service": "vm-registry-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "registries": registries,
        "default_registry": state.resolver.default_registry().as_str(),
        "cached_versions": state.resolver.cache().len(),
    }))
}

impl IntoResponse for Resolution {
    fn into_response(self) -> Response {
        match self {
            Resolution::Packument(packument) => (StatusCode::OK, Json(packument)).into_response(),
            Resolution::Redirect(location) => (
                StatusCode::PERMANENT_REDIRECT,
                [(header::LOCATION, location.to_string())],
                Json(json!({ "location": location.as_str() })),
            )
                .into_response(),
            Resolution::NotFound => AppError::NotFound("Not found".to_string()).into_response(),
        }
    }
}
