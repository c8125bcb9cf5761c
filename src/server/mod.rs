//! HTTP server
//!
//! Assembles the router, wires the crew service in as shared state, and
//! serves until shutdown. CORS is wide open; this front door is meant for
//! local/dev use.

use anyhow::{Context, Result};
use axum::{Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod config;
mod loader;

pub use config::{AppConfig, CrewConfig, DeliveryConfig, LlmConfig, ServerConfig};
pub use loader::load_config;

/// Start the server and block until it exits
pub async fn run() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;

    // Configuration problems (unknown roles, bad YAML, missing API key) are
    // fatal here, before the listener ever opens.
    let service = crate::service::CrewService::from_config(&config)
        .context("Failed to initialize crew service")?;
    let service = Arc::new(service);

    let app = Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::generate_routes())
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}
