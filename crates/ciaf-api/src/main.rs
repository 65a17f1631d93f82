//! # ciaf-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the audit API. Configuration comes
//! from the environment:
//!
//! - `PORT` — listen port (default 8080).
//! - `CIAF_ENGINE_CMD` — engine worker executable; absent means every
//!   operation runs in-process (mock mode).
//! - `CIAF_ENGINE_ARGS` — whitespace-separated worker arguments.
//! - `CIAF_ENGINE_TIMEOUT_MS` — per-call bridge timeout (default 10000).

use std::sync::Arc;
use std::time::Duration;

use ciaf_api::state::AppState;
use ciaf_audit::AuditService;
use ciaf_bridge::{EngineBridge, EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let audit = match std::env::var("CIAF_ENGINE_CMD") {
        Ok(command) => {
            let args: Vec<String> = std::env::var("CIAF_ENGINE_ARGS")
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default();
            let timeout_ms: u64 = std::env::var("CIAF_ENGINE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000);
            let bridge = Arc::new(EngineBridge::new(
                EngineConfig::new(command)
                    .with_args(args)
                    .with_default_timeout(Duration::from_millis(timeout_ms)),
            ));
            // Connect eagerly so worker problems show up at startup; the
            // service reconnects per call if the worker dies later.
            if let Err(error) = bridge.connect().await {
                tracing::warn!(%error, "engine worker unavailable at startup; operations will fall back");
            }
            AuditService::with_bridge(bridge)
        }
        Err(_) => {
            tracing::warn!(
                "CIAF_ENGINE_CMD not set; running without an engine bridge (mock mode only)"
            );
            AuditService::new()
        }
    };

    let state = AppState::with_service(Arc::new(audit));
    let app = ciaf_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("CIAF audit API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
