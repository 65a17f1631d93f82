//! # ciaf-api — Axum Request Boundary
//!
//! Translates inbound HTTP requests into audit-service calls and audit
//! results into JSON envelopes. No business logic in handlers — they
//! validate, delegate, and shape responses.
//!
//! ## API Surface
//!
//! | Route                               | Module               |
//! |-------------------------------------|----------------------|
//! | `POST/GET /v1/dataset-anchor`       | [`routes::anchors`]  |
//! | `POST/GET /v1/inference`            | [`routes::receipts`] |
//! | `POST /v1/inference/:id/verify`     | [`routes::receipts`] |
//! | `GET /v1/audit-report`              | [`routes::report`]   |
//! | `GET /health/*`                     | liveness/readiness   |
//! | `GET /openapi.json`                 | [`openapi`]          |
//!
//! Every creation envelope carries a `mode` tag (`bridge`, `fallback`,
//! `mock`) so operators can distinguish engine-issued artifacts from
//! degraded in-process output without inspecting logs.

pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router.
///
/// Health probes are mounted alongside the API routes and need no
/// credentials — authentication is an external collaborator in this
/// deployment.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::anchors::router())
        .merge(routes::receipts::router())
        .merge(routes::report::router())
        .merge(openapi::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — 200 whenever the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — 200 when the application can serve requests.
async fn readiness() -> &'static str {
    "ready"
}
