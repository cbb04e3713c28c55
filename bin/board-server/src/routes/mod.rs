//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (trace-ID span, security headers, CORS)
//! - The board page and the message API
//! - Liveness / readiness probes
//! - Optional OpenAPI document (disable with `BOARD_ENABLE_API_DOCS=false`)
//! - A JSON 404 fallback

mod board;
pub mod doc;
mod health;
mod messages;

use std::sync::Arc;

use axum::http::Uri;
use axum::routing::get;
use axum::{middleware, Router};
use tracing::warn;

use crate::error::ServerError;
use crate::middleware::{cors, headers, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(board::router())
        .merge(messages::router())
        .merge(health::router());

    if state.config.enable_api_docs {
        app = app.route("/api-docs/openapi.json", get(doc::openapi_json));
    }

    // Security headers wrap CORS so preflight answers carry them too.
    let app = app.fallback(not_found).layer(cors::cors_layer(&state.config));

    headers::apply(app)
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

async fn not_found(uri: Uri) -> ServerError {
    warn!(path = %uri.path(), "404");
    ServerError::NotFound
}

// ── Tests ──────────────────────────────────────────────────────────────────────
