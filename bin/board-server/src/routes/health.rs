//! Liveness and readiness probes.
//!
//! `/health` answers as long as the process can serve HTTP at all.
//! `/ready` additionally pings the database and reports 503 while it is
//! unreachable, so a load balancer stops routing traffic here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health, get_ready))]
pub struct HealthApi;

/// Register probe routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status":    "healthy",
        "service":   state.config.app_name,
        "version":   env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable", body = Value),
        (status = 503, description = "Database unreachable", body = Value),
    )
)]
pub async fn get_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    if state.connections.check_health().await {
        return (
            StatusCode::OK,
            Json(json!({
                "status":    "ready",
                "service":   state.config.app_name,
                "database":  "connected",
                "timestamp": Utc::now().to_rfc3339(),
            })),
        );
    }

    let connection = state.connections.state();
    warn!(state = %connection, "readiness check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status":    "not_ready",
            "service":   state.config.app_name,
            "database":  "disconnected",
            "state":     connection.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}
