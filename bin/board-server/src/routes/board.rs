//! `GET /`: the rendered message board.
//!
//! When the store is unreachable the page still renders, with HTTP 200 and an
//! inline notice instead of the list. Other failures render the same page
//! with HTTP 500.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info, warn};
use utoipa::OpenApi;

use crate::db::{MessageStore, StoreError};
use crate::state::AppState;
use crate::views::BoardPage;

pub const UNAVAILABLE_NOTICE: &str =
    "Messages are temporarily unavailable. Please try again in a moment.";
pub const ERROR_NOTICE: &str = "Unable to load messages. Please try again later.";

#[derive(OpenApi)]
#[openapi(paths(index))]
pub struct BoardApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

/// Render every message, newest first.
#[utoipa::path(
    get,
    path = "/",
    tag = "board",
    responses(
        (status = 200, description = "Board page, possibly with an unavailability notice", content_type = "text/html", body = String),
        (status = 500, description = "Board page with an error notice", content_type = "text/html", body = String),
    )
)]
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    let app_name = state.config.app_name.as_str();
    let hostname = state.hostname.as_str();

    let (status, page) = match state.store.list_all().await {
        Ok(messages) => {
            info!(count = messages.len(), "rendering board");
            (StatusCode::OK, BoardPage::new(app_name, hostname, messages))
        }
        Err(StoreError::Unavailable(reason)) => {
            warn!(%reason, "rendering board without messages");
            (
                StatusCode::OK,
                BoardPage::new(app_name, hostname, Vec::new()).with_notice(UNAVAILABLE_NOTICE),
            )
        }
        Err(e) => {
            error!(error = %e, "failed to load messages for board");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                BoardPage::new(app_name, hostname, Vec::new()).with_notice(ERROR_NOTICE),
            )
        }
    };

    match state.views.board(&page) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render board template");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}
