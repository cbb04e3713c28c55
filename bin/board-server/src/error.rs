//! Unified server error type.
//!
//! Every JSON handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Internal errors are logged with full detail but only a
//! generic message is returned to the caller so that SQL, hostnames, or other
//! implementation details never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::db::{StoreError, ValidationError};

/// All errors that can occur in the board-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Message content failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body could not be read as a message.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The database could not be reached within its timeout.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found")]
    NotFound,

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(v) => ServerError::Validation(v),
            StoreError::Unavailable(reason) => ServerError::StoreUnavailable(reason),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // Client-facing errors: expose the message and a stable reason code.
            ServerError::Validation(v) => {
                warn!(reason = v.reason(), "rejected message: {v}");
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": v.to_string(), "reason": v.reason() }),
                )
            }
            ServerError::BadRequest(m) => {
                warn!(detail = %m, "malformed message request");
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": m, "reason": "malformed_body" }),
                )
            }
            ServerError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Resource not found" }),
            ),

            // Internal detail stays in the logs.
            ServerError::StoreUnavailable(reason) => {
                warn!(%reason, "store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "error": "Message store is temporarily unavailable. Please try again.",
                        "reason": "store_unavailable",
                    }),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn store_errors_map_to_server_errors() {
        assert!(matches!(
            ServerError::from(StoreError::Validation(ValidationError::Empty)),
            ServerError::Validation(ValidationError::Empty)
        ));
        assert!(matches!(
            ServerError::from(StoreError::Unavailable("down".into())),
            ServerError::StoreUnavailable(_)
        ));
        assert!(matches!(
            ServerError::from(StoreError::Database(sqlx::Error::RowNotFound)),
            ServerError::Internal(_)
        ));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::Validation(ValidationError::Empty), StatusCode::BAD_REQUEST),
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::StoreUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServerError::NotFound, StatusCode::NOT_FOUND),
            (ServerError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
