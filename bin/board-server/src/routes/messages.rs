//! `POST /api/message`.

use std::sync::Arc;

use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json, Router};
use utoipa::OpenApi;

use crate::db::MessageStore;
use crate::error::ServerError;
use crate::schemas::message::{CreateMessageRequest, MessageResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_message),
    components(schemas(CreateMessageRequest, MessageResponse))
)]
pub struct MessageApi;

/// Register message routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/message", post(create_message))
}

/// Message body read from JSON or from a urlencoded form.
pub struct MessageInput(pub CreateMessageRequest);

impl<S> FromRequest<S> for MessageInput
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(body) = Form::<CreateMessageRequest>::from_request(req, state)
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;
            Ok(Self(body))
        } else {
            let Json(body) = Json::<CreateMessageRequest>::from_request(req, state)
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;
            Ok(Self(body))
        }
    }
}

/// Post a new message.
#[utoipa::path(
    post,
    path = "/api/message",
    tag = "messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageResponse),
        (status = 400, description = "Empty, oversized, or malformed message"),
        (status = 503, description = "Message store unavailable"),
        (status = 500, description = "Internal error"),
    )
)]
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    MessageInput(req): MessageInput,
) -> Result<(StatusCode, Json<MessageResponse>), ServerError> {
    let message = state.store.append(&req.content).await?;
    Ok((StatusCode::CREATED, Json(message.to_response())))
}
