use axum::Json;
use utoipa::OpenApi;

use crate::routes::{board, health, messages};

#[derive(OpenApi)]
#[openapi(info(
    title = "board-server",
    description = "Message board API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(board::BoardApi::openapi());
    root.merge(messages::MessageApi::openapi());
    root.merge(health::HealthApi::openapi());
    root
}

/// Serve the OpenAPI document as JSON.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(get_docs())
}
