use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::Message;

/// Body of `POST /api/message`.
///
/// Accepted as JSON or as a urlencoded form; the board page's legacy form
/// field name `new_message` is accepted as an alias.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    #[serde(alias = "new_message")]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub content: String,
    /// RFC 3339, UTC.
    pub created_at: String,
}

impl Message {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            id: self.id,
            content: self.content.clone(),
            created_at: self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}
