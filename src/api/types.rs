//! API request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to run one chat turn
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    #[serde(default)]
    pub text: Option<String>,
    pub room_id: Option<i64>,
}

/// Response for a completed turn
#[derive(Debug, Serialize)]
pub struct AiResponse {
    pub text: String,
}

/// Request to create a room
#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    pub title: Option<String>,
}

/// Request to rename a room
#[derive(Debug, Deserialize)]
pub struct RenameRoomRequest {
    pub title: Option<String>,
}

/// Request to append a message to a room
#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    /// Defaults to `user` when omitted
    pub role: Option<crate::db::Role>,
    pub text: Option<String>,
    pub metadata: Option<Value>,
}

/// Pagination for message listing
#[derive(Debug, Default, Deserialize)]
pub struct MessagePageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
