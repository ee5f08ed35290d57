//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AiRequest, AiResponse, AppendMessageRequest, CreateRoomRequest, ErrorResponse,
    MessagePageQuery, RenameRoomRequest,
};
use super::AppState;
use crate::db::{DbError, Message, Role, Room};
use crate::turn::{self, TurnError, TurnRequest};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // One chat turn
        .route("/api/ai", post(ai_turn))
        // Room CRUD
        .route("/api/rooms", get(list_rooms).post(create_room))
        .route("/api/rooms/:id", patch(rename_room).delete(delete_room))
        // Messages within a room
        .route(
            "/api/rooms/:id/messages",
            get(list_messages).post(append_message),
        )
        // Live updates
        .route("/api/stream", get(stream))
        .with_state(state)
}

// ============================================================
// Chat Turn
// ============================================================

async fn ai_turn(
    State(state): State<AppState>,
    Json(req): Json<AiRequest>,
) -> Result<Json<AiResponse>, AppError> {
    let Some(text) = req.text else {
        return Err(AppError::BadRequest(
            "Missing `text` in request body".to_string(),
        ));
    };

    let reply = turn::run_turn(
        &state.db,
        state.generator.as_ref(),
        TurnRequest {
            text,
            room_id: req.room_id,
        },
    )
    .await?;

    Ok(Json(AiResponse { text: reply }))
}

// ============================================================
// Rooms
// ============================================================

async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, AppError> {
    let rooms = state.db.list_rooms()?;
    Ok(Json(rooms))
}

async fn create_room(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let room = state.db.create_room(req.title.as_deref())?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn rename_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RenameRoomRequest>,
) -> Result<Json<Room>, AppError> {
    let room = state.db.rename_room(id, req.title.as_deref())?;
    Ok(Json(room))
}

async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.db.delete_room(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Messages
// ============================================================

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page): Query<MessagePageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state.db.list_messages(id, page.limit, page.offset)?;
    Ok(Json(messages))
}

async fn append_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let Some(text) = req.text else {
        return Err(AppError::BadRequest("Missing text".to_string()));
    };

    let role = req.role.unwrap_or(Role::User);
    let message = state
        .db
        .append_message(id, role, &text, req.metadata.as_ref())?;

    Ok((StatusCode::CREATED, Json(message)))
}

// ============================================================
// Live Updates
// ============================================================

async fn stream(State(state): State<AppState>) -> impl IntoResponse {
    let sse = sse_stream(&state.broadcaster);
    tracing::info!(total = state.broadcaster.count(), "SSE client connected");
    sse
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::RoomNotFound(_) => AppError::NotFound(e.to_string()),
            DbError::EmptyText => AppError::BadRequest(e.to_string()),
            DbError::Sqlite(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::EmptyText => AppError::BadRequest(e.to_string()),
            // Upstream and configuration failures alike surface as 500
            TurnError::Generation(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
