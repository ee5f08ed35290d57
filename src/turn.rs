//! Turn orchestration
//!
//! Sequences one chat turn: persist the user prompt, call the generation
//! service, persist the reply, hand the reply back. Persistence on either side
//! is best-effort; only validation and the generation call itself can fail a
//! turn.

use crate::db::{Database, Role};
use crate::llm::{GenError, TextGenerator};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Missing `text` in request body")]
    EmptyText,
    #[error("{0}")]
    Generation(#[from] GenError),
}

/// Input for one turn
#[derive(Debug)]
pub struct TurnRequest {
    pub text: String,
    pub room_id: Option<i64>,
}

/// Run one turn against the generation service
///
/// The user message, when a room is given, is committed before the generation
/// call begins; the AI message is committed after it returns. A failure in
/// either persistence step is logged and swallowed so a persistence hiccup
/// never blocks the conversational reply.
pub async fn run_turn(
    db: &Database,
    generator: &dyn TextGenerator,
    request: TurnRequest,
) -> Result<String, TurnError> {
    if request.text.is_empty() {
        return Err(TurnError::EmptyText);
    }

    if let Some(room_id) = request.room_id {
        persist_best_effort(db, room_id, Role::User, &request.text);
    }

    let reply = generator.generate(&request.text).await?;

    if let Some(room_id) = request.room_id {
        persist_best_effort(db, room_id, Role::Ai, &reply);
    }

    Ok(reply)
}

/// Append a message, logging instead of propagating on failure
fn persist_best_effort(db: &Database, room_id: i64, role: Role, text: &str) {
    if let Err(e) = db.append_message(room_id, role, text, None) {
        tracing::warn!(
            room_id,
            role = %role,
            error = %e,
            "Failed to persist turn message; continuing"
        );
    }
}
