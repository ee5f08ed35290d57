//! Generation error types

use thiserror::Error;

/// Errors from the generation path
///
/// Upstream failures carry the upstream-reported message where one was
/// available and are never retried automatically.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("GEMINI_API_KEY is not configured")]
    NotConfigured,
    #[error("Prompt must be a non-empty string")]
    EmptyPrompt,
    #[error("{0}")]
    Upstream(String),
}
