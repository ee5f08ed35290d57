//! Text generation abstraction
//!
//! Provides a common interface over the upstream generation service so the
//! turn pipeline can be exercised with a stub.

mod error;
mod gemini;

pub use error::GenError;
pub use gemini::GeminiClient;

use async_trait::async_trait;

/// Common interface for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String, GenError>;
}
