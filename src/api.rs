//! HTTP API for parlor

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::broadcast::Broadcaster;
use crate::db::Database;
use crate::llm::TextGenerator;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub generator: Arc<dyn TextGenerator>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            db,
            generator,
            broadcaster: Broadcaster::new(),
        }
    }
}
