//! parlor - multi-room chat backend
//!
//! A Rust backend that persists named conversations against a generative-text
//! service and pushes live updates to connected viewers over SSE.

mod api;
mod broadcast;
mod config;
mod db;
mod llm;
mod turn;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use llm::GeminiClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %config.db_path, sync = config.db_sync, "Opening database");
    let db = Database::open(&config.db_path, config.db_sync)?;

    // Initialize generation client
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; /api/ai will fail until it is configured");
    }
    let generator = Arc::new(GeminiClient::new(&config.gemini));

    // Create application state
    let state = AppState::new(db, generator);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("parlor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
