//! Environment-derived configuration
//!
//! Loaded once at startup into an immutable value; nothing deeper in the stack
//! reads the environment directly.

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    /// Auto-create the schema on boot
    pub db_sync: bool,
    pub gemini: GeminiConfig,
}

/// Generation service configuration
#[derive(Debug, Clone, Default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    /// Persona preamble prepended to every prompt; a default is used when unset
    pub system_instruction: Option<String>,
}

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("PARLOR_DB_PATH").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.parlor/parlor.db")
        });

        let port: u16 = std::env::var("PARLOR_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4000);

        let db_sync = std::env::var("PARLOR_DB_SYNC")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            port,
            db_path,
            db_sync,
            gemini: GeminiConfig {
                api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
                model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                api_base: std::env::var("GEMINI_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                system_instruction: std::env::var("GEMINI_SYSTEM_INSTRUCTION").ok(),
            },
        }
    }
}
