use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:5173,http://localhost:5177,http://localhost:3000,http://localhost:8001";
const DEFAULT_LLM_MODEL: &str = "minimax/minimax-m2:free";
const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub cors_allowed_origins: Vec<String>,
    /// Empty when report generation is disabled.
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,
    pub media_root: PathBuf,
    pub media_url: String,
    pub pdf_render_command: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            jwt_secret: require_env("JWT_SECRET")?,
            access_token_ttl_secs: parse_env("ACCESS_TOKEN_TTL_SECS", 3600)?,
            refresh_token_ttl_secs: parse_env("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 3600)?,
            cors_allowed_origins: split_list(
                &std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
            ),
            llm_api_key: first_non_empty([
                std::env::var("OPENROUTER_API1").ok(),
                std::env::var("OPENROUTER_API_KEY").ok(),
            ]),
            llm_model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            llm_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            media_root: std::env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            media_url: normalize_media_url(
                &std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string()),
            ),
            pdf_render_command: std::env::var("PDF_RENDER_COMMAND")
                .unwrap_or_else(|_| "weasyprint".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}

/// First value that is set and not blank, or an empty string.
fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Media URLs are always rooted and end with a slash so `reports/<file>` can be appended.
fn normalize_media_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        format!("{trimmed}/")
    } else {
        format!("/{trimmed}/")
    }
}
