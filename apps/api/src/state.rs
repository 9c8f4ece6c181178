use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::tokens::TokenSigner;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::reports::render::PdfRenderer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub config: Config,
    pub tokens: TokenSigner,
    /// HTML→PDF backend for reports. Default: CommandPdfRenderer.
    pub pdf_renderer: Arc<dyn PdfRenderer>,
}
