//! Shared fixtures for tests: app state wiring and a throwaway Postgres.
//!
//! Database tests start one `postgres:16-alpine` container each and run the
//! embedded migrations against it. Without a reachable Docker daemon
//! [`postgres`] returns `None` and the calling test returns early.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::auth::tokens::TokenSigner;
use crate::config::Config;
use crate::db::run_migrations;
use crate::llm_client::LlmClient;
use crate::reports::render::CommandPdfRenderer;
use crate::state::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// A migrated database that lives as long as this value.
pub struct TestDb {
    pub pool: PgPool,
    _container: ContainerAsync<GenericImage>,
}

pub async fn postgres() -> Option<TestDb> {
    let image = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "postgres")
        .with_env_var("POSTGRES_PASSWORD", "postgres");

    let container = match image.start().await {
        Ok(container) => container,
        Err(e) => {
            eprintln!("skipping database test, container unavailable: {e}");
            return None;
        }
    };
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres?sslmode=disable");

    // The entrypoint restarts the server once after initdb.
    let mut attempts = 0;
    let pool = loop {
        match PgPoolOptions::new().max_connections(20).connect(&url).await {
            Ok(pool) => break pool,
            Err(e) if attempts < 50 => {
                attempts += 1;
                tracing::debug!("waiting for postgres: {e}");
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(e) => panic!("postgres never became reachable: {e}"),
        }
    };
    run_migrations(&pool).await.expect("migrations apply");

    Some(TestDb {
        pool,
        _container: container,
    })
}

pub fn config(media_root: PathBuf) -> Config {
    Config {
        database_url: "postgres://localhost:1/unused".into(),
        jwt_secret: TEST_JWT_SECRET.into(),
        access_token_ttl_secs: 3600,
        refresh_token_ttl_secs: 3600,
        cors_allowed_origins: vec![],
        llm_api_key: String::new(),
        llm_model: "m".into(),
        llm_base_url: "http://127.0.0.1:9".into(),
        media_root,
        media_url: "/media/".into(),
        pdf_render_command: "weasyprint".into(),
        port: 0,
        rust_log: "info".into(),
    }
}

pub fn app_state(db: PgPool, media_root: PathBuf) -> AppState {
    let config = config(media_root);
    AppState {
        db,
        llm: LlmClient::new(
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            config.llm_base_url.clone(),
        ),
        tokens: TokenSigner::new(&config.jwt_secret, 3600, 3600),
        pdf_renderer: Arc::new(CommandPdfRenderer::new(config.pdf_render_command.clone())),
        config,
    }
}

/// State backed by a pool that never connects, for routes that fail before any query.
pub fn offline_state(media_root: PathBuf) -> AppState {
    let db = PgPoolOptions::new()
        .connect_lazy("postgres://localhost:1/unused")
        .expect("lazy pool");
    app_state(db, media_root)
}
