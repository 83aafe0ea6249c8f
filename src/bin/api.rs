//! Content Pipeline SSE HTTP API
//!
//! 用法：pipeline-api [config.toml]
//! 监听地址取自 [server] 段（默认 0.0.0.0:8000）

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use content_pipeline::{
    api::{router, AppState},
    config::load_config,
    core::{run_with_graceful_shutdown, AppContext, ShutdownManager},
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    observability::init(&config.telemetry);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let ctx = Arc::new(AppContext::init(config).context("Invalid configuration")?);
    let shutdown = Arc::new(ShutdownManager::new());

    let app_ctx = Arc::clone(&ctx);
    run_with_graceful_shutdown(ctx, shutdown, |signal| async move {
        let state = AppState::new(app_ctx)
            .await
            .context("Failed to create agents")?;
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Content pipeline API: http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.wait_for_shutdown().await })
            .await
            .context("Server error")
    })
    .await
}
