//! A2A Reviewer 服务：把 Reviewer Agent 以 A2A 协议对外暴露
//!
//! 用法：a2a-reviewer [config.toml]
//! 监听地址取自 [a2a] 段（默认 localhost:9000）

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use content_pipeline::{
    a2a::{reviewer_server, AGENT_CARD_PATH},
    config::load_config,
    core::{run_with_graceful_shutdown, AppContext, ShutdownManager},
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    observability::init(&config.telemetry);

    let addr = format!("{}:{}", config.a2a.host, config.a2a.port);
    let public_url = config.a2a.public_url();
    let ctx = Arc::new(AppContext::init(config).context("Invalid configuration")?);
    let shutdown = Arc::new(ShutdownManager::new());

    let app_ctx = Arc::clone(&ctx);
    run_with_graceful_shutdown(ctx, shutdown, |signal| async move {
        let server = Arc::new(
            reviewer_server(&app_ctx)
                .await
                .context("Failed to create reviewer")?,
        );

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        println!("\n{}", "=".repeat(50));
        println!("A2A Reviewer server running at {}", public_url);
        println!("Agent card: {}{}", public_url, AGENT_CARD_PATH);
        println!("{}\n", "=".repeat(50));

        axum::serve(listener, server.router())
            .with_graceful_shutdown(async move { signal.wait_for_shutdown().await })
            .await
            .context("Server error")
    })
    .await
}
