//! Content Pipeline 控制台入口
//!
//! 读取主题，运行 Researcher → Writer → Reviewer 流水线，按 Agent 切换打印标题并实时输出文本。
//! 用法：content-pipeline [config.toml]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use content_pipeline::{
    agents::create_content_agents,
    config::{load_config, DEFAULT_TOPIC},
    core::{run_with_graceful_shutdown, AppContext, ShutdownManager},
    observability,
    stream::{pipeline_events, DoneStatus, EVENT_AGENT, EVENT_DONE, EVENT_ERROR, EVENT_TEXT},
};
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

const RULE: usize = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    observability::init(&config.telemetry);

    let ctx = Arc::new(AppContext::init(config).context("Invalid configuration")?);
    let shutdown = Arc::new(ShutdownManager::new());

    let app_ctx = Arc::clone(&ctx);
    let status = run_with_graceful_shutdown(ctx, shutdown, |signal| async move {
        let agents = create_content_agents(&app_ctx)
            .await
            .context("Failed to create agents")?;
        let pipeline = agents
            .pipeline(app_ctx.config.pipeline.silent_stage)
            .context("Failed to build pipeline")?;

        let topic = tokio::select! {
            topic = read_topic() => topic?,
            _ = signal.wait_for_shutdown() => return Ok(None),
        };
        let message = app_ctx
            .prompts
            .load("pipeline_message", &[("topic", topic.as_str())])
            .context("Failed to render pipeline message")?;

        println!("\n{}", "=".repeat(RULE));
        println!("Running content pipeline for: {}", topic);
        println!("{}\n", "=".repeat(RULE));

        let mut status = None;
        let run = async {
            let mut events = pipeline_events(pipeline.run(message));
            let mut last_agent: Option<String> = None;
            while let Some(ev) = events.next().await {
                match ev.event {
                    EVENT_AGENT => {
                        let agent = ev.data["agent"].as_str().unwrap_or_default().to_string();
                        if last_agent.is_some() {
                            println!("\n{}", "-".repeat(40));
                        }
                        println!("\n[{}]:", agent);
                        last_agent = Some(agent);
                    }
                    EVENT_TEXT => {
                        print!("{}", ev.data["text"].as_str().unwrap_or_default());
                        let _ = std::io::stdout().flush();
                    }
                    EVENT_ERROR => {
                        eprintln!(
                            "\n[{}] error: {}",
                            ev.data["agent"].as_str().unwrap_or_default(),
                            ev.data["message"].as_str().unwrap_or_default()
                        );
                    }
                    EVENT_DONE => {
                        status = Some(if ev.data["status"] == "complete" {
                            DoneStatus::Complete
                        } else {
                            DoneStatus::Failed
                        });
                    }
                    _ => {}
                }
            }
        };
        // 收到关闭信号时丢弃事件流，进行中的模型调用随之取消
        tokio::select! {
            _ = run => {}
            _ = signal.wait_for_shutdown() => {}
        }
        Ok(status)
    })
    .await?;

    println!("\n\n{}", "=".repeat(RULE));
    match status {
        Some(DoneStatus::Complete) => {
            println!("Pipeline complete!");
            Ok(())
        }
        Some(DoneStatus::Failed) => anyhow::bail!("Pipeline failed"),
        None => {
            println!("Pipeline interrupted.");
            Ok(())
        }
    }
}

/// 读取一行主题，空行使用默认主题
async fn read_topic() -> anyhow::Result<String> {
    print!("\nEnter a topic [{}]: ", DEFAULT_TOPIC);
    std::io::stdout().flush()?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read topic")?;
    let topic = line.trim();
    Ok(if topic.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        topic.to_string()
    })
}
