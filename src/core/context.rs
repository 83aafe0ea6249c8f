//! 进程级应用上下文：启动时创建一次，退出时显式关闭
//!
//! 持有配置、LLM 客户端、Prompt 仓库、Agent 注册表、可选记忆库句柄以及共享的工具连接器。
//! 各个入口（控制台、HTTP、A2A）都从这里取依赖，不使用全局单例。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::agents::AgentRegistry;
use crate::config::{AppConfig, ToolsSection};
use crate::core::PipelineError;
use crate::llm::{LlmClient, OpenAiClient};
use crate::memory::{ensure_memory_store, MemoryRef};
use crate::prompts::PromptStore;
use crate::tools::{ToolConnector, ToolSource};

/// GitHub MCP 服务读取的 token 环境变量
const GITHUB_TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

pub struct AppContext {
    pub config: AppConfig,
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<PromptStore>,
    pub registry: AgentRegistry,
    pub memory: Option<MemoryRef>,
    connectors: Vec<Arc<ToolConnector>>,
    released: AtomicBool,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("model", &self.llm.model())
            .field("memory", &self.memory)
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AppContext {
    /// 校验配置并按 [llm] 段创建真实的模型客户端
    pub fn init(config: AppConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let llm = OpenAiClient::from_config(&config.llm);
        tracing::info!(
            provider = ?config.llm.provider,
            model = %config.llm.model,
            "LLM client ready"
        );
        Ok(Self::with_llm(config, Arc::new(llm)))
    }

    /// 使用给定的模型客户端（测试或自定义后端）
    pub fn with_llm(config: AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        let prompts = Arc::new(PromptStore::with_dir(config.pipeline.prompts_dir.clone()));
        let connectors = tool_sources(&config.tools)
            .into_iter()
            .map(|source| {
                Arc::new(ToolConnector::new(
                    source,
                    Duration::from_secs(config.tools.connect_timeout_secs),
                ))
            })
            .collect();
        let memory = ensure_memory_store(&config.memory);

        Self {
            config,
            llm,
            prompts,
            registry: AgentRegistry::new(),
            memory,
            connectors,
            released: AtomicBool::new(false),
        }
    }

    /// 进程内共享的工具连接器（首次 resolve 时才真正连接）
    pub fn tool_connectors(&self) -> &[Arc<ToolConnector>] {
        &self.connectors
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// 释放所有工具连接；重复调用无副作用
    pub async fn shutdown(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        for connector in &self.connectors {
            connector.release().await;
        }
        tracing::info!(connectors = self.connectors.len(), "Application context released");
    }
}

/// 由配置得出要连接的工具源
fn tool_sources(tools: &ToolsSection) -> Vec<ToolSource> {
    let mut sources = Vec::new();

    if tools.learn.enabled {
        sources.push(ToolSource::Http {
            name: "Microsoft Learn".to_string(),
            url: tools.learn.url.clone(),
        });
    }

    match tools.github.token.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(token) => sources.push(ToolSource::Stdio {
            name: "GitHub".to_string(),
            command: tools.github.command.clone(),
            args: tools.github.args.clone(),
            env: vec![(GITHUB_TOKEN_ENV.to_string(), token.to_string())],
        }),
        None => tracing::info!("{} not set, skipping GitHub tool", GITHUB_TOKEN_ENV),
    }

    sources
}
