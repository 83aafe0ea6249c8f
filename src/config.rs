//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PIPELINE__*` 覆盖（双下划线表示嵌套，如 `PIPELINE__LLM__MODEL=gpt-4o`），
//! 最后叠加 Azure AI Foundry 约定的平铺变量（`AZURE_AI_PROJECT_ENDPOINT` 等），便于沿用现有 .env。

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// 未指定主题时使用的默认主题
pub const DEFAULT_TOPIC: &str = "Azure Functions serverless computing";

/// 配置错误：启动期致命
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required (set it in config/default.toml or via environment)")]
    Missing(&'static str),

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),
}

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub memory: MemorySection,
    pub telemetry: TelemetrySection,
    pub server: ServerSection,
    pub a2a: A2aSection,
    pub pipeline: PipelineSection,
}

/// 模型服务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Azure OpenAI / AI Foundry 部署（endpoint + deployment + api-version）
    #[default]
    Azure,
    /// 任意 OpenAI 兼容端点
    Openai,
}

/// [llm] 段：托管模型端点、模型（部署）名、凭据
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: Provider,
    /// 服务端点（必填）
    pub endpoint: String,
    /// 模型或部署名（必填）
    pub model: String,
    pub api_key: Option<String>,
    pub api_version: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            endpoint: String::new(),
            model: "gpt-4o".to_string(),
            api_key: None,
            api_version: "2024-10-21".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// [tools] 段：动态发现的 MCP 工具源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 连接（initialize + tools/list）超时（秒）
    pub connect_timeout_secs: u64,
    pub learn: LearnToolSection,
    pub github: GithubToolSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 20,
            learn: LearnToolSection::default(),
            github: GithubToolSection::default(),
        }
    }
}

/// [tools.learn] 段：Microsoft Learn 文档检索（Streamable HTTP MCP）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearnToolSection {
    pub enabled: bool,
    pub url: String,
}

impl Default for LearnToolSection {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://learn.microsoft.com/api/mcp".to_string(),
        }
    }
}

/// [tools.github] 段：GitHub 仓库访问（stdio MCP），无 token 时跳过
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubToolSection {
    pub command: String,
    pub args: Vec<String>,
    pub token: Option<String>,
}

impl Default for GithubToolSection {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                "@modelcontextprotocol/server-github".to_string(),
            ],
            token: None,
        }
    }
}

/// [memory] 段：托管记忆库（缺少 embedding 模型时降级为无记忆）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub enabled: bool,
    pub store_name: String,
    pub embedding_model: Option<String>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            enabled: false,
            store_name: "content-pipeline-memory".to_string(),
            embedding_model: None,
        }
    }
}

/// [telemetry] 段：可选导出目标，均未配置时仅输出到控制台
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelemetrySection {
    /// JSON 行格式的 span/事件导出文件
    pub export_path: Option<PathBuf>,
    pub connection_string: Option<String>,
}

/// [server] 段：SSE HTTP API 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// [a2a] 段：A2A 服务监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct A2aSection {
    pub host: String,
    pub port: u16,
}

impl Default for A2aSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
        }
    }
}

impl A2aSection {
    /// Agent Card 中对外公布的地址
    pub fn public_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// 阶段无输出时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SilentStagePolicy {
    /// 记录日志后继续下一阶段
    #[default]
    Continue,
    /// 以失败事件终止本次运行
    Abort,
}

/// [pipeline] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub silent_stage: SilentStagePolicy,
    /// Prompt 模板目录，缺失时使用内置模板
    pub prompts_dir: PathBuf,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            silent_stage: SilentStagePolicy::default(),
            prompts_dir: PathBuf::from("config/prompts"),
        }
    }
}

impl AppConfig {
    /// 启动前校验：端点与模型缺一不可（快速失败，不做部分降级）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("AZURE_AI_PROJECT_ENDPOINT (llm.endpoint)"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Missing("AZURE_AI_MODEL_DEPLOYMENT_NAME (llm.model)"));
        }
        if !self.llm.endpoint.starts_with("http://") && !self.llm.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "llm.endpoint",
                reason: format!("expected an http(s) URL, got {:?}", self.llm.endpoint),
            });
        }
        Ok(())
    }
}

/// 平铺环境变量 → 配置键（同一键按顺序取第一个存在的变量）
const ENV_ALIASES: &[(&str, &[&str])] = &[
    ("llm.endpoint", &["AZURE_AI_PROJECT_ENDPOINT", "PROJECT_ENDPOINT"]),
    ("llm.model", &["AZURE_AI_MODEL_DEPLOYMENT_NAME", "MODEL_DEPLOYMENT_NAME"]),
    ("llm.api_key", &["AZURE_OPENAI_API_KEY", "OPENAI_API_KEY"]),
    ("tools.github.token", &["GITHUB_PERSONAL_ACCESS_TOKEN"]),
    ("telemetry.connection_string", &["APPLICATION_INSIGHTS_CONNECTION_STRING"]),
];

fn env_alias(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| std::env::var(n).ok())
        .find(|v| !v.trim().is_empty())
}

/// 从 config 目录加载配置，环境变量可覆盖；不做校验（由 `AppContext::init` 校验）
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 PIPELINE__*（双下划线表示嵌套键）
/// 4. 叠加 AZURE_AI_PROJECT_ENDPOINT 等平铺变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PIPELINE")
            .separator("__")
            .try_parsing(true),
    );

    for (key, names) in ENV_ALIASES {
        builder = builder.set_override_option(*key, env_alias(names))?;
    }

    let c = builder.build()?;
    Ok(c.try_deserialize()?)
}
