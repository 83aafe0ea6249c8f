//! 流水线各层错误类型
//!
//! 传播策略：配置错误在启动期终止进程；工具连接失败与阶段无输出在本地吸收并记录日志；
//! 上游服务错误（LlmError）只以 RunFailed / error 事件终止当前请求的事件流，不影响进程与其它并发运行。

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::llm::LlmError;
pub use crate::prompts::PromptError;
pub use crate::tools::ToolConnectError;
pub use crate::workflow::WorkflowError;

/// 应用级错误：入口与 HTTP 层统一使用
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// 请求了未注册的 Agent
    #[error("Agent '{name}' not found. Available: {available:?}")]
    AgentNotFound {
        name: String,
        available: Vec<String>,
    },
}
