//! Content Pipeline - 多智能体内容流水线
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 应用上下文生命周期、错误类型、优雅关闭
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Azure OpenAI / Mock）
//! - **memory**: 单次运行的对话上下文与可选的托管记忆库句柄
//! - **prompts**: Prompt 模板加载与占位符替换
//! - **tools**: 工具描述、注册表与 MCP 工具发现
//! - **agents**: Agent 句柄、注册表与 Researcher / Writer / Reviewer 角色
//! - **workflow**: 顺序流水线构建与运行（惰性事件流）
//! - **stream**: 对外事件流（agent / text / error / done）
//! - **observability**: 日志初始化与可选的 JSON 导出
//! - **api**: SSE HTTP API（feature `web`）
//! - **a2a**: A2A JSON-RPC 服务与客户端（feature `a2a`）

#[cfg(feature = "a2a")]
pub mod a2a;
pub mod agents;
#[cfg(feature = "web")]
pub mod api;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompts;
pub mod stream;
pub mod tools;
pub mod workflow;

pub use crate::agents::{AgentHandle, AgentRegistry, AgentSpec, ContentAgents};
pub use crate::core::{AppContext, PipelineError};
pub use crate::workflow::{Pipeline, PipelineEvent, SequentialBuilder};
