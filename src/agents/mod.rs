//! Agent 句柄：配置好的角色（名称 + instructions + 工具 + 可选记忆），可单次或流式运行
//!
//! 句柄构造后不可变，以 Arc 在所有运行间共享；每次调用都显式传入对话上下文，句柄自身不保存会话状态。

pub mod registry;
pub mod roles;

use std::sync::Arc;

use crate::llm::{LlmClient, LlmError, TextStream};
use crate::memory::{MemoryRef, Message};
use crate::tools::{ToolRef, ToolRegistry};

pub use registry::AgentRegistry;
pub use roles::{
    create_content_agents, create_researcher, create_reviewer, create_writer, ContentAgents,
    CONTENT_PIPELINE, RESEARCHER, REVIEWER, WRITER,
};

/// 创建 Agent 所需的定义
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    pub role_name: String,
    pub instructions: String,
    pub tools: Vec<ToolRef>,
    pub memory: Option<MemoryRef>,
}

impl AgentSpec {
    pub fn new(role_name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            instructions: instructions.into(),
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolRef>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_memory(mut self, memory: Option<MemoryRef>) -> Self {
        self.memory = memory;
        self
    }
}

/// 已创建的 Agent
pub struct AgentHandle {
    role_name: String,
    instructions: String,
    tool_refs: Vec<ToolRef>,
    tools: ToolRegistry,
    memory: Option<MemoryRef>,
    llm: Arc<dyn LlmClient>,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("role_name", &self.role_name)
            .field("tools", &self.tools.tool_names())
            .field("memory", &self.memory)
            .field("model", &self.llm.model())
            .finish()
    }
}

impl AgentHandle {
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// 最终下发给模型的 instructions（含 Available tools 段落）
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tool_refs(&self) -> &[ToolRef] {
        &self.tool_refs
    }

    /// 已解析的工具
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn memory(&self) -> Option<&MemoryRef> {
        self.memory.as_ref()
    }

    fn prompt(&self, conversation: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(self.instructions.clone()));
        messages.extend(conversation.iter().cloned());
        messages
    }

    /// 单次运行：返回带阶段标记的 assistant 消息
    pub async fn run(&self, conversation: &[Message]) -> Result<Message, LlmError> {
        let text = self.llm.complete(&self.prompt(conversation)).await?;
        Ok(Message::assistant(text).from_stage(self.role_name.clone()))
    }

    /// 流式运行：返回增量文本流
    pub async fn run_stream(&self, conversation: &[Message]) -> Result<TextStream, LlmError> {
        tracing::debug!(agent = %self.role_name, context = conversation.len(), "agent stream opened");
        self.llm.complete_stream(&self.prompt(conversation)).await
    }
}

/// 创建 Agent 并注册（同名重复注册为原地更新）
///
/// 动态发现的工具先经连接器解析；解析失败只记录日志，Agent 照常创建。
pub async fn create_agent(
    registry: &AgentRegistry,
    llm: Arc<dyn LlmClient>,
    spec: AgentSpec,
) -> Arc<AgentHandle> {
    let mut tools = ToolRegistry::new();
    for tool_ref in &spec.tools {
        match tool_ref {
            ToolRef::Declarative(descriptor) => tools.register(descriptor.clone()),
            ToolRef::Discovered(connector) => match connector.resolve().await {
                Ok(found) => found.into_iter().for_each(|t| tools.register(t)),
                Err(e) => tracing::warn!(
                    agent = %spec.role_name,
                    "Tool connect failed, continuing without it: {}",
                    e
                ),
            },
        }
    }

    let instructions = match tools.prompt_section() {
        Some(section) => format!("{}\n\n{}", spec.instructions.trim_end(), section),
        None => spec.instructions.clone(),
    };

    let handle = AgentHandle {
        role_name: spec.role_name,
        instructions,
        tool_refs: spec.tools,
        tools,
        memory: spec.memory,
        llm,
    };
    let (handle, version) = registry.register(handle).await;
    tracing::info!(
        agent = %handle.role_name(),
        version,
        tools = handle.tools().len(),
        "Agent registered"
    );
    handle
}
