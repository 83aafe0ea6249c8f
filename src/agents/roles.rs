//! 三个内容角色：Researcher（带 MCP 工具与可选记忆）、Writer、Reviewer

use std::sync::Arc;

use crate::agents::{create_agent, AgentHandle, AgentSpec};
use crate::config::SilentStagePolicy;
use crate::core::AppContext;
use crate::prompts::PromptError;
use crate::tools::ToolRef;
use crate::workflow::{Pipeline, SequentialBuilder, WorkflowError};

/// 内容流水线名称
pub const CONTENT_PIPELINE: &str = "content-pipeline";

pub const RESEARCHER: &str = "Researcher";
pub const WRITER: &str = "Writer";
pub const REVIEWER: &str = "Reviewer";

/// Researcher：挂载进程级共享的动态工具（文档检索、GitHub），尽力而为
pub async fn create_researcher(ctx: &AppContext) -> Result<Arc<AgentHandle>, PromptError> {
    let instructions = ctx.prompts.load("researcher", &[])?;
    let tools = ctx
        .tool_connectors()
        .iter()
        .cloned()
        .map(ToolRef::Discovered)
        .collect();
    let spec = AgentSpec::new(RESEARCHER, instructions)
        .with_tools(tools)
        .with_memory(ctx.memory.clone());
    Ok(create_agent(&ctx.registry, Arc::clone(&ctx.llm), spec).await)
}

/// Writer：把调研笔记写成面向开发者的文章
pub async fn create_writer(ctx: &AppContext) -> Result<Arc<AgentHandle>, PromptError> {
    let instructions = ctx.prompts.load("writer", &[])?;
    Ok(create_agent(&ctx.registry, Arc::clone(&ctx.llm), AgentSpec::new(WRITER, instructions)).await)
}

/// Reviewer：审校并输出最终稿
pub async fn create_reviewer(ctx: &AppContext) -> Result<Arc<AgentHandle>, PromptError> {
    let instructions = ctx.prompts.load("reviewer", &[])?;
    Ok(create_agent(&ctx.registry, Arc::clone(&ctx.llm), AgentSpec::new(REVIEWER, instructions)).await)
}

/// 流水线用到的三个 Agent
#[derive(Debug, Clone)]
pub struct ContentAgents {
    pub researcher: Arc<AgentHandle>,
    pub writer: Arc<AgentHandle>,
    pub reviewer: Arc<AgentHandle>,
}

impl ContentAgents {
    /// 流水线顺序：Researcher → Writer → Reviewer
    pub fn ordered(&self) -> Vec<Arc<AgentHandle>> {
        vec![
            Arc::clone(&self.researcher),
            Arc::clone(&self.writer),
            Arc::clone(&self.reviewer),
        ]
    }

    /// Researcher → Writer → Reviewer 顺序流水线
    pub fn pipeline(&self, policy: SilentStagePolicy) -> Result<Pipeline, WorkflowError> {
        SequentialBuilder::new(CONTENT_PIPELINE)
            .participants(self.ordered())
            .silent_stage_policy(policy)
            .build()
    }
}

pub async fn create_content_agents(ctx: &AppContext) -> Result<ContentAgents, PromptError> {
    Ok(ContentAgents {
        researcher: create_researcher(ctx).await?,
        writer: create_writer(ctx).await?,
        reviewer: create_reviewer(ctx).await?,
    })
}
