//! Agent-to-Agent（A2A）协议：把 Reviewer 作为远端 Agent 暴露，并提供对应客户端

pub mod client;
pub mod events;
pub mod executor;
pub mod server;
pub mod store;
pub mod types;

pub use client::A2aClient;
pub use events::{EventQueue, TaskEvent};
pub use executor::{AgentExecutor, RequestContext, ReviewerExecutor, REVIEWED_ARTIFACT};
pub use server::{A2aServer, AGENT_CARD_PATH};
pub use store::InMemoryTaskStore;
pub use types::{
    A2aError, A2aMessage, AgentCard, Artifact, JsonRpcRequest, JsonRpcResponse, Part, Task,
    TaskState, TaskStatus,
};

use std::sync::Arc;

use crate::agents::{create_agent, AgentHandle, AgentSpec};
use crate::core::AppContext;
use crate::prompts::PromptError;

/// 使用 a2a_reviewer 模板创建对外暴露的 Reviewer
pub async fn create_remote_reviewer(ctx: &AppContext) -> Result<Arc<AgentHandle>, PromptError> {
    let instructions = ctx.prompts.load("a2a_reviewer", &[])?;
    Ok(create_agent(&ctx.registry, Arc::clone(&ctx.llm), AgentSpec::new("Reviewer", instructions)).await)
}

/// 以 Reviewer 组装 A2A 服务
pub async fn reviewer_server(ctx: &AppContext) -> Result<A2aServer, PromptError> {
    let agent = create_remote_reviewer(ctx).await?;
    let card = AgentCard::reviewer(ctx.config.a2a.public_url());
    Ok(A2aServer::new(card, Arc::new(ReviewerExecutor::new(agent))))
}
