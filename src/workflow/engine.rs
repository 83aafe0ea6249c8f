//! 顺序流水线引擎
//!
//! Pipeline 是不可变的定义，可被任意多个请求共享；每次 run 都创建独立的 PipelineRun（对话上下文），
//! 运行之间互不可见。事件流是惰性的：消费者轮询才推进，丢弃事件流即取消当前阶段的模型调用。

use std::sync::Arc;

use async_stream::stream;
use futures_util::StreamExt;

use crate::agents::AgentHandle;
use crate::config::SilentStagePolicy;
use crate::memory::{Conversation, Message, Role};
use crate::workflow::types::{EventStream, PipelineEvent};

/// 流水线中的一个阶段
#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub(crate) agent: Arc<AgentHandle>,
}

impl PipelineStage {
    pub fn name(&self) -> &str {
        self.agent.role_name()
    }

    pub fn agent(&self) -> &Arc<AgentHandle> {
        &self.agent
    }
}

/// 一次运行的可变状态，随事件流一起释放
struct PipelineRun {
    conversation: Conversation,
    stage_index: usize,
}

/// 事件流被提前丢弃时记录日志
struct RunGuard {
    conversation_id: String,
    stage: Option<String>,
    finished: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                conversation_id = %self.conversation_id,
                stage = self.stage.as_deref().unwrap_or("-"),
                "pipeline stream dropped before terminal event"
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<PipelineStage>,
    silent_stage: SilentStagePolicy,
}

impl Pipeline {
    pub(crate) fn new(name: String, stages: Vec<PipelineStage>, silent_stage: SilentStagePolicy) -> Self {
        Self {
            name,
            stages,
            silent_stage,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn silent_stage_policy(&self) -> SilentStagePolicy {
        self.silent_stage
    }

    /// 启动一次运行，返回惰性事件流
    ///
    /// 成功时依次产生每个阶段的 StageStarted / TextDelta* / StageCompleted，最后是 RunCompleted；
    /// 失败时以唯一的 RunFailed 结束。
    pub fn run(&self, initial_message: impl Into<String>) -> EventStream {
        let pipeline = self.name.clone();
        let stages = self.stages.clone();
        let policy = self.silent_stage;
        let initial_message = initial_message.into();

        Box::pin(stream! {
            let mut run = PipelineRun {
                conversation: Conversation::new(initial_message),
                stage_index: 0,
            };
            let mut guard = RunGuard {
                conversation_id: run.conversation.id().to_string(),
                stage: None,
                finished: false,
            };
            let run_span = tracing::info_span!(
                "pipeline_run",
                pipeline = %pipeline,
                conversation_id = %guard.conversation_id
            );
            tracing::info!(parent: &run_span, stages = stages.len(), "Pipeline run started");

            for (index, stage) in stages.iter().enumerate() {
                run.stage_index = index;
                let name = stage.name().to_string();
                guard.stage = Some(name.clone());
                let stage_span = tracing::info_span!(parent: &run_span, "stage", stage = %name);
                tracing::debug!(parent: &stage_span, stage_index = run.stage_index, "stage started");
                yield PipelineEvent::StageStarted { stage: name.clone() };

                let mut fragments = match stage.agent.run_stream(run.conversation.messages()).await {
                    Ok(fragments) => fragments,
                    Err(e) => {
                        tracing::error!(parent: &stage_span, "Stage failed to start: {}", e);
                        guard.finished = true;
                        yield PipelineEvent::RunFailed { stage: name, error: e.to_string() };
                        return;
                    }
                };

                let mut reply = String::new();
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(text) if text.is_empty() => {}
                        Ok(text) => {
                            reply.push_str(&text);
                            yield PipelineEvent::TextDelta { stage: name.clone(), text };
                        }
                        Err(e) => {
                            tracing::error!(parent: &stage_span, "Stage stream failed: {}", e);
                            guard.finished = true;
                            yield PipelineEvent::RunFailed { stage: name, error: e.to_string() };
                            return;
                        }
                    }
                }

                // 阶段结束时的完整消息列表，按已记录条数切出新增部分
                let mut full = run.conversation.messages().to_vec();
                if !reply.is_empty() {
                    full.push(Message::assistant(reply).from_stage(name.clone()));
                }
                let new_messages = run.conversation.absorb(&full);
                let silent = !new_messages.iter().any(|m| m.role == Role::Assistant);
                if silent {
                    tracing::warn!(parent: &stage_span, policy = ?policy, "stage produced no assistant output");
                }
                yield PipelineEvent::StageCompleted { stage: name.clone(), new_messages };

                if silent && policy == SilentStagePolicy::Abort {
                    guard.finished = true;
                    yield PipelineEvent::RunFailed {
                        stage: name,
                        error: "stage produced no assistant output".to_string(),
                    };
                    return;
                }
            }

            guard.finished = true;
            tracing::info!(parent: &run_span, messages = run.conversation.len(), "Pipeline run completed");
            yield PipelineEvent::RunCompleted;
        })
    }

    /// 运行到结束并收集全部事件
    pub async fn run_buffered(&self, initial_message: impl Into<String>) -> Vec<PipelineEvent> {
        self.run(initial_message).collect().await
    }
}
