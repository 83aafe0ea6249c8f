//! 对外事件流：把流水线事件（或单个 Agent 的增量输出）规整为 agent / text / error / done 四种事件
//!
//! HTTP SSE 与控制台入口共用这一层。每条对外流都恰好以一个 `done` 结束，之后不再产生事件。

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};

use crate::agents::AgentHandle;
use crate::memory::Message;
use crate::workflow::{EventStream, PipelineEvent};

pub const EVENT_AGENT: &str = "agent";
pub const EVENT_TEXT: &str = "text";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_DONE: &str = "done";

/// `done` 事件的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneStatus {
    Complete,
    Failed,
}

/// 对外事件：事件名 + JSON 数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    pub event: &'static str,
    pub data: Value,
}

impl StreamEvent {
    pub fn agent(agent: &str) -> Self {
        Self {
            event: EVENT_AGENT,
            data: json!({ "agent": agent }),
        }
    }

    pub fn text(agent: &str, text: &str) -> Self {
        Self {
            event: EVENT_TEXT,
            data: json!({ "agent": agent, "text": text }),
        }
    }

    pub fn error(agent: &str, message: &str) -> Self {
        Self {
            event: EVENT_ERROR,
            data: json!({ "agent": agent, "message": message }),
        }
    }

    pub fn done(status: DoneStatus) -> Self {
        Self {
            event: EVENT_DONE,
            data: json!({ "status": status }),
        }
    }

    pub fn is_done(&self) -> bool {
        self.event == EVENT_DONE
    }

    /// SSE data 字段的文本
    pub fn data_json(&self) -> String {
        self.data.to_string()
    }
}

pub type OutwardStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// 流水线事件 → 对外事件；StageCompleted 不转发
pub fn pipeline_events(mut events: EventStream) -> OutwardStream {
    Box::pin(stream! {
        while let Some(event) = events.next().await {
            match event {
                PipelineEvent::StageStarted { stage } => yield StreamEvent::agent(&stage),
                PipelineEvent::TextDelta { stage, text } => yield StreamEvent::text(&stage, &text),
                PipelineEvent::StageCompleted { .. } => {}
                PipelineEvent::RunCompleted => {
                    yield StreamEvent::done(DoneStatus::Complete);
                    return;
                }
                PipelineEvent::RunFailed { stage, error } => {
                    yield StreamEvent::error(&stage, &error);
                    yield StreamEvent::done(DoneStatus::Failed);
                    return;
                }
            }
        }
        tracing::warn!("pipeline event stream ended without a terminal event");
        yield StreamEvent::done(DoneStatus::Failed);
    })
}

/// 单个 Agent 独立运行：先合成一个 agent 事件，再逐段输出 text，最后 done
pub fn agent_events(handle: Arc<AgentHandle>, name: impl Into<String>, message: impl Into<String>) -> OutwardStream {
    let name = name.into();
    let message = message.into();
    Box::pin(stream! {
        yield StreamEvent::agent(&name);

        let conversation = [Message::user(message)];
        let mut fragments = match handle.run_stream(&conversation).await {
            Ok(fragments) => fragments,
            Err(e) => {
                tracing::error!(agent = %name, "Agent stream failed to start: {}", e);
                yield StreamEvent::error(&name, &e.to_string());
                yield StreamEvent::done(DoneStatus::Failed);
                return;
            }
        };

        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) if text.is_empty() => {}
                Ok(text) => yield StreamEvent::text(&name, &text),
                Err(e) => {
                    tracing::error!(agent = %name, "Agent stream failed: {}", e);
                    yield StreamEvent::error(&name, &e.to_string());
                    yield StreamEvent::done(DoneStatus::Failed);
                    return;
                }
            }
        }
        yield StreamEvent::done(DoneStatus::Complete);
    })
}
