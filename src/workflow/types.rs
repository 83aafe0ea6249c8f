//! 流水线事件与错误类型

use std::pin::Pin;

use futures_util::Stream;
use serde::Serialize;
use thiserror::Error;

use crate::memory::Message;

/// 流水线运行过程中产生的事件（封闭集合，调用方需穷尽匹配）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// 阶段开始
    StageStarted { stage: String },
    /// 阶段输出的一小段文本
    TextDelta { stage: String, text: String },
    /// 阶段结束，附带本阶段新增的消息
    StageCompleted {
        stage: String,
        new_messages: Vec<Message>,
    },
    /// 全部阶段完成
    RunCompleted,
    /// 运行失败（终止事件）
    RunFailed { stage: String, error: String },
}

impl PipelineEvent {
    /// 是否为终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::RunCompleted | PipelineEvent::RunFailed { .. })
    }

    /// 事件所属阶段（RunCompleted 没有阶段）
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineEvent::StageStarted { stage }
            | PipelineEvent::TextDelta { stage, .. }
            | PipelineEvent::StageCompleted { stage, .. }
            | PipelineEvent::RunFailed { stage, .. } => Some(stage),
            PipelineEvent::RunCompleted => None,
        }
    }
}

/// 惰性事件流：被轮询时才推进，丢弃即取消
pub type EventStream = Pin<Box<dyn Stream<Item = PipelineEvent> + Send>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Pipeline '{0}' has no participants")]
    NoParticipants(String),
}
