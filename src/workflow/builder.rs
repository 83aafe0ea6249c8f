//! 顺序流水线构建器
//!
//! 提供流畅的 API 按声明顺序添加参与者

use std::sync::Arc;

use crate::agents::AgentHandle;
use crate::config::SilentStagePolicy;
use crate::workflow::engine::{Pipeline, PipelineStage};
use crate::workflow::types::WorkflowError;

pub struct SequentialBuilder {
    name: String,
    participants: Vec<Arc<AgentHandle>>,
    silent_stage: SilentStagePolicy,
}

impl SequentialBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            participants: Vec::new(),
            silent_stage: SilentStagePolicy::default(),
        }
    }

    /// 追加一个阶段（执行顺序即添加顺序）
    pub fn participant(mut self, agent: Arc<AgentHandle>) -> Self {
        self.participants.push(agent);
        self
    }

    pub fn participants(mut self, agents: impl IntoIterator<Item = Arc<AgentHandle>>) -> Self {
        self.participants.extend(agents);
        self
    }

    /// 阶段无输出时的处理策略
    pub fn silent_stage_policy(mut self, policy: SilentStagePolicy) -> Self {
        self.silent_stage = policy;
        self
    }

    pub fn build(self) -> Result<Pipeline, WorkflowError> {
        if self.participants.is_empty() {
            return Err(WorkflowError::NoParticipants(self.name));
        }
        let stages = self
            .participants
            .into_iter()
            .map(|agent| PipelineStage { agent })
            .collect();
        Ok(Pipeline::new(self.name, stages, self.silent_stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pipeline_is_rejected() {
        let err = SequentialBuilder::new("content").build().unwrap_err();
        assert_eq!(err, WorkflowError::NoParticipants("content".into()));
    }
}
