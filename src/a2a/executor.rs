//! Agent 执行器：把一个 Agent 句柄的运行桥接为 A2A 任务事件

use std::sync::Arc;

use async_trait::async_trait;

use crate::a2a::events::{EventQueue, TaskEvent};
use crate::a2a::types::{A2aError, A2aMessage, Artifact, TaskState, TaskStatus};
use crate::agents::AgentHandle;
use crate::memory::Message;

/// 产物名称
pub const REVIEWED_ARTIFACT: &str = "reviewed-article";

/// 单次执行的上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub context_id: String,
    pub message: A2aMessage,
}

impl RequestContext {
    pub fn user_input(&self) -> String {
        self.message.text()
    }

    pub fn status(&self, status: TaskStatus, is_final: bool) -> TaskEvent {
        TaskEvent::Status {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            status,
            is_final,
        }
    }

    pub fn artifact(&self, artifact: Artifact) -> TaskEvent {
        TaskEvent::Artifact {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            artifact,
        }
    }
}

#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// 运行任务并通过队列发布状态与产物
    async fn execute(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError>;

    /// 取消任务，发布 canceled 状态
    async fn cancel(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError> {
        queue.enqueue_event(context.status(TaskStatus::new(TaskState::Canceled), true));
        Ok(())
    }
}

/// 运行 Reviewer 句柄：working → 产物 reviewed-article → completed；上游失败时发布 failed
pub struct ReviewerExecutor {
    agent: Arc<AgentHandle>,
}

impl ReviewerExecutor {
    pub fn new(agent: Arc<AgentHandle>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl AgentExecutor for ReviewerExecutor {
    async fn execute(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError> {
        queue.enqueue_event(context.status(TaskStatus::new(TaskState::Working), false));

        let input = [Message::user(context.user_input())];
        match self.agent.run(&input).await {
            Ok(reply) => {
                queue.enqueue_event(context.artifact(Artifact::text(REVIEWED_ARTIFACT, reply.content)));
                queue.enqueue_event(context.status(TaskStatus::new(TaskState::Completed), true));
            }
            Err(e) => {
                tracing::error!(task_id = %context.task_id, "Reviewer run failed: {}", e);
                queue.enqueue_event(context.status(
                    TaskStatus::new(TaskState::Failed).with_message(e.to_string()),
                    true,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{create_agent, AgentRegistry, AgentSpec};
    use crate::llm::{LlmClient, MockBehavior, MockLlmClient};

    async fn reviewer(behavior: MockBehavior) -> ReviewerExecutor {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(behavior));
        let agent = create_agent(&AgentRegistry::new(), llm, AgentSpec::new("Reviewer", "review")).await;
        ReviewerExecutor::new(agent)
    }

    fn context() -> RequestContext {
        RequestContext {
            task_id: "t1".into(),
            context_id: "c1".into(),
            message: A2aMessage::user("draft"),
        }
    }

    async fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn test_execute_publishes_working_artifact_completed() {
        let exec = reviewer(MockBehavior::Fixed("polished".into())).await;
        let (queue, rx) = EventQueue::new();
        exec.execute(context(), queue).await.unwrap();

        let events = drain(rx).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], TaskEvent::Status { status, is_final: false, .. } if status.state == TaskState::Working));
        match &events[1] {
            TaskEvent::Artifact { artifact, .. } => {
                assert_eq!(artifact.name.as_deref(), Some(REVIEWED_ARTIFACT));
            }
            other => panic!("expected artifact, got {:?}", other),
        }
        assert!(matches!(&events[2], TaskEvent::Status { status, is_final: true, .. } if status.state == TaskState::Completed));
    }

    #[tokio::test]
    async fn test_upstream_failure_publishes_failed() {
        let exec = reviewer(MockBehavior::FailOnOpen).await;
        let (queue, rx) = EventQueue::new();
        exec.execute(context(), queue).await.unwrap();

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            TaskEvent::Status { status, .. } => {
                assert_eq!(status.state, TaskState::Failed);
                assert!(status.message.as_ref().unwrap().text().contains("mock failure"));
            }
            other => panic!("expected failed status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_cancel_publishes_canceled() {
        let exec = reviewer(MockBehavior::Echo).await;
        let (queue, rx) = EventQueue::new();
        exec.cancel(context(), queue).await.unwrap();
        let events = drain(rx).await;
        assert!(matches!(&events[0], TaskEvent::Status { status, .. } if status.state == TaskState::Canceled));
    }
}
