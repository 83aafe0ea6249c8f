//! 进程内任务存储：按事件更新任务，终止状态之后的状态事件被忽略

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::a2a::events::TaskEvent;
use crate::a2a::types::{Task, TaskState, TaskStatus};

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// 把执行器事件应用到任务上；未知任务的事件丢弃
    pub async fn apply(&self, event: TaskEvent) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(event.task_id()) else {
            tracing::warn!(task_id = %event.task_id(), "event for unknown task dropped");
            return;
        };
        match event {
            TaskEvent::Status { status, .. } => {
                if task.status.state.is_terminal() {
                    tracing::debug!(
                        task_id = %task.id,
                        current = ?task.status.state,
                        ignored = ?status.state,
                        "status update after terminal state ignored"
                    );
                    return;
                }
                tracing::info!(task_id = %task.id, state = ?status.state, "Task status updated");
                if let Some(message) = &status.message {
                    task.history.push(message.clone());
                }
                task.status = status;
            }
            TaskEvent::Artifact { artifact, .. } => {
                task.artifacts.push(artifact);
            }
        }
    }

    /// 标记失败（执行器自身出错时使用）
    pub async fn fail(&self, task_id: &str, reason: &str) {
        let (context_id, found) = match self.tasks.read().await.get(task_id) {
            Some(task) => (task.context_id.clone(), true),
            None => (String::new(), false),
        };
        if found {
            self.apply(TaskEvent::Status {
                task_id: task_id.to_string(),
                context_id,
                status: TaskStatus::new(TaskState::Failed).with_message(reason),
                is_final: true,
            })
            .await;
        }
    }
}
