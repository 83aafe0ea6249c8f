//! 执行器发布的任务事件与事件队列

use tokio::sync::mpsc;

use crate::a2a::types::{Artifact, TaskStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Status {
        task_id: String,
        context_id: String,
        status: TaskStatus,
        /// 是否为最后一个状态事件
        is_final: bool,
    },
    Artifact {
        task_id: String,
        context_id: String,
        artifact: Artifact,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Status { task_id, .. } | TaskEvent::Artifact { task_id, .. } => task_id,
        }
    }
}

/// 执行器侧的发送端；所有发送端被丢弃后接收端结束
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<TaskEvent>,
}

impl EventQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue_event(&self, event: TaskEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("task event dropped, receiver closed");
        }
    }
}
