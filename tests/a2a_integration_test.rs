//! A2A 集成测试：真实监听端口，经 A2aClient 往返；取消正在运行的任务

#![cfg(feature = "a2a")]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use content_pipeline::a2a::{
    reviewer_server, A2aClient, A2aError, A2aMessage, A2aServer, AgentCard, AgentExecutor,
    EventQueue, RequestContext, TaskState, TaskStatus,
};
use content_pipeline::config::AppConfig;
use content_pipeline::core::AppContext;
use content_pipeline::llm::{MockBehavior, MockLlmClient};

async fn serve(server: A2aServer) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Arc::new(server).router()).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_client_round_trip() {
    let mut cfg = AppConfig::default();
    cfg.tools.learn.enabled = false;
    let llm = Arc::new(MockLlmClient::new(MockBehavior::Fixed("# Polished".into())));
    let ctx = AppContext::with_llm(cfg, llm);
    let url = serve(reviewer_server(&ctx).await.unwrap()).await;

    let client = A2aClient::new(&url);
    let card = client.agent_card().await.unwrap();
    assert_eq!(card.name, "Reviewer");

    let task = client.send_text("Please review: draft").await.unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.artifact_text(), "# Polished");

    let fetched = client.get_task(&task.id).await.unwrap();
    assert_eq!(fetched.id, task.id);
    assert_eq!(fetched.status.state, TaskState::Completed);

    let err = client.cancel_task(&task.id).await.unwrap_err();
    assert_eq!(err.code(), -32002);

    let err = client.get_task("missing").await.unwrap_err();
    assert_eq!(err, A2aError::Remote { code: -32001, message: "Task not found: missing".into() });
}

/// 发布 working 后一直等待，直到被取消
struct StallingExecutor;

#[async_trait]
impl AgentExecutor for StallingExecutor {
    async fn execute(&self, context: RequestContext, queue: EventQueue) -> Result<(), A2aError> {
        queue.enqueue_event(context.status(TaskStatus::new(TaskState::Working), false));
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_cancel_in_flight_task() {
    let server = A2aServer::new(AgentCard::reviewer("http://test"), Arc::new(StallingExecutor));
    let url = serve(server).await;
    let client = Arc::new(A2aClient::new(&url));

    let mut message = A2aMessage::user("draft");
    message.task_id = Some("task-cancel".into());
    let sender = Arc::clone(&client);
    let pending = tokio::spawn(async move { sender.send_message(message).await });

    let mut state = None;
    for _ in 0..100 {
        if let Ok(task) = client.get_task("task-cancel").await {
            state = Some(task.status.state);
            if task.status.state == TaskState::Working {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state, Some(TaskState::Working));

    let canceled = client.cancel_task("task-cancel").await.unwrap();
    assert_eq!(canceled.status.state, TaskState::Canceled);

    let finished = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(finished.status.state, TaskState::Canceled);
}
