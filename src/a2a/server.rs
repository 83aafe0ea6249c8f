//! A2A JSON-RPC 服务
//!
//! - `POST /`：message/send、tasks/get、tasks/cancel
//! - `GET /.well-known/agent-card.json`：Agent Card
//!
//! JSON-RPC 错误总是以 HTTP 200 返回，错误码见 `A2aError::code`。

use std::collections::HashMap;
use std::sync::Arc;

use axum::{body::Bytes, extract::State, routing::get, routing::post, Json, Router};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::a2a::events::EventQueue;
use crate::a2a::executor::{AgentExecutor, RequestContext};
use crate::a2a::store::InMemoryTaskStore;
use crate::a2a::types::{
    A2aError, AgentCard, JsonRpcRequest, JsonRpcResponse, MessageSendParams, Task, TaskIdParams,
};

pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// 请求处理器：执行器 + 任务存储 + 正在运行任务的取消 token
pub struct A2aServer {
    card: AgentCard,
    executor: Arc<dyn AgentExecutor>,
    store: InMemoryTaskStore,
    running: Mutex<HashMap<String, (CancellationToken, RequestContext)>>,
}

impl A2aServer {
    pub fn new(card: AgentCard, executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            card,
            executor,
            store: InMemoryTaskStore::new(),
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    pub fn store(&self) -> &InMemoryTaskStore {
        &self.store
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .route(AGENT_CARD_PATH, get(agent_card))
            .with_state(self)
    }

    /// 分发一条 JSON-RPC 请求
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let result = match request.method.as_str() {
            "message/send" => match params::<MessageSendParams>(request.params) {
                Ok(p) => self.send_message(p).await,
                Err(e) => Err(e),
            },
            "tasks/get" => match params::<TaskIdParams>(request.params) {
                Ok(p) => self.get_task(p).await,
                Err(e) => Err(e),
            },
            "tasks/cancel" => match params::<TaskIdParams>(request.params) {
                Ok(p) => self.cancel_task(p).await,
                Err(e) => Err(e),
            },
            other => Err(A2aError::MethodNotFound(other.to_string())),
        };

        match result.and_then(|task| {
            serde_json::to_value(task).map_err(|e| A2aError::Internal(e.to_string()))
        }) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                tracing::warn!(method = %request.method, code = e.code(), "A2A request failed: {}", e);
                JsonRpcResponse::failure(id, &e)
            }
        }
    }

    /// 运行执行器直到结束（或被取消），返回最终任务
    async fn send_message(&self, params: MessageSendParams) -> Result<Task, A2aError> {
        let message = params.message;
        if message.parts.is_empty() {
            return Err(A2aError::InvalidParams("message has no parts".to_string()));
        }
        let task_id = message
            .task_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        if let Some(existing) = self.store.get(&task_id).await {
            if existing.status.state.is_terminal() {
                return Err(A2aError::InvalidParams(format!(
                    "task {} is already {:?}",
                    task_id, existing.status.state
                )));
            }
        }

        self.store
            .save(Task::submitted(task_id.clone(), context_id.clone(), message.clone()))
            .await;
        let context = RequestContext {
            task_id: task_id.clone(),
            context_id,
            message,
        };
        let token = CancellationToken::new();
        self.running
            .lock()
            .await
            .insert(task_id.clone(), (token.clone(), context.clone()));
        tracing::info!(task_id = %task_id, "A2A task started");

        let (queue, mut rx) = EventQueue::new();
        let run = async {
            tokio::select! {
                result = self.executor.execute(context, queue) => result,
                _ = token.cancelled() => Ok(()),
            }
        };
        let drain = async {
            while let Some(event) = rx.recv().await {
                self.store.apply(event).await;
            }
        };
        let (result, ()) = tokio::join!(run, drain);

        self.running.lock().await.remove(&task_id);
        if let Err(e) = result {
            self.store.fail(&task_id, &e.to_string()).await;
        }
        self.store
            .get(&task_id)
            .await
            .ok_or_else(|| A2aError::Internal(format!("task {} vanished", task_id)))
    }

    async fn get_task(&self, params: TaskIdParams) -> Result<Task, A2aError> {
        let mut task = self
            .store
            .get(&params.id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(params.id.clone()))?;
        if let Some(limit) = params.history_length {
            let skip = task.history.len().saturating_sub(limit);
            task.history.drain(..skip);
        }
        Ok(task)
    }

    async fn cancel_task(&self, params: TaskIdParams) -> Result<Task, A2aError> {
        let task = self
            .store
            .get(&params.id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(params.id.clone()))?;
        if task.status.state.is_terminal() {
            return Err(A2aError::TaskNotCancelable(params.id));
        }

        let entry = self.running.lock().await.remove(&params.id);
        let Some((token, context)) = entry else {
            return Err(A2aError::TaskNotCancelable(params.id));
        };
        // canceled 必须先落库再唤醒 message/send，否则其可能读到 working
        let (queue, mut rx) = EventQueue::new();
        let canceled = self.executor.cancel(context, queue).await;
        while let Some(event) = rx.recv().await {
            self.store.apply(event).await;
        }
        token.cancel();
        canceled?;
        tracing::info!(task_id = %params.id, "A2A task canceled");

        self.store
            .get(&params.id)
            .await
            .ok_or_else(|| A2aError::TaskNotFound(params.id))
    }
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T, A2aError> {
    serde_json::from_value(value).map_err(|e| A2aError::InvalidParams(e.to_string()))
}

/// POST /：body 先按原始字节接收，解析失败返回 -32700
async fn handle_rpc(State(server): State<Arc<A2aServer>>, body: Bytes) -> Json<JsonRpcResponse> {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return Json(JsonRpcResponse::failure(Value::Null, &A2aError::Parse(e.to_string())));
        }
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::failure(id, &A2aError::InvalidRequest(e.to_string())));
        }
    };
    Json(server.dispatch(request).await)
}

async fn agent_card(State(server): State<Arc<A2aServer>>) -> Json<AgentCard> {
    Json(server.card.clone())
}
