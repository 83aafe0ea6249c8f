//! A2A 客户端：读取 Agent Card，发送消息并取回任务

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::a2a::server::AGENT_CARD_PATH;
use crate::a2a::types::{
    A2aError, A2aMessage, AgentCard, JsonRpcRequest, JsonRpcResponse, Task, JSONRPC_VERSION,
};

pub struct A2aClient {
    http: reqwest::Client,
    base_url: String,
}

impl A2aClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(300))
    }

    /// 审校长文可能需要数分钟，超时按请求整体计算
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn agent_card(&self) -> Result<AgentCard, A2aError> {
        let url = format!("{}{}", self.base_url, AGENT_CARD_PATH);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| A2aError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(A2aError::Transport(format!("GET {} returned {}", url, resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| A2aError::Transport(e.to_string()))
    }

    /// 发送一条用户消息，等待任务结束
    pub async fn send_text(&self, text: impl Into<String>) -> Result<Task, A2aError> {
        self.send_message(A2aMessage::user(text)).await
    }

    pub async fn send_message(&self, message: A2aMessage) -> Result<Task, A2aError> {
        self.call("message/send", json!({ "message": message })).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, A2aError> {
        self.call("tasks/get", json!({ "id": task_id })).await
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, A2aError> {
        self.call("tasks/cancel", json!({ "id": task_id })).await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, A2aError> {
        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: json!(uuid::Uuid::new_v4().simple().to_string()),
            method: method.to_string(),
            params,
        };
        tracing::debug!(url = %self.base_url, method, "A2A request");
        let resp: JsonRpcResponse = self
            .http
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| A2aError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| A2aError::Transport(e.to_string()))?;

        if let Some(err) = resp.error {
            return Err(A2aError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        let result = resp
            .result
            .ok_or_else(|| A2aError::Transport("response has neither result nor error".to_string()))?;
        serde_json::from_value(result).map_err(|e| A2aError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_remote_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tasks/get"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": "x",
                "error": {"code": -32001, "message": "Task not found: t9"}
            })))
            .mount(&server)
            .await;

        let client = A2aClient::new(server.uri());
        let err = client.get_task("t9").await.unwrap_err();
        assert_eq!(err.code(), -32001);
        assert!(matches!(err, A2aError::Remote { .. }));
    }

    #[tokio::test]
    async fn test_agent_card_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(AGENT_CARD_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(AgentCard::reviewer(server.uri())),
            )
            .mount(&server)
            .await;

        let card = A2aClient::new(format!("{}/", server.uri())).agent_card().await.unwrap();
        assert_eq!(card.name, "Reviewer");
        assert_eq!(card.skills[0].id, "review-article");
    }
}
