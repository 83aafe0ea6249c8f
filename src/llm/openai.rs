//! Azure OpenAI / OpenAI 兼容客户端
//!
//! 通过 async_openai 调用托管模型端点：provider = azure 时走部署（deployment + api-version），
//! provider = openai 时走任意 OpenAI 兼容 base_url。流式接口逐块返回 delta.content。

use std::time::Duration;

use async_openai::config::{AzureConfig, OpenAIConfig};
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::config::{LlmSection, Provider};
use crate::llm::{LlmClient, LlmError, TextStream};
use crate::memory::{Message, Role};

enum Backend {
    Azure(Client<AzureConfig>),
    OpenAi(Client<OpenAIConfig>),
}

/// 托管模型客户端：持有 Client 与 model（部署）名
pub struct OpenAiClient {
    backend: Backend,
    model: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    /// OpenAI 兼容端点
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        Self {
            backend: Backend::OpenAi(Client::with_config(config)),
            model: model.to_string(),
            timeout_secs: 120,
        }
    }

    /// Azure OpenAI 部署：endpoint 为资源地址，model 即 deployment 名
    pub fn azure(endpoint: &str, deployment: &str, api_version: &str, api_key: Option<&str>) -> Self {
        let mut config = AzureConfig::new()
            .with_api_base(endpoint.trim_end_matches('/'))
            .with_deployment_id(deployment)
            .with_api_version(api_version);
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        Self {
            backend: Backend::Azure(Client::with_config(config)),
            model: deployment.to_string(),
            timeout_secs: 120,
        }
    }

    /// 按 [llm] 段构建
    pub fn from_config(section: &LlmSection) -> Self {
        let client = match section.provider {
            Provider::Azure => Self::azure(
                &section.endpoint,
                &section.model,
                &section.api_version,
                section.api_key.as_deref(),
            ),
            Provider::Openai => Self::new(
                Some(&section.endpoint),
                &section.model,
                section.api_key.as_deref(),
            ),
        };
        client.with_timeout(section.request_timeout_secs)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn build_request(&self, messages: &[Message], stream: bool) -> Result<CreateChatCompletionRequest, LlmError> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_openai_messages(messages)?)
            .stream(stream)
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))
    }

    fn map_error(&self, e: OpenAIError) -> LlmError {
        match e {
            OpenAIError::ApiError(api) => LlmError::Rejected(api.message),
            OpenAIError::Reqwest(err) if err.is_timeout() => LlmError::Timeout(self.timeout_secs),
            OpenAIError::Reqwest(err) => LlmError::Transport(err.to_string()),
            OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg),
            other => LlmError::Stream(other.to_string()),
        }
    }
}

fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let invalid = |e: OpenAIError| LlmError::InvalidRequest(e.to_string());
    messages
        .iter()
        .map(|m| {
            Ok(match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(invalid)?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(invalid)?,
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(invalid)?,
                ),
            })
        })
        .collect()
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = self.build_request(messages, false)?;
        let call = async {
            match &self.backend {
                Backend::Azure(c) => c.chat().create(request).await,
                Backend::OpenAi(c) => c.chat().create(request).await,
            }
        };
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| LlmError::Timeout(self.timeout_secs))?
            .map_err(|e| self.map_error(e))?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, LlmError> {
        let request = self.build_request(messages, true)?;
        let open = async {
            match &self.backend {
                Backend::Azure(c) => c.chat().create_stream(request).await,
                Backend::OpenAi(c) => c.chat().create_stream(request).await,
            }
        };
        let upstream = tokio::time::timeout(Duration::from_secs(self.timeout_secs), open)
            .await
            .map_err(|_| LlmError::Timeout(self.timeout_secs))?
            .map_err(|e| self.map_error(e))?;

        let timeout_secs = self.timeout_secs;
        let stream = upstream.filter_map(move |item| async move {
            match item {
                Ok(chunk) => {
                    let text: String = chunk
                        .choices
                        .iter()
                        .filter_map(|c| c.delta.content.as_deref())
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(OpenAIError::ApiError(api)) => Some(Err(LlmError::Rejected(api.message))),
                Err(OpenAIError::Reqwest(err)) if err.is_timeout() => {
                    Some(Err(LlmError::Timeout(timeout_secs)))
                }
                Err(e) => Some(Err(LlmError::Stream(e.to_string()))),
            }
        });
        Ok(Box::pin(stream))
    }
}
