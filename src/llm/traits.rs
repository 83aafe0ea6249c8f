//! LLM 客户端抽象
//!
//! 所有后端（Azure OpenAI / OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式文本片段）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::memory::Message;

/// 远端模型调用错误（上游服务错误），不做自动重试
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// 流式文本片段
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回文本片段流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 流式完成：每个元素是一段增量文本，流结束即回复结束
    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, LlmError>;

    /// 模型标识（日志用）
    fn model(&self) -> &str {
        "unknown"
    }
}
