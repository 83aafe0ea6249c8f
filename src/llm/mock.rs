//! Mock LLM 客户端（用于测试与无端点的本地演示，无需 API）
//!
//! 默认取最后一条 User 消息回显，按词切块模拟流式输出；也可配置固定回复、空回复与中途失败。

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::llm::{LlmClient, LlmError, TextStream};
use crate::memory::{Message, Role};

/// Mock 行为
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// 回显最后一条 User 消息
    #[default]
    Echo,
    /// 固定回复
    Fixed(String),
    /// 流立即结束，不产生任何文本
    Silent,
    /// 输出 n 个片段后报错
    FailAfter(usize),
    /// 打开流时即报错
    FailOnOpen,
}

/// Mock 客户端
#[derive(Debug, Default, Clone)]
pub struct MockLlmClient {
    behavior: MockBehavior,
    chunk_delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            chunk_delay: None,
        }
    }

    /// 每个片段前等待，便于测试并发交错
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    fn reply(&self, messages: &[Message]) -> String {
        match &self.behavior {
            MockBehavior::Fixed(text) => text.clone(),
            MockBehavior::Silent => String::new(),
            _ => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                format!("Echo from Mock: {}", last_user)
            }
        }
    }
}

/// 按空白切块，保留分隔符，拼接后与原文一致
fn split_chunks(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        match self.behavior {
            MockBehavior::FailOnOpen | MockBehavior::FailAfter(_) => {
                Err(LlmError::Rejected("mock failure".to_string()))
            }
            _ => Ok(self.reply(messages)),
        }
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, LlmError> {
        let mut items: Vec<Result<String, LlmError>> = split_chunks(&self.reply(messages))
            .into_iter()
            .map(Ok)
            .collect();
        match self.behavior {
            MockBehavior::FailOnOpen => {
                return Err(LlmError::Rejected("mock failure".to_string()));
            }
            MockBehavior::FailAfter(n) => {
                items.truncate(n);
                items.push(Err(LlmError::Stream("mock stream interrupted".to_string())));
            }
            _ => {}
        }

        let delay = self.chunk_delay;
        let stream = stream::iter(items).then(move |item| async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }
}
