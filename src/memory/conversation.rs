//! 单次运行的对话上下文
//!
//! 流水线每次运行持有一份独立的 Conversation：按序累积消息，并按「已记录条数」切出各阶段新产生的消息。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 产生该消息的阶段（用户输入为 None）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            stage: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            stage: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            stage: None,
        }
    }

    /// 标记产生该消息的阶段
    pub fn from_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

/// 一次运行的累积对话：conversation_id + 有序消息 + 已归属的消息条数
#[derive(Clone, Debug)]
pub struct Conversation {
    id: String,
    messages: Vec<Message>,
    recorded: usize,
}

impl Conversation {
    /// 以一条用户消息开场
    pub fn new(initial: impl Into<String>) -> Self {
        let messages = vec![Message::user(initial)];
        Self {
            id: format!("conv_{}", uuid::Uuid::new_v4().simple()),
            recorded: messages.len(),
            messages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 吸收阶段完成时报告的完整消息列表，只返回超出已记录条数的部分
    ///
    /// 重复吸收同一份列表不会再产生新消息。
    pub fn absorb(&mut self, full: &[Message]) -> Vec<Message> {
        if full.len() <= self.recorded {
            return Vec::new();
        }
        let fresh = full[self.recorded..].to_vec();
        self.messages.extend(fresh.iter().cloned());
        self.recorded = full.len();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_starts_with_user_message() {
        let conv = Conversation::new("topic T");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert!(conv.id().starts_with("conv_"));
    }

    #[test]
    fn test_absorb_returns_only_new_slice() {
        let mut conv = Conversation::new("hi");
        let mut full = conv.messages().to_vec();
        full.push(Message::assistant("stage one").from_stage("Researcher"));

        let fresh = conv.absorb(&full);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].stage.as_deref(), Some("Researcher"));
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_absorb_is_idempotent() {
        let mut conv = Conversation::new("hi");
        let mut full = conv.messages().to_vec();
        full.push(Message::assistant("reply"));

        assert_eq!(conv.absorb(&full).len(), 1);
        assert!(conv.absorb(&full).is_empty());
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_absorb_shorter_list_is_noop() {
        let mut conv = Conversation::new("hi");
        assert!(conv.absorb(&[]).is_empty());
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
