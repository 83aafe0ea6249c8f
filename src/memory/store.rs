//! 托管记忆库句柄
//!
//! 记忆库是可选能力：未启用或缺少 embedding 模型时返回 None，Agent 以「无记忆」继续运行。

use serde::Serialize;

use crate::config::MemorySection;

/// 记忆库引用（不透明句柄，由 Agent 携带）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRef {
    pub store_name: String,
    pub embedding_model: String,
}

/// 按配置准备记忆库；不可用时返回 None（不视为错误）
pub fn ensure_memory_store(section: &MemorySection) -> Option<MemoryRef> {
    if !section.enabled {
        tracing::debug!("memory store disabled");
        return None;
    }
    match section.embedding_model.as_deref().filter(|m| !m.trim().is_empty()) {
        Some(model) => {
            tracing::info!(store = %section.store_name, model, "Using memory store");
            Some(MemoryRef {
                store_name: section.store_name.clone(),
                embedding_model: model.to_string(),
            })
        }
        None => {
            tracing::info!("No embedding model configured, continuing without agent memory");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_unavailable() {
        assert!(ensure_memory_store(&MemorySection::default()).is_none());
    }

    #[test]
    fn test_enabled_without_embedding_model_is_unavailable() {
        let section = MemorySection {
            enabled: true,
            ..MemorySection::default()
        };
        assert!(ensure_memory_store(&section).is_none());
    }

    #[test]
    fn test_enabled_with_model() {
        let section = MemorySection {
            enabled: true,
            embedding_model: Some("text-embedding-3-small".into()),
            ..MemorySection::default()
        };
        let memory = ensure_memory_store(&section).unwrap();
        assert_eq!(memory.store_name, "content-pipeline-memory");
    }
}
