//! 工具描述与注册表
//!
//! Agent 的工具分两类：声明式工具（远端可直接解析，原样附加）与动态发现的工具（需先经 ToolConnector 连接）。
//! 解析后的工具按名注册到 ToolRegistry，并生成 prompt 中的 Available tools 段落。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::tools::ToolConnector;

/// 工具描述：名称、描述（供 LLM 理解）、参数 schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// 来源（工具服务名），声明式工具为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            source: None,
        }
    }
}

/// Agent 持有的工具引用
#[derive(Clone)]
pub enum ToolRef {
    /// 远端可直接解析的工具
    Declarative(ToolDescriptor),
    /// 需本地连接后才能得到工具列表（连接在进程内共享）
    Discovered(Arc<ToolConnector>),
}

impl std::fmt::Debug for ToolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolRef::Declarative(d) => f.debug_tuple("Declarative").field(&d.name).finish(),
            ToolRef::Discovered(c) => f.debug_tuple("Discovered").field(&c.name()).finish(),
        }
    }
}

/// 工具注册表：按名称存储，重名时后注册者覆盖
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDescriptor) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 返回 (name, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .values()
            .map(|t| (t.name.clone(), t.description.clone()))
            .collect()
    }

    /// 拼入 instructions 的 Available tools 段落；无工具时为 None
    pub fn prompt_section(&self) -> Option<String> {
        if self.tools.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .tools
            .values()
            .map(|t| match &t.source {
                Some(src) => format!("- {} ({}): {}", t.name, src, t.description),
                None => format!("- {}: {}", t.name, t.description),
            })
            .collect();
        Some(format!("Available tools:\n{}", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_replaces_same_name() {
        let mut reg = ToolRegistry::new();
        reg.register(ToolDescriptor::new("search", "v1"));
        reg.register(ToolDescriptor::new("search", "v2"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("search").unwrap().description, "v2");
    }

    #[test]
    fn test_prompt_section() {
        let mut reg = ToolRegistry::new();
        assert!(reg.prompt_section().is_none());

        let mut docs = ToolDescriptor::new("microsoft_docs_search", "Search Microsoft Learn");
        docs.source = Some("Microsoft Learn".into());
        reg.register(docs);
        reg.register(ToolDescriptor::new("code_interpreter", "Run Python"));

        let section = reg.prompt_section().unwrap();
        assert!(section.starts_with("Available tools:"));
        assert!(section.contains("- code_interpreter: Run Python"));
        assert!(section.contains("- microsoft_docs_search (Microsoft Learn): Search Microsoft Learn"));
    }
}
