//! Prompt 模板：按名称加载 `<dir>/<name>.txt`，缺失时回退到内置模板
//!
//! 占位符写作 `{name}`，`{{` / `}}` 表示字面量花括号。未提供替换值的占位符视为格式错误。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// 内置模板（编译进二进制）
const BUILTIN: &[(&str, &str)] = &[
    ("researcher", include_str!("../../config/prompts/researcher.txt")),
    ("writer", include_str!("../../config/prompts/writer.txt")),
    ("reviewer", include_str!("../../config/prompts/reviewer.txt")),
    ("pipeline_message", include_str!("../../config/prompts/pipeline_message.txt")),
    ("a2a_reviewer", include_str!("../../config/prompts/a2a_reviewer.txt")),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("prompt template '{0}' not found")]
    NotFound(String),

    #[error("prompt template '{template}' has no value for placeholder '{placeholder}'")]
    Format { template: String, placeholder: String },
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

/// 只读模板仓库，可在所有运行间共享
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: Option<PathBuf>,
    builtin: HashMap<&'static str, &'static str>,
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptStore {
    /// 仅使用内置模板
    pub fn builtin() -> Self {
        Self {
            dir: None,
            builtin: BUILTIN.iter().copied().collect(),
        }
    }

    /// 优先读取目录中的 `<name>.txt`，不存在时回退到内置模板
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::builtin()
        }
    }

    /// 原始模板文本（已去除首尾空白）
    pub fn template(&self, name: &str) -> Result<String, PromptError> {
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(PromptError::NotFound(name.to_string()));
        }

        if let Some(dir) = &self.dir {
            if let Some(text) = read_template(dir, name) {
                return Ok(text);
            }
        }

        self.builtin
            .get(name)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    /// 加载模板并替换占位符；未传替换值时原样返回
    pub fn load(&self, name: &str, substitutions: &[(&str, &str)]) -> Result<String, PromptError> {
        let text = self.template(name)?;
        if substitutions.is_empty() {
            return Ok(text);
        }
        render(name, &text, substitutions)
    }
}

fn read_template(dir: &Path, name: &str) -> Option<String> {
    let path = dir.join(format!("{}.txt", name));
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read prompt template: {}", e);
            None
        }
    }
}

/// 按名称替换 `{placeholder}`，`{{` / `}}` 还原为单个花括号
pub fn render(template_name: &str, text: &str, substitutions: &[(&str, &str)]) -> Result<String, PromptError> {
    let re = PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

    let mut missing: Option<String> = None;
    let rendered = re.replace_all(text, |caps: &Captures| match caps.get(1) {
        None => caps[0][..1].to_string(),
        Some(key) => match substitutions.iter().find(|(k, _)| *k == key.as_str()) {
            Some((_, value)) => value.to_string(),
            None => {
                missing.get_or_insert_with(|| key.as_str().to_string());
                String::new()
            }
        },
    });

    match missing {
        Some(placeholder) => Err(PromptError::Format {
            template: template_name.to_string(),
            placeholder,
        }),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_present() {
        let store = PromptStore::builtin();
        for name in ["researcher", "writer", "reviewer", "pipeline_message", "a2a_reviewer"] {
            let text = store.template(name).unwrap();
            assert!(!text.is_empty(), "{name} is empty");
            assert_eq!(text, text.trim());
        }
    }

    #[test]
    fn test_load_substitutes_topic() {
        let store = PromptStore::builtin();
        let msg = store
            .load("pipeline_message", &[("topic", "Rust async")])
            .unwrap();
        assert_eq!(msg, "Write a technical article about: Rust async");
    }

    #[test]
    fn test_missing_placeholder_is_format_error() {
        let store = PromptStore::builtin();
        let err = store
            .load("pipeline_message", &[("subject", "x")])
            .unwrap_err();
        assert_eq!(
            err,
            PromptError::Format {
                template: "pipeline_message".into(),
                placeholder: "topic".into()
            }
        );
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let store = PromptStore::builtin();
        assert_eq!(
            store.load("editor", &[]),
            Err(PromptError::NotFound("editor".into()))
        );
        assert!(matches!(
            store.template("../secrets"),
            Err(PromptError::NotFound(_))
        ));
    }

    #[test]
    fn test_escaped_braces() {
        let out = render("t", "{{literal}} {name} }}", &[("name", "v")]).unwrap();
        assert_eq!(out, "{literal} v }");
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("writer.txt"), "  Custom writer for {audience}\n").unwrap();
        std::fs::write(dir.path().join("glossary.txt"), "Terms").unwrap();

        let store = PromptStore::with_dir(dir.path());
        assert_eq!(
            store.load("writer", &[("audience", "SREs")]).unwrap(),
            "Custom writer for SREs"
        );
        assert_eq!(store.template("glossary").unwrap(), "Terms");
        // 目录中没有的模板回退到内置
        assert!(store.template("reviewer").unwrap().contains("technical editor"));
    }

    #[test]
    fn test_no_substitutions_returns_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.txt"), "keep {this}").unwrap();
        let store = PromptStore::with_dir(dir.path());
        assert_eq!(store.load("raw", &[]).unwrap(), "keep {this}");
    }
}
