//! 动态发现的工具源（MCP）：Streamable HTTP 与 stdio 两种传输
//!
//! 协议与传输由 rmcp 客户端负责：握手后 list_all_tools 拉取全部工具。
//! 连接在进程启动时建立一次，由所有引用它的 Agent 共享；进程关闭时 release 恰好一次。
//! 这里只做工具发现，不实现工具调用。

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rmcp::model::Tool;
use rmcp::service::RunningService;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{Mutex, OnceCell};

use crate::tools::ToolDescriptor;

/// 工具连接失败（非致命：Agent 在没有这些工具的情况下照常创建）
#[derive(Error, Debug, Clone)]
pub enum ToolConnectError {
    #[error("{tool}: connect timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool}: transport error: {message}")]
    Transport { tool: String, message: String },

    #[error("{tool}: protocol error: {message}")]
    Protocol { tool: String, message: String },
}

/// 工具源定义
#[derive(Debug, Clone)]
pub enum ToolSource {
    /// Streamable HTTP MCP 服务
    Http { name: String, url: String },
    /// 以子进程启动、经 stdin/stdout 通信的 MCP 服务
    Stdio {
        name: String,
        command: String,
        args: Vec<String>,
        env: Vec<(String, String)>,
    },
}

impl ToolSource {
    pub fn name(&self) -> &str {
        match self {
            ToolSource::Http { name, .. } | ToolSource::Stdio { name, .. } => name,
        }
    }
}

fn descriptor(source: &str, tool: Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        source: Some(source.to_string()),
    }
}

type McpClient = RunningService<RoleClient, ()>;

/// 已建立的工具连接：发现到的工具 + 存活的 MCP 会话
pub struct ToolConnection {
    name: String,
    tools: Vec<ToolDescriptor>,
    client: Mutex<Option<McpClient>>,
}

impl ToolConnection {
    /// 握手后列出全部工具（自动翻页）
    pub async fn connect(source: &ToolSource) -> Result<Self, ToolConnectError> {
        let name = source.name().to_string();
        let transport_err = |message: String| ToolConnectError::Transport {
            tool: name.clone(),
            message,
        };

        let client = match source {
            ToolSource::Http { url, .. } => ()
                .serve(StreamableHttpClientTransport::from_uri(url.as_str()))
                .await
                .map_err(|e| transport_err(e.to_string()))?,
            ToolSource::Stdio {
                command, args, env, ..
            } => {
                let mut cmd = Command::new(command);
                cmd.args(args)
                    .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    .stderr(Stdio::null());
                let process = TokioChildProcess::new(cmd)
                    .map_err(|e| transport_err(format!("failed to spawn {}: {}", command, e)))?;
                ().serve(process)
                    .await
                    .map_err(|e| transport_err(e.to_string()))?
            }
        };

        let tools = match client.list_all_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                let _ = client.cancel().await;
                return Err(ToolConnectError::Protocol {
                    tool: name,
                    message: e.to_string(),
                });
            }
        };
        let tools: Vec<ToolDescriptor> = tools.into_iter().map(|t| descriptor(&name, t)).collect();

        tracing::info!(tool_source = %name, count = tools.len(), "MCP tools discovered");
        Ok(Self {
            name,
            tools,
            client: Mutex::new(Some(client)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// 结束 MCP 会话（HTTP 会话终止 / 子进程退出）；重复调用无副作用
    pub async fn close(&self) {
        let Some(client) = self.client.lock().await.take() else {
            return;
        };
        if let Err(e) = client.cancel().await {
            tracing::debug!(tool_source = %self.name, "MCP session shutdown failed: {}", e);
        }
        tracing::info!(tool_source = %self.name, "MCP connection closed");
    }
}

/// 共享的工具连接器：首次 resolve 时连接一次，结果（含失败）缓存；release 恰好执行一次
pub struct ToolConnector {
    source: ToolSource,
    timeout: Duration,
    connection: OnceCell<Result<Arc<ToolConnection>, ToolConnectError>>,
    released: AtomicBool,
}

impl ToolConnector {
    pub fn new(source: ToolSource, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            connection: OnceCell::new(),
            released: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// 连接（仅首次）并返回发现到的工具
    pub async fn resolve(&self) -> Result<Vec<ToolDescriptor>, ToolConnectError> {
        let result = self
            .connection
            .get_or_init(|| async {
                match tokio::time::timeout(self.timeout, ToolConnection::connect(&self.source)).await {
                    Ok(Ok(conn)) => Ok(Arc::new(conn)),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(ToolConnectError::Timeout {
                        tool: self.name().to_string(),
                        secs: self.timeout.as_secs(),
                    }),
                }
            })
            .await;
        match result {
            Ok(conn) => Ok(conn.tools().to_vec()),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection.get(), Some(Ok(_))) && !self.released.load(Ordering::SeqCst)
    }

    /// 释放连接；只有第一次调用生效
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(Ok(conn)) = self.connection.get() {
            conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const SESSION_HEADER: &str = "mcp-session-id";

    /// 按请求 id 回填 JSON-RPC 响应
    struct RpcReply {
        result: Value,
        sse: bool,
    }

    impl Respond for RpcReply {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
            let reply = json!({"jsonrpc": "2.0", "id": body["id"], "result": self.result});
            let template = ResponseTemplate::new(200).insert_header(SESSION_HEADER, "sess-1");
            if self.sse {
                // 同一事件的 JSON 分两行 data 发送
                let text = reply.to_string();
                let (head, tail) = text.split_at(text.find(",\"result\"").unwrap_or(text.len()));
                let event = format!("event: message\ndata: {}\ndata: {}\n\n", head, tail);
                template.set_body_raw(event, "text/event-stream")
            } else {
                template.set_body_json(reply)
            }
        }
    }

    async fn mount_mcp(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(RpcReply {
                result: json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "learn", "version": "1.0.0"}
                }),
                sse: false,
            })
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .respond_with(ResponseTemplate::new(202))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(405))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .and(header(SESSION_HEADER, "sess-1"))
            .respond_with(RpcReply {
                result: json!({"tools": [
                    {"name": "microsoft_docs_search", "description": "Search docs",
                     "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}},
                    {"name": "microsoft_docs_fetch", "inputSchema": {"type": "object"}}
                ]}),
                sse: true,
            })
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_http_discovery_and_single_release() {
        let server = MockServer::start().await;
        mount_mcp(&server).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let connector = ToolConnector::new(
            ToolSource::Http {
                name: "Microsoft Learn".into(),
                url: server.uri(),
            },
            Duration::from_secs(5),
        );
        let tools = connector.resolve().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "microsoft_docs_search");
        assert_eq!(tools[0].source.as_deref(), Some("Microsoft Learn"));
        assert_eq!(tools[0].input_schema["properties"]["query"]["type"], "string");
        assert_eq!(tools[1].description, "");
        assert!(connector.is_connected());

        // 第二次 resolve 复用已有连接
        assert_eq!(connector.resolve().await.unwrap().len(), 2);
        let initializes = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains("\"initialize\""))
            .count();
        assert_eq!(initializes, 1);

        connector.release().await;
        connector.release().await;
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_http_failure_is_connect_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let connector = ToolConnector::new(
            ToolSource::Http {
                name: "Broken".into(),
                url: server.uri(),
            },
            Duration::from_secs(5),
        );
        let err = connector.resolve().await.unwrap_err();
        assert!(err.to_string().starts_with("Broken:"));
        assert!(!connector.is_connected());
        connector.release().await;
    }

    #[tokio::test]
    async fn test_stdio_spawn_failure() {
        let connector = ToolConnector::new(
            ToolSource::Stdio {
                name: "GitHub".into(),
                command: "content-pipeline-no-such-binary".into(),
                args: vec![],
                env: vec![],
            },
            Duration::from_secs(5),
        );
        let err = connector.resolve().await.unwrap_err();
        assert!(matches!(err, ToolConnectError::Transport { .. }));
        assert!(err.to_string().starts_with("GitHub:"));
    }
}
