//! SSE HTTP API
//!
//! - `POST /pipeline`：运行 Researcher → Writer → Reviewer 流水线
//! - `POST /agents/:name`：单独运行一个 Agent
//! - `GET /health`：健康检查
//!
//! 同一组路由同时挂在 `/api` 前缀下。响应为 `text/event-stream`，事件名为 agent / text / error / done。

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::agents::create_content_agents;
use crate::config::DEFAULT_TOPIC;
use crate::core::{AppContext, PipelineError};
use crate::stream::{agent_events, pipeline_events, OutwardStream};
use crate::workflow::Pipeline;

/// 请求处理共享状态：上下文（含 Agent 注册表）+ 流水线定义（只读）
pub struct AppState {
    pub ctx: Arc<AppContext>,
    pub pipeline: Pipeline,
}

impl AppState {
    pub async fn new(ctx: Arc<AppContext>) -> Result<Arc<Self>, PipelineError> {
        let agents = create_content_agents(&ctx).await?;
        let pipeline = agents.pipeline(ctx.config.pipeline.silent_stage)?;
        Ok(Arc::new(Self { ctx, pipeline }))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub message: String,
}

/// HTTP 层错误：请求体无法解析为 400，未知 Agent 为 404（附可用名称），其余为 500
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(message) => {
                tracing::warn!("Bad request: {}", message);
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
            }
            ApiError::Pipeline(err) => err,
        };
        match err {
            PipelineError::AgentNotFound { name, available } => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": format!("Agent '{}' not found", name),
                    "available": available,
                })),
            )
                .into_response(),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": other.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/pipeline", post(run_pipeline))
        .route("/agents/:name", post(run_agent))
        .route("/health", get(health));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 对外事件流 → SSE 响应
fn sse(events: OutwardStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = events.map(|ev| Ok(Event::default().event(ev.event).data(ev.data_json())));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// 解析 /pipeline 请求体：空 body 视为无主题，非法 JSON 为 400
fn parse_pipeline_request(body: &[u8]) -> Result<PipelineRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PipelineRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// POST /pipeline：body 缺失或 topic 为空时使用默认主题
async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let topic = parse_pipeline_request(&body)?
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    let message = state
        .ctx
        .prompts
        .load("pipeline_message", &[("topic", topic.as_str())])
        .map_err(PipelineError::from)?;

    tracing::info!(topic = %topic, "Pipeline request");
    Ok(sse(pipeline_events(state.pipeline.run(message))))
}

/// POST /agents/:name：名称不区分大小写
async fn run_agent(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<AgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = name.to_lowercase();
    let Some(handle) = state.ctx.registry.get(&name).await else {
        let available = state.ctx.registry.names().await;
        return Err(PipelineError::AgentNotFound { name, available }.into());
    };

    tracing::info!(agent = %name, "Agent request");
    Ok(sse(agent_events(handle, name, req.message)))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "agents": state.ctx.registry.names().await,
        "pipeline": true,
    }))
}
