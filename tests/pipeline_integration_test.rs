//! 流水线集成测试：阶段顺序、对话累积、并发隔离、失败终止

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use content_pipeline::agents::{create_agent, create_content_agents, AgentRegistry, AgentSpec};
use content_pipeline::config::{AppConfig, SilentStagePolicy};
use content_pipeline::core::AppContext;
use content_pipeline::llm::{LlmClient, LlmError, MockBehavior, MockLlmClient, TextStream};
use content_pipeline::memory::{Message, Role};
use content_pipeline::stream::{pipeline_events, StreamEvent, EVENT_AGENT, EVENT_TEXT};
use content_pipeline::workflow::{PipelineEvent, SequentialBuilder};
use futures_util::{stream, Stream, StreamExt};

fn offline_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.tools.learn.enabled = false;
    cfg
}

/// 回复中报告本次看到的非 system 消息条数
struct CountingLlm;

#[async_trait]
impl LlmClient for CountingLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let seen = messages.iter().filter(|m| m.role != Role::System).count();
        Ok(format!("seen={}", seen))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, LlmError> {
        let text = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(text)])))
    }
}

fn stage_starts(events: &[PipelineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageStarted { stage } => Some(stage.clone()),
            _ => None,
        })
        .collect()
}

fn text_of(events: &[PipelineEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::TextDelta { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_content_pipeline_runs_researcher_writer_reviewer() {
    let ctx = AppContext::with_llm(offline_config(), Arc::new(MockLlmClient::default()));
    let agents = create_content_agents(&ctx).await.unwrap();
    let pipeline = agents.pipeline(SilentStagePolicy::Continue).unwrap();

    let events = pipeline.run_buffered("Write a technical article about: Rust").await;
    assert_eq!(stage_starts(&events), vec!["Researcher", "Writer", "Reviewer"]);

    // 每个 StageStarted 之后、下一阶段开始之前恰有一个 StageCompleted
    let mut open: Option<String> = None;
    for ev in &events {
        match ev {
            PipelineEvent::StageStarted { stage } => {
                assert!(open.is_none(), "stage {} started before previous completed", stage);
                open = Some(stage.clone());
            }
            PipelineEvent::TextDelta { stage, .. } => assert_eq!(open.as_ref(), Some(stage)),
            PipelineEvent::StageCompleted { stage, .. } => {
                assert_eq!(open.take().as_ref(), Some(stage));
            }
            PipelineEvent::RunCompleted => assert!(open.is_none()),
            PipelineEvent::RunFailed { .. } => panic!("unexpected failure"),
        }
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(events.last(), Some(&PipelineEvent::RunCompleted));
}

#[tokio::test]
async fn test_each_stage_sees_accumulated_conversation() {
    let registry = AgentRegistry::new();
    let llm: Arc<dyn LlmClient> = Arc::new(CountingLlm);
    let mut builder = SequentialBuilder::new("counting");
    for name in ["A", "B", "C"] {
        builder = builder.participant(create_agent(&registry, Arc::clone(&llm), AgentSpec::new(name, "x")).await);
    }
    let pipeline = builder.build().unwrap();

    let events = pipeline.run_buffered("start").await;
    let completed: Vec<(String, Vec<Message>)> = events
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::StageCompleted { stage, new_messages } => Some((stage, new_messages)),
            _ => None,
        })
        .collect();

    assert_eq!(completed.len(), 3);
    for (i, (stage, new_messages)) in completed.iter().enumerate() {
        // 每个阶段只报告自己新增的一条消息
        assert_eq!(new_messages.len(), 1);
        assert_eq!(new_messages[0].role, Role::Assistant);
        assert_eq!(new_messages[0].stage.as_deref(), Some(stage.as_str()));
        assert_eq!(new_messages[0].content, format!("seen={}", i + 1));
    }
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let registry = AgentRegistry::new();
    let llm: Arc<dyn LlmClient> =
        Arc::new(MockLlmClient::default().with_chunk_delay(Duration::from_millis(5)));
    let pipeline = SequentialBuilder::new("shared")
        .participant(create_agent(&registry, Arc::clone(&llm), AgentSpec::new("Writer", "w")).await)
        .participant(create_agent(&registry, Arc::clone(&llm), AgentSpec::new("Reviewer", "r")).await)
        .build()
        .unwrap();

    let (alpha, beta) = tokio::join!(pipeline.run_buffered("alpha"), pipeline.run_buffered("beta"));

    let alpha_text = text_of(&alpha);
    let beta_text = text_of(&beta);
    assert!(alpha_text.contains("alpha") && !alpha_text.contains("beta"));
    assert!(beta_text.contains("beta") && !beta_text.contains("alpha"));
    assert_eq!(alpha.last(), Some(&PipelineEvent::RunCompleted));
    assert_eq!(beta.last(), Some(&PipelineEvent::RunCompleted));
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_text_and_ends_once() {
    let registry = AgentRegistry::new();
    let ok: Arc<dyn LlmClient> = Arc::new(MockLlmClient::default());
    let broken: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(MockBehavior::FailAfter(2)));
    let pipeline = SequentialBuilder::new("failing")
        .participant(create_agent(&registry, ok, AgentSpec::new("Researcher", "r")).await)
        .participant(create_agent(&registry, broken, AgentSpec::new("Writer", "w")).await)
        .build()
        .unwrap();

    let events = pipeline.run_buffered("topic").await;
    assert!(matches!(events.last(), Some(PipelineEvent::RunFailed { stage, .. }) if stage == "Writer"));
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::RunCompleted)));

    let outward: Vec<StreamEvent> = pipeline_events(pipeline.run("topic")).collect().await;
    let names: Vec<&str> = outward.iter().map(|e| e.event).collect();
    assert_eq!(names.iter().filter(|n| **n == "done").count(), 1);
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(outward.last().unwrap().data["status"], "failed");
    // 失败前 Writer 已输出的两段文本仍然保留
    let writer_texts = outward
        .iter()
        .filter(|e| e.event == "text" && e.data["agent"] == "Writer")
        .count();
    assert_eq!(writer_texts, 2);
    assert_eq!(names[names.len() - 2], "error");
}

#[tokio::test]
async fn test_silent_stage_policy() {
    let registry = AgentRegistry::new();
    let silent: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new(MockBehavior::Silent));
    let echo: Arc<dyn LlmClient> = Arc::new(MockLlmClient::default());
    let quiet = create_agent(&registry, silent, AgentSpec::new("Researcher", "r")).await;
    let writer = create_agent(&registry, echo, AgentSpec::new("Writer", "w")).await;

    let continuing = SequentialBuilder::new("continue")
        .participant(Arc::clone(&quiet))
        .participant(Arc::clone(&writer))
        .build()
        .unwrap();
    let events = continuing.run_buffered("topic").await;
    assert!(events.contains(&PipelineEvent::StageCompleted {
        stage: "Researcher".into(),
        new_messages: vec![],
    }));
    assert_eq!(stage_starts(&events), vec!["Researcher", "Writer"]);
    assert_eq!(events.last(), Some(&PipelineEvent::RunCompleted));

    let aborting = SequentialBuilder::new("abort")
        .participant(quiet)
        .participant(writer)
        .silent_stage_policy(SilentStagePolicy::Abort)
        .build()
        .unwrap();
    let events = aborting.run_buffered("topic").await;
    assert_eq!(stage_starts(&events), vec!["Researcher"]);
    assert!(matches!(events.last(), Some(PipelineEvent::RunFailed { stage, .. }) if stage == "Researcher"));
}

/// 永不结束的上游片段流：记录被轮询次数，析构时置位
struct EndlessStream {
    polls: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Stream for EndlessStream {
    type Item = Result<String, LlmError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Some(Ok("chunk ".to_string())))
    }
}

impl Drop for EndlessStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct EndlessLlm {
    polls: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl LlmClient for EndlessLlm {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::InvalidRequest("streaming only".into()))
    }

    async fn complete_stream(&self, _messages: &[Message]) -> Result<TextStream, LlmError> {
        Ok(Box::pin(EndlessStream {
            polls: Arc::clone(&self.polls),
            dropped: Arc::clone(&self.dropped),
        }))
    }
}

#[tokio::test]
async fn test_dropping_outward_stream_releases_upstream() {
    let llm = Arc::new(EndlessLlm::default());
    let polls = Arc::clone(&llm.polls);
    let dropped = Arc::clone(&llm.dropped);

    let registry = AgentRegistry::new();
    let writer = create_agent(&registry, llm, AgentSpec::new("Writer", "write")).await;
    let pipeline = SequentialBuilder::new("endless")
        .participant(writer)
        .build()
        .unwrap();

    let mut events = pipeline_events(pipeline.run("topic"));
    assert_eq!(events.next().await.unwrap().event, EVENT_AGENT);
    assert_eq!(events.next().await.unwrap().event, EVENT_TEXT);
    assert!(!dropped.load(Ordering::SeqCst));
    let polled = polls.load(Ordering::SeqCst);
    assert!(polled >= 1);

    drop(events);
    assert!(dropped.load(Ordering::SeqCst));

    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(polls.load(Ordering::SeqCst), polled);
}
