#![allow(missing_docs, unused_results)]
//! Nested research agent driving a read-only registry over a temp directory.

use std::collections::VecDeque;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tide_core::events::StreamEvent;
use tide_core::messages::{Message, ToolCall};
use tide_llm::provider::{Provider, ProviderError, ProviderRequest, ProviderResult, StreamEventStream};
use tide_runtime::{NestedResearchAgent, TurnConfig};
use tide_tools::errors::ToolError;
use tide_tools::providers::RealFileSystem;
use tide_tools::registry::ToolRegistry;
use tide_tools::traits::{ResearchDelegate, ResearchRequest, ToolContext};
use tokio_util::sync::CancellationToken;

enum Reply {
    Events(Vec<StreamEvent>),
    Fail,
}

struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(&self, request: &ProviderRequest) -> ProviderResult<StreamEventStream> {
        self.requests.lock().push(request.clone());
        match self.replies.lock().pop_front() {
            Some(Reply::Events(events)) => Ok(Box::pin(stream::iter(events.into_iter().map(Ok)))),
            Some(Reply::Fail) => Err(ProviderError::Auth {
                message: "missing key".into(),
            }),
            None => Ok(Box::pin(stream::iter(text("").into_iter().map(Ok)))),
        }
    }
}

fn text(body: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::TextDelta { delta: body.into() },
        StreamEvent::Done {
            stop_reason: "stop".into(),
            usage: None,
        },
    ]
}

fn read(id: &str, path: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::ToolCallEnd {
            tool_call: ToolCall::new(id, "read_file", format!(r#"{{"path":"{path}"}}"#)),
        },
        StreamEvent::Done {
            stop_reason: "tool_calls".into(),
            usage: None,
        },
    ]
}

fn request() -> ResearchRequest {
    ResearchRequest {
        query: "where is the retry loop?".into(),
        directories: vec![".".into()],
        max_files: 5,
    }
}

fn context(dir: &std::path::Path) -> ToolContext {
    ToolContext {
        tool_call_id: "research-1".into(),
        session_id: "parent".into(),
        working_directory: dir.to_string_lossy().into_owned(),
        cancellation: CancellationToken::new(),
    }
}

fn agent(provider: Arc<ScriptedProvider>, max_iterations: u32) -> NestedResearchAgent {
    NestedResearchAgent::new(
        provider,
        ToolRegistry::read_only(Arc::new(RealFileSystem)),
        TurnConfig::default(),
        max_iterations,
    )
}

#[tokio::test]
async fn findings_come_from_the_final_answer() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("retry.rs"), "fn with_retry() {}\n").unwrap();
    let provider = ScriptedProvider::new(vec![
        Reply::Events(read("c1", "retry.rs")),
        Reply::Events(text("The retry loop is `with_retry` in retry.rs.")),
    ]);

    let findings = agent(provider.clone(), 5)
        .research(request(), &context(dir.path()))
        .await
        .unwrap();

    assert_eq!(findings, "The retry loop is `with_retry` in retry.rs.");
    let requests = provider.requests.lock();
    assert_eq!(requests.len(), 2);
    // the sub-agent only sees read-only tools
    let tools: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tools, vec!["glob", "grep", "list_dir", "read_file"]);
    assert!(requests[0]
        .system_prompt
        .as_deref()
        .is_some_and(|p| p.contains(&dir.path().to_string_lossy().into_owned())));
    assert_matches!(&requests[0].messages[0], Message::User { content, .. } if content.contains("Read at most 5 files"));
    assert_matches!(&requests[1].messages[2], Message::ToolResult { tool_call_id, .. } if tool_call_id == "c1");
}

#[tokio::test]
async fn provider_failure_becomes_a_delegation_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![Reply::Fail]);

    let err = agent(provider, 5)
        .research(request(), &context(dir.path()))
        .await
        .unwrap_err();

    assert_matches!(err, ToolError::Delegation { message } if message.contains("missing key"));
}

#[tokio::test]
async fn empty_answer_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![Reply::Events(text("   "))]);

    let err = agent(provider, 5)
        .research(request(), &context(dir.path()))
        .await
        .unwrap_err();

    assert_matches!(err, ToolError::Delegation { message } if message.contains("no findings"));
}

#[tokio::test]
async fn iteration_limit_without_findings_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    let provider = ScriptedProvider::new(vec![
        Reply::Events(read("c1", "a.txt")),
        Reply::Events(read("c2", "a.txt")),
    ]);

    let err = agent(provider.clone(), 2)
        .research(request(), &context(dir.path()))
        .await
        .unwrap_err();

    assert_matches!(err, ToolError::Delegation { message } if message.contains("limit of 2 iterations"));
    assert_eq!(provider.requests.lock().len(), 2);
}

#[tokio::test]
async fn cancelled_parent_cancels_the_research() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![Reply::Events(text("never read"))]);
    let ctx = context(dir.path());
    ctx.cancellation.cancel();

    let err = agent(provider, 5).research(request(), &ctx).await.unwrap_err();

    assert_matches!(err, ToolError::Delegation { message } if message == "Operation cancelled");
}
