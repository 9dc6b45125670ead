//! # OpenAI-Compatible Provider
//!
//! Streams chat completions from any endpoint speaking the `OpenAI`
//! `/chat/completions` protocol. Delivery goes through [`RetryTransport`],
//! so retries finish before the event stream is handed to the caller.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use tide_core::events::StreamEvent;
use tide_core::retry::RetryConfig;
use tracing::{debug, instrument, warn};

use crate::provider::{Provider, ProviderError, ProviderRequest, ProviderResult, StreamEventStream};
use crate::sse::{SseFrame, parse_sse_lines};
use crate::transport::RetryTransport;

use super::message_converter::{convert_messages, convert_tools};
use super::stream_handler::{StreamState, finish_stream, process_chunk};
use super::types::{ChatChunk, OpenAiConfig};

/// Provider for OpenAI-compatible chat completions endpoints.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    transport: RetryTransport,
}

impl OpenAiProvider {
    /// Create a provider with its own HTTP client.
    #[must_use]
    pub fn new(config: OpenAiConfig, retry: RetryConfig) -> Self {
        Self::with_client(config, retry, reqwest::Client::new())
    }

    /// Create a provider with a caller-supplied HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAiConfig, retry: RetryConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            transport: RetryTransport::new(client, retry),
        }
    }

    /// Cancel retry backoff when `token` fires.
    #[must_use]
    pub fn with_cancel_token(mut self, token: tokio_util::sync::CancellationToken) -> Self {
        self.transport = self.transport.with_cancel_token(token);
        self
    }

    /// Build the JSON request body.
    #[must_use]
    pub fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": convert_messages(request.system_prompt.as_deref(), &request.messages),
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(convert_tools(&request.tools)).unwrap_or_default();
        }
        if let Some(max_tokens) = request.max_tokens.or(self.config.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

/// Turn one `data:` payload into events, or an error for in-band failures.
fn handle_data(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent, ProviderError>> {
    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            warn!(line = %data, error = %e, "failed to parse chat completion chunk");
            return Vec::new();
        }
    };

    if let Some(error) = &chunk.error {
        let message = error["message"]
            .as_str()
            .map_or_else(|| error.to_string(), String::from);
        return vec![Err(ProviderError::Other { message })];
    }

    process_chunk(&chunk, state).into_iter().map(Ok).collect()
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "openai", model = %self.config.model))]
    async fn stream(&self, request: &ProviderRequest) -> ProviderResult<StreamEventStream> {
        let url = self.config.completions_url();
        let body = self.build_request_body(request);
        let api_key = self.config.api_key.as_deref();

        debug!(
            url = %url,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion request"
        );

        let response = self
            .transport
            .send(|client| {
                let builder = client.post(&url).json(&body);
                match api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await?;

        let frames = parse_sse_lines(response.bytes_stream())
            .map(Some)
            .chain(stream::once(async { None }));

        let events = frames
            .scan(
                (StreamState::default(), false),
                |(state, failed), frame| {
                    if *failed {
                        return std::future::ready(None);
                    }
                    let out = match frame {
                        Some(SseFrame::Data(data)) => handle_data(&data, state),
                        Some(SseFrame::Done) => {
                            state.saw_done_marker = true;
                            Vec::new()
                        }
                        None => finish_stream(state).into_iter().map(Ok).collect(),
                    };
                    *failed = out.iter().any(Result::is_err);
                    std::future::ready(Some(out))
                },
            )
            .flat_map(stream::iter);

        let with_start = stream::once(std::future::ready(Ok(StreamEvent::Start))).chain(events);
        Ok(Box::pin(with_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tide_core::messages::Message;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            base_url: format!("{}/v1", server.uri()),
            model: "gpt-4.1-mini".into(),
            api_key: Some("sk-test".into()),
            max_tokens: None,
        }
    }

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            max_retry_after_ms: 5,
            jitter_factor: 0.0,
        }
    }

    fn sse(lines: &[&str]) -> ResponseTemplate {
        let mut body = String::new();
        for line in lines {
            body.push_str("data: ");
            body.push_str(line);
            body.push_str("\n\n");
        }
        ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
    }

    async fn collect(provider: &OpenAiProvider) -> Vec<Result<StreamEvent, ProviderError>> {
        let request = ProviderRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        provider.stream(&request).await.unwrap().collect().await
    }

    #[tokio::test]
    async fn streams_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"stream": true, "model": "gpt-4.1-mini"})))
            .respond_with(sse(&[
                r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":1}}"#,
                "[DONE]",
            ]))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config(&server), quick_retry());
        let events: Vec<_> = collect(&provider).await.into_iter().map(Result::unwrap).collect();

        assert_eq!(events[0], StreamEvent::Start);
        assert_eq!(events[1], StreamEvent::TextDelta { delta: "Hello".into() });
        assert_matches!(
            &events[2],
            StreamEvent::Done { stop_reason, usage: Some(u) }
                if stop_reason == "stop" && u.prompt_tokens == Some(5)
        );
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn cut_off_stream_has_no_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&[r#"{"choices":[{"delta":{"content":"partial"}}]}"#]))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config(&server), quick_retry());
        let events = collect(&provider).await;
        assert_eq!(events.len(), 2);
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, Ok(StreamEvent::Done { .. })))
        );
    }

    #[tokio::test]
    async fn malformed_chunks_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&[
                "{not json",
                r#"{"choices":[{"delta":{"content":"ok"},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ]))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config(&server), quick_retry());
        let events = collect(&provider).await;
        assert!(events.iter().all(Result::is_ok));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn in_band_error_ends_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&[
                r#"{"error":{"message":"upstream overloaded"}}"#,
                r#"{"choices":[{"delta":{"content":"late"}}]}"#,
                "[DONE]",
            ]))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config(&server), quick_retry());
        let events = collect(&provider).await;
        assert_eq!(events.len(), 2);
        assert_matches!(&events[1], Err(ProviderError::Other { message }) if message == "upstream overloaded");
    }

    #[tokio::test]
    async fn auth_failure_surfaces_before_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "bad key"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config(&server), quick_retry());
        let request = ProviderRequest::default();
        let err = provider.stream(&request).await.err().unwrap();
        assert_matches!(err, ProviderError::Auth { .. });
    }

    #[tokio::test]
    async fn server_error_is_retried_then_streams() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(sse(&[r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#]))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(config(&server), quick_retry());
        let events = collect(&provider).await;
        assert_matches!(events.last(), Some(Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn request_body_includes_tools_and_limits() {
        let cfg = OpenAiConfig {
            base_url: "http://localhost/v1/".into(),
            model: "m".into(),
            api_key: None,
            max_tokens: Some(256),
        };
        assert_eq!(cfg.completions_url(), "http://localhost/v1/chat/completions");
        let provider = OpenAiProvider::new(cfg, RetryConfig::default());
        let request = ProviderRequest {
            system_prompt: Some("sys".into()),
            messages: vec![Message::user("q")],
            tools: vec![tide_core::tools::Tool {
                name: "glob".into(),
                description: "find files".into(),
                parameters: tide_core::tools::ToolParameterSchema::object(vec![], &[]),
            }],
            max_tokens: None,
            temperature: Some(0.2),
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["function"]["name"], "glob");
        assert_eq!(body["stream_options"]["include_usage"], true);
    }
}
