//! OpenAI-compatible streaming backend adapter.
//!
//! Speaks the chat-completions API with `stream: true` and maps the SSE
//! `data:` line protocol onto the reconciler's event model. The byte stream
//! is parsed incrementally; lines are only decoded once complete, so UTF-8
//! sequences split across network chunks survive intact.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures_util::{stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::models::{ChainMessage, ContentPart, Role};
use crate::stream::{PartDelta, StreamEvent};
use crate::traits::{EventStream, InferenceBackend};

type BytesStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Client for OpenAI-compatible chat-completions backends.
pub struct OpenAiBackend {
    client: Client,
    config: BackendConfig,
    system_prompt: Option<String>,
}

impl OpenAiBackend {
    /// Create a backend client.
    ///
    /// `system_prompt` may contain `{date}` and `{time}` placeholders,
    /// expanded per request.
    pub fn new(config: BackendConfig, system_prompt: Option<String>) -> Self {
        OpenAiBackend {
            client: Client::new(),
            config,
            system_prompt,
        }
    }

    /// Serialize the conversation history into wire messages.
    fn wire_messages(&self, history: &[ChainMessage]) -> Vec<Value> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(template) = &self.system_prompt {
            messages.push(json!({
                "role": "system",
                "content": expand_system_prompt(template),
            }));
        }
        for message in history {
            let content = message.plain_text();
            if content.is_empty() {
                continue;
            }
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": content }));
        }
        messages
    }
}

/// Expand `{date}` and `{time}` placeholders in a system prompt.
fn expand_system_prompt(template: &str) -> String {
    let now = chrono::Local::now();
    template
        .replace("{date}", &now.format("%B %d %Y").to_string())
        .replace("{time}", &now.format("%H:%M:%S %Z").to_string())
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    async fn stream_response(&self, history: &[ChainMessage]) -> Result<EventStream, BackendError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "messages": self.wire_messages(history),
            "stream": true,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BackendError::Reported {
                message,
                code: Some(status.to_string()),
            });
        }

        let state = SseState {
            bytes: Box::pin(response.bytes_stream()),
            buffer: Vec::new(),
            mapper: DeltaMapper::default(),
            pending: VecDeque::new(),
            finished: false,
        };

        let events = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }

                if let Some(pos) = state.buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    state.handle_line(line.trim_end());
                    continue;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                    Some(Err(err)) => {
                        state
                            .pending
                            .push_back(Err(BackendError::Connect(err.to_string())));
                        state.finished = true;
                    }
                    // Stream end without [DONE]: the reconciler treats the
                    // missing Complete as abnormal termination
                    None => state.finished = true,
                }
            }
        });

        Ok(Box::pin(events))
    }
}

struct SseState {
    bytes: BytesStream,
    buffer: Vec<u8>,
    mapper: DeltaMapper,
    pending: VecDeque<Result<StreamEvent, BackendError>>,
    finished: bool,
}

impl SseState {
    fn handle_line(&mut self, line: &str) {
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();
        if data.is_empty() {
            return;
        }
        if data == "[DONE]" {
            self.pending.push_back(Ok(StreamEvent::Complete));
            self.finished = true;
            return;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(value) => {
                for event in self.mapper.map_chunk(&value) {
                    self.pending.push_back(Ok(event));
                }
            }
            Err(err) => {
                self.pending
                    .push_back(Err(BackendError::Protocol(err.to_string())));
                self.finished = true;
            }
        }
    }
}

/// Which part the wire stream currently has open.
#[derive(Debug, PartialEq)]
enum OpenPart {
    Text,
    Tool(u64),
}

/// Maps chat-completion delta chunks onto `PartStart`/`PartDelta` events.
#[derive(Debug, Default)]
struct DeltaMapper {
    open: Option<OpenPart>,
}

impl DeltaMapper {
    fn map_chunk(&mut self, value: &Value) -> Vec<StreamEvent> {
        if let Some(err) = value.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown backend error")
                .to_string();
            let code = err.get("code").and_then(|c| c.as_str()).map(String::from);
            return vec![StreamEvent::Error { message, code }];
        }

        let mut events = Vec::new();
        let Some(delta) = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
        else {
            return events;
        };

        if let Some(content) = delta.get("content").and_then(|c| c.as_str()) {
            if self.open != Some(OpenPart::Text) {
                events.push(StreamEvent::PartStart(ContentPart::empty_text()));
                self.open = Some(OpenPart::Text);
            }
            if !content.is_empty() {
                events.push(StreamEvent::PartDelta(PartDelta::Text(content.to_string())));
            }
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
            for call in tool_calls {
                let index = call.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
                let function = call.get("function");
                if self.open != Some(OpenPart::Tool(index)) {
                    let tool_name = function
                        .and_then(|f| f.get("name"))
                        .and_then(|n| n.as_str())
                        .unwrap_or("tool")
                        .to_string();
                    events.push(StreamEvent::PartStart(ContentPart::ToolCall {
                        tool_name,
                        arguments: String::new(),
                    }));
                    self.open = Some(OpenPart::Tool(index));
                }
                if let Some(arguments) = function
                    .and_then(|f| f.get("arguments"))
                    .and_then(|a| a.as_str())
                {
                    if !arguments.is_empty() {
                        events.push(StreamEvent::PartDelta(PartDelta::ToolCallArguments(
                            arguments.to_string(),
                        )));
                    }
                }
            }
        }

        events
    }
}
