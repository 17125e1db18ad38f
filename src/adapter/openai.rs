//! OpenAI Chat Completions stream adapter.
//!
//! Wire grammar: SSE `data:` lines, each carrying one JSON delta object with
//! `choices[].delta` content and index-tagged tool-call argument fragments.
//! `data: [DONE]` is the terminal sentinel.

use serde::Deserialize;
use tracing::debug;

use crate::types::{AggregatedResponse, FinishReason, ProviderKind, UnifiedStreamChunk};

use super::{parse_sse_data, AdapterState, ChunkSink, StreamAdapter};

pub struct OpenAiStreamAdapter {
    state: AdapterState,
}

impl OpenAiStreamAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ProviderKind::OpenAi),
        }
    }

    fn process_data(&mut self, data: &str, sink: &mut ChunkSink<'_>) {
        let parsed: OpenAiStreamChunk = match serde_json::from_str(data) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(error = %err, "unparseable OpenAI delta");
                sink(self.state.parse_error_chunk(format!("unparseable delta: {err}")));
                return;
            }
        };

        if let Some(model) = parsed.model {
            self.state.set_model(model);
        }
        if let Some(usage) = parsed.usage {
            self.state.set_usage(crate::types::TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        let Some(choice) = parsed.choices.into_iter().next() else {
            return;
        };

        if let Some(text) = choice.delta.content {
            if !text.is_empty() {
                sink(self.state.content_chunk(&text));
            }
        }

        for tc in choice.delta.tool_calls.unwrap_or_default() {
            let fragment = tc
                .function
                .as_ref()
                .and_then(|f| f.arguments.clone())
                .unwrap_or_default();
            let name_delta = tc.function.and_then(|f| f.name);
            let (id, name) = {
                let acc = self.state.accumulators.entry(tc.index);
                if let Some(id) = tc.id {
                    acc.id = id;
                }
                if let Some(name) = name_delta {
                    acc.name = name;
                }
                acc.push_fragment(&fragment);
                (acc.id.clone(), acc.name.clone())
            };
            let metadata = self.state.chunk_metadata();
            sink(UnifiedStreamChunk::ToolCall {
                id,
                name,
                arguments_fragment: fragment,
                metadata,
            });
        }

        if let Some(reason) = choice.finish_reason.as_deref().and_then(parse_finish_reason) {
            self.state.set_finish_reason(reason);
        }
    }
}

impl Default for OpenAiStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAdapter for OpenAiStreamAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn process_payload(&mut self, raw: &str, sink: &mut ChunkSink<'_>) {
        if self.state.is_finished() {
            return;
        }
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
                continue;
            }
            // Bare JSON payloads (no SSE framing) are accepted as-is.
            let data = parse_sse_data(line).unwrap_or(line);
            if data == "[DONE]" {
                if let Some(done) = self.state.done_chunk() {
                    sink(done);
                }
                return;
            }
            self.process_data(data, sink);
            if self.state.is_finished() {
                return;
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    fn finish(&mut self) -> Option<UnifiedStreamChunk> {
        self.state.done_chunk()
    }

    fn complete(self: Box<Self>) -> AggregatedResponse {
        self.state.into_response()
    }
}

pub(crate) fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

// OpenAI wire types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
