//! Anthropic Messages stream adapter.
//!
//! Wire grammar: named SSE events (`event:` + `data:` line pairs). Content
//! arrives as `content_block_delta` events; tool-call arguments as
//! `input_json_delta` fragments tagged with the content-block index; usage
//! splits across `message_start` (input) and `message_delta` (output).

use serde::Deserialize;
use tracing::debug;

use crate::types::{
    AggregatedResponse, FinishReason, ProviderKind, TokenUsage, UnifiedStreamChunk,
};

use super::{parse_sse_data, AdapterState, ChunkSink, StreamAdapter};

pub struct AnthropicStreamAdapter {
    state: AdapterState,
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl AnthropicStreamAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ProviderKind::Anthropic),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    fn process_event(&mut self, event_type: &str, event: &AnthropicEvent, sink: &mut ChunkSink<'_>) {
        match event_type {
            "message_start" => {
                if let Some(message) = &event.message {
                    if let Some(model) = &message.model {
                        self.state.set_model(model.clone());
                    }
                    if let Some(usage) = &message.usage {
                        if let Some(input) = usage.input_tokens {
                            self.prompt_tokens = Some(input);
                        }
                    }
                }
            }
            "content_block_start" => {
                if let Some(block) = &event.content_block {
                    if block.r#type.as_deref() == Some("tool_use") {
                        let (id, name) = {
                            let acc = self.state.accumulators.entry(event.index.unwrap_or(0));
                            if let Some(id) = &block.id {
                                acc.id = id.clone();
                            }
                            if let Some(name) = &block.name {
                                acc.name = name.clone();
                            }
                            (acc.id.clone(), acc.name.clone())
                        };
                        // Announce the call with an empty fragment so
                        // consumers establish it before arguments arrive.
                        let metadata = self.state.chunk_metadata();
                        sink(UnifiedStreamChunk::ToolCall {
                            id,
                            name,
                            arguments_fragment: String::new(),
                            metadata,
                        });
                    }
                }
            }
            "content_block_delta" => {
                let Some(delta) = &event.delta else { return };
                match delta.r#type.as_deref() {
                    Some("text_delta") => {
                        if let Some(text) = &delta.text {
                            if !text.is_empty() {
                                sink(self.state.content_chunk(text));
                            }
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(fragment) = &delta.partial_json {
                            let (id, name) = {
                                let acc =
                                    self.state.accumulators.entry(event.index.unwrap_or(0));
                                acc.push_fragment(fragment);
                                (acc.id.clone(), acc.name.clone())
                            };
                            let metadata = self.state.chunk_metadata();
                            sink(UnifiedStreamChunk::ToolCall {
                                id,
                                name,
                                arguments_fragment: fragment.clone(),
                                metadata,
                            });
                        }
                    }
                    // Thinking deltas have no unified counterpart.
                    _ => {}
                }
            }
            "content_block_stop" => {}
            "message_delta" => {
                if let Some(delta) = &event.delta {
                    if let Some(reason) = delta.stop_reason.as_deref().and_then(parse_stop_reason)
                    {
                        self.state.set_finish_reason(reason);
                    }
                }
                if let Some(usage) = &event.usage {
                    if let Some(output) = usage.output_tokens {
                        self.completion_tokens = Some(output);
                    }
                }
            }
            "message_stop" => {
                if self.prompt_tokens.is_some() || self.completion_tokens.is_some() {
                    self.state.set_usage(TokenUsage::new(
                        self.prompt_tokens.unwrap_or(0),
                        self.completion_tokens.unwrap_or(0),
                    ));
                }
                if !self.state.accumulators.is_empty() {
                    self.state.set_finish_reason(FinishReason::ToolCalls);
                }
                if let Some(done) = self.state.done_chunk() {
                    sink(done);
                }
            }
            "error" => {
                let message = event
                    .error
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| "unknown provider error".to_string());
                sink(self.state.provider_error_chunk(message));
            }
            // ping and future event types are ignored.
            _ => {}
        }
    }
}

impl Default for AnthropicStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAdapter for AnthropicStreamAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn process_payload(&mut self, raw: &str, sink: &mut ChunkSink<'_>) {
        if self.state.is_finished() {
            return;
        }
        let mut event_name: Option<&str> = None;
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(name) = line.strip_prefix("event:") {
                event_name = Some(name.trim());
                continue;
            }
            let Some(data) = parse_sse_data(line) else {
                continue;
            };
            match serde_json::from_str::<AnthropicEvent>(data) {
                Ok(event) => {
                    // The data object usually carries its own type; the
                    // event: line is the fallback.
                    let event_type = event
                        .r#type
                        .clone()
                        .or_else(|| event_name.map(str::to_string))
                        .unwrap_or_default();
                    self.process_event(&event_type, &event, sink);
                    if self.state.is_finished() {
                        return;
                    }
                }
                Err(err) => {
                    debug!(error = %err, "unparseable Anthropic event");
                    sink(self.state.parse_error_chunk(format!("unparseable event: {err}")));
                }
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

fn parse_stop_reason(s: &str) -> Option<FinishReason> {
    match s {
        "end_turn" | "stop_sequence" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        "tool_use" => Some(FinishReason::ToolCalls),
        _ => None,
    }
}

// Anthropic wire types (internal)

#[derive(Deserialize)]
struct AnthropicEvent {
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    message: Option<AnthropicMessageStart>,
    #[serde(default)]
    content_block: Option<AnthropicContentBlock>,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    error: Option<AnthropicError>,
}

#[derive(Deserialize)]
struct AnthropicMessageStart {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    partial_json: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct AnthropicError {
    #[serde(default)]
    message: Option<String>,
}
