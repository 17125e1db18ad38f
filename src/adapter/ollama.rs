//! Ollama chat stream adapter.
//!
//! Wire grammar: newline-delimited JSON objects carrying `message.content`,
//! optionally `message.tool_calls`, a `done` boolean, and
//! `prompt_eval_count`/`eval_count` on the final object.

use serde::Deserialize;
use tracing::debug;

use crate::types::{AggregatedResponse, ProviderKind, TokenUsage, UnifiedStreamChunk};

use super::{AdapterState, ChunkSink, StreamAdapter};

pub struct OllamaStreamAdapter {
    state: AdapterState,
}

impl OllamaStreamAdapter {
    pub fn new() -> Self {
        Self {
            state: AdapterState::new(ProviderKind::Ollama),
        }
    }

    fn process_object(&mut self, data: &str, sink: &mut ChunkSink<'_>) {
        let payload: OllamaStreamPayload = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "unparseable Ollama payload");
                sink(self
                    .state
                    .parse_error_chunk(format!("unparseable payload: {err}")));
                return;
            }
        };

        if let Some(model) = payload.model {
            self.state.set_model(model);
        }

        if let Some(message) = payload.message {
            if !message.content.is_empty() {
                sink(self.state.content_chunk(&message.content));
            }

            // Ollama sends tool calls whole, not fragmented; each becomes a
            // single fragment covering the full argument object.
            for call in message.tool_calls.unwrap_or_default() {
                let Some(function) = call.function else { continue };
                let fragment =
                    serde_json::to_string(&function.arguments).unwrap_or_else(|_| "{}".into());
                let index = self.state.accumulators.len() as u32;
                let (id, name) = {
                    let acc = self.state.accumulators.entry(index);
                    acc.id = format!("call_{index}");
                    acc.name = function.name.clone();
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
        }

        if payload.done {
            if payload.prompt_eval_count.is_some() || payload.eval_count.is_some() {
                self.state.set_usage(TokenUsage::new(
                    payload.prompt_eval_count.unwrap_or(0),
                    payload.eval_count.unwrap_or(0),
                ));
            }
            if let Some(done) = self.state.done_chunk() {
                sink(done);
            }
        }
    }
}

impl Default for OllamaStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAdapter for OllamaStreamAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn process_payload(&mut self, raw: &str, sink: &mut ChunkSink<'_>) {
        if self.state.is_finished() {
            return;
        }
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.process_object(line, sink);
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

// Ollama wire types (internal)

#[derive(Deserialize)]
struct OllamaStreamPayload {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    function: Option<OllamaFunction>,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(adapter: &mut OllamaStreamAdapter, raw: &str) -> Vec<UnifiedStreamChunk> {
        let mut out = Vec::new();
        adapter.process_payload(raw, &mut |chunk| out.push(chunk));
        out
    }

    #[test]
    fn content_then_done_with_token_counts() {
        let mut adapter = OllamaStreamAdapter::new();
        let first = collect(
            &mut adapter,
            r#"{"model":"llama3.1","message":{"content":"Hi"},"done":false}"#,
        );
        let second = collect(
            &mut adapter,
            r#"{"message":{"content":""},"done":true,"prompt_eval_count":10,"eval_count":5}"#,
        );

        assert_eq!(first.len(), 1);
        assert!(matches!(
            &first[0],
            UnifiedStreamChunk::Content { text, .. } if text == "Hi"
        ));
        assert_eq!(second.len(), 1);
        match &second[0] {
            UnifiedStreamChunk::Done { metadata } => {
                assert_eq!(metadata.usage.unwrap().total_tokens, 15);
            }
            other => panic!("expected done chunk, got {other:?}"),
        }
    }

    #[test]
    fn whole_tool_calls_get_synthetic_ids() {
        let mut adapter = OllamaStreamAdapter::new();
        let chunks = collect(
            &mut adapter,
            r#"{"message":{"content":"","tool_calls":[{"function":{"name":"smart_search","arguments":{"query":"todo"}}}]},"done":false}"#,
        );
        match &chunks[0] {
            UnifiedStreamChunk::ToolCall {
                id,
                name,
                arguments_fragment,
                ..
            } => {
                assert_eq!(id, "call_0");
                assert_eq!(name, "smart_search");
                let parsed: serde_json::Value =
                    serde_json::from_str(arguments_fragment).unwrap();
                assert_eq!(parsed["query"], "todo");
            }
            other => panic!("expected tool call chunk, got {other:?}"),
        }
    }

    #[test]
    fn multiple_objects_in_one_read_are_all_processed() {
        let mut adapter = OllamaStreamAdapter::new();
        let chunks = collect(
            &mut adapter,
            "{\"message\":{\"content\":\"a\"},\"done\":false}\n{\"message\":{\"content\":\"b\"},\"done\":false}",
        );
        let texts: Vec<_> = chunks
            .iter()
            .filter_map(|c| match c {
                UnifiedStreamChunk::Content { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
    }
}
