//! Stream aggregator: folds a chunk sequence into one final response.

use crate::types::{
    AggregatedResponse, AssembledToolCall, FinishReason, ProviderKind, TokenUsage,
    UnifiedStreamChunk,
};

/// Folds unified chunks into an [`AggregatedResponse`].
///
/// Single-use: created per request and discarded after the terminal chunk.
/// Content is append-only in arrival order; metadata from `Done` wins over
/// anything harvested earlier.
#[derive(Debug)]
pub struct StreamAggregator {
    provider: ProviderKind,
    chunks: Vec<UnifiedStreamChunk>,
    text: String,
    tool_calls: Vec<AssembledToolCall>,
    model: Option<String>,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
}

impl StreamAggregator {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            chunks: Vec::new(),
            text: String::new(),
            tool_calls: Vec::new(),
            model: None,
            finish_reason: None,
            usage: None,
        }
    }

    /// Fold one chunk into the running response.
    pub fn add_chunk(&mut self, chunk: UnifiedStreamChunk) {
        match &chunk {
            UnifiedStreamChunk::Content { text, metadata } => {
                self.text.push_str(text);
                if self.model.is_none() {
                    self.model = metadata.model.clone();
                }
            }
            UnifiedStreamChunk::ToolCall {
                id,
                name,
                arguments_fragment,
                ..
            } => {
                // First occurrence establishes the call; later chunks with
                // the same id extend its argument string.
                if let Some(existing) = self.tool_calls.iter_mut().find(|c| c.id == *id) {
                    if existing.name.is_empty() {
                        existing.name = name.clone();
                    }
                    existing.arguments.push_str(arguments_fragment);
                } else {
                    self.tool_calls.push(AssembledToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: arguments_fragment.clone(),
                    });
                }
            }
            UnifiedStreamChunk::Done { metadata } => {
                if metadata.model.is_some() {
                    self.model = metadata.model.clone();
                }
                if metadata.finish_reason.is_some() {
                    self.finish_reason = metadata.finish_reason;
                }
                if metadata.usage.is_some() {
                    self.usage = metadata.usage;
                }
            }
            UnifiedStreamChunk::Error { .. } => {}
        }
        self.chunks.push(chunk);
    }

    /// The response folded so far.
    pub fn response(&self) -> AggregatedResponse {
        AggregatedResponse {
            text: self.text.clone(),
            tool_calls: self.tool_calls.clone(),
            usage: self.usage,
            provider: self.provider,
            model: self.model.clone(),
            finish_reason: self.finish_reason,
        }
    }

    /// All chunks in arrival order.
    pub fn chunks(&self) -> &[UnifiedStreamChunk] {
        &self.chunks
    }

    /// Clear all folded state, keeping the provider.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.text.clear();
        self.tool_calls.clear();
        self.model = None;
        self.finish_reason = None;
        self.usage = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn content(text: &str) -> UnifiedStreamChunk {
        UnifiedStreamChunk::Content {
            text: text.into(),
            metadata: ChunkMetadata::bare(ProviderKind::OpenAi),
        }
    }

    #[test]
    fn text_concatenates_in_feed_order() {
        let mut agg = StreamAggregator::new(ProviderKind::OpenAi);
        for part in ["Hel", "lo ", "world"] {
            agg.add_chunk(content(part));
        }
        assert_eq!(agg.response().text, "Hello world");
    }

    #[test]
    fn tool_call_fragments_extend_by_id() {
        let mut agg = StreamAggregator::new(ProviderKind::OpenAi);
        agg.add_chunk(UnifiedStreamChunk::ToolCall {
            id: "1".into(),
            name: "smart_search".into(),
            arguments_fragment: "{\"a\":".into(),
            metadata: ChunkMetadata::bare(ProviderKind::OpenAi),
        });
        agg.add_chunk(UnifiedStreamChunk::ToolCall {
            id: "1".into(),
            name: "smart_search".into(),
            arguments_fragment: "1}".into(),
            metadata: ChunkMetadata::bare(ProviderKind::OpenAi),
        });
        let response = agg.response();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments, "{\"a\":1}");
    }

    #[test]
    fn done_metadata_wins_last() {
        let mut agg = StreamAggregator::new(ProviderKind::OpenAi);
        agg.add_chunk(UnifiedStreamChunk::Content {
            text: "x".into(),
            metadata: ChunkMetadata {
                provider: ProviderKind::OpenAi,
                model: Some("draft-model".into()),
                finish_reason: None,
                usage: None,
            },
        });
        agg.add_chunk(UnifiedStreamChunk::Done {
            metadata: ChunkMetadata {
                provider: ProviderKind::OpenAi,
                model: Some("final-model".into()),
                finish_reason: Some(FinishReason::Stop),
                usage: Some(TokenUsage::new(3, 4)),
            },
        });
        let response = agg.response();
        assert_eq!(response.model.as_deref(), Some("final-model"));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 7);
    }

    #[test]
    fn reset_clears_folded_state() {
        let mut agg = StreamAggregator::new(ProviderKind::OpenAi);
        agg.add_chunk(content("abc"));
        agg.reset();
        assert!(agg.chunks().is_empty());
        assert_eq!(agg.response().text, "");
    }
}
