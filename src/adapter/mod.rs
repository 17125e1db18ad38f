//! Provider stream adapters.
//!
//! Each provider family speaks its own incremental wire grammar; an adapter's
//! sole job is parsing that grammar and re-emitting [`UnifiedStreamChunk`]s.
//! Everything downstream is provider-agnostic.

pub mod accumulator;
pub mod aggregator;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

use std::time::Duration;

use futures::StreamExt;

use crate::error::QuillError;
use crate::transport::RawPayloadStream;
use crate::types::{
    AggregatedResponse, ChunkMetadata, FinishReason, ProviderKind, StreamErrorKind, TokenUsage,
    UnifiedStreamChunk,
};

use accumulator::ToolCallAccumulators;

pub use aggregator::StreamAggregator;

/// Sink adapters emit unified chunks into.
pub type ChunkSink<'a> = dyn FnMut(UnifiedStreamChunk) + 'a;

/// Normalizes one provider's raw payloads into unified chunks.
///
/// Adapters are single-use: one instance per stream, discarded after
/// [`complete`](StreamAdapter::complete). Parsing failures are data (error
/// chunks), never panics or `Err` across this boundary.
pub trait StreamAdapter: Send {
    /// Provider family this adapter parses.
    fn provider(&self) -> ProviderKind;

    /// Parse one raw payload, emitting zero or more chunks via `sink`.
    ///
    /// Payloads arriving after the terminal chunk are ignored.
    fn process_payload(&mut self, raw: &str, sink: &mut ChunkSink<'_>);

    /// Whether a terminal chunk has been emitted.
    fn is_finished(&self) -> bool;

    /// Synthesize the terminal `Done` chunk for a stream that ended without
    /// one; `None` if the stream already terminated.
    fn finish(&mut self) -> Option<UnifiedStreamChunk>;

    /// Consume the adapter, producing the final aggregated response.
    fn complete(self: Box<Self>) -> AggregatedResponse;
}

/// Create the adapter for a provider family.
#[allow(unused_variables)]
pub fn new_adapter(provider: ProviderKind) -> Result<Box<dyn StreamAdapter>, QuillError> {
    match provider {
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => Ok(Box::new(openai::OpenAiStreamAdapter::new())),
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => Ok(Box::new(anthropic::AnthropicStreamAdapter::new())),
        #[cfg(feature = "ollama")]
        ProviderKind::Ollama => Ok(Box::new(ollama::OllamaStreamAdapter::new())),
        #[allow(unreachable_patterns)]
        _ => Err(QuillError::Configuration(format!(
            "adapter for provider '{provider}' not enabled via feature flags"
        ))),
    }
}

/// Shared per-stream state embedded by every adapter.
#[derive(Debug)]
pub(crate) struct AdapterState {
    provider: ProviderKind,
    text: String,
    model: Option<String>,
    usage: Option<TokenUsage>,
    finish_reason: Option<FinishReason>,
    pub(crate) accumulators: ToolCallAccumulators,
    finished: bool,
}

impl AdapterState {
    pub(crate) fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            text: String::new(),
            model: None,
            usage: None,
            finish_reason: None,
            accumulators: ToolCallAccumulators::default(),
            finished: false,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub(crate) fn set_usage(&mut self, usage: TokenUsage) {
        self.usage = Some(usage);
    }

    pub(crate) fn set_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    /// Metadata for in-flight content/tool-call chunks.
    pub(crate) fn chunk_metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            provider: self.provider,
            model: self.model.clone(),
            finish_reason: None,
            usage: None,
        }
    }

    /// Record incremental text and build its content chunk.
    pub(crate) fn content_chunk(&mut self, text: &str) -> UnifiedStreamChunk {
        self.text.push_str(text);
        UnifiedStreamChunk::Content {
            text: text.to_string(),
            metadata: self.chunk_metadata(),
        }
    }

    /// Non-terminal parse error chunk; the stream resynchronizes on the next
    /// payload.
    pub(crate) fn parse_error_chunk(&self, message: impl Into<String>) -> UnifiedStreamChunk {
        UnifiedStreamChunk::Error {
            message: message.into(),
            kind: StreamErrorKind::Parse,
        }
    }

    /// Terminal provider-reported error chunk.
    pub(crate) fn provider_error_chunk(&mut self, message: impl Into<String>) -> UnifiedStreamChunk {
        self.finished = true;
        UnifiedStreamChunk::Error {
            message: message.into(),
            kind: StreamErrorKind::Provider,
        }
    }

    /// Terminal done chunk carrying whatever metadata has been harvested.
    /// `None` if a terminal chunk was already emitted.
    pub(crate) fn done_chunk(&mut self) -> Option<UnifiedStreamChunk> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(UnifiedStreamChunk::Done {
            metadata: ChunkMetadata {
                provider: self.provider,
                model: self.model.clone(),
                finish_reason: self.finish_reason,
                usage: self.usage,
            },
        })
    }

    /// Fold this stream's state into the final response.
    pub(crate) fn into_response(self) -> AggregatedResponse {
        AggregatedResponse {
            text: self.text,
            tool_calls: self.accumulators.freeze(),
            usage: self.usage,
            provider: self.provider,
            model: self.model,
            finish_reason: self.finish_reason,
        }
    }
}

/// Pump a raw payload stream through an adapter, yielding unified chunks.
///
/// This is where the inactivity timeout lives: if no payload arrives within
/// `idle_timeout`, a terminal `Error` chunk of kind `timeout` is synthesized
/// (the only event an adapter pipeline initiates without an inbound
/// payload). A stream that ends without a terminal payload gets a synthesized
/// `Done` so downstream consumers are never left hanging.
pub fn unified_chunk_stream(
    mut adapter: Box<dyn StreamAdapter>,
    payloads: RawPayloadStream,
    idle_timeout: Option<Duration>,
) -> futures::stream::BoxStream<'static, UnifiedStreamChunk> {
    let stream = async_stream::stream! {
        let mut payloads = payloads;
        loop {
            let next = match idle_timeout {
                Some(window) => match tokio::time::timeout(window, payloads.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        yield UnifiedStreamChunk::Error {
                            message: format!(
                                "stream inactivity timeout after {}ms",
                                window.as_millis()
                            ),
                            kind: StreamErrorKind::Timeout,
                        };
                        return;
                    }
                },
                None => payloads.next().await,
            };

            match next {
                Some(Ok(raw)) => {
                    let mut emitted = Vec::new();
                    adapter.process_payload(&raw, &mut |chunk| emitted.push(chunk));
                    for chunk in emitted {
                        let terminal = chunk.is_terminal();
                        yield chunk;
                        if terminal {
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    yield UnifiedStreamChunk::Error {
                        message: err.to_string(),
                        kind: StreamErrorKind::Provider,
                    };
                    return;
                }
                None => {
                    if let Some(done) = adapter.finish() {
                        yield done;
                    }
                    return;
                }
            }
        }
    };
    Box::pin(stream)
}

/// Extract the data portion of an SSE line, if it is one.
pub(crate) fn parse_sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}
