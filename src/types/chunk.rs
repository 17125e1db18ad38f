//! The unified chunk model: the provider-agnostic vocabulary every other
//! component speaks.

use serde::{Deserialize, Serialize};

use super::usage::TokenUsage;

/// Provider family a stream originates from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Metadata carried on non-error chunks. Usage and finish reason typically
/// only arrive on the terminal payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChunkMetadata {
    /// Metadata with only the provider set.
    pub fn bare(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: None,
            finish_reason: None,
            usage: None,
        }
    }
}

/// Distinguishes how a stream error arose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    /// A raw payload could not be parsed.
    Parse,
    /// The inactivity window elapsed with no inbound payload.
    Timeout,
    /// The provider itself reported an error event.
    Provider,
}

/// One normalized streaming event.
///
/// Invariant: a stream emits at most one terminal chunk (`Done` or `Error`),
/// and it is always the last chunk emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedStreamChunk {
    Content {
        text: String,
        metadata: ChunkMetadata,
    },
    ToolCall {
        id: String,
        name: String,
        /// The argument text added by this payload, not the accumulated
        /// whole; consumers concatenate fragments per id.
        arguments_fragment: String,
        metadata: ChunkMetadata,
    },
    Done {
        metadata: ChunkMetadata,
    },
    Error {
        message: String,
        kind: StreamErrorKind,
    },
}

impl UnifiedStreamChunk {
    /// Whether this chunk terminates its stream.
    ///
    /// Parse errors are recoverable: the line-delimited wire grammars always
    /// resynchronize on the next payload, so an `Error` of kind `Parse` may
    /// be followed by further chunks. Timeout and provider errors end the
    /// stream.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Done { .. } => true,
            Self::Error { kind, .. } => !matches!(kind, StreamErrorKind::Parse),
            _ => false,
        }
    }
}

/// A tool call with fully reassembled argument text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssembledToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text as produced by the model. Parsed (with a fallback)
    /// only at the tool boundary.
    pub arguments: String,
}

/// Final response folded out of one chunk stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedResponse {
    pub text: String,
    pub tool_calls: Vec<AssembledToolCall>,
    pub usage: Option<TokenUsage>,
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl AggregatedResponse {
    /// Whether the model requested any tool calls this turn.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
