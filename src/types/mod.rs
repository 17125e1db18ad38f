//! Shared types: the unified chunk model, conversation messages, and usage.

pub mod chunk;
pub mod message;
pub mod usage;

pub use chunk::{
    AggregatedResponse, AssembledToolCall, ChunkMetadata, FinishReason, ProviderKind,
    StreamErrorKind, UnifiedStreamChunk,
};
pub use message::{ChatMessage, ContentPart, Role, ToolResultContent};
pub use usage::TokenUsage;
