//! Convenience re-exports.

pub use crate::adapter::{new_adapter, unified_chunk_stream, StreamAdapter, StreamAggregator};
pub use crate::context::{ToolContext, ToolContextManager, ToolMetadata};
pub use crate::error::{QuillError, Result};
pub use crate::monitor::{
    ExecutionRecord, ExecutionStatus, MonitorConfig, ToolReliabilityMonitor,
};
pub use crate::pipeline::{
    ChatOptions, ChatPipeline, InteractionConfig, LlmStreamEvent, PipelineConfig, PipelineInput,
    UserResponse,
};
pub use crate::tools::{Tool, ToolRegistry, ToolSpec};
pub use crate::transport::{ProviderTransport, TransportRequest};
pub use crate::types::{
    AggregatedResponse, AssembledToolCall, ChatMessage, ProviderKind, TokenUsage,
    UnifiedStreamChunk,
};
