//! Provider transport boundary.
//!
//! Transports own the HTTP clients and authentication for a provider; the
//! engine hands them a prepared request and consumes the raw incremental
//! payloads they yield, one per network read. The engine never issues
//! requests itself.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::QuillError;
use crate::tools::ToolSpec;
use crate::types::{ChatMessage, ProviderKind};

/// Raw provider payloads as read off the wire, in arrival order.
pub type RawPayloadStream = BoxStream<'static, Result<String, QuillError>>;

/// A request handed to a transport for one model turn.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub messages: Vec<ChatMessage>,
    /// Tool definitions offered to the model this turn.
    pub tools: Vec<ToolSpec>,
    pub stream: bool,
}

/// A provider transport client.
///
/// Implementations translate the conversation into their provider's request
/// format, perform the network call, and yield each raw incremental payload
/// as a string. Payload grammar is provider-specific; the matching
/// [`StreamAdapter`](crate::adapter::StreamAdapter) normalizes it.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Provider family this transport serves.
    fn provider(&self) -> ProviderKind;

    /// Model identifier served by this transport.
    fn model(&self) -> &str;

    /// Issue one model call and return the raw payload stream.
    async fn request(&self, request: TransportRequest) -> Result<RawPayloadStream, QuillError>;
}
