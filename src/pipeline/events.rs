//! Outbound stream events for the presentation layer.

use std::sync::Arc;

use serde::Serialize;

use super::interaction::{InteractionOutcome, RiskLevel};

/// Callback the presentation layer injects to receive stream events.
pub type StreamCallback = Arc<dyn Fn(LlmStreamEvent) + Send + Sync>;

/// One `llm-stream` event as delivered to the presentation layer.
///
/// Exactly one event per turn has `done: true`; it may carry an `error`.
/// Content already streamed is never retracted.
#[derive(Debug, Clone, Serialize)]
pub struct LlmStreamEvent {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_execution: Option<ToolExecutionEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction: Option<ConfirmationRequest>,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LlmStreamEvent {
    fn base() -> Self {
        Self {
            kind: "llm-stream",
            content: None,
            thinking: None,
            tool_execution: None,
            interaction: None,
            done: false,
            error: None,
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::base()
        }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self {
            thinking: Some(text.into()),
            ..Self::base()
        }
    }

    pub fn tool_execution(event: ToolExecutionEvent) -> Self {
        Self {
            tool_execution: Some(event),
            ..Self::base()
        }
    }

    pub fn confirmation(request: ConfirmationRequest) -> Self {
        Self {
            interaction: Some(request),
            ..Self::base()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::base()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            done: true,
            error: Some(error.into()),
            ..Self::base()
        }
    }
}

/// Phase of one tool execution as seen by the UI.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionPhase {
    Start,
    Complete,
    Error,
}

/// Progress of one tool execution.
#[derive(Debug, Clone, Serialize)]
pub struct ToolExecutionEvent {
    pub phase: ToolExecutionPhase,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How the confirmation gate resolved, when one applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_outcome: Option<InteractionOutcome>,
}

impl ToolExecutionEvent {
    pub fn start(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            phase: ToolExecutionPhase::Start,
            tool_name: tool_name.into(),
            arguments: Some(arguments),
            result: None,
            error: None,
            interaction_outcome: None,
        }
    }

    pub fn complete(tool_name: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            phase: ToolExecutionPhase::Complete,
            tool_name: tool_name.into(),
            arguments: None,
            result: Some(result),
            error: None,
            interaction_outcome: None,
        }
    }

    pub fn error(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            phase: ToolExecutionPhase::Error,
            tool_name: tool_name.into(),
            arguments: None,
            result: None,
            error: Some(error.into()),
            interaction_outcome: None,
        }
    }

    pub fn with_outcome(mut self, outcome: InteractionOutcome) -> Self {
        self.interaction_outcome = Some(outcome);
        self
    }
}

/// A confirmation request surfaced to the user before a gated tool runs.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    pub id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub risk_level: RiskLevel,
    pub timeout_ms: u64,
}
