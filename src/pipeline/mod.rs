//! Tool-orchestration pipeline.
//!
//! Drives one conversation turn: prepare messages, call the model through
//! its transport, normalize and fold the stream, then execute any requested
//! tool calls (optionally gated by user confirmation) and loop with a
//! bounded number of follow-up calls.

pub mod events;
pub mod interaction;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{new_adapter, unified_chunk_stream, StreamAggregator};
use crate::error::{QuillError, Result};
use crate::monitor::{ExecutionRecord, ExecutionStatus, ToolReliabilityMonitor};
use crate::context::ToolContextManager;
use crate::tools::{parse_tool_arguments, ToolRegistry, ToolSpec};
use crate::transport::{ProviderTransport, TransportRequest};
use crate::types::{
    AggregatedResponse, AssembledToolCall, ChatMessage, ProviderKind, Role, StreamErrorKind,
    UnifiedStreamChunk,
};

pub use events::{
    ConfirmationRequest, LlmStreamEvent, StreamCallback, ToolExecutionEvent, ToolExecutionPhase,
};
pub use interaction::{
    assess_risk, InteractionBroker, InteractionConfig, InteractionOutcome, PendingInteraction,
    RiskLevel, TimeoutAction, UserResponse,
};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hard bound on follow-up model calls per turn.
    pub max_tool_call_iterations: u32,
    /// Inactivity window before a stream is declared failed.
    pub stream_idle_timeout: Duration,
    /// Per-execution bound before a tool is reported as timed out.
    pub tool_execution_timeout: Duration,
    /// System prompt injected when the conversation has none.
    pub system_prompt: Option<String>,
    pub interaction: InteractionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tool_call_iterations: 5,
            stream_idle_timeout: Duration::from_secs(120),
            tool_execution_timeout: Duration::from_secs(30),
            system_prompt: None,
            interaction: InteractionConfig::default(),
        }
    }
}

/// Per-turn options from the caller.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Enrich the system prompt with note context for the query.
    pub use_advanced_context: bool,
    /// Surface tool-activity narration as `thinking` events.
    pub show_thinking: bool,
    /// Forward content chunks to the stream callback as they arrive.
    pub stream: bool,
    /// Override the configured iteration bound for this turn.
    pub max_tool_call_iterations: Option<u32>,
}

/// One conversation turn.
pub struct PipelineInput {
    pub messages: Vec<ChatMessage>,
    /// The user's new message, used for context enrichment.
    pub query: Option<String>,
    pub options: ChatOptions,
    pub stream_callback: Option<StreamCallback>,
}

/// Capability that surfaces note content relevant to a query.
///
/// Search and ranking live in the host application; the pipeline only folds
/// whatever context comes back into the system prompt.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn related_context(&self, query: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, Default)]
struct StageMetric {
    average_ms: f64,
    count: u64,
}

/// The tool-orchestration pipeline.
///
/// All collaborators are injected; the pipeline owns no global state beyond
/// its interaction broker and stage metrics.
pub struct ChatPipeline {
    transport: Arc<dyn ProviderTransport>,
    registry: Arc<dyn ToolRegistry>,
    monitor: Arc<ToolReliabilityMonitor>,
    contexts: Arc<ToolContextManager>,
    interactions: Arc<InteractionBroker>,
    context_source: Option<Arc<dyn ContextSource>>,
    config: PipelineConfig,
    metrics: Mutex<HashMap<String, StageMetric>>,
}

impl ChatPipeline {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        registry: Arc<dyn ToolRegistry>,
        monitor: Arc<ToolReliabilityMonitor>,
        contexts: Arc<ToolContextManager>,
    ) -> Self {
        Self {
            transport,
            registry,
            monitor,
            contexts,
            interactions: Arc::new(InteractionBroker::new()),
            context_source: None,
            config: PipelineConfig::default(),
            metrics: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_context_source(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.context_source = Some(source);
        self
    }

    /// The interaction broker, for routing user responses and teardown.
    pub fn interactions(&self) -> Arc<InteractionBroker> {
        self.interactions.clone()
    }

    /// Resolve a pending confirmation. Returns `true` if one existed.
    pub fn handle_user_response(&self, interaction_id: &str, response: UserResponse) -> bool {
        self.interactions.handle_user_response(interaction_id, response)
    }

    /// Resolve every pending confirmation as cancel.
    pub fn cancel_all_pending(&self) {
        self.interactions.cancel_all();
    }

    /// Execute one conversation turn.
    ///
    /// The stream callback (when present) always receives a terminal `done`
    /// event, carrying the error text if the turn failed.
    pub async fn execute(&self, input: PipelineInput) -> Result<AggregatedResponse> {
        let callback = input.stream_callback.clone();
        match self.run(input).await {
            Ok(response) => {
                self.emit(callback.as_ref(), LlmStreamEvent::done());
                Ok(response)
            }
            Err(err) => {
                self.emit(callback.as_ref(), LlmStreamEvent::failed(err.to_string()));
                Err(err)
            }
        }
    }

    async fn run(&self, input: PipelineInput) -> Result<AggregatedResponse> {
        let started = tokio::time::Instant::now();
        let request_id = Uuid::new_v4();
        let provider = self.transport.provider();
        let callback = input.stream_callback.clone();
        let iteration_cap = input
            .options
            .max_tool_call_iterations
            .unwrap_or(self.config.max_tool_call_iterations);

        info!(
            %request_id,
            provider = %provider,
            model = self.transport.model(),
            streaming = input.options.stream,
            "pipeline started"
        );

        let prep_started = tokio::time::Instant::now();
        let mut messages = self.prepare_messages(&input).await;
        self.record_metric("message_preparation", prep_started.elapsed());

        let tool_specs = self.offered_tools(provider);
        debug!(tools = tool_specs.len(), "tools offered to model");

        let mut follow_ups = 0u32;
        let response = loop {
            let call_started = tokio::time::Instant::now();
            let response = self
                .call_model(&messages, &tool_specs, &input.options, callback.as_ref())
                .await?;
            self.record_metric("model_call", call_started.elapsed());

            if !response.has_tool_calls() {
                break response;
            }
            if follow_ups >= iteration_cap {
                warn!(
                    %request_id,
                    iterations = follow_ups,
                    "tool iteration cap reached, terminating loop"
                );
                break response;
            }
            follow_ups += 1;

            let tools_started = tokio::time::Instant::now();
            messages.push(ChatMessage::assistant_with_tool_calls(
                response.text.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let message = self
                    .handle_tool_call(call, provider, &input.options, callback.as_ref())
                    .await;
                messages.push(message);
            }
            self.record_metric("tool_handling", tools_started.elapsed());
        };

        self.record_metric("pipeline_total", started.elapsed());
        info!(
            %request_id,
            follow_ups,
            response_len = response.text.len(),
            "pipeline completed"
        );
        Ok(response)
    }

    /// Inject the system prompt and, when requested, note context from the
    /// injected context source.
    async fn prepare_messages(&self, input: &PipelineInput) -> Vec<ChatMessage> {
        let mut messages = input.messages.clone();

        if let Some(prompt) = &self.config.system_prompt {
            if !messages.iter().any(|m| m.role == Role::System) {
                messages.insert(0, ChatMessage::system(prompt.clone()));
            }
        }

        if input.options.use_advanced_context {
            if let (Some(query), Some(source)) = (&input.query, &self.context_source) {
                match source.related_context(query).await {
                    Ok(Some(context)) => {
                        if let Some(system) =
                            messages.iter_mut().find(|m| m.role == Role::System)
                        {
                            system.append_text(&format!("\n\nContext:\n{context}"));
                        } else {
                            messages.insert(0, ChatMessage::system(format!("Context:\n{context}")));
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "context extraction failed"),
                }
            }
        }

        messages
    }

    /// Tool definitions offered this turn: the current context's selection,
    /// minus tools the monitor has taken out of rotation, minus tools the
    /// registry does not actually have.
    fn offered_tools(&self, provider: ProviderKind) -> Vec<ToolSpec> {
        let mut specs = Vec::new();
        for meta in self
            .contexts
            .tools_for_context(self.contexts.current_context())
        {
            if self.monitor.is_tool_disabled(&meta.name, provider) {
                debug!(tool = %meta.name, "skipping disabled tool");
                continue;
            }
            if let Some(tool) = self.registry.get_tool(&meta.name) {
                specs.push(tool.definition().clone());
            }
        }
        specs
    }

    /// One model call: transport → adapter → unified chunks → aggregate.
    async fn call_model(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        options: &ChatOptions,
        callback: Option<&StreamCallback>,
    ) -> Result<AggregatedResponse> {
        let provider = self.transport.provider();
        let request = TransportRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            stream: options.stream,
        };
        let payloads = self.transport.request(request).await?;
        let adapter = new_adapter(provider)?;
        let mut chunks =
            unified_chunk_stream(adapter, payloads, Some(self.config.stream_idle_timeout));

        let mut aggregator = StreamAggregator::new(provider);
        while let Some(chunk) = chunks.next().await {
            match &chunk {
                UnifiedStreamChunk::Content { text, .. } => {
                    if options.stream && !text.is_empty() {
                        self.emit(callback, LlmStreamEvent::content(text.clone()));
                    }
                }
                UnifiedStreamChunk::Error { message, kind } => match kind {
                    StreamErrorKind::Parse => {
                        debug!(error = %message, "recoverable parse error in stream");
                    }
                    StreamErrorKind::Timeout => {
                        return Err(QuillError::Timeout(
                            self.config.stream_idle_timeout.as_millis() as u64,
                        ));
                    }
                    StreamErrorKind::Provider => {
                        return Err(QuillError::transport(provider, message.clone()));
                    }
                },
                _ => {}
            }
            aggregator.add_chunk(chunk);
        }

        Ok(aggregator.response())
    }

    /// Execute one tool call through the risk gate, returning the tool
    /// result message to fold into the conversation. Never fails the turn:
    /// errors become error-text tool results the model can react to.
    async fn handle_tool_call(
        &self,
        call: &AssembledToolCall,
        provider: ProviderKind,
        options: &ChatOptions,
        callback: Option<&StreamCallback>,
    ) -> ChatMessage {
        let tool_name = call.name.as_str();
        let args = parse_tool_arguments(&call.arguments);
        let risk = assess_risk(tool_name);

        let mut gate_outcome = None;
        if self.config.interaction.requires_confirmation(tool_name, risk) {
            let (id, response_rx) = self.interactions.register(tool_name);
            self.emit(
                callback,
                LlmStreamEvent::confirmation(ConfirmationRequest {
                    id: id.clone(),
                    tool_name: tool_name.to_string(),
                    arguments: args.clone(),
                    risk_level: risk,
                    timeout_ms: self.config.interaction.confirmation_timeout.as_millis() as u64,
                }),
            );
            let outcome = self
                .interactions
                .await_confirmation(
                    &id,
                    response_rx,
                    self.config.interaction.confirmation_timeout,
                    self.config.interaction.timeout_action,
                )
                .await;

            match outcome {
                InteractionOutcome::Cancelled | InteractionOutcome::TimeoutCancelled => {
                    info!(tool = %tool_name, ?outcome, "tool call cancelled");
                    // No execution happened; the model is told why.
                    return ChatMessage::tool_result(
                        call.id.clone(),
                        tool_name,
                        serde_json::Value::String(format!(
                            "USER_CANCELLED: execution of {tool_name} was cancelled by user request"
                        )),
                        false,
                    );
                }
                InteractionOutcome::Confirmed | InteractionOutcome::TimeoutExecuted => {
                    gate_outcome = Some(outcome);
                }
            }
        }

        if options.show_thinking {
            self.emit(
                callback,
                LlmStreamEvent::thinking(format!("Executing tool {tool_name}")),
            );
        }
        let mut start_event = ToolExecutionEvent::start(tool_name, args.clone());
        if let Some(outcome) = gate_outcome {
            start_event = start_event.with_outcome(outcome);
        }
        self.emit(callback, LlmStreamEvent::tool_execution(start_event));

        let Some(tool) = self.registry.get_tool(tool_name) else {
            let error = format!("Tool not found: {tool_name}");
            warn!(tool = %tool_name, "unknown tool requested by model");
            self.emit(
                callback,
                LlmStreamEvent::tool_execution(ToolExecutionEvent::error(tool_name, &error)),
            );
            return ChatMessage::tool_result(
                call.id.clone(),
                tool_name,
                serde_json::json!({ "error": error }),
                true,
            );
        };

        let exec_started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(
            self.config.tool_execution_timeout,
            tool.execute(args.clone()),
        )
        .await;
        let elapsed_ms = exec_started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(result)) => {
                self.monitor.record_execution(ExecutionRecord::new(
                    tool_name,
                    provider,
                    ExecutionStatus::Success,
                    elapsed_ms,
                ));
                debug!(tool = %tool_name, elapsed_ms, "tool execution succeeded");
                self.emit(
                    callback,
                    LlmStreamEvent::tool_execution(ToolExecutionEvent::complete(
                        tool_name,
                        result.clone(),
                    )),
                );
                ChatMessage::tool_result(call.id.clone(), tool_name, result, false)
            }
            Ok(Err(err)) => {
                let error = err.to_string();
                self.monitor.record_execution(
                    ExecutionRecord::new(tool_name, provider, ExecutionStatus::Failure, elapsed_ms)
                        .with_error(&error),
                );
                warn!(tool = %tool_name, error = %error, "tool execution failed");
                self.emit(
                    callback,
                    LlmStreamEvent::tool_execution(ToolExecutionEvent::error(tool_name, &error)),
                );
                ChatMessage::tool_result(
                    call.id.clone(),
                    tool_name,
                    serde_json::json!({ "error": error }),
                    true,
                )
            }
            Err(_) => {
                let error = format!(
                    "tool execution timed out after {}ms",
                    self.config.tool_execution_timeout.as_millis()
                );
                self.monitor.record_execution(
                    ExecutionRecord::new(tool_name, provider, ExecutionStatus::Timeout, elapsed_ms)
                        .with_error(&error),
                );
                warn!(tool = %tool_name, "tool execution timed out");
                self.emit(
                    callback,
                    LlmStreamEvent::tool_execution(ToolExecutionEvent::error(tool_name, &error)),
                );
                ChatMessage::tool_result(
                    call.id.clone(),
                    tool_name,
                    serde_json::json!({ "error": error }),
                    true,
                )
            }
        }
    }

    fn emit(&self, callback: Option<&StreamCallback>, event: LlmStreamEvent) {
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn record_metric(&self, name: &str, elapsed: Duration) {
        let mut metrics = self.metrics.lock().expect("pipeline metrics poisoned");
        let metric = metrics.entry(name.to_string()).or_default();
        let elapsed_ms = elapsed.as_millis() as f64;
        metric.average_ms = (metric.average_ms * metric.count as f64 + elapsed_ms)
            / (metric.count + 1) as f64;
        metric.count += 1;
    }

    /// Running average duration per stage, in milliseconds.
    pub fn metrics(&self) -> HashMap<String, f64> {
        self.metrics
            .lock()
            .expect("pipeline metrics poisoned")
            .iter()
            .map(|(name, metric)| (name.clone(), metric.average_ms))
            .collect()
    }

    pub fn reset_metrics(&self) {
        self.metrics
            .lock()
            .expect("pipeline metrics poisoned")
            .clear();
    }
}
