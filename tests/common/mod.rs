//! Shared test doubles: scripted transports, a static tool registry, and an
//! event log for stream callbacks.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::StreamExt;

use quill::error::{QuillError, Result};
use quill::pipeline::{LlmStreamEvent, StreamCallback};
use quill::tools::{Tool, ToolRegistry, ToolSpec};
use quill::transport::{ProviderTransport, RawPayloadStream, TransportRequest};
use quill::types::ProviderKind;

/// Transport that replays scripted payload sequences, one script per
/// request. When the queue runs dry it replays the fallback script, so a
/// "model that always asks for tools" is just a fallback with a tool call.
pub struct ScriptedTransport {
    provider: ProviderKind,
    model: String,
    scripts: Mutex<VecDeque<Vec<String>>>,
    fallback: Option<Vec<String>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(provider: ProviderKind, scripts: Vec<Vec<&str>>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            model: "test-model".to_string(),
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|s| s.into_iter().map(String::from).collect())
                    .collect(),
            ),
            fallback: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transport that replays the same script on every request.
    pub fn looping(provider: ProviderKind, script: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            model: "test-model".to_string(),
            scripts: Mutex::new(VecDeque::new()),
            fallback: Some(script.into_iter().map(String::from).collect()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Number of model calls issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests as received, for asserting on folded conversations.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, request: TransportRequest) -> Result<RawPayloadStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let payloads = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .pop_front()
                .or_else(|| self.fallback.clone())
                .unwrap_or_default()
        };
        Ok(futures::stream::iter(payloads.into_iter().map(Ok)).boxed())
    }
}

/// Transport whose payload stream never yields, for inactivity timeouts.
pub struct HangingTransport {
    provider: ProviderKind,
    model: String,
}

impl HangingTransport {
    pub fn new(provider: ProviderKind) -> Arc<Self> {
        Arc::new(Self {
            provider,
            model: "test-model".to_string(),
        })
    }
}

#[async_trait]
impl ProviderTransport for HangingTransport {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, _request: TransportRequest) -> Result<RawPayloadStream> {
        Ok(futures::stream::pending().boxed())
    }
}

type ToolHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value>> + Send + Sync>;

/// Closure-backed tool for tests.
pub struct FnTool {
    spec: ToolSpec,
    handler: ToolHandler,
}

impl FnTool {
    pub fn new<F>(name: &str, handler: F) -> Arc<dyn Tool>
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Arc::new(Self {
            spec: ToolSpec::new(
                name,
                format!("test tool {name}"),
                serde_json::json!({ "type": "object", "properties": {} }),
            ),
            handler: Arc::new(move |args| {
                let handler = handler.clone();
                Box::pin(async move { handler(args) })
            }),
        })
    }

    /// Tool whose execution never completes, for timeout tests.
    pub fn pending(name: &str) -> Arc<dyn Tool> {
        Arc::new(Self {
            spec: ToolSpec::new(
                name,
                format!("test tool {name}"),
                serde_json::json!({ "type": "object", "properties": {} }),
            ),
            handler: Arc::new(|_| Box::pin(futures::future::pending())),
        })
    }
}

#[async_trait]
impl Tool for FnTool {
    fn definition(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        (self.handler)(args).await
    }
}

/// In-memory registry for tests.
#[derive(Default)]
pub struct StaticRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl StaticRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Arc<Self> {
        Arc::new(Self {
            tools: tools
                .into_iter()
                .map(|t| (t.definition().name.clone(), t))
                .collect(),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ToolRegistry for StaticRegistry {
    fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

/// Captures every event delivered to the stream callback.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<LlmStreamEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callback(self: &Arc<Self>) -> StreamCallback {
        let log = self.clone();
        Arc::new(move |event| {
            log.events.lock().unwrap().push(event);
        })
    }

    pub fn events(&self) -> Vec<LlmStreamEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn content_text(&self) -> String {
        self.events()
            .iter()
            .filter_map(|e| e.content.clone())
            .collect()
    }

    pub fn done_events(&self) -> Vec<LlmStreamEvent> {
        self.events().into_iter().filter(|e| e.done).collect()
    }
}

/// A quiet error helper for scripted failures.
pub fn tool_failure(message: &str) -> QuillError {
    QuillError::tool_execution("test", message)
}
