//! Quill — LLM streaming and tool-orchestration engine.
//!
//! The engine behind the Quill knowledge base's assistant: it normalizes
//! heterogeneous provider streams into one chunk model, folds them into
//! responses, drives a bounded tool-calling loop with an optional
//! confirmation gate, and tracks per-tool reliability so chronically
//! failing tools drop out of rotation.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use quill::prelude::*;
//!
//! # async fn example(
//! #     transport: Arc<dyn quill::transport::ProviderTransport>,
//! #     registry: Arc<dyn quill::tools::ToolRegistry>,
//! # ) -> quill::error::Result<()> {
//! let monitor = ToolReliabilityMonitor::with_defaults();
//! let contexts = Arc::new(ToolContextManager::with_default_registry());
//! let pipeline = ChatPipeline::new(transport, registry, monitor, contexts);
//!
//! let response = pipeline
//!     .execute(PipelineInput {
//!         messages: vec![ChatMessage::user("What did I write about larches?")],
//!         query: Some("larches".into()),
//!         options: ChatOptions::default(),
//!         stream_callback: None,
//!     })
//!     .await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod context;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod prelude;
pub mod tools;
pub mod transport;
pub mod types;
