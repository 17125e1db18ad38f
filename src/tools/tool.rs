//! Tool and registry boundary traits.
//!
//! The engine executes tools through these traits and must not know tool
//! internals; concrete tools (note search, note creation, ...) live in the
//! host application.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QuillError;

/// Static definition of a tool as offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Core tool trait, implemented by the host application's tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition offered to the model.
    fn definition(&self) -> &ToolSpec;

    /// Execute the tool with parsed arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, QuillError>;
}

/// Registry of tools available to the engine.
///
/// Implemented by the host; the engine only lists and looks up.
pub trait ToolRegistry: Send + Sync {
    /// All registered tools.
    fn list_tools(&self) -> Vec<Arc<dyn Tool>>;

    /// Look up a tool by name.
    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>>;
}
