//! Context-aware tool budgeting.
//!
//! Each usage context is a tier bounding which tools, and how many tokens of
//! tool description, may be offered to the model in one turn. Selection is
//! greedy by priority; the essential "core" tools (priority ≤ 8) are always
//! included, budget or not.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Ceiling below which a tool counts as core and bypasses the budget.
pub const CORE_PRIORITY_CEILING: u32 = 8;

/// Usage context tiers.
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
pub enum ToolContext {
    Core,
    Advanced,
    Admin,
    Full,
}

impl ToolContext {
    /// Tiers ordered from smallest to largest.
    pub const ALL: [ToolContext; 4] = [
        ToolContext::Core,
        ToolContext::Advanced,
        ToolContext::Admin,
        ToolContext::Full,
    ];

    /// Fixed token budget for tool descriptions in this tier.
    pub fn token_budget(self) -> u32 {
        match self {
            ToolContext::Core => 5000,
            ToolContext::Advanced => 8000,
            ToolContext::Admin => 12000,
            ToolContext::Full => 15000,
        }
    }
}

/// Static registry entry describing one tool's budgeting profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub priority: u32,
    pub token_estimate: u32,
    pub contexts: Vec<ToolContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Tools that replace this one after consolidation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaced_by: Vec<String>,
    /// Tools whose functionality this one consolidates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consolidates: Vec<String>,
}

impl ToolMetadata {
    pub fn new(
        name: impl Into<String>,
        priority: u32,
        token_estimate: u32,
        contexts: &[ToolContext],
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            token_estimate,
            contexts: contexts.to_vec(),
            dependencies: Vec::new(),
            replaced_by: Vec::new(),
            consolidates: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_replaced_by(mut self, replacements: &[&str]) -> Self {
        self.replaced_by = replacements.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_consolidates(mut self, consolidated: &[&str]) -> Self {
        self.consolidates = consolidated.iter().map(|s| s.to_string()).collect();
        self
    }

    fn is_core(&self) -> bool {
        self.priority <= CORE_PRIORITY_CEILING
    }
}

/// Token accounting for one context tier.
#[derive(Debug, Clone, Serialize)]
pub struct ContextTokenUsage {
    pub estimated: u32,
    pub budget: u32,
    pub utilization: f64,
    pub tools: Vec<String>,
}

/// Why a requested tool is unavailable, and what to do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAvailability {
    /// Available in the current context.
    Available,
    /// Unavailable here, but consolidated replacements are.
    ReplacedBy(Vec<String>),
    /// Unavailable here; exists starting at this tier.
    EscalateTo(ToolContext),
    /// Not in the metadata registry at all.
    Unknown,
}

/// Per-tier summary for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ContextStats {
    pub current: ToolContext,
    pub tiers: Vec<TierStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub context: ToolContext,
    pub tool_count: usize,
    pub token_usage: u32,
    pub utilization: f64,
}

/// Selects which tools may be offered to the model for a given context.
///
/// Metadata is injected at construction and read-only afterwards; only the
/// current-context cursor mutates.
#[derive(Debug)]
pub struct ToolContextManager {
    registry: Vec<ToolMetadata>,
    current: Mutex<ToolContext>,
}

impl ToolContextManager {
    pub fn new(mut registry: Vec<ToolMetadata>) -> Self {
        registry.sort_by_key(|m| m.priority);
        Self {
            registry,
            current: Mutex::new(ToolContext::Core),
        }
    }

    /// Manager loaded with the note-tool registry.
    pub fn with_default_registry() -> Self {
        Self::new(default_tool_registry())
    }

    pub fn set_context(&self, context: ToolContext) {
        let mut current = self.current.lock().expect("context cursor poisoned");
        if *current != context {
            info!(from = %current, to = %context, "switching tool context");
            *current = context;
        }
    }

    pub fn current_context(&self) -> ToolContext {
        *self.current.lock().expect("context cursor poisoned")
    }

    /// Metadata entry for a tool name.
    pub fn metadata(&self, name: &str) -> Option<&ToolMetadata> {
        self.registry.iter().find(|m| m.name == name)
    }

    /// Tools selected for a context, greedy by ascending priority.
    ///
    /// A tool is taken while its estimate fits the remaining budget; core
    /// tools (priority <= 8) are taken regardless; correctness of the
    /// essential set outranks the budget.
    pub fn tools_for_context(&self, context: ToolContext) -> Vec<&ToolMetadata> {
        let budget = context.token_budget();
        let mut selected = Vec::new();
        let mut spent: u32 = 0;

        for meta in self.registry.iter().filter(|m| m.contexts.contains(&context)) {
            if spent + meta.token_estimate <= budget {
                spent += meta.token_estimate;
                selected.push(meta);
            } else if meta.is_core() {
                spent += meta.token_estimate;
                selected.push(meta);
                info!(tool = %meta.name, "core tool exceeds token budget but is included");
            }
        }

        selected
    }

    /// Estimated token spend for a context.
    pub fn context_token_usage(&self, context: ToolContext) -> ContextTokenUsage {
        let tools = self.tools_for_context(context);
        let estimated: u32 = tools.iter().map(|m| m.token_estimate).sum();
        let budget = context.token_budget();
        ContextTokenUsage {
            estimated,
            budget,
            utilization: estimated as f64 / budget as f64,
            tools: tools.iter().map(|m| m.name.clone()).collect(),
        }
    }

    /// Whether a tool is offered in the current context.
    pub fn is_tool_available(&self, name: &str) -> bool {
        self.tools_for_context(self.current_context())
            .iter()
            .any(|m| m.name == name)
    }

    /// Resolve a requested-but-unavailable tool: consolidated replacements
    /// first, else the lowest tier carrying the tool so the caller can
    /// decide whether to escalate.
    pub fn suggest_alternatives(&self, name: &str) -> ToolAvailability {
        let Some(meta) = self.metadata(name) else {
            return ToolAvailability::Unknown;
        };
        if self.is_tool_available(name) {
            return ToolAvailability::Available;
        }

        let replacements: Vec<String> = meta
            .replaced_by
            .iter()
            .filter(|alt| self.is_tool_available(alt))
            .cloned()
            .collect();
        if !replacements.is_empty() {
            return ToolAvailability::ReplacedBy(replacements);
        }

        for context in ToolContext::ALL {
            if meta.contexts.contains(&context) {
                return ToolAvailability::EscalateTo(context);
            }
        }
        ToolAvailability::Unknown
    }

    /// Summary of every tier plus the current cursor.
    pub fn context_stats(&self) -> ContextStats {
        ContextStats {
            current: self.current_context(),
            tiers: ToolContext::ALL
                .iter()
                .map(|&context| {
                    let usage = self.context_token_usage(context);
                    TierStats {
                        context,
                        tool_count: usage.tools.len(),
                        token_usage: usage.estimated,
                        utilization: usage.utilization,
                    }
                })
                .collect(),
        }
    }
}

/// The note-tool metadata registry.
pub fn default_tool_registry() -> Vec<ToolMetadata> {
    use ToolContext::*;
    let everywhere = [Core, Advanced, Admin, Full];
    let advanced_up = [Advanced, Admin, Full];
    let admin_up = [Admin, Full];
    let full_only = [Full];

    vec![
        ToolMetadata::new("smart_search", 1, 800, &everywhere).with_consolidates(&[
            "search_notes",
            "keyword_search",
            "attribute_search",
        ]),
        ToolMetadata::new("read_note", 2, 300, &everywhere),
        ToolMetadata::new("find_and_read", 3, 400, &everywhere)
            .with_dependencies(&["smart_search", "read_note"]),
        ToolMetadata::new("find_and_update", 4, 450, &everywhere)
            .with_dependencies(&["smart_search", "note_update"]),
        ToolMetadata::new("note_creation", 5, 350, &everywhere),
        ToolMetadata::new("note_update", 6, 350, &everywhere),
        ToolMetadata::new("attribute_manager", 7, 400, &everywhere),
        ToolMetadata::new("clone_note", 8, 300, &everywhere),
        ToolMetadata::new("create_with_template", 9, 500, &advanced_up)
            .with_dependencies(&["note_creation", "template_manager"]),
        ToolMetadata::new("organize_hierarchy", 10, 450, &advanced_up),
        ToolMetadata::new("template_manager", 11, 400, &advanced_up),
        ToolMetadata::new("bulk_update", 12, 500, &advanced_up)
            .with_dependencies(&["smart_search", "note_update"]),
        ToolMetadata::new("note_summarization", 13, 350, &advanced_up),
        ToolMetadata::new("protected_note", 14, 400, &admin_up),
        ToolMetadata::new("revision_manager", 15, 400, &admin_up),
        ToolMetadata::new("note_type_converter", 16, 350, &admin_up),
        ToolMetadata::new("relationship_tool", 17, 300, &everywhere),
        ToolMetadata::new("search_notes", 100, 500, &full_only).with_replaced_by(&["smart_search"]),
        ToolMetadata::new("keyword_search", 101, 400, &full_only)
            .with_replaced_by(&["smart_search"]),
        ToolMetadata::new("attribute_search", 102, 350, &full_only)
            .with_replaced_by(&["smart_search"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_priority_ordered() {
        let manager = ToolContextManager::with_default_registry();
        let tools = manager.tools_for_context(ToolContext::Core);
        let priorities: Vec<u32> = tools.iter().map(|m| m.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn core_tools_ignore_the_budget() {
        // Core tools alone exceed a tiny budget; all must still be selected.
        let registry = vec![
            ToolMetadata::new("a", 1, 4000, &[ToolContext::Core]),
            ToolMetadata::new("b", 2, 4000, &[ToolContext::Core]),
            ToolMetadata::new("c", 9, 4000, &[ToolContext::Core]),
        ];
        let manager = ToolContextManager::new(registry);
        let names: Vec<&str> = manager
            .tools_for_context(ToolContext::Core)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        // a fits, b is core so included over budget, c is not core and dropped.
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn deprecated_tools_suggest_their_replacement() {
        let manager = ToolContextManager::with_default_registry();
        assert_eq!(
            manager.suggest_alternatives("keyword_search"),
            ToolAvailability::ReplacedBy(vec!["smart_search".to_string()])
        );
    }

    #[test]
    fn escalation_points_at_the_lowest_tier() {
        let manager = ToolContextManager::with_default_registry();
        assert_eq!(
            manager.suggest_alternatives("protected_note"),
            ToolAvailability::EscalateTo(ToolContext::Admin)
        );
        assert_eq!(
            manager.suggest_alternatives("no_such_tool"),
            ToolAvailability::Unknown
        );
    }

    #[test]
    fn context_cursor_switches() {
        let manager = ToolContextManager::with_default_registry();
        assert_eq!(manager.current_context(), ToolContext::Core);
        manager.set_context(ToolContext::Admin);
        assert_eq!(manager.current_context(), ToolContext::Admin);
        assert!(manager.is_tool_available("protected_note"));
    }
}
