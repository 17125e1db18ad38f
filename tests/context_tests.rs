//! Context budget manager integration tests.

use pretty_assertions::assert_eq;

use quill::context::{
    ToolAvailability, ToolContext, ToolContextManager, ToolMetadata, CORE_PRIORITY_CEILING,
};

#[test]
fn core_tools_over_budget_are_still_returned() {
    // Every core tool alone blows the 5000-token budget.
    let registry: Vec<ToolMetadata> = (1..=CORE_PRIORITY_CEILING)
        .map(|p| ToolMetadata::new(format!("core_{p}"), p, 2000, &[ToolContext::Core]))
        .collect();
    let manager = ToolContextManager::new(registry);

    let selected = manager.tools_for_context(ToolContext::Core);
    assert_eq!(selected.len(), CORE_PRIORITY_CEILING as usize);

    let usage = manager.context_token_usage(ToolContext::Core);
    assert_eq!(usage.estimated, 16000);
    assert!(usage.utilization > 1.0);
}

#[test]
fn non_core_tools_respect_the_budget() {
    let registry = vec![
        ToolMetadata::new("essential", 1, 4500, &[ToolContext::Core]),
        ToolMetadata::new("optional_a", 9, 400, &[ToolContext::Core]),
        ToolMetadata::new("optional_b", 10, 400, &[ToolContext::Core]),
    ];
    let manager = ToolContextManager::new(registry);

    let names: Vec<&str> = manager
        .tools_for_context(ToolContext::Core)
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    // essential (4500) + optional_a (400) fit in 5000; optional_b does not.
    assert_eq!(names, vec!["essential", "optional_a"]);
}

#[test]
fn default_registry_tiers_grow_monotonically() {
    let manager = ToolContextManager::with_default_registry();
    let counts: Vec<usize> = ToolContext::ALL
        .iter()
        .map(|&c| manager.tools_for_context(c).len())
        .collect();
    for pair in counts.windows(2) {
        assert!(pair[0] <= pair[1], "tier shrank: {counts:?}");
    }

    let stats = manager.context_stats();
    assert_eq!(stats.current, ToolContext::Core);
    assert_eq!(stats.tiers.len(), 4);
    for tier in &stats.tiers {
        assert!(tier.utilization <= 1.0, "default registry busts its budget");
    }
}

#[test]
fn alternatives_prefer_replacements_then_escalation() {
    let manager = ToolContextManager::with_default_registry();

    // Consolidated search tools point at smart_search in any tier.
    assert_eq!(
        manager.suggest_alternatives("search_notes"),
        ToolAvailability::ReplacedBy(vec!["smart_search".to_string()])
    );

    // Admin tooling has no replacement; escalate to the lowest tier with it.
    assert_eq!(
        manager.suggest_alternatives("revision_manager"),
        ToolAvailability::EscalateTo(ToolContext::Admin)
    );

    manager.set_context(ToolContext::Admin);
    assert_eq!(
        manager.suggest_alternatives("revision_manager"),
        ToolAvailability::Available
    );

    assert_eq!(
        manager.suggest_alternatives("time_travel"),
        ToolAvailability::Unknown
    );
}

#[test]
fn availability_follows_the_current_cursor() {
    let manager = ToolContextManager::with_default_registry();
    assert!(manager.is_tool_available("smart_search"));
    assert!(!manager.is_tool_available("bulk_update"));

    manager.set_context(ToolContext::Advanced);
    assert!(manager.is_tool_available("bulk_update"));
    assert!(!manager.is_tool_available("keyword_search"));

    manager.set_context(ToolContext::Full);
    assert!(manager.is_tool_available("keyword_search"));
}
