//! Tool reliability monitoring.
//!
//! Records every tool execution outcome, maintains a reliability score per
//! (tool, provider) key, and automatically takes chronically failing tools
//! out of rotation. Disabled tools get one scheduled re-evaluation after a
//! cooldown; a tool that fails re-evaluation stays disabled until manual
//! intervention.

pub mod reenable;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuillError, Result};
use crate::types::ProviderKind;

pub use reenable::ScheduledTasks;

/// Monitor tuning. Score weights are fixed; these knobs bound when the
/// monitor acts on the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Failure rate above which a tool is auto-disabled.
    pub failure_rate_threshold: f64,
    /// Executions required before reliability is acted on.
    pub min_executions_for_reliability: u32,
    /// Trailing window for recent-execution queries, in seconds.
    pub recent_stats_window_secs: u64,
    /// Whether auto-disable is active at all.
    pub auto_disable: bool,
    /// Cooldown before a disabled tool is re-evaluated, in seconds.
    pub disable_cooldown_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            min_executions_for_reliability: 5,
            recent_stats_window_secs: 3600,
            auto_disable: true,
            disable_cooldown_secs: 300,
        }
    }
}

/// Outcome of one tool execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Timeout,
}

/// Immutable fact about one tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub provider: ProviderKind,
    pub status: ExecutionStatus,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn new(
        tool_name: impl Into<String>,
        provider: ProviderKind,
        status: ExecutionStatus,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            provider,
            status,
            execution_time_ms,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Running statistics for one (tool, provider) key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolExecutionStats {
    pub tool_name: String,
    pub provider: ProviderKind,
    pub total_executions: u32,
    pub successful_executions: u32,
    pub failed_executions: u32,
    pub timeout_executions: u32,
    pub average_execution_time_ms: f64,
    pub min_execution_time_ms: u64,
    pub max_execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub reliability_score: f64,
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
}

impl ToolExecutionStats {
    fn new(tool_name: &str, provider: ProviderKind) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            provider,
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            timeout_executions: 0,
            average_execution_time_ms: 0.0,
            min_execution_time_ms: 0,
            max_execution_time_ms: 0,
            last_execution_time_ms: None,
            last_execution_status: None,
            last_error: None,
            reliability_score: 1.0,
            disabled: false,
            disabled_at: None,
            disabled_reason: None,
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        (self.failed_executions + self.timeout_executions) as f64 / self.total_executions as f64
    }
}

/// Aggregate view for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_tools: usize,
    pub active_tools: usize,
    pub disabled_tools: usize,
    pub overall_reliability: f64,
    pub top_performers: Vec<ToolExecutionStats>,
    pub bottom_performers: Vec<ToolExecutionStats>,
    pub recent_failures: Vec<ExecutionRecord>,
}

/// Persisted statistics document.
#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub stats: Vec<(String, ToolExecutionStats)>,
    pub recent_executions: Vec<ExecutionRecord>,
    pub disabled_tools: Vec<String>,
    pub config: MonitorConfig,
}

#[derive(Debug, Default)]
struct MonitorState {
    stats: HashMap<String, ToolExecutionStats>,
    recent: Vec<ExecutionRecord>,
    disabled: HashSet<String>,
}

impl MonitorState {
    fn enable(&mut self, key: &str) -> bool {
        let Some(stats) = self.stats.get_mut(key) else {
            return false;
        };
        if !stats.disabled {
            return false;
        }
        stats.disabled = false;
        stats.disabled_at = None;
        stats.disabled_reason = None;
        self.disabled.remove(key);
        true
    }

    fn recent_for(&self, key_tool: &str, provider: ProviderKind, window: Duration) -> Vec<&ExecutionRecord> {
        let cutoff = Utc::now() - chrono::Duration::seconds(window.as_secs() as i64);
        self.recent
            .iter()
            .filter(|r| r.tool_name == key_tool && r.provider == provider && r.timestamp > cutoff)
            .collect()
    }
}

/// Process-wide tool reliability monitor.
///
/// Shared across every turn; per-key updates are serialized by the internal
/// mutex. Construct once and inject wherever executions are reported.
#[derive(Debug)]
pub struct ToolReliabilityMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    reevaluations: ScheduledTasks,
}

impl ToolReliabilityMonitor {
    pub fn new(config: MonitorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(MonitorState::default()),
            reevaluations: ScheduledTasks::new(),
        })
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(MonitorConfig::default())
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn stats_key(tool_name: &str, provider: ProviderKind) -> String {
        format!("{provider}:{tool_name}")
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.recent_stats_window_secs)
    }

    /// Record one execution outcome, updating stats and the trailing-window
    /// buffer, and auto-disabling the tool when it crosses the failure
    /// threshold.
    pub fn record_execution(self: &Arc<Self>, record: ExecutionRecord) {
        let key = Self::stats_key(&record.tool_name, record.provider);
        let should_disable = {
            let mut state = self.state.lock().expect("monitor state poisoned");
            let stats = state
                .stats
                .entry(key.clone())
                .or_insert_with(|| ToolExecutionStats::new(&record.tool_name, record.provider));

            stats.total_executions += 1;
            match record.status {
                ExecutionStatus::Success => stats.successful_executions += 1,
                ExecutionStatus::Failure => stats.failed_executions += 1,
                ExecutionStatus::Timeout => stats.timeout_executions += 1,
            }

            let elapsed = record.execution_time_ms;
            let prev_count = (stats.total_executions - 1) as f64;
            stats.average_execution_time_ms = if stats.total_executions == 1 {
                elapsed as f64
            } else {
                (stats.average_execution_time_ms * prev_count + elapsed as f64)
                    / stats.total_executions as f64
            };
            if stats.min_execution_time_ms == 0 || elapsed < stats.min_execution_time_ms {
                stats.min_execution_time_ms = elapsed;
            }
            if elapsed > stats.max_execution_time_ms {
                stats.max_execution_time_ms = elapsed;
            }

            stats.last_execution_time_ms = Some(elapsed);
            stats.last_execution_status = Some(record.status);
            stats.last_error = record.error.clone();
            stats.reliability_score = reliability_score(stats);

            let should_disable = self.config.auto_disable
                && !stats.disabled
                && stats.total_executions >= self.config.min_executions_for_reliability
                && stats.failure_rate() > self.config.failure_rate_threshold;

            if stats.reliability_score < 0.5
                && stats.total_executions >= self.config.min_executions_for_reliability
            {
                info!(
                    tool = %record.tool_name,
                    provider = %record.provider,
                    score = stats.reliability_score,
                    "tool reliability is low"
                );
            }

            let cutoff = Utc::now()
                - chrono::Duration::seconds(self.config.recent_stats_window_secs as i64);
            state.recent.push(record.clone());
            state.recent.retain(|r| r.timestamp > cutoff);

            should_disable
        };

        if should_disable {
            self.disable_tool(&record.tool_name, record.provider, "high failure rate");
        }
    }

    /// Disable a tool and schedule its cooldown re-evaluation.
    pub fn disable_tool(self: &Arc<Self>, tool_name: &str, provider: ProviderKind, reason: &str) {
        let key = Self::stats_key(tool_name, provider);
        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            let Some(stats) = state.stats.get_mut(&key) else {
                return;
            };
            if stats.disabled {
                return;
            }
            stats.disabled = true;
            stats.disabled_at = Some(Utc::now());
            stats.disabled_reason = Some(reason.to_string());
            state.disabled.insert(key.clone());
        }

        warn!(tool = %tool_name, provider = %provider, reason, "tool disabled");

        if self.config.disable_cooldown_secs > 0 {
            let weak: Weak<Self> = Arc::downgrade(self);
            let tool = tool_name.to_string();
            self.reevaluations.schedule(
                &key,
                Duration::from_secs(self.config.disable_cooldown_secs),
                async move {
                    if let Some(monitor) = weak.upgrade() {
                        monitor.reevaluate(&tool, provider);
                    }
                },
            );
        }
    }

    /// Cooldown re-evaluation: re-enable optimistically when the trailing
    /// window is empty, or when the recent success rate clears 0.7.
    /// Otherwise the tool stays disabled until manual intervention.
    fn reevaluate(&self, tool_name: &str, provider: ProviderKind) {
        let key = Self::stats_key(tool_name, provider);
        let enabled = {
            let mut state = self.state.lock().expect("monitor state poisoned");
            if !state.disabled.contains(&key) {
                return;
            }
            let recent = state.recent_for(tool_name, provider, self.window());
            let decision = if recent.is_empty() {
                true
            } else {
                let successes = recent
                    .iter()
                    .filter(|r| r.status == ExecutionStatus::Success)
                    .count();
                successes as f64 / recent.len() as f64 > 0.7
            };
            decision && state.enable(&key)
        };

        if enabled {
            info!(tool = %tool_name, provider = %provider, "tool re-enabled after cooldown");
        } else {
            info!(tool = %tool_name, provider = %provider, "tool stays disabled after cooldown");
        }
    }

    /// Manually re-enable a tool, cancelling any pending re-evaluation.
    pub fn enable_tool(&self, tool_name: &str, provider: ProviderKind) {
        let key = Self::stats_key(tool_name, provider);
        let enabled = {
            let mut state = self.state.lock().expect("monitor state poisoned");
            state.enable(&key)
        };
        self.reevaluations.cancel(&key);
        if enabled {
            info!(tool = %tool_name, provider = %provider, "tool re-enabled");
        }
    }

    pub fn is_tool_disabled(&self, tool_name: &str, provider: ProviderKind) -> bool {
        let key = Self::stats_key(tool_name, provider);
        self.state
            .lock()
            .expect("monitor state poisoned")
            .disabled
            .contains(&key)
    }

    pub fn tool_stats(
        &self,
        tool_name: &str,
        provider: ProviderKind,
    ) -> Option<ToolExecutionStats> {
        let key = Self::stats_key(tool_name, provider);
        self.state
            .lock()
            .expect("monitor state poisoned")
            .stats
            .get(&key)
            .cloned()
    }

    pub fn all_stats(&self) -> Vec<ToolExecutionStats> {
        self.state
            .lock()
            .expect("monitor state poisoned")
            .stats
            .values()
            .cloned()
            .collect()
    }

    pub fn stats_by_provider(&self, provider: ProviderKind) -> Vec<ToolExecutionStats> {
        self.all_stats()
            .into_iter()
            .filter(|s| s.provider == provider)
            .collect()
    }

    pub fn stats_by_tool(&self, tool_name: &str) -> Vec<ToolExecutionStats> {
        self.all_stats()
            .into_iter()
            .filter(|s| s.tool_name == tool_name)
            .collect()
    }

    /// Executions for a (tool, provider) key within the trailing window.
    pub fn recent_executions(
        &self,
        tool_name: &str,
        provider: ProviderKind,
    ) -> Vec<ExecutionRecord> {
        let state = self.state.lock().expect("monitor state poisoned");
        state
            .recent_for(tool_name, provider, self.window())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn dashboard_metrics(&self) -> DashboardMetrics {
        let state = self.state.lock().expect("monitor state poisoned");
        let all: Vec<ToolExecutionStats> = state.stats.values().cloned().collect();
        let active: Vec<&ToolExecutionStats> = all.iter().filter(|s| !s.disabled).collect();

        let overall_reliability = if active.is_empty() {
            1.0
        } else {
            active.iter().map(|s| s.reliability_score).sum::<f64>() / active.len() as f64
        };

        let mut sorted = all.clone();
        sorted.sort_by(|a, b| {
            b.reliability_score
                .partial_cmp(&a.reliability_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let recent_failures: Vec<ExecutionRecord> = state
            .recent
            .iter()
            .filter(|r| r.status != ExecutionStatus::Success)
            .rev()
            .take(10)
            .cloned()
            .collect();

        DashboardMetrics {
            total_tools: all.len(),
            active_tools: active.len(),
            disabled_tools: state.disabled.len(),
            overall_reliability,
            top_performers: sorted.iter().take(5).cloned().collect(),
            bottom_performers: sorted.iter().rev().take(5).cloned().collect(),
            recent_failures,
        }
    }

    /// Drop all state for one (tool, provider) key.
    pub fn reset_tool_stats(&self, tool_name: &str, provider: ProviderKind) {
        let key = Self::stats_key(tool_name, provider);
        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            state.stats.remove(&key);
            state.disabled.remove(&key);
            state
                .recent
                .retain(|r| !(r.tool_name == tool_name && r.provider == provider));
        }
        self.reevaluations.cancel(&key);
        info!(tool = %tool_name, provider = %provider, "tool stats reset");
    }

    /// Drop everything.
    pub fn reset_all_stats(&self) {
        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            state.stats.clear();
            state.recent.clear();
            state.disabled.clear();
        }
        self.reevaluations.cancel_all();
        info!("all tool stats reset");
    }

    /// Export statistics as the persisted JSON document.
    pub fn export_stats(&self) -> Result<String> {
        let state = self.state.lock().expect("monitor state poisoned");
        let snapshot = MonitorSnapshot {
            stats: state
                .stats
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            recent_executions: state.recent.clone(),
            disabled_tools: state.disabled.iter().cloned().collect(),
            config: self.config.clone(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Restore statistics from a document produced by [`export_stats`].
    ///
    /// Restores stats, the window buffer and the disabled set; the monitor's
    /// own config is kept.
    pub fn import_stats(&self, json: &str) -> Result<()> {
        let snapshot: MonitorSnapshot =
            serde_json::from_str(json).map_err(QuillError::Serialization)?;
        let mut state = self.state.lock().expect("monitor state poisoned");
        state.stats = snapshot.stats.into_iter().collect();
        state.recent = snapshot.recent_executions;
        state.disabled = snapshot.disabled_tools.into_iter().collect();
        info!("tool stats imported");
        Ok(())
    }
}

/// Weighted reliability score in [0, 1].
///
/// 0.7 * success rate + 0.2 * (1 - timeout rate) + 0.1 * timing consistency,
/// where consistency is `max(0, 1 - (max-min)/avg/10)` once two samples
/// exist.
fn reliability_score(stats: &ToolExecutionStats) -> f64 {
    if stats.total_executions == 0 {
        return 1.0;
    }
    let total = stats.total_executions as f64;
    let success_rate = stats.successful_executions as f64 / total;
    let timeout_rate = stats.timeout_executions as f64 / total;
    let consistency = if stats.total_executions > 1 && stats.average_execution_time_ms > 0.0 {
        let spread = (stats.max_execution_time_ms - stats.min_execution_time_ms) as f64
            / stats.average_execution_time_ms;
        (1.0 - spread / 10.0).max(0.0)
    } else {
        1.0
    };

    (0.7 * success_rate + 0.2 * (1.0 - timeout_rate) + 0.1 * consistency).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(tool: &str, ms: u64) -> ExecutionRecord {
        ExecutionRecord::new(tool, ProviderKind::OpenAi, ExecutionStatus::Success, ms)
    }

    fn failure(tool: &str, ms: u64) -> ExecutionRecord {
        ExecutionRecord::new(tool, ProviderKind::OpenAi, ExecutionStatus::Failure, ms)
            .with_error("boom")
    }

    #[tokio::test]
    async fn perfect_tool_scores_one() {
        let monitor = ToolReliabilityMonitor::with_defaults();
        for _ in 0..5 {
            monitor.record_execution(success("smart_search", 100));
        }
        let stats = monitor
            .tool_stats("smart_search", ProviderKind::OpenAi)
            .unwrap();
        assert!((stats.reliability_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_executions, 5);
        assert_eq!(stats.min_execution_time_ms, 100);
        assert_eq!(stats.max_execution_time_ms, 100);
    }

    #[tokio::test]
    async fn score_is_clamped_and_weighted() {
        let monitor = ToolReliabilityMonitor::new(MonitorConfig {
            auto_disable: false,
            ..MonitorConfig::default()
        });
        // 2 successes, 1 timeout, constant timing.
        monitor.record_execution(success("t", 50));
        monitor.record_execution(success("t", 50));
        monitor.record_execution(ExecutionRecord::new(
            "t",
            ProviderKind::OpenAi,
            ExecutionStatus::Timeout,
            50,
        ));
        let stats = monitor.tool_stats("t", ProviderKind::OpenAi).unwrap();
        // 0.7 * (2/3) + 0.2 * (2/3) + 0.1 * 1.0
        let expected = 0.7 * (2.0 / 3.0) + 0.2 * (2.0 / 3.0) + 0.1;
        assert!((stats.reliability_score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn timing_averages_are_running() {
        let monitor = ToolReliabilityMonitor::with_defaults();
        monitor.record_execution(success("t", 100));
        monitor.record_execution(success("t", 300));
        let stats = monitor.tool_stats("t", ProviderKind::OpenAi).unwrap();
        assert!((stats.average_execution_time_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(stats.min_execution_time_ms, 100);
        assert_eq!(stats.max_execution_time_ms, 300);
    }
}
