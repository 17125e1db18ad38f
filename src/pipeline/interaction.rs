//! User-interaction stage: the confirmation gate for risky tool calls.
//!
//! A confirmation is a race between an external user response and a
//! deadline, merged by whichever fires first. Every pending interaction is
//! resolved exactly once; late responses for an already-resolved id are
//! ignored.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

/// Static risk classification for a tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Risk classification by tool name. Read-only lookups are low risk,
/// targeted reads are medium, and bulk or privileged operations are high.
pub fn assess_risk(tool_name: &str) -> RiskLevel {
    match tool_name {
        "smart_search" | "search_notes" | "keyword_search" | "template_search"
        | "discover_tools" => RiskLevel::Low,
        "read_note" | "note_by_path" | "find_and_read" | "relationship_tool" => RiskLevel::Medium,
        "attribute_search" | "bulk_update" | "protected_note" | "note_type_converter" => {
            RiskLevel::High
        }
        _ => RiskLevel::Medium,
    }
}

/// External answer to a confirmation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserResponse {
    Confirm,
    Cancel,
}

/// How a confirmation wait resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionOutcome {
    Confirmed,
    Cancelled,
    /// The deadline passed and the call executed anyway.
    TimeoutExecuted,
    /// The deadline passed and the call was dropped.
    TimeoutCancelled,
}

/// What a confirmation timeout means.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    /// Treat the timeout as an implicit confirm.
    Execute,
    /// Treat the timeout as an implicit cancel.
    Cancel,
}

/// Confirmation gate tuning.
#[derive(Debug, Clone)]
pub struct InteractionConfig {
    pub enable_confirmation: bool,
    pub confirmation_timeout: Duration,
    pub auto_confirm_low_risk: bool,
    /// Tools that always require confirmation regardless of risk level.
    pub required_confirmation_tools: Vec<String>,
    pub timeout_action: TimeoutAction,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            enable_confirmation: true,
            confirmation_timeout: Duration::from_secs(15),
            auto_confirm_low_risk: true,
            required_confirmation_tools: Vec::new(),
            timeout_action: TimeoutAction::Execute,
        }
    }
}

impl InteractionConfig {
    /// Whether a call to this tool must pass the confirmation gate.
    pub fn requires_confirmation(&self, tool_name: &str, risk: RiskLevel) -> bool {
        if !self.enable_confirmation {
            return false;
        }
        if risk == RiskLevel::High {
            return true;
        }
        if self
            .required_confirmation_tools
            .iter()
            .any(|t| t == tool_name)
        {
            return true;
        }
        if risk == RiskLevel::Low && self.auto_confirm_low_risk {
            return false;
        }
        risk == RiskLevel::Medium
    }
}

/// A pending interaction as reported to status observers.
#[derive(Debug, Clone, Serialize)]
pub struct PendingInteraction {
    pub id: String,
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
}

struct PendingEntry {
    tool_name: String,
    created_at: DateTime<Utc>,
    responder: oneshot::Sender<UserResponse>,
}

/// Routes user responses to their waiting confirmation, enforcing
/// exactly-once resolution.
///
/// Shared with the presentation layer, which calls
/// [`handle_user_response`](InteractionBroker::handle_user_response) when
/// the user clicks, and [`cancel_all`](InteractionBroker::cancel_all) when a
/// conversation is torn down mid-turn.
#[derive(Default)]
pub struct InteractionBroker {
    pending: Mutex<HashMap<String, PendingEntry>>,
}

impl InteractionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending interaction, returning its id and the channel
    /// the response arrives on.
    pub fn register(&self, tool_name: &str) -> (String, oneshot::Receiver<UserResponse>) {
        let id = format!("interaction_{}", Uuid::new_v4().simple());
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().expect("pending interactions poisoned");
        pending.insert(
            id.clone(),
            PendingEntry {
                tool_name: tool_name.to_string(),
                created_at: Utc::now(),
                responder: tx,
            },
        );
        (id, rx)
    }

    /// Wait for the user response or the deadline, whichever fires first.
    ///
    /// The timeout branch removes the pending entry, so a response arriving
    /// after the deadline is silently ignored.
    pub async fn await_confirmation(
        &self,
        id: &str,
        response_rx: oneshot::Receiver<UserResponse>,
        timeout: Duration,
        timeout_action: TimeoutAction,
    ) -> InteractionOutcome {
        tokio::select! {
            response = response_rx => match response {
                Ok(UserResponse::Confirm) => InteractionOutcome::Confirmed,
                Ok(UserResponse::Cancel) | Err(_) => InteractionOutcome::Cancelled,
            },
            _ = tokio::time::sleep(timeout) => {
                self.take(id);
                debug!(interaction = id, "confirmation timed out");
                match timeout_action {
                    TimeoutAction::Execute => InteractionOutcome::TimeoutExecuted,
                    TimeoutAction::Cancel => InteractionOutcome::TimeoutCancelled,
                }
            }
        }
    }

    /// Resolve a pending interaction with the user's response.
    ///
    /// Returns `true` if a pending interaction existed and was resolved;
    /// calling again for the same id returns `false`.
    pub fn handle_user_response(&self, id: &str, response: UserResponse) -> bool {
        let Some(entry) = self.take(id) else {
            debug!(interaction = id, "no pending interaction for response");
            return false;
        };
        info!(interaction = id, tool = %entry.tool_name, ?response, "user responded");
        entry.responder.send(response).is_ok()
    }

    /// Resolve every still-pending interaction as cancel.
    pub fn cancel_all(&self) {
        let entries: Vec<PendingEntry> = {
            let mut pending = self.pending.lock().expect("pending interactions poisoned");
            pending.drain().map(|(_, entry)| entry).collect()
        };
        if !entries.is_empty() {
            info!(count = entries.len(), "cancelling all pending interactions");
        }
        for entry in entries {
            let _ = entry.responder.send(UserResponse::Cancel);
        }
    }

    /// Pending interactions, for status monitoring.
    pub fn pending_interactions(&self) -> Vec<PendingInteraction> {
        let pending = self.pending.lock().expect("pending interactions poisoned");
        pending
            .iter()
            .map(|(id, entry)| PendingInteraction {
                id: id.clone(),
                tool_name: entry.tool_name.clone(),
                created_at: entry.created_at,
            })
            .collect()
    }

    fn take(&self, id: &str) -> Option<PendingEntry> {
        self.pending
            .lock()
            .expect("pending interactions poisoned")
            .remove(id)
    }
}
