use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    ShuttingDown,
    ShutDown,
}

/// A long-lived participant registered with the Kernel.
///
/// `instance_ref` is intentionally not serialized: registry snapshots handed to
/// external callers (`show_agent_registry`) never leak live handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub kind: String,
    pub description: String,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
}

impl AgentRegistration {
    #[must_use]
    pub fn new(agent_id: impl Into<String>, kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind: kind.into(),
            description: description.into(),
            status: AgentStatus::Active,
            registered_at: Utc::now(),
        }
    }
}
