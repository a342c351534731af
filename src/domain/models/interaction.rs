use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// The kind of work an [`Interaction`] represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Query,
    SystemAnalysis,
    ComponentImprovement,
    AgentRegistration,
    PublishEvent,
}

impl InteractionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::SystemAnalysis => "system_analysis",
            Self::ComponentImprovement => "component_improvement",
            Self::AgentRegistration => "agent_registration",
            Self::PublishEvent => "publish_event",
        }
    }

    /// Whether this kind is dispatched through the heavy-task semaphore.
    #[must_use]
    pub const fn is_heavy(self) -> bool {
        matches!(self, Self::ComponentImprovement)
    }
}

/// Monotonic lifecycle status of an [`Interaction`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Routed,
}

impl InteractionStatus {
    /// Ordinal used to enforce monotonic transitions: pending < in_progress < terminal.
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress | Self::Routed => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// True if transitioning from `self` to `next` never moves backward.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        next.rank() >= self.rank()
    }
}

/// A unit of work routed through the Kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub kind: InteractionKind,
    pub content: String,
    pub metadata: HashMap<String, Value>,
    pub status: InteractionStatus,
    pub response: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Interaction {
    #[must_use]
    pub fn new(kind: InteractionKind, content: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            metadata,
            status: InteractionStatus::Pending,
            response: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Attempt a monotonic status transition. Returns `false` (no-op) if `next` would move
    /// the interaction backward.
    pub fn transition_to(&mut self, next: InteractionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    pub fn complete(&mut self, response: Value) {
        self.response = Some(response);
        self.transition_to(InteractionStatus::Completed);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.transition_to(InteractionStatus::Failed);
    }
}
