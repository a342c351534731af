use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of a [`Goal`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    Active,
    CompletedSuccess,
    CompletedNoAction,
    FailedPlanning,
    FailedExecution,
    PausedDependency,
    Cancelled,
}

impl GoalStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CompletedSuccess | Self::CompletedNoAction | Self::FailedPlanning | Self::FailedExecution | Self::Cancelled
        )
    }
}

/// A desired end state with priority and dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    priority: u8,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub subgoal_ids: Vec<String>,
    pub dependency_ids: Vec<String>,
    pub dependent_ids: Vec<String>,
    pub plan_id: Option<String>,
    pub attempt_count: u32,
    pub failure_reason: Option<String>,
    pub source: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl Goal {
    #[must_use]
    pub fn new(description: impl Into<String>, priority: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            priority: priority.clamp(1, 10),
            status: GoalStatus::Pending,
            created_at: now,
            last_updated_at: now,
            parent_id: None,
            subgoal_ids: Vec::new(),
            dependency_ids: Vec::new(),
            dependent_ids: Vec::new(),
            plan_id: None,
            attempt_count: 0,
            failure_reason: None,
            source: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority.clamp(1, 10);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }

    pub fn transition_to(&mut self, status: GoalStatus) {
        self.status = status;
        self.touch();
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Ordering used by the priority queue: highest priority first, ties broken by earlier
/// `created_at`.
impl Ord for Goal {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

impl PartialOrd for Goal {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Goal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Goal {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_clamped() {
        assert_eq!(Goal::new("x", 0).priority(), 1);
        assert_eq!(Goal::new("x", 99).priority(), 10);
        assert_eq!(Goal::new("x", 5).priority(), 5);
    }

    #[test]
    fn ordering_prefers_higher_priority() {
        let low = Goal::new("low", 2);
        let high = Goal::new("high", 9);
        assert!(high > low);
    }

    #[test]
    fn ordering_ties_prefer_earlier_created() {
        let mut earlier = Goal::new("a", 5);
        let mut later = Goal::new("b", 5);
        earlier.created_at = Utc::now() - chrono::Duration::seconds(10);
        later.created_at = Utc::now();
        assert!(earlier > later);
    }
}
