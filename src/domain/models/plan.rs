use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::action::{Action, ActionStatus};

/// Lifecycle status of a [`Plan`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    PendingGeneration,
    Ready,
    InProgress,
    CompletedSuccess,
    FailedAction,
    FailedValidation,
    Paused,
    Cancelled,
}

/// An ordered or dependency-structured list of [`Action`]s addressing a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal_id: String,
    pub description: Option<String>,
    pub actions: Vec<Action>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_action_idx: usize,
    pub action_results: HashMap<String, Value>,
    pub failure_reason: Option<String>,
    pub created_by: String,
}

impl Plan {
    #[must_use]
    pub fn new(goal_id: impl Into<String>, actions: Vec<Action>, created_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            goal_id: goal_id.into(),
            description: None,
            actions,
            status: PlanStatus::Ready,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            current_action_idx: 0,
            action_results: HashMap::new(),
            failure_reason: None,
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn action_mut(&mut self, id: &str) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    /// Whether every declared dependency of `action` has already completed successfully.
    #[must_use]
    pub fn dependencies_met(&self, action: &Action) -> bool {
        action.dependency_ids.iter().all(|dep_id| {
            self.action(dep_id)
                .is_some_and(|dep| dep.status == ActionStatus::CompletedSuccess)
        })
    }

    /// Re-derive plan status from terminal action states. Implements the plan completion rule:
    /// `completed_success` iff every action ended `completed_success` or `skipped_dependency`
    /// and no critical action failed; `failed_action` iff any critical action failed.
    pub fn recompute_status(&mut self) {
        if !self.actions.iter().all(|a| a.status.is_terminal()) {
            return;
        }
        let any_critical_failed = self
            .actions
            .iter()
            .any(|a| a.is_critical && a.status == ActionStatus::Failed);
        let any_failed = self.actions.iter().any(|a| a.status == ActionStatus::Failed);

        self.status = if any_critical_failed {
            PlanStatus::FailedAction
        } else if any_failed {
            // A non-critical failure alone does not flip completed_success, but it also is not
            // a clean success; treat as failed_action to keep the closed set small and honest.
            PlanStatus::FailedAction
        } else {
            PlanStatus::CompletedSuccess
        };
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn noop() -> Action {
        Action::new("NO_OP", Map::new())
    }

    #[test]
    fn completion_rule_all_success() {
        let mut a1 = noop();
        a1.mark_succeeded(Value::Null);
        let mut plan = Plan::new("g1", vec![a1], "tester");
        plan.recompute_status();
        assert_eq!(plan.status, PlanStatus::CompletedSuccess);
    }

    #[test]
    fn critical_failure_propagates() {
        let mut a1 = noop().critical();
        a1.mark_failed("boom");
        let mut plan = Plan::new("g1", vec![a1], "tester");
        plan.recompute_status();
        assert_eq!(plan.status, PlanStatus::FailedAction);
    }

    #[test]
    fn skipped_dependency_counts_as_clean() {
        let mut a1 = noop();
        a1.mark_succeeded(Value::Null);
        let mut a2 = noop();
        a2.mark_skipped();
        let mut plan = Plan::new("g1", vec![a1, a2], "tester");
        plan.recompute_status();
        assert_eq!(plan.status, PlanStatus::CompletedSuccess);
    }

    #[test]
    fn dependencies_met_checks_completed_success_only() {
        let mut dep = noop().with_id("dep");
        dep.mark_failed("nope");
        let child = noop().with_id("child").depends_on(["dep".to_string()]);
        let plan = Plan::new("g1", vec![dep, child.clone()], "tester");
        assert!(!plan.dependencies_met(&child));
    }
}
