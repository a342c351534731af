use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of an [`Action`] within a [`crate::domain::models::plan::Plan`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Ready,
    InProgress,
    CompletedSuccess,
    Failed,
    SkippedDependency,
    Cancelled,
}

impl ActionStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CompletedSuccess | Self::Failed | Self::SkippedDependency | Self::Cancelled
        )
    }
}

/// A single step of a [`crate::domain::models::plan::Plan`].
///
/// `params` values may reference a prior action's result with the placeholder syntax
/// `"$action_result.<action_id>[.<dotted.path>]"`, resolved by the Plan Manager before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub params: HashMap<String, Value>,
    pub description: Option<String>,
    pub status: ActionStatus,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub dependency_ids: Vec<String>,
    pub is_critical: bool,
}

impl Action {
    #[must_use]
    pub fn new(action_type: impl Into<String>, params: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_type: action_type.into().to_uppercase(),
            params,
            description: None,
            status: ActionStatus::Pending,
            result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            attempt_count: 0,
            dependency_ids: Vec::new(),
            is_critical: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    #[must_use]
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.dependency_ids.extend(ids);
        self
    }

    pub fn mark_started(&mut self) {
        self.status = ActionStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.attempt_count += 1;
    }

    pub fn mark_succeeded(&mut self, result: Value) {
        self.result = Some(result);
        self.status = ActionStatus::CompletedSuccess;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.error_message = Some(error.into());
        self.status = ActionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_skipped(&mut self) {
        self.status = ActionStatus::SkippedDependency;
        self.completed_at = Some(Utc::now());
    }
}
