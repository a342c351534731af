use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of backlog statuses. The original source mixes Interaction and Goal status
/// vocabularies here; this crate treats backlog status as its own small, independent set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BacklogStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Approved,
    Rejected,
}

/// A single entry in the Kernel's persistent improvement backlog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogItem {
    pub id: String,
    pub target: String,
    pub suggestion: String,
    pub priority: u8,
    pub status: BacklogStatus,
    pub source: String,
    pub added_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl BacklogItem {
    #[must_use]
    pub fn new(target: impl Into<String>, suggestion: impl Into<String>, priority: u8, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: target.into(),
            suggestion: suggestion.into(),
            priority: priority.clamp(1, 10),
            status: BacklogStatus::Pending,
            source: source.into(),
            added_at: Utc::now(),
            attempt_count: 0,
            last_attempted_at: None,
            approved_at: None,
        }
    }

    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        matches!(self.status, BacklogStatus::Pending | BacklogStatus::Approved)
    }
}
