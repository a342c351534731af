use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outcome classification of a concluded Strategic Evolution campaign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Success,
    PartialSuccess,
    Failure,
}

/// A run record of the Strategic Evolution subsystem, appended to campaign history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub run_id: String,
    pub agent_id: String,
    pub status: CampaignStatus,
    pub message: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl CampaignSummary {
    #[must_use]
    pub fn new(agent_id: impl Into<String>, status: CampaignStatus, message: impl Into<String>, data: Value) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            status,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}
