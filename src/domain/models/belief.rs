use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance of a [`Belief`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BeliefSource {
    Perception,
    SelfAnalysis,
    Derivation,
    External,
}

/// A keyed, confidence-weighted, optionally-expiring fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belief {
    pub key: String,
    pub value: Value,
    pub confidence: f64,
    pub source: BeliefSource,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: Option<i64>,
}

impl Belief {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Value, confidence: f64, source: BeliefSource, ttl_seconds: Option<i64>) -> Self {
        Self {
            key: key.into(),
            value,
            confidence: confidence.clamp(0.0, 1.0),
            source,
            created_at: Utc::now(),
            ttl_seconds,
        }
    }

    /// TTL expiry is lazy: this is evaluated at read time, never proactively swept.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_seconds {
            None => false,
            Some(ttl) => (now - self.created_at).num_seconds() >= ttl,
        }
    }
}
