use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persistent, periodically-due audit campaign configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSchedule {
    pub campaign_id: String,
    pub scope: String,
    pub targets: Vec<String>,
    /// Interval between runs, in seconds.
    pub interval_secs: i64,
    pub priority: u8,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
}

impl AuditSchedule {
    #[must_use]
    pub fn new(campaign_id: impl Into<String>, scope: impl Into<String>, targets: Vec<String>, interval_secs: i64, priority: u8) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            scope: scope.into(),
            targets,
            interval_secs,
            priority,
            enabled: true,
            last_run_at: None,
            next_run_at: None,
            runs: 0,
            successes: 0,
            failures: 0,
        }
    }

    /// `is_due ⟺ enabled ∧ (next_run_at is null ∨ now ≥ next_run_at)`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_none_or(|next| now >= next)
    }

    /// Record an execution outcome. `next_run_at` advances by `interval_secs` regardless of
    /// outcome.
    pub fn record_execution(&mut self, now: DateTime<Utc>, success: bool) {
        self.runs += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.last_run_at = Some(now);
        self.next_run_at = Some(now + chrono::Duration::seconds(self.interval_secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_when_next_run_unset() {
        let s = AuditSchedule::new("c1", "security", vec![], 86400, 9);
        assert!(s.is_due(Utc::now()));
    }

    #[test]
    fn not_due_before_interval_elapses() {
        let mut s = AuditSchedule::new("c1", "security", vec![], 86400, 9);
        let now = Utc::now();
        s.record_execution(now, true);
        assert!(!s.is_due(now + chrono::Duration::seconds(10)));
        assert!(s.is_due(now + chrono::Duration::days(1)));
    }

    #[test]
    fn disabled_schedule_never_due() {
        let mut s = AuditSchedule::new("c1", "security", vec![], 1, 9);
        s.enabled = false;
        assert!(!s.is_due(Utc::now() + chrono::Duration::days(10)));
    }

    #[test]
    fn successive_runs_respect_interval_law() {
        let mut s = AuditSchedule::new("c1", "security", vec![], 3600, 5);
        let t0 = Utc::now();
        s.record_execution(t0, true);
        let first_next = s.next_run_at.unwrap();
        s.record_execution(first_next, false);
        assert!(s.next_run_at.unwrap() >= first_next + chrono::Duration::seconds(3600));
    }
}
