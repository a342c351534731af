use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{info, instrument, warn};

use crate::domain::models::audit_schedule::AuditSchedule;
use crate::domain::models::backlog::BacklogItem;
use crate::services::kernel::Kernel;
use crate::services::persistence::JsonStore;
use crate::services::strategic_evolution::StrategicEvolution;

/// Seeds the default audit cadence (§4.9): security daily, full-system weekly, performance
/// every two days, code quality slightly less often, priorities reflecting urgency.
fn default_schedules() -> Vec<AuditSchedule> {
    vec![
        AuditSchedule::new("daily_security_audit", "security", vec!["auth".to_string(), "secrets".to_string()], 86400, 9),
        AuditSchedule::new("weekly_system_audit", "system", vec!["kernel".to_string(), "agents".to_string()], 604_800, 7),
        AuditSchedule::new("performance_audit", "performance", vec!["llm_dispatch".to_string(), "plan_manager".to_string()], 172_800, 6),
        AuditSchedule::new("code_quality_audit", "code_quality", vec!["services".to_string()], 129_600, 5),
    ]
}

/// Drives periodic, priority-ordered, load-aware audit campaigns (C9). Grounded on the source
/// project's autonomous audit coordinator, which polls a schedule table and hands due entries
/// to the strategic evolution layer.
pub struct AuditScheduler {
    schedules: AsyncRwLock<Vec<AuditSchedule>>,
    strategic: Arc<StrategicEvolution>,
    kernel: Arc<Kernel>,
    store: Arc<JsonStore>,
    check_interval_secs: u64,
}

impl AuditScheduler {
    #[must_use]
    pub fn new(strategic: Arc<StrategicEvolution>, kernel: Arc<Kernel>, store: Arc<JsonStore>, check_interval_secs: u64) -> Self {
        Self { schedules: AsyncRwLock::new(Vec::new()), strategic, kernel, store, check_interval_secs }
    }

    /// Loads persisted schedules, seeding the defaults on first run (empty collection).
    pub async fn load_persisted(&self) {
        let mut loaded: Vec<AuditSchedule> = self.store.load("audit_schedules").await;
        if loaded.is_empty() {
            loaded = default_schedules();
            if let Err(err) = self.store.save("audit_schedules", &loaded).await {
                warn!(%err, "failed to persist default audit schedules");
            }
        }
        *self.schedules.write().await = loaded;
    }

    async fn persist(&self) {
        let schedules = self.schedules.read().await.clone();
        if let Err(err) = self.store.save("audit_schedules", &schedules).await {
            warn!(%err, "failed to persist audit schedules");
        }
    }

    pub async fn add_schedule(&self, schedule: AuditSchedule) {
        self.schedules.write().await.push(schedule);
        self.persist().await;
    }

    #[must_use]
    pub async fn list_schedules(&self) -> Vec<AuditSchedule> {
        self.schedules.read().await.clone()
    }

    pub async fn set_enabled(&self, campaign_id: &str, enabled: bool) -> bool {
        let mut schedules = self.schedules.write().await;
        let Some(schedule) = schedules.iter_mut().find(|s| s.campaign_id == campaign_id) else {
            return false;
        };
        schedule.enabled = enabled;
        drop(schedules);
        self.persist().await;
        true
    }

    /// Due schedules, highest priority first; ties broken by campaign id for determinism.
    async fn due_schedules_sorted(&self) -> Vec<AuditSchedule> {
        let now = Utc::now();
        let mut due: Vec<AuditSchedule> = self.schedules.read().await.iter().filter(|s| s.is_due(now)).cloned().collect();
        due.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.campaign_id.cmp(&b.campaign_id)));
        due
    }

    /// Runs one scheduling pass: every due schedule, by priority, unless the Kernel reports no
    /// spare heavy-task capacity (load-aware deferral — the schedule is left due and retried
    /// next pass). Returns the campaign ids actually executed.
    #[instrument(skip(self))]
    pub async fn run_due(&self) -> Vec<String> {
        let due = self.due_schedules_sorted().await;
        let mut executed = Vec::new();

        for schedule in due {
            if self.kernel.available_heavy_task_permits() == 0 {
                info!(campaign_id = %schedule.campaign_id, "deferring audit: kernel at heavy-task capacity");
                continue;
            }

            let summary = self.strategic.run_audit_driven_campaign(&schedule.scope, &schedule.targets).await;
            let success = summary.status != crate::domain::models::campaign::CampaignStatus::Failure;

            {
                let mut schedules = self.schedules.write().await;
                if let Some(entry) = schedules.iter_mut().find(|s| s.campaign_id == schedule.campaign_id) {
                    entry.record_execution(Utc::now(), success);
                }
            }
            self.persist().await;

            if !success {
                let item = BacklogItem::new(schedule.scope.clone(), format!("audit campaign '{}' reported failure", schedule.campaign_id), schedule.priority, format!("audit_scheduler.{}", schedule.campaign_id));
                self.kernel.push_backlog_item(item).await;
            }

            executed.push(schedule.campaign_id);
        }
        executed
    }

    /// Runs the scheduler forever: sleep `check_interval_secs`, then `run_due`. Production
    /// entry point; tests drive `run_due` directly instead of this loop.
    pub async fn run_forever(&self) -> ! {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(self.check_interval_secs)).await;
            self.run_due().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::belief_store::BeliefStore;
    use crate::services::llm_dispatch::LlmDispatch;
    use crate::services::plan_manager::PlanManager;
    use crate::services::rate_limiter::TokenBucketRateLimiter;
    use crate::services::retry::RetryPolicy;

    fn build(data_dir: &std::path::Path) -> AuditScheduler {
        let llm = Arc::new(LlmDispatch::new(TokenBucketRateLimiter::new(6000.0), RetryPolicy::default()));
        let store = Arc::new(JsonStore::new(data_dir.to_path_buf()));
        let kernel = Arc::new(Kernel::new(llm.clone(), "mock-default", 4, store.clone()));
        let strategic = Arc::new(StrategicEvolution::new(
            "sea-agent",
            Arc::new(BeliefStore::new()),
            Arc::new(PlanManager::new()),
            llm,
            "mock-default",
            kernel.clone(),
            store.clone(),
        ));
        AuditScheduler::new(strategic, kernel, store, 60)
    }

    #[tokio::test]
    async fn load_persisted_seeds_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = build(dir.path());
        scheduler.load_persisted().await;
        let schedules = scheduler.list_schedules().await;
        assert_eq!(schedules.len(), 4);
        assert!(schedules.iter().any(|s| s.campaign_id == "daily_security_audit" && s.priority == 9));
    }

    #[tokio::test]
    async fn run_due_executes_highest_priority_first() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = build(dir.path());
        scheduler.load_persisted().await;
        let executed = scheduler.run_due().await;
        assert_eq!(executed.first().map(String::as_str), Some("daily_security_audit"));
        assert_eq!(executed.len(), 4);
    }

    #[tokio::test]
    async fn disabled_schedule_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = build(dir.path());
        scheduler.load_persisted().await;
        scheduler.set_enabled("weekly_system_audit", false).await;
        let executed = scheduler.run_due().await;
        assert!(!executed.contains(&"weekly_system_audit".to_string()));
    }

    #[tokio::test]
    async fn run_due_records_execution_counters() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = build(dir.path());
        scheduler.load_persisted().await;
        scheduler.run_due().await;
        let schedules = scheduler.list_schedules().await;
        assert!(schedules.iter().all(|s| s.runs == 1));
        assert!(schedules.iter().all(|s| s.next_run_at.is_some()));
    }

    #[tokio::test]
    async fn schedules_persist_across_scheduler_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let scheduler = build(dir.path());
            scheduler.load_persisted().await;
            scheduler.set_enabled("performance_audit", false).await;
        }
        let scheduler2 = build(dir.path());
        scheduler2.load_persisted().await;
        let schedules = scheduler2.list_schedules().await;
        assert!(schedules.iter().find(|s| s.campaign_id == "performance_audit").is_some_and(|s| !s.enabled));
    }
}
