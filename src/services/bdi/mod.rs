pub mod actions;
pub mod failure;
pub mod planner;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{info, instrument, warn};

use crate::domain::error::BdiError;
use crate::domain::models::action::Action;
use crate::domain::models::belief::BeliefSource;
use crate::domain::models::goal::{Goal, GoalStatus};
use crate::domain::models::plan::PlanStatus;
use crate::services::belief_store::BeliefStore;
use crate::services::goal_set::GoalSet;
use crate::services::llm_dispatch::LlmDispatch;
use crate::services::persistence::JsonStore;
use crate::services::plan_manager::PlanManager;

use actions::InternalActions;
use failure::{FailureAnalyzer, FailureType, PersistedEmaTable, RecoveryStrategy};
use planner::ActionSpec;

/// Fixed pause before an action is re-dispatched under `RETRY_WITH_DELAY` (§4.6.3). Distinct
/// from the LLM-call backoff in [`crate::services::retry`], which paces provider requests.
const RETRY_WITH_DELAY_PAUSE: std::time::Duration = std::time::Duration::from_millis(500);

/// Capability set for a dynamically-loaded tool (§6, §9): an async `execute`, plus a manifest
/// description used when building the planning prompt.
#[async_trait]
pub trait Tool: Send + Sync {
    async fn execute(&self, params: &HashMap<String, Value>) -> Result<Value, BdiError>;
    fn describe(&self) -> ActionSpec;
}

/// Persisted per-agent lessons and recovery preferences (§3, §4.10).
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct LessonsLearned {
    lessons: Vec<String>,
}

/// The BDI loop (C6): perceive → deliberate → plan (with validation-repair) → act → learn.
/// Grounded on the source project's `bdi_agent.py`.
pub struct BdiExecutor {
    pub agent_id: String,
    pub goal_set: Arc<GoalSet>,
    pub plan_manager: Arc<PlanManager>,
    pub belief_store: Arc<BeliefStore>,
    internal_actions: Arc<InternalActions>,
    tools: AsyncRwLock<HashMap<String, Arc<dyn Tool>>>,
    failure_analyzer: Arc<FailureAnalyzer>,
    llm: Arc<LlmDispatch>,
    default_model: String,
    max_repair_attempts: u32,
    store: Arc<JsonStore>,
    active_plan_id: AsyncRwLock<Option<String>>,
}

impl BdiExecutor {
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        goal_set: Arc<GoalSet>,
        plan_manager: Arc<PlanManager>,
        belief_store: Arc<BeliefStore>,
        llm: Arc<LlmDispatch>,
        default_model: impl Into<String>,
        workspace_root: impl Into<std::path::PathBuf>,
        max_repair_attempts: u32,
        store: Arc<JsonStore>,
    ) -> Self {
        let default_model = default_model.into();
        let internal_actions =
            Arc::new(InternalActions::new(belief_store.clone(), llm.clone(), default_model.clone(), workspace_root));
        Self {
            agent_id: agent_id.into(),
            goal_set,
            plan_manager,
            belief_store,
            internal_actions,
            tools: AsyncRwLock::new(HashMap::new()),
            failure_analyzer: Arc::new(FailureAnalyzer::new()),
            llm,
            default_model,
            max_repair_attempts,
            store,
            active_plan_id: AsyncRwLock::new(None),
        }
    }

    pub async fn register_tool(&self, id: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.write().await.insert(id.into(), tool);
    }

    async fn action_manifest(&self) -> Vec<ActionSpec> {
        let mut manifest = InternalActions::manifest();
        for tool in self.tools.read().await.values() {
            manifest.push(tool.describe());
        }
        manifest
    }

    fn lessons_key(&self) -> String {
        format!("lessons_{}", self.agent_id)
    }

    fn recovery_table_key(&self) -> String {
        format!("recovery_ema_{}", self.agent_id)
    }

    async fn add_lesson(&self, lesson: String) {
        append_lesson(&self.store, &self.lessons_key(), lesson).await;
    }

    /// Restores the persisted recovery-strategy EMA table and lessons-learned log for this
    /// agent, if any were saved by a prior run (§4.10).
    pub async fn load_persisted(&self) {
        let table: PersistedEmaTable = self.store.load(&self.recovery_table_key()).await;
        self.failure_analyzer.load_persisted(table);
    }

    /// Ingests optional external input as `environment.*` beliefs.
    #[instrument(skip(self, external_input))]
    pub fn perceive(&self, external_input: Option<(&str, Value)>) {
        if let Some((key, value)) = external_input {
            self.belief_store.add(format!("environment.{key}"), value, 0.8, BeliefSource::Perception, None);
        }
    }

    /// Picks the next actionable goal from the goal set.
    #[must_use]
    pub fn deliberate(&self) -> Option<Goal> {
        self.goal_set.next_actionable()
    }

    /// Generates a plan for `goal` via the validation-repair loop (§4.6.1) and registers it
    /// with the Plan Manager.
    #[instrument(skip(self, goal))]
    pub async fn plan_for(&self, goal: &Goal) -> Result<String, BdiError> {
        let manifest = self.action_manifest().await;
        let context = self.belief_context_summary();
        let path_corrections = HashMap::new();

        let actions = planner::generate_plan_actions(
            &self.llm,
            &self.default_model,
            &goal.description,
            &context,
            &manifest,
            &path_corrections,
            self.max_repair_attempts,
        )
        .await?;

        let plan_id = self.plan_manager.create_plan(goal.id.clone(), actions, self.agent_id.clone());
        *self.active_plan_id.write().await = Some(plan_id.clone());
        Ok(plan_id)
    }

    /// Directly installs a pre-built plan for `goal_id`, bypassing LLM generation. Used by
    /// literal scenarios that seed a fixed plan (§8 scenario 2, 3) and by Strategic Evolution.
    pub async fn install_plan(&self, goal_id: impl Into<String>, actions: Vec<Action>) -> String {
        let plan_id = self.plan_manager.create_plan(goal_id, actions, self.agent_id.clone());
        *self.active_plan_id.write().await = Some(plan_id.clone());
        plan_id
    }

    fn belief_context_summary(&self) -> String {
        let beliefs = self.belief_store.query("");
        beliefs
            .iter()
            .take(20)
            .map(|(k, b)| format!("{k}={}", b.value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Executes the active plan to completion via the internal-action/tool dispatch table,
    /// applying adaptive recovery on failure (§4.6.3) up to once per action.
    #[instrument(skip(self))]
    pub async fn act(&self, plan_id: &str) -> Result<PlanStatus, BdiError> {
        let goal_id = self.plan_manager.get_plan(plan_id).map(|p| p.goal_id).unwrap_or_default();

        let internal = self.internal_actions.clone();
        let tools = self.tools.read().await.clone();
        let failure_analyzer = self.failure_analyzer.clone();
        let goal_set = self.goal_set.clone();
        let belief_store = self.belief_store.clone();
        let store = self.store.clone();
        let agent_id = self.agent_id.clone();
        let lessons_key = self.lessons_key();
        let recovery_table_key = self.recovery_table_key();

        let executor: Box<crate::services::plan_manager::ActionExecutor> = Box::new(move |action: Action| {
            let internal = internal.clone();
            let tools = tools.clone();
            let failure_analyzer = failure_analyzer.clone();
            let goal_set = goal_set.clone();
            let belief_store = belief_store.clone();
            let store = store.clone();
            let agent_id = agent_id.clone();
            let goal_id = goal_id.clone();
            let lessons_key = lessons_key.clone();
            let recovery_table_key = recovery_table_key.clone();
            Box::pin(async move {
                let dispatch_result = if InternalActions::handles(&action.action_type) {
                    internal.dispatch(&action.action_type, &action.params).await
                } else if let Some(tool) = tools.get(&action.action_type) {
                    tool.execute(&action.params).await
                } else {
                    Err(BdiError::ToolUnavailable(action.action_type.clone()))
                };

                match dispatch_result {
                    Ok(value) => (true, value),
                    Err(err) => {
                        let tool_resolved = !matches!(err, BdiError::ToolUnavailable(_));
                        let failure_type = FailureType::classify(&err.to_string(), tool_resolved);
                        let strategy = failure_analyzer.select_recovery_strategy(failure_type);
                        warn!(action_type = %action.action_type, ?failure_type, ?strategy, %err, "action failed, recovery strategy selected");

                        let outcome = apply_recovery_strategy(
                            strategy, &action, &err, &internal, &tools, &goal_set, &belief_store, &agent_id, &goal_id,
                        )
                        .await;

                        failure_analyzer.record_recovery_outcome(failure_type, strategy, outcome.recovery_succeeded);
                        let _ = store.save(&recovery_table_key, &failure_analyzer.to_persisted()).await;
                        let lesson = format!(
                            "failure {failure_type:?} with strategy {strategy:?}: {}",
                            if outcome.recovery_succeeded { "SUCCESS" } else { "FAILURE" }
                        );
                        append_lesson(&store, &lessons_key, lesson).await;

                        (outcome.action_succeeded, outcome.action_result)
                    }
                }
            })
        });

        self.plan_manager.execute_plan_sequential(plan_id, &executor).await;
        let plan = self.plan_manager.get_plan(plan_id).ok_or_else(|| BdiError::ToolError("plan vanished".to_string()))?;

        match plan.status {
            PlanStatus::CompletedSuccess => {
                self.goal_set.complete(&plan.goal_id);
            }
            PlanStatus::FailedAction => {
                self.goal_set.transition(&plan.goal_id, GoalStatus::FailedExecution);
                self.add_lesson(format!("plan {} for goal {} failed: {:?}", plan.id, plan.goal_id, plan.failure_reason)).await;
            }
            _ => {}
        }

        Ok(plan.status)
    }

    /// Runs the full perceive/deliberate/plan/act loop until no actionable goals remain or
    /// `max_cycles` is exhausted.
    #[instrument(skip(self))]
    pub async fn run(&self, max_cycles: u32) {
        for cycle in 0..max_cycles {
            self.perceive(None);
            let Some(goal) = self.deliberate() else {
                info!(cycle, "no actionable goals remain, stopping");
                break;
            };
            self.goal_set.transition(&goal.id, GoalStatus::Active);

            let plan_id = match self.plan_for(&goal).await {
                Ok(id) => id,
                Err(err) => {
                    warn!(cycle, goal_id = %goal.id, %err, "plan generation failed");
                    self.goal_set.transition(&goal.id, GoalStatus::FailedPlanning);
                    continue;
                }
            };

            if let Err(err) = self.act(&plan_id).await {
                warn!(cycle, goal_id = %goal.id, %err, "action dispatch failed");
            }
        }
    }
}

/// Appends `lesson` to the agent's persisted lessons-learned log, deduplicated, if not already
/// present. Shared by [`BdiExecutor::add_lesson`] and the recovery path in [`BdiExecutor::act`],
/// which cannot borrow `&self` from inside the 'static action-executor closure.
async fn append_lesson(store: &JsonStore, key: &str, lesson: String) {
    let mut learned: LessonsLearned = store.load(key).await;
    if !learned.lessons.contains(&lesson) {
        learned.lessons.push(lesson);
        let _ = store.save(key, &learned).await;
    }
}

/// Result of applying a [`RecoveryStrategy`] to a failed action (§4.6.3).
struct RecoveryOutcome {
    /// Whether the recovery procedure itself worked (drives the EMA success-rate update).
    recovery_succeeded: bool,
    /// What the action's own terminal status in the plan should be.
    action_succeeded: bool,
    action_result: Value,
}

fn failure_result(err: &BdiError) -> Value {
    Value::String(err.to_string())
}

/// Applies one of the six recovery strategies (§4.6.3) to a failed action. `RETRY_WITH_DELAY`
/// and `ALTERNATIVE_TOOL` re-dispatch the action and can flip its terminal outcome to success;
/// the remaining strategies register a side effect (a new goal, an escalation or abort belief)
/// and leave the action itself failed.
#[allow(clippy::too_many_arguments)]
async fn apply_recovery_strategy(
    strategy: RecoveryStrategy,
    action: &Action,
    err: &BdiError,
    internal: &InternalActions,
    tools: &HashMap<String, Arc<dyn Tool>>,
    goal_set: &GoalSet,
    belief_store: &BeliefStore,
    agent_id: &str,
    goal_id: &str,
) -> RecoveryOutcome {
    match strategy {
        RecoveryStrategy::RetryWithDelay => {
            tokio::time::sleep(RETRY_WITH_DELAY_PAUSE).await;
            let retried = if InternalActions::handles(&action.action_type) {
                internal.dispatch(&action.action_type, &action.params).await
            } else if let Some(tool) = tools.get(&action.action_type) {
                tool.execute(&action.params).await
            } else {
                Err(BdiError::ToolUnavailable(action.action_type.clone()))
            };
            match retried {
                Ok(value) => RecoveryOutcome { recovery_succeeded: true, action_succeeded: true, action_result: value },
                Err(retry_err) => {
                    let result = failure_result(&retry_err);
                    RecoveryOutcome { recovery_succeeded: false, action_succeeded: false, action_result: result }
                }
            }
        }
        RecoveryStrategy::AlternativeTool => {
            let alternative = tools.keys().find(|id| id.as_str() != action.action_type).cloned();
            let Some(alt_id) = alternative else {
                return RecoveryOutcome { recovery_succeeded: false, action_succeeded: false, action_result: failure_result(err) };
            };
            let tool = tools.get(&alt_id).expect("just looked up by key");
            info!(from = %action.action_type, to = %alt_id, "switching to alternative tool after failure");
            match tool.execute(&action.params).await {
                Ok(value) => RecoveryOutcome { recovery_succeeded: true, action_succeeded: true, action_result: value },
                Err(alt_err) => {
                    let result = failure_result(&alt_err);
                    RecoveryOutcome { recovery_succeeded: false, action_succeeded: false, action_result: result }
                }
            }
        }
        RecoveryStrategy::SimplifiedApproach => {
            let recovery_succeeded = match goal_set.get(goal_id) {
                Some(goal) => {
                    let simplified = Goal::new(format!("simplified approach: {}", goal.description), goal.priority())
                        .with_source("failure_recovery");
                    goal_set.add(simplified).is_ok()
                }
                None => false,
            };
            RecoveryOutcome { recovery_succeeded, action_succeeded: false, action_result: failure_result(err) }
        }
        RecoveryStrategy::Escalate => {
            belief_store.add(
                format!("escalation.bdi_failure.{agent_id}"),
                json!({"action_type": action.action_type, "error": err.to_string(), "goal_id": goal_id}),
                1.0,
                BeliefSource::Perception,
                None,
            );
            RecoveryOutcome { recovery_succeeded: true, action_succeeded: false, action_result: failure_result(err) }
        }
        RecoveryStrategy::FallbackManual => {
            let manual = Goal::new(format!("manual intervention required for: {}", action.action_type), 10)
                .with_source("failure_recovery");
            let recovery_succeeded = goal_set.add(manual).is_ok();
            RecoveryOutcome { recovery_succeeded, action_succeeded: false, action_result: failure_result(err) }
        }
        RecoveryStrategy::AbortGracefully => {
            goal_set.transition(goal_id, GoalStatus::FailedExecution);
            belief_store.add(
                format!("goal.aborted.{goal_id}"),
                json!({"reason": "failed_gracefully", "error": err.to_string()}),
                1.0,
                BeliefSource::SelfAnalysis,
                None,
            );
            RecoveryOutcome { recovery_succeeded: true, action_succeeded: false, action_result: failure_result(err) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn build_executor(workspace: &std::path::Path, data_dir: &std::path::Path) -> BdiExecutor {
        let llm = Arc::new(LlmDispatch::new(
            crate::services::rate_limiter::TokenBucketRateLimiter::new(6000.0),
            crate::services::retry::RetryPolicy::default(),
        ));
        BdiExecutor::new(
            "test-agent",
            Arc::new(GoalSet::new()),
            Arc::new(PlanManager::new()),
            Arc::new(BeliefStore::new()),
            llm,
            "mock-default",
            workspace.to_path_buf(),
            2,
            Arc::new(JsonStore::new(data_dir.to_path_buf())),
        )
    }

    #[tokio::test]
    async fn sequential_plan_scenario_updates_belief() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let executor = build_executor(workspace.path(), data_dir.path());

        let goal = Goal::new("demo", 5);
        let goal_id = executor.goal_set.add(goal).unwrap();

        let mut update_params = Map::new();
        update_params.insert("key".to_string(), Value::String("k".into()));
        update_params.insert("value".to_string(), Value::String("v".into()));
        let actions = vec![Action::new("NO_OP", Map::new()), Action::new("UPDATE_BELIEF", update_params)];

        let plan_id = executor.install_plan(goal_id.clone(), actions).await;
        let status = executor.act(&plan_id).await.unwrap();

        assert_eq!(status, PlanStatus::CompletedSuccess);
        assert_eq!(executor.belief_store.get("k").unwrap().value, Value::String("v".into()));
    }

    #[tokio::test]
    async fn parameter_passing_scenario() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let executor = build_executor(workspace.path(), data_dir.path());

        let goal_id = executor.goal_set.add(Goal::new("analyze", 5)).unwrap();

        let mut analyze_params = Map::new();
        analyze_params.insert("data".to_string(), Value::String("raw".into()));
        let mut update_params = Map::new();
        update_params.insert("key".to_string(), Value::String("out".into()));
        update_params.insert("value".to_string(), Value::String("$action_result.A".into()));

        let actions = vec![
            Action::new("ANALYZE_DATA", analyze_params).with_id("A"),
            Action::new("UPDATE_BELIEF", update_params).with_id("B"),
        ];
        let plan_id = executor.install_plan(goal_id, actions).await;
        executor.act(&plan_id).await.unwrap();

        let belief = executor.belief_store.get("out").unwrap();
        assert!(belief.value.as_str().is_some());
    }

    #[tokio::test]
    async fn failing_action_spawns_simplified_approach_goal() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let executor = build_executor(workspace.path(), data_dir.path());

        let goal_id = executor.goal_set.add(Goal::new("do the thing", 5)).unwrap();
        let plan_id = executor.install_plan(goal_id, vec![Action::new("FAIL", Map::new())]).await;
        let status = executor.act(&plan_id).await.unwrap();

        assert_eq!(status, PlanStatus::FailedAction);
        assert_eq!(executor.goal_set.len(), 2);
        let rates = executor.failure_analyzer.snapshot();
        assert!(rates.contains_key(&(FailureType::ToolExecutionError, RecoveryStrategy::SimplifiedApproach)));
    }

    struct AlwaysOkTool;

    #[async_trait]
    impl Tool for AlwaysOkTool {
        async fn execute(&self, _params: &Map<String, Value>) -> Result<Value, BdiError> {
            Ok(Value::String("fallback ran".into()))
        }

        fn describe(&self) -> ActionSpec {
            ActionSpec { action_type: "FALLBACK".into(), description: "test fallback tool".into(), required_params: vec![] }
        }
    }

    #[tokio::test]
    async fn unresolved_tool_falls_back_to_alternative_tool() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let executor = build_executor(workspace.path(), data_dir.path());
        executor.register_tool("FALLBACK", Arc::new(AlwaysOkTool)).await;

        let goal_id = executor.goal_set.add(Goal::new("use a missing tool", 5)).unwrap();
        let plan_id = executor.install_plan(goal_id, vec![Action::new("MISSING_TOOL", Map::new())]).await;
        let status = executor.act(&plan_id).await.unwrap();

        assert_eq!(status, PlanStatus::CompletedSuccess);
        let rates = executor.failure_analyzer.snapshot();
        assert_eq!(rates[&(FailureType::ToolUnavailable, RecoveryStrategy::AlternativeTool)], 0.3 * 1.0 + 0.7 * 0.5);
    }

    #[tokio::test]
    async fn recovery_table_persists_across_executors() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let executor = build_executor(workspace.path(), data_dir.path());

        let goal_id = executor.goal_set.add(Goal::new("do the thing", 5)).unwrap();
        let plan_id = executor.install_plan(goal_id, vec![Action::new("FAIL", Map::new())]).await;
        executor.act(&plan_id).await.unwrap();

        let reloaded = build_executor(workspace.path(), data_dir.path());
        reloaded.load_persisted().await;
        let rates = reloaded.failure_analyzer.snapshot();
        assert!(rates.contains_key(&(FailureType::ToolExecutionError, RecoveryStrategy::SimplifiedApproach)));
    }
}
