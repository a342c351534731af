use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::domain::models::action::{Action, ActionStatus};
use crate::domain::models::plan::{Plan, PlanStatus};

/// Executor callback: given a fully parameter-resolved action, returns `(success, result)`.
pub type ActionExecutor = dyn Fn(Action) -> Pin<Box<dyn Future<Output = (bool, Value)> + Send>> + Send + Sync;

/// Represents, validates, and executes [`Plan`]s (C5), grounded on the source project's
/// `plan_management.py`: sequential array-order execution, or dependency-graph-gated bounded
/// parallel execution, with recursive `$action_result.<id>[.<path>]` parameter resolution.
#[derive(Default)]
pub struct PlanManager {
    plans: RwLock<HashMap<String, Plan>>,
}

impl PlanManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_plan(&self, goal_id: impl Into<String>, actions: Vec<Action>, created_by: impl Into<String>) -> String {
        let plan = Plan::new(goal_id, actions, created_by);
        let id = plan.id.clone();
        self.plans.write().expect("plan manager lock poisoned").insert(id.clone(), plan);
        id
    }

    #[must_use]
    pub fn get_plan(&self, id: &str) -> Option<Plan> {
        self.plans.read().expect("plan manager lock poisoned").get(id).cloned()
    }

    fn with_plan<R>(&self, id: &str, f: impl FnOnce(&mut Plan) -> R) -> Option<R> {
        let mut plans = self.plans.write().expect("plan manager lock poisoned");
        plans.get_mut(id).map(f)
    }

    /// Sequential execution: iterate actions in array order. Skips actions whose dependencies
    /// are unmet; a failed critical action halts remaining execution.
    #[instrument(skip(self, executor), fields(plan_id))]
    pub async fn execute_plan_sequential(&self, plan_id: &str, executor: &ActionExecutor) {
        let Some(mut plan) = self.get_plan(plan_id) else {
            warn!(plan_id, "execute_plan_sequential: unknown plan");
            return;
        };
        plan.status = PlanStatus::InProgress;
        plan.started_at = Some(chrono::Utc::now());

        let action_ids: Vec<String> = plan.actions.iter().map(|a| a.id.clone()).collect();
        let mut halted = false;

        for action_id in action_ids {
            if halted {
                if let Some(a) = plan.action_mut(&action_id) {
                    a.status = ActionStatus::Cancelled;
                }
                continue;
            }

            let action = plan.action(&action_id).cloned().expect("id came from plan.actions");
            if !plan.dependencies_met(&action) {
                plan.action_mut(&action_id).expect("exists").mark_skipped();
                continue;
            }

            let resolved = resolve_params(&action.params, &plan.action_results);
            let mut to_run = action.clone();
            to_run.params = resolved;
            to_run.mark_started();
            let (success, result) = executor(to_run.clone()).await;

            let is_critical = action.is_critical;
            let a = plan.action_mut(&action_id).expect("exists");
            if success {
                a.mark_succeeded(result.clone());
                plan.action_results.insert(action_id.clone(), result);
            } else {
                a.mark_failed(result.as_str().unwrap_or("action failed").to_string());
                if is_critical {
                    halted = true;
                }
            }
        }

        plan.recompute_status();
        info!(plan_id, status = ?plan.status, "sequential plan execution finished");
        self.with_plan(plan_id, |p| *p = plan);
    }

    /// Dependency-graph-gated parallel execution bounded by `max_concurrent`. Runs a pending
    /// action as soon as its dependencies are satisfied and a slot is free; awaits first
    /// completion; cancels and drains the remaining futures if the plan is marked failed.
    #[instrument(skip(self, executor), fields(plan_id))]
    pub async fn execute_plan_parallel(&self, plan_id: &str, executor: &ActionExecutor, max_concurrent: usize) {
        let Some(mut plan) = self.get_plan(plan_id) else {
            warn!(plan_id, "execute_plan_parallel: unknown plan");
            return;
        };
        plan.status = PlanStatus::InProgress;
        plan.started_at = Some(chrono::Utc::now());

        let mut running: FuturesUnordered<Pin<Box<dyn Future<Output = (String, bool, Value)> + Send>>> = FuturesUnordered::new();
        let mut failed_critically = false;

        loop {
            if !failed_critically {
                let ready_ids: Vec<String> = plan
                    .actions
                    .iter()
                    .filter(|a| a.status == ActionStatus::Pending && plan.dependencies_met(a))
                    .map(|a| a.id.clone())
                    .collect();

                for action_id in ready_ids {
                    if running.len() >= max_concurrent {
                        plan.action_mut(&action_id).expect("exists").status = ActionStatus::Ready;
                        continue;
                    }
                    let action = plan.action(&action_id).cloned().expect("exists");
                    let resolved = resolve_params(&action.params, &plan.action_results);
                    let mut to_run = action.clone();
                    to_run.params = resolved;
                    to_run.mark_started();
                    plan.action_mut(&action_id).expect("exists").status = ActionStatus::InProgress;

                    let fut = executor(to_run);
                    let id_for_fut = action_id.clone();
                    running.push(Box::pin(async move {
                        let (success, result) = fut.await;
                        (id_for_fut, success, result)
                    }));
                }
            }

            if running.is_empty() {
                let still_pending = plan.actions.iter().any(|a| matches!(a.status, ActionStatus::Pending | ActionStatus::Ready));
                if !still_pending || failed_critically {
                    break;
                }
                // No running futures and nothing became ready: remaining pending actions have
                // permanently unmet dependencies (their deps failed). Skip them and exit.
                let stuck_ids: Vec<String> = plan
                    .actions
                    .iter()
                    .filter(|a| matches!(a.status, ActionStatus::Pending | ActionStatus::Ready))
                    .map(|a| a.id.clone())
                    .collect();
                for id in stuck_ids {
                    plan.action_mut(&id).expect("exists").mark_skipped();
                }
                break;
            }

            if let Some((action_id, success, result)) = running.next().await {
                let is_critical = plan.action(&action_id).expect("exists").is_critical;
                let a = plan.action_mut(&action_id).expect("exists");
                if success {
                    a.mark_succeeded(result.clone());
                    plan.action_results.insert(action_id, result);
                } else {
                    a.mark_failed(result.as_str().unwrap_or("action failed").to_string());
                    if is_critical {
                        failed_critically = true;
                    }
                }
            }

            if failed_critically && running.is_empty() {
                let remaining_ids: Vec<String> = plan
                    .actions
                    .iter()
                    .filter(|a| matches!(a.status, ActionStatus::Pending | ActionStatus::Ready | ActionStatus::InProgress))
                    .map(|a| a.id.clone())
                    .collect();
                for id in remaining_ids {
                    plan.action_mut(&id).expect("exists").status = ActionStatus::Cancelled;
                }
                break;
            }
        }

        plan.recompute_status();
        info!(plan_id, status = ?plan.status, "parallel plan execution finished");
        self.with_plan(plan_id, |p| *p = plan);
    }
}

/// Recursively resolves `"$action_result.<id>[.<dotted.path>]"` placeholders against prior
/// action results. Missing paths resolve to `Value::Null`; maps and lists are resolved
/// element-wise.
#[must_use]
pub fn resolve_params(params: &HashMap<String, Value>, action_results: &HashMap<String, Value>) -> HashMap<String, Value> {
    params.iter().map(|(k, v)| (k.clone(), resolve_value(v, action_results))).collect()
}

fn resolve_value(value: &Value, action_results: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => {
            if let Some(rest) = s.strip_prefix("$action_result.") {
                let mut parts = rest.splitn(2, '.');
                let action_id = parts.next().unwrap_or_default();
                let path = parts.next();
                let Some(root) = action_results.get(action_id) else {
                    return Value::Null;
                };
                match path {
                    None => root.clone(),
                    Some(p) => traverse_path(root, p),
                }
            } else {
                value.clone()
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, action_results)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_value(v, action_results))).collect())
        }
        other => other.clone(),
    }
}

fn traverse_path(root: &Value, path: &str) -> Value {
    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => current = v,
                None => return Value::Null,
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => current = v,
                None => return Value::Null,
            },
            _ => return Value::Null,
        }
    }
    current.clone()
}
