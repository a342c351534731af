use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::domain::error::KernelError;
use crate::domain::models::goal::{Goal, GoalStatus};

/// Priority queue of goals with dependency tracking and cycle rejection (C4).
#[derive(Default)]
pub struct GoalSet {
    goals: RwLock<HashMap<String, Goal>>,
}

impl GoalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a goal. If `dependency_ids` is non-empty, rejects insertion with
    /// `KernelError::InvalidInput` when it would close a cycle in the dependency graph, leaving
    /// the graph unchanged.
    pub fn add(&self, mut goal: Goal) -> Result<String, KernelError> {
        let mut goals = self.goals.write().expect("goal set lock poisoned");

        if !goal.dependency_ids.is_empty() && would_cycle(&goals, &goal.id, &goal.dependency_ids) {
            return Err(KernelError::InvalidInput(format!(
                "adding dependencies {:?} to goal {} would create a cycle",
                goal.dependency_ids, goal.id
            )));
        }

        let unmet = goal.dependency_ids.iter().any(|dep| {
            goals.get(dep).is_none_or(|d| d.status != GoalStatus::CompletedSuccess)
        });
        if unmet {
            goal.status = GoalStatus::PausedDependency;
        }

        for dep_id in goal.dependency_ids.clone() {
            if let Some(dep) = goals.get_mut(&dep_id) {
                dep.dependent_ids.push(goal.id.clone());
            }
        }

        let id = goal.id.clone();
        goals.insert(id.clone(), goal);
        Ok(id)
    }

    /// Attempts to add `dependency_id` as a dependency of `goal_id` after insertion. Rejects
    /// (leaving the graph unchanged) if it would close a cycle.
    pub fn add_dependency(&self, goal_id: &str, dependency_id: &str) -> Result<(), KernelError> {
        let mut goals = self.goals.write().expect("goal set lock poisoned");
        if !goals.contains_key(goal_id) || !goals.contains_key(dependency_id) {
            return Err(KernelError::InvalidInput("unknown goal id".to_string()));
        }
        let candidate_deps: Vec<String> = goals[goal_id]
            .dependency_ids
            .iter()
            .cloned()
            .chain(std::iter::once(dependency_id.to_string()))
            .collect();
        if would_cycle(&goals, goal_id, &candidate_deps) {
            return Err(KernelError::InvalidInput(format!(
                "dependency {goal_id} -> {dependency_id} would create a cycle"
            )));
        }
        goals.get_mut(goal_id).expect("checked above").dependency_ids.push(dependency_id.to_string());
        goals.get_mut(dependency_id).expect("checked above").dependent_ids.push(goal_id.to_string());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Goal> {
        self.goals.read().expect("goal set lock poisoned").get(id).cloned()
    }

    /// Highest-priority goal (ties broken by earlier `created_at`) whose status is `pending`
    /// and whose dependencies are all `completed_success`.
    #[must_use]
    pub fn next_actionable(&self) -> Option<Goal> {
        let goals = self.goals.read().expect("goal set lock poisoned");
        goals
            .values()
            .filter(|g| g.status == GoalStatus::Pending)
            .filter(|g| dependencies_satisfied(&goals, g))
            .max()
            .cloned()
    }

    /// Marks `id` completed and promotes any `paused_dependency` dependents whose dependencies
    /// are now all satisfied, within the same call.
    pub fn complete(&self, id: &str) {
        let mut goals = self.goals.write().expect("goal set lock poisoned");
        let Some(goal) = goals.get_mut(id) else { return };
        goal.transition_to(GoalStatus::CompletedSuccess);
        let dependents = goal.dependent_ids.clone();

        for dep_id in dependents {
            let promote = goals
                .get(&dep_id)
                .map(|d| d.status == GoalStatus::PausedDependency && dependencies_satisfied(&goals, d))
                .unwrap_or(false);
            if promote {
                if let Some(dependent) = goals.get_mut(&dep_id) {
                    dependent.transition_to(GoalStatus::Pending);
                }
            }
        }
    }

    pub fn transition(&self, id: &str, status: GoalStatus) {
        if let Some(goal) = self.goals.write().expect("goal set lock poisoned").get_mut(id) {
            goal.transition_to(status);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.goals.read().expect("goal set lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dependencies_satisfied(goals: &HashMap<String, Goal>, goal: &Goal) -> bool {
    goal.dependency_ids
        .iter()
        .all(|dep| goals.get(dep).is_some_and(|d| d.status == GoalStatus::CompletedSuccess))
}

/// DFS cycle check: would adding edges `from -> dep` for each `dep` in `new_deps` create a
/// cycle reachable back to `from`?
fn would_cycle(goals: &HashMap<String, Goal>, from: &str, new_deps: &[String]) -> bool {
    let mut visited = HashSet::new();
    let mut stack: Vec<String> = new_deps.to_vec();
    while let Some(node) = stack.pop() {
        if node == from {
            return true;
        }
        if !visited.insert(node.clone()) {
            continue;
        }
        if let Some(g) = goals.get(&node) {
            stack.extend(g.dependency_ids.iter().cloned());
        }
    }
    false
}
