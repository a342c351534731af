use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::process::Command;
use tracing::instrument;

use crate::domain::error::BdiError;
use crate::services::belief_store::BeliefStore;
use crate::domain::models::belief::BeliefSource;
use crate::services::bdi::planner::ActionSpec;
use crate::services::llm_dispatch::{GenerateOptions, LlmDispatch};

/// The internal action vocabulary every BDI executor ships regardless of loaded tools
/// (§4.6.2): cognitive LLM wrappers, belief updates, path-scoped file/shell ops, and a
/// deliberately-failing action used to exercise recovery paths in tests.
pub struct InternalActions {
    belief_store: Arc<BeliefStore>,
    llm: Arc<LlmDispatch>,
    default_model: String,
    workspace_root: PathBuf,
}

impl InternalActions {
    #[must_use]
    pub fn new(belief_store: Arc<BeliefStore>, llm: Arc<LlmDispatch>, default_model: impl Into<String>, workspace_root: impl Into<PathBuf>) -> Self {
        Self { belief_store, llm, default_model: default_model.into(), workspace_root: workspace_root.into() }
    }

    #[must_use]
    pub fn manifest() -> Vec<ActionSpec> {
        vec![
            ActionSpec { action_type: "NO_OP".into(), description: "does nothing, always succeeds".into(), required_params: vec![] },
            ActionSpec {
                action_type: "UPDATE_BELIEF".into(),
                description: "writes a belief into the shared store".into(),
                required_params: vec!["key".into(), "value".into()],
            },
            ActionSpec {
                action_type: "ANALYZE_DATA".into(),
                description: "runs a cognitive LLM call over the supplied data".into(),
                required_params: vec!["data".into()],
            },
            ActionSpec {
                action_type: "READ_FILE".into(),
                description: "reads a file scoped to the workspace root".into(),
                required_params: vec!["path".into()],
            },
            ActionSpec {
                action_type: "WRITE_FILE".into(),
                description: "writes a file scoped to the workspace root".into(),
                required_params: vec!["path".into(), "content".into()],
            },
            ActionSpec {
                action_type: "EXECUTE_SHELL_COMMAND".into(),
                description: "runs a shell command with the workspace root as cwd".into(),
                required_params: vec!["command".into()],
            },
            ActionSpec { action_type: "FAIL".into(), description: "always fails; used to exercise recovery".into(), required_params: vec![] },
        ]
    }

    #[must_use]
    pub fn handles(action_type: &str) -> bool {
        Self::manifest().iter().any(|spec| spec.action_type == action_type)
    }

    /// Resolves `path` against the workspace root, rejecting any path that escapes it.
    fn scoped_path(&self, path: &str) -> Result<PathBuf, BdiError> {
        let candidate = self.workspace_root.join(path);
        let root = self.workspace_root.canonicalize().unwrap_or_else(|_| self.workspace_root.clone());
        let parent = candidate.parent().map(Path::to_path_buf).unwrap_or_else(|| candidate.clone());
        let canon_parent = parent.canonicalize().unwrap_or(parent);
        if !canon_parent.starts_with(&root) {
            return Err(BdiError::PermissionDenied(format!("path '{path}' escapes workspace root")));
        }
        Ok(candidate)
    }

    #[instrument(skip(self, params))]
    pub async fn dispatch(&self, action_type: &str, params: &HashMap<String, Value>) -> Result<Value, BdiError> {
        match action_type {
            "NO_OP" => Ok(Value::Null),
            "UPDATE_BELIEF" => self.update_belief(params),
            "ANALYZE_DATA" => self.analyze_data(params).await,
            "READ_FILE" => self.read_file(params).await,
            "WRITE_FILE" => self.write_file(params).await,
            "EXECUTE_SHELL_COMMAND" => self.execute_shell_command(params).await,
            "FAIL" => Err(BdiError::ToolError("FAIL action invoked deliberately".to_string())),
            other => Err(BdiError::ToolUnavailable(other.to_string())),
        }
    }

    fn update_belief(&self, params: &HashMap<String, Value>) -> Result<Value, BdiError> {
        let key = params.get("key").and_then(Value::as_str).ok_or_else(|| BdiError::ToolError("missing 'key'".into()))?;
        let value = params.get("value").cloned().unwrap_or(Value::Null);
        self.belief_store.add(key, value.clone(), 0.9, BeliefSource::Derivation, None);
        Ok(value)
    }

    async fn analyze_data(&self, params: &HashMap<String, Value>) -> Result<Value, BdiError> {
        let data = params.get("data").cloned().unwrap_or(Value::Null);
        let prompt = format!("Analyze the following data and summarize it in one sentence:\n{data}");
        let text = self
            .llm
            .generate_text(&prompt, &self.default_model, GenerateOptions::default())
            .await
            .map_err(BdiError::from)?;
        Ok(Value::String(text))
    }

    async fn read_file(&self, params: &HashMap<String, Value>) -> Result<Value, BdiError> {
        let path = params.get("path").and_then(Value::as_str).ok_or_else(|| BdiError::ToolError("missing 'path'".into()))?;
        let resolved = self.scoped_path(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| BdiError::ToolError(format!("read_file failed: {e}")))?;
        Ok(Value::String(content))
    }

    async fn write_file(&self, params: &HashMap<String, Value>) -> Result<Value, BdiError> {
        let path = params.get("path").and_then(Value::as_str).ok_or_else(|| BdiError::ToolError("missing 'path'".into()))?;
        let content = params.get("content").and_then(Value::as_str).unwrap_or_default();
        let resolved = self.scoped_path(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| BdiError::ToolError(e.to_string()))?;
        }
        tokio::fs::write(&resolved, content).await.map_err(|e| BdiError::ToolError(format!("write_file failed: {e}")))?;
        Ok(Value::Bool(true))
    }

    async fn execute_shell_command(&self, params: &HashMap<String, Value>) -> Result<Value, BdiError> {
        let command = params.get("command").and_then(Value::as_str).ok_or_else(|| BdiError::ToolError("missing 'command'".into()))?;
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .output()
            .await
            .map_err(|e| BdiError::ToolError(format!("shell command failed to spawn: {e}")))?;

        if output.status.success() {
            Ok(Value::String(String::from_utf8_lossy(&output.stdout).to_string()))
        } else {
            Err(BdiError::ToolError(String::from_utf8_lossy(&output.stderr).to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(workspace: &Path) -> InternalActions {
        InternalActions::new(
            Arc::new(BeliefStore::new()),
            Arc::new(LlmDispatch::new(
                crate::services::rate_limiter::TokenBucketRateLimiter::new(6000.0),
                crate::services::retry::RetryPolicy::default(),
            )),
            "mock-default",
            workspace.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn no_op_always_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let internal = actions(dir.path());
        let result = internal.dispatch("NO_OP", &HashMap::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn update_belief_writes_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let internal = actions(dir.path());
        let mut params = HashMap::new();
        params.insert("key".to_string(), Value::String("k".into()));
        params.insert("value".to_string(), Value::String("v".into()));
        internal.dispatch("UPDATE_BELIEF", &params).await.unwrap();
        assert_eq!(internal.belief_store.get("k").unwrap().value, Value::String("v".into()));
    }

    #[tokio::test]
    async fn write_then_read_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let internal = actions(dir.path());
        let mut write_params = HashMap::new();
        write_params.insert("path".to_string(), Value::String("nested/out.txt".into()));
        write_params.insert("content".to_string(), Value::String("hello".into()));
        internal.dispatch("WRITE_FILE", &write_params).await.unwrap();

        let mut read_params = HashMap::new();
        read_params.insert("path".to_string(), Value::String("nested/out.txt".into()));
        let result = internal.dispatch("READ_FILE", &read_params).await.unwrap();
        assert_eq!(result, Value::String("hello".into()));
    }

    #[tokio::test]
    async fn path_escaping_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let internal = actions(dir.path());
        let mut params = HashMap::new();
        params.insert("path".to_string(), Value::String("../../etc/passwd".into()));
        let result = internal.dispatch("READ_FILE", &params).await;
        assert!(matches!(result, Err(BdiError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn fail_action_always_errors() {
        let dir = tempfile::tempdir().unwrap();
        let internal = actions(dir.path());
        assert!(internal.dispatch("FAIL", &HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn unknown_action_is_tool_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let internal = actions(dir.path());
        assert!(matches!(internal.dispatch("NOT_A_REAL_ACTION", &HashMap::new()).await, Err(BdiError::ToolUnavailable(_))));
    }
}
