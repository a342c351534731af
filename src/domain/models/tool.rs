use serde::{Deserialize, Serialize};

/// Declarative manifest entry for a loadable tool. Instantiation policy belongs to the BDI
/// Executor; this is metadata only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub tool_id: String,
    pub enabled: bool,
    pub module_path: String,
    pub class_name: String,
    pub required_params: Vec<String>,
    pub description: String,
}

impl ToolEntry {
    #[must_use]
    pub fn new(tool_id: impl Into<String>, description: impl Into<String>, required_params: Vec<String>) -> Self {
        let tool_id = tool_id.into();
        Self {
            module_path: format!("builtin::{tool_id}"),
            class_name: tool_id.clone(),
            tool_id,
            enabled: true,
            required_params,
            description: description.into(),
        }
    }
}
