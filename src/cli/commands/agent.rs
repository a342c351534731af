use serde::Serialize;
use serde_json::json;

use crate::cli::commands::{parse_agent_detail, validate_agent_id};
use crate::cli::output::CommandOutput;
use crate::cli::table::TableFormatter;
use crate::domain::error::KernelError;
use crate::cli::AppContext;
use crate::domain::models::agent::AgentRegistration;

#[derive(Serialize)]
pub struct AgentListOutput(pub Vec<AgentRegistration>);

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        let mut table = TableFormatter::new(&["agent_id", "kind", "status", "description"]);
        for agent in &self.0 {
            table.add_row(vec![agent.agent_id.clone(), agent.kind.clone(), format!("{:?}", agent.status), crate::cli::table::truncate_text(&agent.description, 60)]);
        }
        table.render()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(json!([]))
    }
}

/// `agent_list` / `show_agent_registry` (§6): the Kernel's current agent registry snapshot.
pub fn list(ctx: &AppContext) -> AgentListOutput {
    AgentListOutput(ctx.kernel.list_agents())
}

#[derive(Serialize)]
pub struct AgentCreatedOutput {
    pub agent_id: String,
    pub kind: String,
}

impl CommandOutput for AgentCreatedOutput {
    fn to_human(&self) -> String {
        format!("registered agent '{}' of kind '{}'", self.agent_id, self.kind)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"agent_id": self.agent_id, "kind": self.kind})
    }
}

/// `agent_create <kind> <id> [detail]` (§6): registers a new agent. `detail` is parsed as a
/// JSON config object when it starts with `{` or `[`; otherwise it is a free-text description.
/// `id` is rejected up front if it is a bare English stop-word, almost always a transposed or
/// truncated argument rather than a real identifier.
pub fn create(ctx: &AppContext, kind: &str, id: &str, detail: Option<&str>) -> Result<AgentCreatedOutput, String> {
    validate_agent_id(id)?;
    let (description, config) = parse_agent_detail(detail);
    let description = match (description.is_empty(), config) {
        (false, _) => description,
        (true, Some(config)) => format!("config: {config}"),
        (true, None) => format!("agent of kind '{kind}'"),
    };
    ctx.kernel.register_agent(id, kind, description);
    Ok(AgentCreatedOutput { agent_id: id.to_string(), kind: kind.to_string() })
}

#[derive(Serialize)]
pub struct AgentDeletedOutput {
    pub agent_id: String,
}

impl CommandOutput for AgentDeletedOutput {
    fn to_human(&self) -> String {
        format!("deregistered agent '{}'", self.agent_id)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"agent_id": self.agent_id})
    }
}

/// `agent_delete <id>` (§6): deregisters an agent.
pub fn delete(ctx: &AppContext, id: &str) -> Result<AgentDeletedOutput, KernelError> {
    ctx.kernel.deregister_agent(id)?;
    Ok(AgentDeletedOutput { agent_id: id.to_string() })
}
