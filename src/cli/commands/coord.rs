use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::output::CommandOutput;
use crate::cli::table::TableFormatter;
use crate::domain::error::KernelError;
use crate::domain::models::backlog::{BacklogItem, BacklogStatus};
use crate::cli::AppContext;
use crate::domain::models::interaction::{Interaction, InteractionKind};

#[derive(Serialize)]
pub struct InteractionOutput(pub Interaction);

impl CommandOutput for InteractionOutput {
    fn to_human(&self) -> String {
        let mut table = TableFormatter::new(&["id", "kind", "status", "response"]);
        let response = self.0.response.as_ref().map(|v| v.to_string()).or_else(|| self.0.error.clone()).unwrap_or_default();
        table.add_row(vec![self.0.id.clone(), self.0.kind.as_str().to_string(), format!("{:?}", self.0.status), response]);
        table.render()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(json!({}))
    }
}

/// `coord_query <text>` (§6): routes free text through the Kernel as a `query` interaction.
pub async fn query(ctx: &AppContext, text: &str) -> InteractionOutput {
    InteractionOutput(ctx.kernel.handle_input(text, InteractionKind::Query, HashMap::new()).await)
}

/// `coord_analyze [context]` (§6): requests a `system_analysis` interaction.
pub async fn analyze(ctx: &AppContext, context: Option<&str>) -> InteractionOutput {
    InteractionOutput(ctx.kernel.handle_input(context.unwrap_or_default(), InteractionKind::SystemAnalysis, HashMap::new()).await)
}

/// `coord_improve <id> [context]` (§6): requests a `component_improvement` interaction against
/// `id`; `context` (falling back to `id`) becomes the interaction content.
pub async fn improve(ctx: &AppContext, id: &str, context: Option<&str>) -> InteractionOutput {
    let mut metadata = HashMap::new();
    metadata.insert("target_id".to_string(), Value::String(id.to_string()));
    let content = context.unwrap_or(id);
    InteractionOutput(ctx.kernel.handle_input(content, InteractionKind::ComponentImprovement, metadata).await)
}

#[derive(Serialize)]
pub struct BacklogOutput(pub Vec<BacklogItem>);

impl CommandOutput for BacklogOutput {
    fn to_human(&self) -> String {
        let mut table = TableFormatter::new(&["id", "priority", "status", "target", "suggestion"]);
        for item in &self.0 {
            table.add_row(vec![item.id.clone(), item.priority.to_string(), format!("{:?}", item.status), item.target.clone(), crate::cli::table::truncate_text(&item.suggestion, 60)]);
        }
        table.render()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(json!([]))
    }
}

/// `coord_backlog` (§6): prints the current improvement backlog.
pub async fn backlog(ctx: &AppContext) -> BacklogOutput {
    BacklogOutput(ctx.kernel.backlog_snapshot().await)
}

#[derive(Serialize)]
pub struct ProcessBacklogOutput {
    pub item: Option<BacklogItem>,
    pub interaction: Option<Interaction>,
}

impl CommandOutput for ProcessBacklogOutput {
    fn to_human(&self) -> String {
        match (&self.item, &self.interaction) {
            (Some(item), Some(interaction)) => format!(
                "dispatched backlog item {} ('{}') as interaction {} ({:?})",
                item.id, item.suggestion, interaction.id, interaction.status
            ),
            _ => "no actionable backlog item".to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"item": self.item, "interaction": self.interaction})
    }
}

/// `coord_process_backlog` (§6): pops the highest-priority actionable backlog item and
/// dispatches its suggestion as a `component_improvement` interaction.
pub async fn process_backlog(ctx: &AppContext) -> ProcessBacklogOutput {
    let Some(item) = ctx.kernel.pop_actionable_backlog_item().await else {
        return ProcessBacklogOutput { item: None, interaction: None };
    };
    let mut metadata = HashMap::new();
    metadata.insert("backlog_item_id".to_string(), Value::String(item.id.clone()));
    let interaction = ctx.kernel.handle_input(item.suggestion.clone(), InteractionKind::ComponentImprovement, metadata).await;
    ProcessBacklogOutput { item: Some(item), interaction: Some(interaction) }
}

#[derive(Serialize)]
pub struct BacklogStatusOutput {
    pub id: String,
    pub status: &'static str,
}

impl CommandOutput for BacklogStatusOutput {
    fn to_human(&self) -> String {
        format!("backlog item {} marked {}", self.id, self.status)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"id": self.id, "status": self.status})
    }
}

/// `coord_approve <id>` / `coord_reject <id>` (§6): transitions a pending backlog item.
pub async fn set_status(ctx: &AppContext, id: &str, status: BacklogStatus) -> Result<BacklogStatusOutput, KernelError> {
    ctx.kernel.set_backlog_status(id, status).await?;
    let label = match status {
        BacklogStatus::Approved => "approved",
        BacklogStatus::Rejected => "rejected",
        _ => "updated",
    };
    Ok(BacklogStatusOutput { id: id.to_string(), status: label })
}
