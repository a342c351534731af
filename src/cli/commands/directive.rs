use serde::Serialize;
use serde_json::json;

use crate::cli::output::CommandOutput;
use crate::cli::table::TableFormatter;
use crate::cli::AppContext;
use crate::domain::models::campaign::CampaignSummary;

#[derive(Serialize)]
pub struct CampaignOutput(pub CampaignSummary);

impl CommandOutput for CampaignOutput {
    fn to_human(&self) -> String {
        let mut table = TableFormatter::new(&["run_id", "agent_id", "status", "message"]);
        table.add_row(vec![self.0.run_id.clone(), self.0.agent_id.clone(), format!("{:?}", self.0.status), self.0.message.clone()]);
        table.render()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(json!({}))
    }
}

/// `evolve <directive>` (§6): runs a full Strategic Evolution campaign for the given goal.
pub async fn evolve(ctx: &AppContext, directive: &str) -> CampaignOutput {
    CampaignOutput(ctx.strategic.run_evolution_campaign(directive).await)
}

#[derive(Serialize)]
pub struct OutOfScopeOutput {
    pub directive: String,
    pub note: &'static str,
}

impl CommandOutput for OutOfScopeOutput {
    fn to_human(&self) -> String {
        format!("'{}' accepted by the handler interface; deployment execution is out of core scope ({})", self.directive, self.note)
    }

    fn to_json(&self) -> serde_json::Value {
        json!({"directive": self.directive, "note": self.note})
    }
}

/// `deploy <directive>` (§6): a handler-interface stub. Deployment execution against live
/// infrastructure is an explicit non-goal of the core kernel; this only confirms the directive
/// was accepted by the interface a future deployment backend would implement.
pub fn deploy(directive: &str) -> OutOfScopeOutput {
    OutOfScopeOutput { directive: directive.to_string(), note: "no deployment backend is wired into the core kernel" }
}

/// `introspect <role>` (§6): a handler-interface stub, mirroring `deploy`.
pub fn introspect(role: &str) -> OutOfScopeOutput {
    OutOfScopeOutput { directive: role.to_string(), note: "no role-introspection backend is wired into the core kernel" }
}
