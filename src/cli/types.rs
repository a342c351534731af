use clap::{Args, Parser, Subcommand};

/// Autonomous, self-improving multi-agent orchestration kernel.
#[derive(Parser, Debug)]
#[command(name = "swarmkernel")]
#[command(about = "Orchestration kernel: BDI agents, strategic evolution, autonomous audits", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON instead of a human-formatted table.
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs a directive through the Strategic Evolution campaign pipeline.
    Evolve(EvolveArgs),

    /// Hands a directive to the (out-of-core-scope) deployment handler interface.
    Deploy(DeployArgs),

    /// Hands a role query to the (out-of-core-scope) introspection handler interface.
    Introspect(IntrospectArgs),

    /// Prints the Kernel's current agent registry snapshot.
    ShowAgentRegistry,

    /// Coordinator-facing interactions: query, analyze, improve, and backlog management.
    #[command(subcommand)]
    Coord(CoordCommands),

    /// Agent registry management: create, delete, list.
    #[command(subcommand)]
    Agent(AgentCommands),
}

#[derive(Args, Debug)]
pub struct EvolveArgs {
    /// The improvement goal driving the campaign.
    pub directive: String,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    pub directive: String,
}

#[derive(Args, Debug)]
pub struct IntrospectArgs {
    pub role: String,
}

#[derive(Subcommand, Debug)]
pub enum CoordCommands {
    /// Routes free-text through the Kernel as a `query` interaction.
    Query(CoordQueryArgs),

    /// Requests a `system_analysis` interaction, optionally scoped by context.
    Analyze(CoordAnalyzeArgs),

    /// Requests a `component_improvement` interaction against a named target.
    Improve(CoordImproveArgs),

    /// Prints the current improvement backlog.
    Backlog,

    /// Pops and dispatches the highest-priority actionable backlog item.
    ProcessBacklog,

    /// Approves a pending backlog item for execution.
    Approve(CoordBacklogIdArgs),

    /// Rejects a pending backlog item.
    Reject(CoordBacklogIdArgs),
}

#[derive(Args, Debug)]
pub struct CoordQueryArgs {
    pub text: String,
}

#[derive(Args, Debug)]
pub struct CoordAnalyzeArgs {
    pub context: Option<String>,
}

#[derive(Args, Debug)]
pub struct CoordImproveArgs {
    pub id: String,
    pub context: Option<String>,
}

#[derive(Args, Debug)]
pub struct CoordBacklogIdArgs {
    pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Registers a new agent. `detail` is parsed as a JSON config object when it starts with
    /// `{` or `[`, otherwise treated as a free-text description.
    Create(AgentCreateArgs),

    /// Deregisters an agent by id.
    Delete(AgentDeleteArgs),

    /// Lists all registered agents.
    List,
}

#[derive(Args, Debug)]
pub struct AgentCreateArgs {
    pub kind: String,
    pub id: String,
    pub detail: Option<String>,
}

#[derive(Args, Debug)]
pub struct AgentDeleteArgs {
    pub id: String,
}
