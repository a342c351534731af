pub mod commands;
pub mod output;
pub mod table;
pub mod types;

use serde_json::json;
use std::sync::Arc;

use crate::domain::error::{error_kind_label, CoreError, KernelError};
use crate::domain::models::backlog::BacklogStatus;
use crate::services::audit_scheduler::AuditScheduler;
use crate::services::kernel::Kernel;
use crate::services::strategic_evolution::StrategicEvolution;

pub use types::Cli;
use types::{AgentCommands, Commands, CoordCommands};

/// The constructed service graph a dispatched command operates against. Built once at startup
/// (§4.7's singleton discipline, reinterpreted as an explicit, process-local service locator)
/// and passed down rather than reached for as a global.
pub struct AppContext {
    pub kernel: Arc<Kernel>,
    pub strategic: Arc<StrategicEvolution>,
    pub audit_scheduler: Arc<AuditScheduler>,
}

/// Prints the §7 JSON failure shape `{status, message, error_details?}` (`data` is omitted on
/// failure responses, as nothing has succeeded to report).
fn print_error(message: &str, error_details: Option<&'static str>, json_mode: bool) {
    if json_mode {
        let mut body = json!({"status": "error", "message": message});
        if let Some(kind) = error_details {
            body["error_details"] = json!({"kind": kind});
        }
        println!("{body}");
    } else {
        eprintln!("error: {message}");
    }
}

fn print_kernel_error(err: &KernelError, json_mode: bool) {
    let kind = error_kind_label(&CoreError::Kernel(match err {
        KernelError::InvalidInput(m) => KernelError::InvalidInput(m.clone()),
        KernelError::NoHandler(m) => KernelError::NoHandler(m.clone()),
        KernelError::Internal(m) => KernelError::Internal(m.clone()),
    }));
    print_error(&err.to_string(), Some(kind), json_mode);
}

/// Dispatches a parsed command against `ctx`, printing its output, and returns the process
/// exit code (0 on success, 1 if the command itself reported failure).
pub async fn dispatch(cli: Cli, ctx: &AppContext) -> i32 {
    let json_mode = cli.json;
    match cli.command {
        Commands::Evolve(args) => {
            output::output(&commands::directive::evolve(ctx, &args.directive).await, json_mode);
            0
        }
        Commands::Deploy(args) => {
            output::output(&commands::directive::deploy(&args.directive), json_mode);
            0
        }
        Commands::Introspect(args) => {
            output::output(&commands::directive::introspect(&args.role), json_mode);
            0
        }
        Commands::ShowAgentRegistry => {
            output::output(&commands::agent::list(ctx), json_mode);
            0
        }
        Commands::Coord(coord) => dispatch_coord(coord, ctx, json_mode).await,
        Commands::Agent(agent) => dispatch_agent(agent, ctx, json_mode),
    }
}

async fn dispatch_coord(command: CoordCommands, ctx: &AppContext, json_mode: bool) -> i32 {
    match command {
        CoordCommands::Query(args) => {
            output::output(&commands::coord::query(ctx, &args.text).await, json_mode);
            0
        }
        CoordCommands::Analyze(args) => {
            output::output(&commands::coord::analyze(ctx, args.context.as_deref()).await, json_mode);
            0
        }
        CoordCommands::Improve(args) => {
            output::output(&commands::coord::improve(ctx, &args.id, args.context.as_deref()).await, json_mode);
            0
        }
        CoordCommands::Backlog => {
            output::output(&commands::coord::backlog(ctx).await, json_mode);
            0
        }
        CoordCommands::ProcessBacklog => {
            output::output(&commands::coord::process_backlog(ctx).await, json_mode);
            0
        }
        CoordCommands::Approve(args) => match commands::coord::set_status(ctx, &args.id, BacklogStatus::Approved).await {
            Ok(result) => {
                output::output(&result, json_mode);
                0
            }
            Err(err) => {
                print_kernel_error(&err, json_mode);
                1
            }
        },
        CoordCommands::Reject(args) => match commands::coord::set_status(ctx, &args.id, BacklogStatus::Rejected).await {
            Ok(result) => {
                output::output(&result, json_mode);
                0
            }
            Err(err) => {
                print_kernel_error(&err, json_mode);
                1
            }
        },
    }
}

fn dispatch_agent(command: AgentCommands, ctx: &AppContext, json_mode: bool) -> i32 {
    match command {
        AgentCommands::Create(args) => match commands::agent::create(ctx, &args.kind, &args.id, args.detail.as_deref()) {
            Ok(result) => {
                output::output(&result, json_mode);
                0
            }
            Err(message) => {
                print_error(&message, Some("INVALID_INPUT"), json_mode);
                1
            }
        },
        AgentCommands::Delete(args) => match commands::agent::delete(ctx, &args.id) {
            Ok(result) => {
                output::output(&result, json_mode);
                0
            }
            Err(err) => {
                print_kernel_error(&err, json_mode);
                1
            }
        },
        AgentCommands::List => {
            output::output(&commands::agent::list(ctx), json_mode);
            0
        }
    }
}
