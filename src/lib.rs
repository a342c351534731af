//! Autonomous, self-improving multi-agent orchestration kernel: BDI agent execution, a
//! Strategic Evolution subsystem that runs safety-bracketed self-improvement campaigns, and an
//! Audit Scheduler that drives both on a recurring, priority-ordered, load-aware cadence.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use cli::AppContext;
