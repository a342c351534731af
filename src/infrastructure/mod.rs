//! Infrastructure layer: configuration loading and logging setup. Kept separate from
//! `domain`/`services` so the core orchestration logic never depends on how it is configured
//! or where its logs end up.

pub mod config;
pub mod logging;
