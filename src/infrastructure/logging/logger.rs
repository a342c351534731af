use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::models::config::LoggingConfig;
use crate::infrastructure::logging::secret_scrubbing::SecretScrubbingLayer;

fn parse_log_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Holds the worker guard for non-blocking file output, if any; dropping it flushes pending
/// log lines. Grounded on the source project's rolling-file logger initialization.
pub struct LoggerImpl {
    _file_guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Initializes the global `tracing` subscriber from `config`: stdout only, JSON or pretty
    /// formatted per `config.format`, filtered by `config.level` (with a `RUST_LOG` override).
    pub fn init(config: &LoggingConfig) -> anyhow::Result<Self> {
        Self::init_with_file(config, None)
    }

    /// As [`Self::init`], but additionally mirrors output to a daily-rolling file under
    /// `log_dir` via `tracing-appender`'s non-blocking writer.
    pub fn init_with_file(config: &LoggingConfig, log_dir: Option<&Path>) -> anyhow::Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(parse_log_level(&config.level)));
        let json = config.format.eq_ignore_ascii_case("json");

        let registry = tracing_subscriber::registry().with(filter).with(SecretScrubbingLayer::new());

        if let Some(dir) = log_dir {
            let file_appender = tracing_appender::rolling::daily(dir, "swarmkernel.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            if json {
                registry.with(fmt::layer().json().with_writer(non_blocking).with_ansi(false)).try_init()?;
            } else {
                registry.with(fmt::layer().with_writer(non_blocking).with_ansi(false)).try_init()?;
            }
            Ok(Self { _file_guard: Some(guard) })
        } else if json {
            registry.with(fmt::layer().json()).try_init()?;
            Ok(Self { _file_guard: None })
        } else {
            registry.with(fmt::layer()).try_init()?;
            Ok(Self { _file_guard: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_defaults_to_info() {
        assert_eq!(parse_log_level("bogus"), "info");
        assert_eq!(parse_log_level("DEBUG"), "debug");
    }
}
