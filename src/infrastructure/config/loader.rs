use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::error::ConfigError;
use crate::domain::models::config::Config;

/// Loads and validates [`Config`] from a layered stack, each layer overriding the last:
/// programmatic defaults, `.swarmkernel/config.yaml`, `.swarmkernel/local.yaml`, then
/// `SWARMKERNEL_`-prefixed environment variables (`__` marks nesting, e.g.
/// `SWARMKERNEL_RATE_LIMIT__BURST_SIZE`).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads from the conventional project paths under the current directory.
    pub fn load() -> anyhow::Result<Config> {
        Self::load_from_file(Path::new(".swarmkernel/config.yaml"), Path::new(".swarmkernel/local.yaml"))
    }

    /// Loads from explicit project and local override paths. Both are optional: figment's
    /// `Yaml::file` provider is a no-op when the path does not exist.
    pub fn load_from_file(project_path: &Path, local_path: &Path) -> anyhow::Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project_path))
            .merge(Yaml::file(local_path))
            .merge(Env::prefixed("SWARMKERNEL_").split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Checks the invariants the rest of the crate relies on without re-validating. Returns
    /// the first violation found.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.data_dir.trim().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if config.kernel.max_concurrent_heavy_tasks == 0 {
            return Err(ConfigError::InvalidHeavyTaskBound(config.kernel.max_concurrent_heavy_tasks));
        }
        if config.rate_limit.requests_per_minute <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit.requests_per_minute));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(config.retry.initial_backoff_ms, config.retry.max_backoff_ms));
        }
        match config.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        Ok(())
    }
}
