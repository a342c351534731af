use serde::{Deserialize, Serialize};

/// Root configuration, assembled by [`crate::infrastructure::config::ConfigLoader`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: String,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub bdi: BdiConfig,
    pub kernel: KernelConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: ".swarmkernel".to_string(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            bdi: BdiConfig::default(),
            kernel: KernelConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: f64,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_minute: 60.0, burst_size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff_ms: 500, max_backoff_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BdiConfig {
    pub max_cycles: u32,
    pub max_repair_attempts: u32,
    pub workspace_root: String,
}

impl Default for BdiConfig {
    fn default() -> Self {
        Self { max_cycles: 25, max_repair_attempts: 2, workspace_root: ".".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    pub max_concurrent_heavy_tasks: usize,
    pub default_model: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { max_concurrent_heavy_tasks: 3, default_model: "mock-default".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub check_interval_secs: u64,
    pub max_cpu_percent: f64,
    pub max_memory_percent: f64,
    pub max_active_improvements: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            max_cpu_percent: 85.0,
            max_memory_percent: 85.0,
            max_active_improvements: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}
