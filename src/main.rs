use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use swarmkernel::cli::{self, AppContext, Cli};
use swarmkernel::domain::models::config::Config;
use swarmkernel::infrastructure::config::ConfigLoader;
use swarmkernel::infrastructure::logging::LoggerImpl;
use swarmkernel::services::audit_scheduler::AuditScheduler;
use swarmkernel::services::belief_store::BeliefStore;
use swarmkernel::services::kernel::Kernel;
use swarmkernel::services::llm_dispatch::LlmDispatch;
use swarmkernel::services::persistence::JsonStore;
use swarmkernel::services::plan_manager::PlanManager;
use swarmkernel::services::rate_limiter::TokenBucketRateLimiter;
use swarmkernel::services::retry::RetryPolicy;
use swarmkernel::services::strategic_evolution::StrategicEvolution;

fn load_config() -> Config {
    match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("warning: failed to load config ({err}), falling back to defaults");
            Config::default()
        }
    }
}

async fn build_context(config: &Config) -> AppContext {
    let store = Arc::new(JsonStore::new(config.data_dir.clone()));
    let limiter = TokenBucketRateLimiter::new(config.rate_limit.requests_per_minute);
    let retry = RetryPolicy::new(config.retry.max_retries, config.retry.initial_backoff_ms, config.retry.max_backoff_ms);
    let llm = Arc::new(LlmDispatch::new(limiter, retry));

    let kernel = Arc::new(Kernel::new(llm.clone(), config.kernel.default_model.clone(), config.kernel.max_concurrent_heavy_tasks, store.clone()));
    kernel.load_persisted().await;

    let strategic = Arc::new(StrategicEvolution::new(
        "strategic-evolution",
        Arc::new(BeliefStore::new()),
        Arc::new(PlanManager::new()),
        llm,
        config.kernel.default_model.clone(),
        kernel.clone(),
        store.clone(),
    ));
    kernel.set_campaign_hook(strategic.clone()).await;

    let audit_scheduler = Arc::new(AuditScheduler::new(strategic.clone(), kernel.clone(), store, config.audit.check_interval_secs));
    audit_scheduler.load_persisted().await;

    AppContext { kernel, strategic, audit_scheduler }
}

#[tokio::main]
async fn main() {
    let config = load_config();
    let _logger = LoggerImpl::init(&config.logging).expect("failed to initialize structured logging");

    info!(data_dir = %config.data_dir, "swarmkernel booting");
    let ctx = build_context(&config).await;

    let cli = Cli::parse();
    let exit_code = cli::dispatch(cli, &ctx).await;
    if exit_code != 0 {
        warn!(exit_code, "command reported failure");
    } else {
        info!("command completed");
    }
    std::process::exit(exit_code);
}
