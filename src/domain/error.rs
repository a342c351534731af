use thiserror::Error;

/// Errors raised by the rate limiter / retry wrapper (C1).
#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("transient error, retry {attempt}/{max_retries}: {message}")]
    Transient { attempt: u32, max_retries: u32, message: String },

    #[error("retry budget exhausted after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("permanent error: {0}")]
    Permanent(String),
}

impl RateLimitError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_) | Self::Exhausted { .. })
    }
}

/// Errors raised by LLM Dispatch (C2).
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("provider '{0}' not registered")]
    UnknownProvider(String),

    #[error("transport or authentication failure: {0}")]
    Transport(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("rate limiter exhausted retry budget")]
    RateLimited(#[from] RateLimitError),

    #[error("requested json_mode but provider returned non-JSON output")]
    NotJson,
}

impl LlmError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited(_))
    }
}

/// Errors raised by the Plan Manager (C5).
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("action '{0}' not found in plan")]
    UnknownAction(String),

    #[error("dependency unmet for action '{0}'")]
    DependencyUnmet(String),

    #[error("plan execution deadline exceeded")]
    Timeout,
}

/// Errors raised by the BDI Executor (C6), including plan generation.
#[derive(Error, Debug)]
pub enum BdiError {
    #[error("plan validation exhausted repair budget: {0}")]
    PlanValidation(String),

    #[error("tool or internal handler unavailable for action type '{0}'")]
    ToolUnavailable(String),

    #[error("tool execution failed: {0}")]
    ToolError(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Errors raised by the Kernel (C7) at its external boundary.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no handler registered for interaction kind '{0}'")]
    NoHandler(String),

    #[error("unclassified internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading or validating [`crate::domain::models::config::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid max_concurrent_heavy_tasks: {0}, must be at least 1")]
    InvalidHeavyTaskBound(usize),

    #[error("invalid requests_per_minute: {0}, must be positive")]
    InvalidRateLimit(f64),

    #[error("invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("data_dir cannot be empty")]
    EmptyDataDir,
}

/// Crate-wide aggregate error for call sites that want a single type.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Bdi(#[from] BdiError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Maps an error kind to the fixed vocabulary of §7 for CLI / Interaction-facing responses.
#[must_use]
pub fn error_kind_label(err: &CoreError) -> &'static str {
    match err {
        CoreError::RateLimit(_) => "RATE_LIMITED",
        CoreError::Llm(e) => match e {
            LlmError::RateLimited(_) => "RATE_LIMITED",
            LlmError::NotJson | LlmError::ModelNotFound(_) | LlmError::UnknownProvider(_) | LlmError::Transport(_) => "LLM_ERROR",
        },
        CoreError::Plan(e) => match e {
            PlanError::DependencyUnmet(_) => "DEPENDENCY_UNMET",
            PlanError::Timeout => "TIMEOUT",
            PlanError::UnknownAction(_) => "INTERNAL_ERROR",
        },
        CoreError::Bdi(e) => match e {
            BdiError::PlanValidation(_) => "PLAN_VALIDATION_ERROR",
            BdiError::ToolUnavailable(_) => "TOOL_UNAVAILABLE",
            BdiError::ToolError(_) => "TOOL_ERROR",
            BdiError::PermissionDenied(_) => "PERMISSION_DENIED",
            BdiError::Llm(_) | BdiError::Plan(_) => "INTERNAL_ERROR",
        },
        CoreError::Kernel(e) => match e {
            KernelError::InvalidInput(_) => "INVALID_INPUT",
            KernelError::NoHandler(_) | KernelError::Internal(_) => "INTERNAL_ERROR",
        },
        CoreError::Config(_) => "INVALID_INPUT",
    }
}
