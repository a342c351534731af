use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Failure classification vocabulary (§4.6.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    ToolUnavailable,
    ToolExecutionError,
    InvalidParameters,
    RateLimitError,
    PermissionError,
    NetworkError,
    PlanningError,
    GoalParseError,
    UnknownError,
}

/// Recovery strategy vocabulary (§4.6.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    RetryWithDelay,
    AlternativeTool,
    SimplifiedApproach,
    Escalate,
    FallbackManual,
    AbortGracefully,
}

impl FailureType {
    /// The default strategy applied when no success-rate history exists yet for this type.
    #[must_use]
    pub const fn default_strategy(self) -> RecoveryStrategy {
        match self {
            Self::RateLimitError | Self::NetworkError => RecoveryStrategy::RetryWithDelay,
            Self::ToolUnavailable => RecoveryStrategy::AlternativeTool,
            Self::PermissionError => RecoveryStrategy::Escalate,
            Self::ToolExecutionError | Self::InvalidParameters => RecoveryStrategy::SimplifiedApproach,
            Self::PlanningError | Self::GoalParseError => RecoveryStrategy::FallbackManual,
            Self::UnknownError => RecoveryStrategy::AbortGracefully,
        }
    }

    /// Best-effort classification of a lowercase error message into a [`FailureType`].
    #[must_use]
    pub fn classify(error_message: &str, tool_was_resolved: bool) -> Self {
        let msg = error_message.to_lowercase();
        if !tool_was_resolved {
            return Self::ToolUnavailable;
        }
        if msg.contains("rate limit") || msg.contains("429") || msg.contains("too many requests") {
            Self::RateLimitError
        } else if msg.contains("permission") || msg.contains("denied") || msg.contains("forbidden") {
            Self::PermissionError
        } else if msg.contains("network") || msg.contains("connection") || msg.contains("timeout") {
            Self::NetworkError
        } else if msg.contains("invalid parameter") || msg.contains("missing required") {
            Self::InvalidParameters
        } else if msg.contains("plan") && (msg.contains("valid") || msg.contains("json")) {
            Self::PlanningError
        } else if msg.contains("goal") && msg.contains("parse") {
            Self::GoalParseError
        } else if msg.is_empty() {
            Self::UnknownError
        } else {
            Self::ToolExecutionError
        }
    }
}

/// Per-(failure_type, strategy) exponential-moving-average success rate table, with
/// α = 0.3 and a neutral initial rate of 0.5.
#[derive(Default)]
pub struct FailureAnalyzer {
    success_rates: RwLock<HashMap<(FailureType, RecoveryStrategy), f64>>,
}

const ALPHA: f64 = 0.3;
const INITIAL_RATE: f64 = 0.5;

impl FailureAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_table(table: HashMap<(FailureType, RecoveryStrategy), f64>) -> Self {
        Self { success_rates: RwLock::new(table) }
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<(FailureType, RecoveryStrategy), f64> {
        self.success_rates.read().expect("lock poisoned").clone()
    }

    /// Selects the strategy with the highest recorded success rate for `failure_type`; falls
    /// back to [`FailureType::default_strategy`] if no history exists for any strategy.
    #[must_use]
    pub fn select_recovery_strategy(&self, failure_type: FailureType) -> RecoveryStrategy {
        let rates = self.success_rates.read().expect("lock poisoned");
        let best = rates
            .iter()
            .filter(|((ft, _), _)| *ft == failure_type)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some(((_, strategy), _)) => *strategy,
            None => failure_type.default_strategy(),
        }
    }

    /// Updates the EMA success rate for `(failure_type, strategy)` after an attempt.
    pub fn record_recovery_outcome(&self, failure_type: FailureType, strategy: RecoveryStrategy, succeeded: bool) {
        let mut rates = self.success_rates.write().expect("lock poisoned");
        let key = (failure_type, strategy);
        let prior = *rates.get(&key).unwrap_or(&INITIAL_RATE);
        let observed = if succeeded { 1.0 } else { 0.0 };
        rates.insert(key, ALPHA * observed + (1.0 - ALPHA) * prior);
    }

    /// Flattens the table into a JSON-serializable form (tuple keys cannot be JSON object keys).
    #[must_use]
    pub fn to_persisted(&self) -> PersistedEmaTable {
        let rates = self.success_rates.read().expect("lock poisoned");
        PersistedEmaTable {
            entries: rates
                .iter()
                .map(|(&(failure_type, strategy), &success_rate)| EmaEntry { failure_type, strategy, success_rate })
                .collect(),
        }
    }

    /// Merges a previously-persisted table into this analyzer's in-memory state.
    pub fn load_persisted(&self, table: PersistedEmaTable) {
        let mut rates = self.success_rates.write().expect("lock poisoned");
        for entry in table.entries {
            rates.insert((entry.failure_type, entry.strategy), entry.success_rate);
        }
    }
}

/// One flattened row of the EMA success-rate table (§4.6.3, §4.10), suitable for JSON
/// persistence via [`crate::services::persistence::JsonStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmaEntry {
    pub failure_type: FailureType,
    pub strategy: RecoveryStrategy,
    pub success_rate: f64,
}

/// The persisted shape of [`FailureAnalyzer`]'s success-rate table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedEmaTable {
    pub entries: Vec<EmaEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_tool_classifies_as_tool_unavailable() {
        assert_eq!(FailureType::classify("anything", false), FailureType::ToolUnavailable);
    }

    #[test]
    fn rate_limit_message_classifies_correctly() {
        assert_eq!(FailureType::classify("HTTP 429 too many requests", true), FailureType::RateLimitError);
    }

    #[test]
    fn default_strategy_applies_without_history() {
        let analyzer = FailureAnalyzer::new();
        assert_eq!(analyzer.select_recovery_strategy(FailureType::RateLimitError), RecoveryStrategy::RetryWithDelay);
        assert_eq!(analyzer.select_recovery_strategy(FailureType::ToolUnavailable), RecoveryStrategy::AlternativeTool);
        assert_eq!(analyzer.select_recovery_strategy(FailureType::PermissionError), RecoveryStrategy::Escalate);
    }

    #[test]
    fn ema_update_shifts_toward_observed_outcome() {
        let analyzer = FailureAnalyzer::new();
        analyzer.record_recovery_outcome(FailureType::NetworkError, RecoveryStrategy::RetryWithDelay, true);
        let rate = analyzer.snapshot()[&(FailureType::NetworkError, RecoveryStrategy::RetryWithDelay)];
        assert!((rate - (0.3 * 1.0 + 0.7 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn persisted_table_round_trips_through_json() {
        let analyzer = FailureAnalyzer::new();
        analyzer.record_recovery_outcome(FailureType::RateLimitError, RecoveryStrategy::RetryWithDelay, true);
        let persisted = analyzer.to_persisted();
        let json = serde_json::to_string(&persisted).unwrap();
        let roundtripped: PersistedEmaTable = serde_json::from_str(&json).unwrap();

        let restored = FailureAnalyzer::new();
        restored.load_persisted(roundtripped);
        assert_eq!(
            restored.snapshot()[&(FailureType::RateLimitError, RecoveryStrategy::RetryWithDelay)],
            analyzer.snapshot()[&(FailureType::RateLimitError, RecoveryStrategy::RetryWithDelay)]
        );
    }

    #[test]
    fn best_strategy_wins_once_history_exists() {
        let analyzer = FailureAnalyzer::new();
        for _ in 0..5 {
            analyzer.record_recovery_outcome(FailureType::ToolExecutionError, RecoveryStrategy::AlternativeTool, true);
            analyzer.record_recovery_outcome(FailureType::ToolExecutionError, RecoveryStrategy::Escalate, false);
        }
        assert_eq!(analyzer.select_recovery_strategy(FailureType::ToolExecutionError), RecoveryStrategy::AlternativeTool);
    }
}
