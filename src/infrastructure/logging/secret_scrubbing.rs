use regex::Regex;
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Scrubs common secret shapes out of log message text before it is formatted: provider API
/// keys, bearer tokens, and `key=value`-style password/token fields.
///
/// Full interception of every event's formatted output would require a custom `Layer`/visitor
/// pair wired ahead of the formatting layer. That integration is not done here; `scrub_message`
/// is the primitive other call sites (notably `LoggerImpl`) apply directly to message text
/// before it is logged.
pub struct SecretScrubbingLayer {
    api_key_pattern: Regex,
    bearer_pattern: Regex,
    token_pattern: Regex,
    password_pattern: Regex,
}

impl Default for SecretScrubbingLayer {
    fn default() -> Self {
        Self {
            api_key_pattern: Regex::new(r"(sk-ant-[A-Za-z0-9_-]{20,}|sk-[A-Za-z0-9]{20,})").expect("valid regex"),
            bearer_pattern: Regex::new(r"(?i)bearer\s+[A-Za-z0-9._-]{10,}").expect("valid regex"),
            token_pattern: Regex::new(r#"(?i)(token|api_key|apikey)\s*[=:]\s*['"]?[A-Za-z0-9._-]{8,}['"]?"#).expect("valid regex"),
            password_pattern: Regex::new(r#"(?i)password\s*[=:]\s*['"]?\S+['"]?"#).expect("valid regex"),
        }
    }
}

impl SecretScrubbingLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every recognized secret shape in `message` with `[REDACTED]`.
    #[must_use]
    pub fn scrub_message(&self, message: &str) -> String {
        let scrubbed = self.api_key_pattern.replace_all(message, "[REDACTED]");
        let scrubbed = self.bearer_pattern.replace_all(&scrubbed, "Bearer [REDACTED]");
        let scrubbed = self.token_pattern.replace_all(&scrubbed, "$1=[REDACTED]");
        let scrubbed = self.password_pattern.replace_all(&scrubbed, "password=[REDACTED]");
        scrubbed.into_owned()
    }
}

impl<S: Subscriber> Layer<S> for SecretScrubbingLayer {
    fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_anthropic_api_key() {
        let layer = SecretScrubbingLayer::new();
        let msg = "using key sk-ant-REDACTED for request";
        assert!(!layer.scrub_message(msg).contains("sk-ant-"));
    }

    #[test]
    fn scrubs_bearer_token() {
        let layer = SecretScrubbingLayer::new();
        let msg = "Authorization: Bearer abc123def456ghi789";
        assert!(!layer.scrub_message(msg).contains("abc123def456ghi789"));
    }

    #[test]
    fn scrubs_token_field() {
        let layer = SecretScrubbingLayer::new();
        let msg = r#"config: api_key="supersecretvalue123""#;
        assert!(!layer.scrub_message(msg).contains("supersecretvalue123"));
    }

    #[test]
    fn scrubs_password_field() {
        let layer = SecretScrubbingLayer::new();
        let msg = "password=hunter2bunter3";
        assert_eq!(layer.scrub_message(msg), "password=[REDACTED]");
    }

    #[test]
    fn leaves_ordinary_messages_untouched() {
        let layer = SecretScrubbingLayer::new();
        let msg = "kernel started with 3 agents registered";
        assert_eq!(layer.scrub_message(msg), msg);
    }

    #[test]
    fn scrubs_multiple_secrets_in_one_message() {
        let layer = SecretScrubbingLayer::new();
        let msg = "key sk-ant-REDACTED and password=hunter2";
        let scrubbed = layer.scrub_message(msg);
        assert!(!scrubbed.contains("sk-ant-"));
        assert!(!scrubbed.contains("hunter2"));
    }
}
