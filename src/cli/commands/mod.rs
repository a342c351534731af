pub mod agent;
pub mod coord;
pub mod directive;

/// Common English stop-words rejected as agent ids (§6 `agent_create` grammar): these are
/// almost always a sign the caller transposed `kind` and `id`, or meant to start typing a
/// description in the id slot.
const STOP_WORDS: &[&str] =
    &["the", "a", "an", "and", "or", "of", "in", "on", "to", "is", "are", "be", "this", "that", "for", "with", "as", "at", "by", "from", "into", "onto", "but", "nor", "so", "it", "its"];

/// Rejects agent ids that are bare English stop-words, per the `agent_create` grammar.
pub fn validate_agent_id(id: &str) -> Result<(), String> {
    if STOP_WORDS.contains(&id.to_lowercase().as_str()) {
        return Err(format!("'{id}' looks like an English word, not an agent id; pass a concrete identifier (e.g. 'billing-worker-1')"));
    }
    if id.trim().is_empty() {
        return Err("agent id must not be empty".to_string());
    }
    Ok(())
}

/// Splits an `agent_create` `detail` argument into (`description`, `config`) per the grammar:
/// a value starting with `{` or `[` is parsed as a JSON config object/array; anything else is
/// a free-text description with no config.
pub fn parse_agent_detail(detail: Option<&str>) -> (String, Option<serde_json::Value>) {
    let Some(detail) = detail else {
        return (String::new(), None);
    };
    let trimmed = detail.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str(trimmed) {
            Ok(value) => (String::new(), Some(value)),
            Err(_) => (detail.to_string(), None),
        }
    } else {
        (detail.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_word_agent_id_rejected() {
        assert!(validate_agent_id("the").is_err());
        assert!(validate_agent_id("AND").is_err());
    }

    #[test]
    fn concrete_agent_id_accepted() {
        assert!(validate_agent_id("billing-worker-1").is_ok());
    }

    #[test]
    fn json_detail_parsed_as_config() {
        let (description, config) = parse_agent_detail(Some(r#"{"retries": 3}"#));
        assert!(description.is_empty());
        assert_eq!(config.unwrap()["retries"], 3);
    }

    #[test]
    fn array_detail_parsed_as_config() {
        let (description, config) = parse_agent_detail(Some(r#"["a", "b"]"#));
        assert!(description.is_empty());
        assert!(config.unwrap().is_array());
    }

    #[test]
    fn plain_text_detail_treated_as_description() {
        let (description, config) = parse_agent_detail(Some("handles billing reconciliation"));
        assert_eq!(description, "handles billing reconciliation");
        assert!(config.is_none());
    }

    #[test]
    fn malformed_json_falls_back_to_description() {
        let (description, config) = parse_agent_detail(Some("{not valid json"));
        assert_eq!(description, "{not valid json");
        assert!(config.is_none());
    }

    #[test]
    fn absent_detail_is_empty_description() {
        let (description, config) = parse_agent_detail(None);
        assert!(description.is_empty());
        assert!(config.is_none());
    }
}
