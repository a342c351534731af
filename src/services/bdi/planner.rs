use std::collections::HashMap;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::error::{BdiError, LlmError};
use crate::domain::models::action::Action;
use crate::services::llm_dispatch::{GenerateOptions, LlmDispatch};

/// One entry of the action manifest offered to the planning LLM: an internal action or a
/// loaded tool, described uniformly.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub action_type: String,
    pub description: String,
    pub required_params: Vec<String>,
}

/// Extracts the first JSON array or object from free-form LLM output: tries a fenced code
/// block first, then brace/bracket matching, then a strict whole-string parse.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(fenced) = extract_fenced_block(text) {
        if let Ok(v) = serde_json::from_str(&fenced) {
            return Some(v);
        }
    }
    if let Some(matched) = extract_balanced(text) {
        if let Ok(v) = serde_json::from_str(&matched) {
            return Some(v);
        }
    }
    serde_json::from_str(text.trim()).ok()
}

fn extract_fenced_block(text: &str) -> Option<String> {
    let start_marker = text.find("```")?;
    let after_marker = &text[start_marker + 3..];
    let after_marker = after_marker.strip_prefix("json").unwrap_or(after_marker);
    let end = after_marker.find("```")?;
    Some(after_marker[..end].trim().to_string())
}

fn extract_balanced(text: &str) -> Option<String> {
    let open_candidates = ['[', '{'];
    let start = text.find(open_candidates.as_slice())?;
    let open_char = text[start..].chars().next()?;
    let close_char = if open_char == '[' { ']' } else { '}' };

    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        if ch == open_char {
            depth += 1;
        } else if ch == close_char {
            depth -= 1;
            if depth == 0 {
                return Some(text[start..start + offset + ch.len_utf8()].to_string());
            }
        }
    }
    None
}

/// Structural validation against the action manifest: must be a JSON array; each element a
/// map with a known `type`; every required parameter for that type present in `params`.
fn validate_plan_json(value: &Value, manifest: &HashMap<String, Vec<String>>) -> Result<Vec<Action>, String> {
    let Value::Array(items) = value else {
        return Err("expected a JSON array of actions".to_string());
    };

    let mut actions = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            return Err(format!("action at index {idx} is not an object"));
        };
        let action_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("action at index {idx} missing string 'type'"))?
            .to_uppercase();
        let Some(required) = manifest.get(&action_type) else {
            return Err(format!("action type '{action_type}' at index {idx} is not in the action manifest"));
        };

        let params = obj
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for req in required {
            if !params.contains_key(req) {
                return Err(format!("action '{action_type}' at index {idx} missing required param '{req}'"));
            }
        }

        let mut action = Action::new(action_type, params.into_iter().collect());
        if let Some(desc) = obj.get("description").and_then(Value::as_str) {
            action.description = Some(desc.to_string());
        }
        actions.push(action);
    }
    Ok(actions)
}

/// Deterministic placeholder-path correction table, keyed by logical component name (§4.6.1,
/// §9). Applied after validation, before the plan is committed.
#[must_use]
pub fn apply_path_corrections(mut actions: Vec<Action>, corrections: &HashMap<String, String>) -> Vec<Action> {
    for action in &mut actions {
        for value in action.params.values_mut() {
            if let Value::String(s) = value {
                if let Some(stripped) = s.strip_prefix("path/to/") {
                    if let Some(resolved) = corrections.get(stripped) {
                        *s = resolved.clone();
                    }
                } else if let Some(resolved) = corrections.get(s.as_str()) {
                    *s = resolved.clone();
                }
            }
        }
    }
    actions
}

fn build_prompt(goal_description: &str, manifest: &[ActionSpec], context: &str, prior_error: Option<&str>) -> String {
    let actions_desc: String = manifest
        .iter()
        .map(|spec| format!("- {} (required params: {}): {}", spec.action_type, spec.required_params.join(", "), spec.description))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "Goal: {goal_description}\n\nContext:\n{context}\n\nAvailable actions:\n{actions_desc}\n\n\
Respond with ONLY a JSON array of objects shaped like:\n\
[{{\"type\": \"NO_OP\", \"params\": {{}}}}]\n"
    );
    if let Some(err) = prior_error {
        prompt.push_str(&format!("\nYour previous response was invalid: {err}\nEmit corrected JSON only.\n"));
    }
    prompt
}

/// Generates a plan's action list via the LLM with a validation-repair loop. Attempts at
/// most `1 + max_repair_attempts` times total; on final failure returns
/// `BdiError::PlanValidation`.
#[instrument(skip(llm, manifest, path_corrections))]
pub async fn generate_plan_actions(
    llm: &LlmDispatch,
    model: &str,
    goal_description: &str,
    context: &str,
    manifest: &[ActionSpec],
    path_corrections: &HashMap<String, String>,
    max_repair_attempts: u32,
) -> Result<Vec<Action>, BdiError> {
    let required_by_type: HashMap<String, Vec<String>> =
        manifest.iter().map(|s| (s.action_type.clone(), s.required_params.clone())).collect();

    let mut prior_error: Option<String> = None;
    let total_attempts = 1 + max_repair_attempts;

    for attempt in 1..=total_attempts {
        let prompt = build_prompt(goal_description, manifest, context, prior_error.as_deref());
        let opts = GenerateOptions { json_mode: true, temperature: Some(0.0), ..Default::default() };

        let raw = llm.generate_text(&prompt, model, opts).await.map_err(BdiError::from)?;

        let Some(parsed) = extract_json(&raw) else {
            warn!(attempt, "plan generation: could not extract JSON from LLM output");
            prior_error = Some("could not locate a JSON array in the response".to_string());
            continue;
        };

        match validate_plan_json(&parsed, &required_by_type) {
            Ok(actions) => return Ok(apply_path_corrections(actions, path_corrections)),
            Err(reason) => {
                warn!(attempt, %reason, "plan generation: validation failed");
                prior_error = Some(reason);
            }
        }
    }

    Err(BdiError::PlanValidation(prior_error.unwrap_or_else(|| "unknown validation failure".to_string())))
}

impl From<LlmError> for BdiError {
    fn from(value: LlmError) -> Self {
        Self::Llm(value)
    }
}
