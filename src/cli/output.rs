use serde::Serialize;

/// A CLI response shape that knows how to render itself both ways. Mirrors the existing
/// `--json` convention: every command produces one `CommandOutput` and a single call to
/// [`output`] decides which rendering to print.
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}
