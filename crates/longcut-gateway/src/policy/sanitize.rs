//! Request body sanitization.
//!
//! Object keys that could reach a prototype chain downstream are dropped at
//! every depth; strings lose `<script>` blocks, then any remaining markup, and
//! are trimmed. Arrays keep their shape.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("script regex must compile"))
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup regex must compile"))
}

pub fn sanitize_str(s: &str) -> String {
    let without_scripts = script_re().replace_all(s, "");
    markup_re().replace_all(&without_scripts, "").trim().to_string()
}

pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !FORBIDDEN_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k, sanitize_value(v)))
                .collect(),
        ),
        other => other,
    }
}
