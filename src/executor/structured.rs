//! Structured output support
//!
//! Builds the JSON schema sent with a Structured node's prompt, and
//! recovers a value from whatever text the model sends back. Malformed model output is an expected condition: recovery
//! degrades through fence-stripping and balanced-brace extraction down to
//! a sentinel object, never a hard failure.

use serde_json::{json, Map, Value};

use crate::ast::{FieldDef, ValueKind};

/// JSON schema for the field tree (an object at the top level)
pub fn field_schema(fields: &[FieldDef]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), one_field_schema(field));
        required.push(Value::String(field.name.clone()));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn one_field_schema(field: &FieldDef) -> Value {
    let mut schema = match field.value_kind().unwrap_or(ValueKind::String) {
        ValueKind::String => json!({"type": "string"}),
        ValueKind::Number => json!({"type": "number"}),
        ValueKind::Boolean => json!({"type": "boolean"}),
        ValueKind::List => {
            let items = if field.children.is_empty() {
                json!({"type": "string"})
            } else {
                field_schema(&field.children)
            };
            json!({"type": "array", "items": items})
        }
        ValueKind::Object => field_schema(&field.children),
    };
    if !field.description.is_empty() {
        schema["description"] = Value::String(field.description.clone());
    }
    schema
}

/// Natural-language field list included ahead of the schema
pub fn field_summary(fields: &[FieldDef]) -> String {
    let mut lines = Vec::new();
    summarize(fields, 0, &mut lines);
    lines.join("\n")
}

fn summarize(fields: &[FieldDef], depth: usize, lines: &mut Vec<String>) {
    for field in fields {
        let indent = "  ".repeat(depth);
        let description = if field.description.is_empty() {
            String::new()
        } else {
            format!(": {}", field.description)
        };
        lines.push(format!("{indent}- {} ({}){description}", field.name, field.kind));
        summarize(&field.children, depth + 1, lines);
    }
}

/// Best-effort JSON recovery from model output.
///
/// Tries, in order: the text as-is after fence stripping, then the
/// longest balanced `{...}` region found anywhere in the text.
pub fn recover_json(text: &str) -> Option<Value> {
    let stripped = strip_fences(text.trim());
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Some(value);
    }
    largest_object(stripped).or_else(|| largest_object(text))
}

/// Sentinel carrying the raw text when recovery fails entirely
pub fn sentinel(raw: &str) -> Value {
    json!({ "raw": raw, "error": true })
}

/// Remove a wrapping ``` fence (with optional language tag)
fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").map(str::trim_end).unwrap_or(text)
}

/// Longest balanced top-level `{...}` region that parses as JSON
fn largest_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut best: Option<Value> = None;
    let mut best_len = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = balanced_end(bytes, i) {
                let candidate = &text[i..=end];
                if candidate.len() > best_len {
                    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                        best_len = candidate.len();
                        best = Some(value);
                    }
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    best
}

/// Index of the `}` balancing `bytes[start]`, string-aware
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                i += 1;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}
