//! Human-in-the-loop input boundary
//!
//! Prompt/Select/Confirm nodes suspend by awaiting an [`InputResolver`].
//! An interactive front end wires one that asks the user; headless runs
//! wire none, and the executor falls back to declared defaults (or fails
//! when a required value has neither).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::expr::display;

/// A request for one externally supplied value
#[derive(Debug, Clone, PartialEq)]
pub enum InputRequest {
    /// Free-text prompt
    Text {
        name: String,
        message: String,
        default: Option<String>,
        /// Coerce the response to a number
        numeric: bool,
    },
    /// Choice from a normalized option list
    Select {
        name: String,
        message: String,
        options: Vec<SelectOption>,
        default: Option<Value>,
    },
    /// Yes/no gate
    Confirm {
        name: String,
        message: String,
        default: Option<bool>,
    },
}

impl InputRequest {
    pub fn name(&self) -> &str {
        match self {
            InputRequest::Text { name, .. }
            | InputRequest::Select { name, .. }
            | InputRequest::Confirm { name, .. } => name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            InputRequest::Text { message, .. }
            | InputRequest::Select { message, .. }
            | InputRequest::Confirm { message, .. } => message,
        }
    }
}

/// One presentable choice
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

/// How interactive and headless front ends share one executor: the
/// executor awaits `resolve`, whatever is on the other side
#[async_trait]
pub trait InputResolver: Send + Sync {
    async fn resolve(&self, request: InputRequest) -> Result<Value>;
}

/// Normalize a Select's options value into `{value, label}` pairs.
///
/// Accepts an array of plain strings, or an array of objects keyed by
/// `label_key`/`value_key`. Anything else normalizes to an empty list.
pub fn normalize_options(options: &Value, label_key: &str, value_key: &str) -> Vec<SelectOption> {
    let Value::Array(items) = options else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => {
                let value = map.get(value_key).cloned().unwrap_or_else(|| item.clone());
                let label = map
                    .get(label_key)
                    .map(display)
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| display(&value));
                SelectOption { value, label }
            }
            other => SelectOption { value: other.clone(), label: display(other) },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_options_normalize_to_identical_pairs() {
        let options = normalize_options(&json!(["a", "b"]), "label", "value");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].value, json!("a"));
        assert_eq!(options[0].label, "a");
    }

    #[test]
    fn object_options_use_configured_keys() {
        let raw = json!([
            {"id": 1, "title": "First"},
            {"id": 2, "title": "Second"}
        ]);
        let options = normalize_options(&raw, "title", "id");
        assert_eq!(options[0].value, json!(1));
        assert_eq!(options[0].label, "First");
        assert_eq!(options[1].label, "Second");
    }

    #[test]
    fn non_array_normalizes_empty() {
        assert!(normalize_options(&json!("nope"), "label", "value").is_empty());
        assert!(normalize_options(&Value::Null, "label", "value").is_empty());
    }

    #[test]
    fn request_accessors() {
        let request = InputRequest::Confirm {
            name: "go".into(),
            message: "Proceed?".into(),
            default: Some(true),
        };
        assert_eq!(request.name(), "go");
        assert_eq!(request.message(), "Proceed?");
    }
}
