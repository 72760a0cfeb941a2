//! Workflow run context
//!
//! Three pieces of state scoped to one execution: `inputs` (frozen after
//! input resolution), `outputs` (append-only, keyed by node name), and the
//! context stack (the ordered narrative every later LLM call sees).
//!
//! The stack is append-only during forward execution; loops snapshot its
//! length before iterating and truncate back to the snapshot, which is why
//! sibling iterations are blind to each other's generations.

use serde_json::{Map, Value};

use crate::expr::Scope;

/// Separator used when joining the stack into a prompt
const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    inputs: Map<String, Value>,
    outputs: Map<String, Value>,
    stack: Vec<String>,
}

impl WorkflowContext {
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self { inputs, outputs: Map::new(), stack: Vec::new() }
    }

    /// The expression environment: inputs merged with outputs,
    /// outputs winning on name collisions
    pub fn scope(&self) -> Scope {
        let mut scope = self.inputs.clone();
        for (key, value) in &self.outputs {
            scope.insert(key.clone(), value.clone());
        }
        scope
    }

    /// Push a narrative entry visible to every later LLM call
    pub fn push_context(&mut self, entry: impl Into<String>) {
        self.stack.push(entry.into());
    }

    /// The full prompt a generation at this point would see
    pub fn joined_context(&self) -> String {
        self.stack.join(CONTEXT_SEPARATOR)
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Restore the stack to a previously observed length
    pub fn truncate_stack(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    pub fn set_output(&mut self, name: impl Into<String>, value: Value) {
        self.outputs.insert(name.into(), value);
    }

    pub fn get_output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    pub fn remove_output(&mut self, name: &str) -> Option<Value> {
        self.outputs.remove(name)
    }

    pub fn outputs(&self) -> &Map<String, Value> {
        &self.outputs
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    /// Final result mapping: inputs and outputs merged, optionally
    /// filtered to an output allow-list (missing keys silently omitted)
    pub fn into_result(self, allow_list: Option<&[String]>) -> Map<String, Value> {
        let mut merged = self.inputs;
        for (key, value) in self.outputs {
            merged.insert(key, value);
        }
        match allow_list {
            Some(keys) => {
                let mut filtered = Map::new();
                for key in keys {
                    if let Some(value) = merged.get(key) {
                        filtered.insert(key.clone(), value.clone());
                    }
                }
                filtered
            }
            None => merged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn scope_merges_outputs_over_inputs() {
        let mut ctx = WorkflowContext::new(inputs(&[("x", json!("in"))]));
        ctx.set_output("x", json!("out"));
        ctx.set_output("y", json!(1));

        let scope = ctx.scope();
        assert_eq!(scope["x"], json!("out"));
        assert_eq!(scope["y"], json!(1));
    }

    #[test]
    fn stack_snapshot_and_restore() {
        let mut ctx = WorkflowContext::new(Map::new());
        ctx.push_context("one");
        let snapshot = ctx.stack_len();
        ctx.push_context("two");
        ctx.push_context("three");
        ctx.truncate_stack(snapshot);
        assert_eq!(ctx.joined_context(), "one");
    }

    #[test]
    fn joined_context_uses_blank_line_separator() {
        let mut ctx = WorkflowContext::new(Map::new());
        ctx.push_context("a");
        ctx.push_context("b");
        assert_eq!(ctx.joined_context(), "a\n\nb");
    }

    #[test]
    fn result_filters_by_allow_list() {
        let mut ctx = WorkflowContext::new(inputs(&[("topic", json!("cats"))]));
        ctx.set_output("summary", json!("text"));
        ctx.set_output("scratch", json!("x"));

        let allow = vec!["summary".to_string(), "never_produced".to_string()];
        let result = ctx.into_result(Some(&allow));
        assert_eq!(result.len(), 1);
        assert_eq!(result["summary"], json!("text"));
    }

    #[test]
    fn result_without_allow_list_merges_everything() {
        let mut ctx = WorkflowContext::new(inputs(&[("topic", json!("cats"))]));
        ctx.set_output("summary", json!("text"));
        let result = ctx.into_result(None);
        assert_eq!(result.len(), 2);
    }
}
