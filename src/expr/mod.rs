//! Expression engine
//!
//! A restricted expression language evaluated against the workflow scope
//! (merged inputs and outputs). Expressions power prop values, string
//! interpolation, and conditionals. Documents get property access,
//! indexing, arithmetic, comparisons, logic, template literals, and a
//! fixed builtin allow-list; they do not get ambient code execution.

pub mod ast;
pub mod builtins;
mod eval;
pub mod parser;

pub use eval::{display, truthy, Scope};

use serde_json::Value;

use crate::ast::Expression;
use crate::scan;

/// Evaluate expression source against a scope.
///
/// Never fails: parse errors and evaluation errors both yield `Null`.
pub fn evaluate(src: &str, scope: &Scope) -> Value {
    match parser::parse(src.trim()) {
        Some(expr) => eval::eval(&expr, scope),
        None => Value::Null,
    }
}

/// Evaluate and coerce to a boolean
pub fn evaluate_condition(src: &str, scope: &Scope) -> bool {
    truthy(&evaluate(src, scope))
}

/// Resolve a prop expression: static values pass through unchanged,
/// dynamic ones are evaluated. The executor's single seam for props.
pub fn resolve(expr: &Expression, scope: &Scope) -> Value {
    if expr.is_static {
        Value::String(expr.raw.clone())
    } else {
        evaluate(&expr.raw, scope)
    }
}

/// Substitute `{...}` spans in prose with their evaluated values.
///
/// `{/* ... */}` spans are comments and are removed. A `{` that never
/// closes is kept as literal text. `Null` results render as "".
pub fn interpolate(template: &str, scope: &Scope) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '{' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        // Comment span: removed, not evaluated
        if matches!(chars.get(i + 1), Some('/')) && matches!(chars.get(i + 2), Some('*')) {
            match find_comment_end(&chars, i + 3) {
                Some(end) => i = end,
                None => {
                    out.push('{');
                    i += 1;
                }
            }
            continue;
        }
        match scan::matching_brace(&chars, i) {
            Some(close) => {
                let inner: String = chars[i + 1..close].iter().collect();
                out.push_str(&display(&evaluate(&inner, scope)));
                i = close + 1;
            }
            None => {
                out.push('{');
                i += 1;
            }
        }
    }
    out
}

/// Index just past a `*/}` terminator, scanning from `from`
fn find_comment_end(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars.get(i) == Some(&'*')
            && chars.get(i + 1) == Some(&'/')
            && chars.get(i + 2) == Some(&'}')
        {
            return Some(i + 3);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(pairs: &[(&str, Value)]) -> Scope {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn evaluate_is_fail_soft() {
        let empty = Scope::new();
        assert_eq!(evaluate("undefinedVar.prop", &empty), Value::Null);
        assert_eq!(evaluate("((broken", &empty), Value::Null);
        assert_eq!(evaluate("", &empty), Value::Null);
    }

    #[test]
    fn static_resolution_round_trips() {
        let expr = Expression::literal("hello");
        let scope = scope(&[("hello", json!("shadowed"))]);
        assert_eq!(resolve(&expr, &scope), json!("hello"));
        assert_eq!(resolve(&expr, &Scope::new()), json!("hello"));
    }

    #[test]
    fn dynamic_resolution_evaluates() {
        let expr = Expression::dynamic("n + 1");
        let scope = scope(&[("n", json!(2))]);
        assert_eq!(resolve(&expr, &scope), json!(3.0));
    }

    #[test]
    fn interpolate_substitutes_spans() {
        let scope = scope(&[("topic", json!("cats")), ("n", json!(3))]);
        assert_eq!(
            interpolate("Write {n} facts about {topic}.", &scope),
            "Write 3 facts about cats."
        );
    }

    #[test]
    fn interpolate_handles_nested_braces() {
        let scope = scope(&[("user", json!({"name": "Ada"}))]);
        assert_eq!(
            interpolate("hi {{name: user.name}.name}", &scope),
            "hi Ada"
        );
    }

    #[test]
    fn interpolate_removes_comments() {
        let scope = Scope::new();
        assert_eq!(
            interpolate("before {/* note to self */} after", &scope),
            "before  after"
        );
    }

    #[test]
    fn interpolate_keeps_unclosed_brace_literal() {
        let scope = Scope::new();
        assert_eq!(interpolate("a { b", &scope), "a { b");
    }

    #[test]
    fn interpolate_renders_null_as_empty() {
        let scope = Scope::new();
        assert_eq!(interpolate("x={missing}!", &scope), "x=!");
    }

    #[test]
    fn condition_coerces_truthiness() {
        let scope = scope(&[("items", json!([]))]);
        assert!(!evaluate_condition("items", &scope));
        assert!(evaluate_condition("1 < 2", &scope));
        assert!(!evaluate_condition("garbage !!", &scope));
    }
}
