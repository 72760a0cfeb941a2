//! Tree-walking evaluator
//!
//! Evaluation is fail-soft end to end: missing bindings, type mismatches,
//! and division by zero all produce `Null` rather than an error. Documents
//! routinely reference outputs that have not been produced yet (skeleton
//! rendering), so an empty interpolation beats an aborted run.

use serde_json::{Map, Value};

use super::ast::{BinaryOp, Expr, TemplatePart, UnaryOp};
use super::builtins;

/// The expression environment: merged inputs and outputs
pub type Scope = Map<String, Value>;

pub fn eval(expr: &Expr, scope: &Scope) -> Value {
    match expr {
        Expr::Null => Value::Null,
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Number(n) => number(*n),
        Expr::Str(s) => Value::String(s.clone()),
        Expr::Template(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Lit(lit) => out.push_str(lit),
                    TemplatePart::Hole(inner) => out.push_str(&display(&eval(inner, scope))),
                }
            }
            Value::String(out)
        }
        Expr::Array(elements) => {
            Value::Array(elements.iter().map(|e| eval(e, scope)).collect())
        }
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), eval(value, scope));
            }
            Value::Object(map)
        }
        Expr::Ident(name) => scope.get(name).cloned().unwrap_or(Value::Null),
        Expr::Member { object, property } => {
            let object = eval(object, scope);
            match &object {
                Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Null),
                Value::Array(a) if property == "length" => number(a.len() as f64),
                Value::String(s) if property == "length" => number(s.chars().count() as f64),
                _ => Value::Null,
            }
        }
        Expr::Index { object, index } => {
            let object = eval(object, scope);
            let index = eval(index, scope);
            match (&object, &index) {
                (Value::Array(a), Value::Number(n)) => n
                    .as_f64()
                    .filter(|f| *f >= 0.0)
                    .and_then(|f| a.get(f as usize))
                    .cloned()
                    .unwrap_or(Value::Null),
                (Value::Object(map), Value::String(key)) => {
                    map.get(key).cloned().unwrap_or(Value::Null)
                }
                _ => Value::Null,
            }
        }
        Expr::Call { function, args } => {
            let args: Vec<Value> = args.iter().map(|a| eval(a, scope)).collect();
            builtins::call(function, &args)
        }
        Expr::Unary { op, operand } => {
            let operand = eval(operand, scope);
            match op {
                UnaryOp::Not => Value::Bool(!truthy(&operand)),
                UnaryOp::Neg => match operand.as_f64() {
                    Some(n) => number(-n),
                    None => Value::Null,
                },
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, scope),
        Expr::Ternary { cond, then, otherwise } => {
            if truthy(&eval(cond, scope)) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &Scope) -> Value {
    // Short-circuit forms return operand values, enabling `a || "fallback"`
    match op {
        BinaryOp::And => {
            let l = eval(left, scope);
            return if truthy(&l) { eval(right, scope) } else { l };
        }
        BinaryOp::Or => {
            let l = eval(left, scope);
            return if truthy(&l) { l } else { eval(right, scope) };
        }
        _ => {}
    }

    let l = eval(left, scope);
    let r = eval(right, scope);
    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::Number(_), Value::Number(_)) => {
                arithmetic(&l, &r, |a, b| Some(a + b))
            }
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", display(&l), display(&r)))
            }
            _ => Value::Null,
        },
        BinaryOp::Sub => arithmetic(&l, &r, |a, b| Some(a - b)),
        BinaryOp::Mul => arithmetic(&l, &r, |a, b| Some(a * b)),
        BinaryOp::Div => arithmetic(&l, &r, |a, b| (b != 0.0).then(|| a / b)),
        BinaryOp::Mod => arithmetic(&l, &r, |a, b| (b != 0.0).then(|| a % b)),
        BinaryOp::Eq => Value::Bool(loose_eq(&l, &r)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(&l, &r)),
        BinaryOp::Lt => compare(&l, &r, |o| o == std::cmp::Ordering::Less),
        BinaryOp::LtEq => compare(&l, &r, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(&l, &r, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::GtEq => compare(&l, &r, |o| o != std::cmp::Ordering::Less),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn arithmetic(l: &Value, r: &Value, f: impl Fn(f64, f64) -> Option<f64>) -> Value {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => f(a, b).map(number).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn compare(l: &Value, r: &Value, f: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (l, r) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.map(|o| Value::Bool(f(o))).unwrap_or(Value::Null)
}

/// Equality with numeric coercion (1 == 1.0); everything else structural
fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

/// Truthiness coercion: false, null, 0, "", [], {} are falsy
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Stringification used by interpolation and template holes.
/// `Null` becomes the empty string; compounds render as compact JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use serde_json::json;

    fn run(src: &str, scope: &Scope) -> Value {
        parse(src).map(|e| eval(&e, scope)).unwrap_or(Value::Null)
    }

    fn scope(pairs: &[(&str, Value)]) -> Scope {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn ident_lookup_and_member_access() {
        let scope = scope(&[("user", json!({"name": "Ada", "tags": ["x", "y"]}))]);
        assert_eq!(run("user.name", &scope), json!("Ada"));
        assert_eq!(run("user.tags[1]", &scope), json!("y"));
        assert_eq!(run("user.tags.length", &scope), json!(2.0));
    }

    #[test]
    fn missing_binding_is_null_not_error() {
        let empty = Scope::new();
        assert_eq!(run("missing", &empty), Value::Null);
        assert_eq!(run("missing.deeply.nested", &empty), Value::Null);
        assert_eq!(run("missing[3]", &empty), Value::Null);
    }

    #[test]
    fn arithmetic_and_concat() {
        let scope = scope(&[("n", json!(4))]);
        assert_eq!(run("n * 2 + 1", &scope), json!(9.0));
        assert_eq!(run("'v' + n", &scope), json!("v4"));
        assert_eq!(run("n / 0", &scope), Value::Null);
    }

    #[test]
    fn comparisons_and_equality() {
        let scope = scope(&[("a", json!(3)), ("b", json!("hi"))]);
        assert_eq!(run("a >= 3", &scope), json!(true));
        assert_eq!(run("a == 3.0", &scope), json!(true));
        assert_eq!(run("b == 'hi'", &scope), json!(true));
        assert_eq!(run("a < b", &scope), Value::Null);
    }

    #[test]
    fn logic_returns_operand_values() {
        let scope = scope(&[("name", json!(""))]);
        assert_eq!(run("name || 'anonymous'", &scope), json!("anonymous"));
        assert_eq!(run("'a' && 'b'", &scope), json!("b"));
    }

    #[test]
    fn ternary_selects_branch() {
        let scope = scope(&[("ok", json!(false))]);
        assert_eq!(run("ok ? 'yes' : 'no'", &scope), json!("no"));
    }

    #[test]
    fn template_literal_interpolates() {
        let scope = scope(&[("name", json!("world")), ("n", json!(2))]);
        assert_eq!(run("`hi ${name} x${n * 2}`", &scope), json!("hi world x4"));
    }

    #[test]
    fn truthiness_table() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(!truthy(&json!({})));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!([0])));
    }

    #[test]
    fn display_formats_integers_without_fraction() {
        assert_eq!(display(&json!(4.0)), "4");
        assert_eq!(display(&json!(4.5)), "4.5");
        assert_eq!(display(&Value::Null), "");
        assert_eq!(display(&json!([1, "a"])), "[1,\"a\"]");
    }
}
