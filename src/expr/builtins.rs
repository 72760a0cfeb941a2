//! Allow-listed builtin functions
//!
//! These are the only functions callable from document expressions. They
//! are resolved by name at call sites only and never appear as scope
//! values, so they cannot shadow or be shadowed by workflow bindings.

use serde_json::{json, Value};

use super::eval::{display, truthy};

/// Names the validator and docs can enumerate
pub const NAMES: &[&str] = &[
    "stringify",
    "parse",
    "length",
    "keys",
    "join",
    "split",
    "contains",
    "upper",
    "lower",
    "trim",
    "replace",
    "abs",
    "floor",
    "ceil",
    "round",
    "min",
    "max",
    "string",
    "number",
    "boolean",
    "isFinite",
    "isNaN",
    "encodeUriComponent",
    "now",
];

/// Dispatch a builtin by name; unknown names and bad arguments yield `Null`
pub fn call(name: &str, args: &[Value]) -> Value {
    match name {
        "stringify" => {
            let pretty = args.get(1).map(truthy).unwrap_or(false);
            let target = args.first().unwrap_or(&Value::Null);
            let out = if pretty {
                serde_json::to_string_pretty(target)
            } else {
                serde_json::to_string(target)
            };
            out.map(Value::String).unwrap_or(Value::Null)
        }
        "parse" => match args.first() {
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "length" => match args.first() {
            Some(Value::String(s)) => number(s.chars().count() as f64),
            Some(Value::Array(a)) => number(a.len() as f64),
            Some(Value::Object(o)) => number(o.len() as f64),
            _ => Value::Null,
        },
        "keys" => match args.first() {
            Some(Value::Object(o)) => {
                Value::Array(o.keys().map(|k| Value::String(k.clone())).collect())
            }
            _ => Value::Null,
        },
        "join" => match (args.first(), args.get(1)) {
            (Some(Value::Array(a)), sep) => {
                let sep = match sep {
                    Some(Value::String(s)) => s.clone(),
                    _ => ",".to_string(),
                };
                Value::String(a.iter().map(display).collect::<Vec<_>>().join(&sep))
            }
            _ => Value::Null,
        },
        "split" => match (args.first(), args.get(1)) {
            (Some(Value::String(s)), Some(Value::String(sep))) => Value::Array(
                s.split(sep.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ),
            _ => Value::Null,
        },
        "contains" => match (args.first(), args.get(1)) {
            (Some(Value::String(s)), Some(Value::String(needle))) => {
                Value::Bool(s.contains(needle.as_str()))
            }
            (Some(Value::Array(a)), Some(needle)) => Value::Bool(a.contains(needle)),
            _ => Value::Null,
        },
        "upper" => string_fn(args, |s| s.to_uppercase()),
        "lower" => string_fn(args, |s| s.to_lowercase()),
        "trim" => string_fn(args, |s| s.trim().to_string()),
        "replace" => match (args.first(), args.get(1), args.get(2)) {
            (Some(Value::String(s)), Some(Value::String(from)), Some(Value::String(to))) => {
                Value::String(s.replace(from.as_str(), to))
            }
            _ => Value::Null,
        },
        "abs" => numeric_fn(args, f64::abs),
        "floor" => numeric_fn(args, f64::floor),
        "ceil" => numeric_fn(args, f64::ceil),
        "round" => numeric_fn(args, f64::round),
        "min" => fold_numeric(args, f64::min),
        "max" => fold_numeric(args, f64::max),
        "string" => Value::String(args.first().map(display).unwrap_or_default()),
        "number" => match args.first() {
            Some(Value::Number(n)) => Value::Number(n.clone()),
            Some(Value::String(s)) => s.trim().parse::<f64>().map(number).unwrap_or(Value::Null),
            Some(Value::Bool(b)) => number(if *b { 1.0 } else { 0.0 }),
            _ => Value::Null,
        },
        "boolean" => Value::Bool(args.first().map(truthy).unwrap_or(false)),
        "isFinite" => Value::Bool(matches!(
            args.first(),
            Some(Value::Number(n)) if n.as_f64().is_some_and(f64::is_finite)
        )),
        "isNaN" => Value::Bool(match args.first() {
            Some(Value::Number(n)) => n.as_f64().is_none(),
            Some(Value::String(s)) => s.trim().parse::<f64>().is_err(),
            Some(Value::Null) | None => true,
            _ => false,
        }),
        "encodeUriComponent" => match args.first() {
            Some(Value::String(s)) => Value::String(percent_encode(s)),
            _ => Value::Null,
        },
        "now" => json!(chrono::Utc::now().to_rfc3339()),
        _ => Value::Null,
    }
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn string_fn(args: &[Value], f: impl Fn(&str) -> String) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(f(s)),
        _ => Value::Null,
    }
}

fn numeric_fn(args: &[Value], f: impl Fn(f64) -> f64) -> Value {
    match args.first().and_then(Value::as_f64) {
        Some(n) => number(f(n)),
        None => Value::Null,
    }
}

fn fold_numeric(args: &[Value], f: impl Fn(f64, f64) -> f64) -> Value {
    let mut nums = args.iter().filter_map(Value::as_f64);
    match nums.next() {
        Some(first) => number(nums.fold(first, f)),
        None => Value::Null,
    }
}

/// RFC 3986 percent-encoding, unreserved characters passed through
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringify_and_parse_round_trip() {
        let value = json!({"a": [1, 2]});
        let text = call("stringify", &[value.clone()]);
        let back = call("parse", &[text]);
        assert_eq!(back, value);
    }

    #[test]
    fn length_covers_strings_arrays_objects() {
        assert_eq!(call("length", &[json!("abc")]), json!(3.0));
        assert_eq!(call("length", &[json!([1, 2])]), json!(2.0));
        assert_eq!(call("length", &[json!({"k": 1})]), json!(1.0));
        assert_eq!(call("length", &[json!(5)]), Value::Null);
    }

    #[test]
    fn join_stringifies_elements() {
        let joined = call("join", &[json!(["a", 1, true]), json!("-")]);
        assert_eq!(joined, json!("a-1-true"));
    }

    #[test]
    fn min_max_fold_all_arguments() {
        assert_eq!(call("min", &[json!(3), json!(1), json!(2)]), json!(1.0));
        assert_eq!(call("max", &[json!(3), json!(1), json!(2)]), json!(3.0));
    }

    #[test]
    fn encode_uri_component_escapes_reserved() {
        assert_eq!(
            call("encodeUriComponent", &[json!("a b&c")]),
            json!("a%20b%26c")
        );
    }

    #[test]
    fn unknown_builtin_is_null() {
        assert_eq!(call("eval", &[json!("1+1")]), Value::Null);
    }
}
