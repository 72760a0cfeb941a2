//! Frontmatter parsing
//!
//! A document may open with a `---`-fenced YAML block declaring `name`,
//! `description`, `inputs`, and `outputs`. Input declarations are either a
//! type string (`string`, `number = 3`, `list<string>`) or a nested mapping
//! for object-typed inputs.

use serde_json::Value;
use serde_yaml::Value as Yaml;

use crate::ast::{InputDef, ValueKind};
use crate::error::FolioError;

/// Parsed frontmatter header
#[derive(Debug, Default)]
pub struct Header {
    pub name: String,
    pub description: String,
    pub inputs: Vec<InputDef>,
    pub outputs: Option<Vec<String>>,
}

/// Split a document into its frontmatter text (if any) and body.
/// The third element is the number of lines consumed before the body,
/// used to keep body parse errors pointing at real document lines.
pub fn split(source: &str) -> (Option<&str>, &str, usize) {
    let mut rest = source;
    if let Some(stripped) = rest.strip_prefix('\u{feff}') {
        rest = stripped;
    }
    let first_line = rest.lines().next().unwrap_or("");
    if first_line.trim_end() != "---" {
        return (None, source, 0);
    }
    let after_fence = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return (None, source, 0),
    };
    // Find the closing fence on its own line
    let mut offset = 0;
    for line in after_fence.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let front = &after_fence[..offset];
            let body = &after_fence[offset + line.len()..];
            let consumed = 2 + front.matches('\n').count();
            return (Some(front), body, consumed);
        }
        offset += line.len();
    }
    (None, source, 0)
}

/// Parse frontmatter YAML into a header
pub fn parse(front: &str) -> Result<Header, FolioError> {
    let yaml: Yaml = serde_yaml::from_str(front)?;
    let mut header = Header::default();
    let Yaml::Mapping(map) = yaml else {
        return Ok(header);
    };

    for (key, value) in map {
        let Yaml::String(key) = key else { continue };
        match key.as_str() {
            "name" => header.name = scalar_string(&value),
            "description" => header.description = scalar_string(&value),
            "inputs" => {
                if let Yaml::Mapping(inputs) = value {
                    for (input_key, decl) in inputs {
                        let Yaml::String(input_name) = input_key else { continue };
                        header.inputs.push(parse_input(input_name, &decl));
                    }
                }
            }
            "outputs" => {
                if let Yaml::Sequence(seq) = value {
                    header.outputs =
                        Some(seq.iter().map(scalar_string).collect());
                }
            }
            _ => {}
        }
    }
    Ok(header)
}

/// One input declaration: a type string, or a nested mapping for objects
fn parse_input(name: String, decl: &Yaml) -> InputDef {
    match decl {
        Yaml::String(s) => parse_type_decl(name, s),
        Yaml::Mapping(map) => {
            let children = map
                .iter()
                .filter_map(|(k, v)| match k {
                    Yaml::String(child) => Some(parse_input(child.clone(), v)),
                    _ => None,
                })
                .collect();
            InputDef {
                name,
                kind: ValueKind::Object,
                required: true,
                default: None,
                element: None,
                children,
            }
        }
        // A bare scalar acts as a default with an inferred kind
        other => {
            let default = yaml_to_json(other);
            let kind = infer_kind(&default);
            InputDef {
                name,
                kind,
                required: false,
                default: Some(default),
                element: None,
                children: Vec::new(),
            }
        }
    }
}

/// `type`, `type = default`, or `list<element>`
fn parse_type_decl(name: String, decl: &str) -> InputDef {
    let (type_part, default_part) = match decl.split_once('=') {
        Some((t, d)) => (t.trim(), Some(d.trim())),
        None => (decl.trim(), None),
    };

    let (kind, element) = match type_part.strip_prefix("list<").and_then(|r| r.strip_suffix('>')) {
        Some(elem) => (ValueKind::List, ValueKind::parse(elem)),
        None => (
            ValueKind::parse(type_part).unwrap_or(ValueKind::String),
            None,
        ),
    };

    let default = default_part.map(|raw| parse_default(raw, kind));
    InputDef {
        name,
        kind,
        required: default.is_none(),
        default,
        element,
        children: Vec::new(),
    }
}

/// Interpret a default token: JSON first, bare text as a string
fn parse_default(raw: &str, kind: ValueKind) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    match kind {
        ValueKind::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ValueKind::Boolean => Value::Bool(raw.eq_ignore_ascii_case("true")),
        _ => Value::String(raw.trim_matches('"').to_string()),
    }
}

fn infer_kind(value: &Value) -> ValueKind {
    match value {
        Value::Number(_) => ValueKind::Number,
        Value::Bool(_) => ValueKind::Boolean,
        Value::Array(_) => ValueKind::List,
        Value::Object(_) => ValueKind::Object,
        _ => ValueKind::String,
    }
}

fn scalar_string(value: &Yaml) -> String {
    match value {
        Yaml::String(s) => s.clone(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Convert a YAML value to the JSON value domain used everywhere else
pub fn yaml_to_json(value: &Yaml) -> Value {
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(seq) => Value::Array(seq.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if let Yaml::String(key) = k {
                    out.insert(key.clone(), yaml_to_json(v));
                }
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_separates_front_and_body() {
        let doc = "---\nname: demo\n---\nBody text";
        let (front, body, consumed) = split(doc);
        assert_eq!(front, Some("name: demo\n"));
        assert_eq!(body, "Body text");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn split_without_frontmatter_returns_whole_body() {
        let doc = "Just prose here";
        let (front, body, consumed) = split(doc);
        assert_eq!(front, None);
        assert_eq!(body, doc);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn parses_simple_and_defaulted_inputs() {
        let header = parse("name: demo\ninputs:\n  topic: string\n  limit: number = 5\n").unwrap();
        assert_eq!(header.name, "demo");
        assert_eq!(header.inputs.len(), 2);

        let topic = &header.inputs[0];
        assert_eq!(topic.name, "topic");
        assert_eq!(topic.kind, ValueKind::String);
        assert!(topic.required);

        let limit = &header.inputs[1];
        assert!(!limit.required);
        assert_eq!(limit.default, Some(json!(5)));
    }

    #[test]
    fn parses_list_element_type() {
        let header = parse("inputs:\n  tags: list<string>\n").unwrap();
        let tags = &header.inputs[0];
        assert_eq!(tags.kind, ValueKind::List);
        assert_eq!(tags.element, Some(ValueKind::String));
    }

    #[test]
    fn nested_mapping_becomes_object_input() {
        let header =
            parse("inputs:\n  author:\n    name: string\n    age: number = 30\n").unwrap();
        let author = &header.inputs[0];
        assert_eq!(author.kind, ValueKind::Object);
        assert_eq!(author.children.len(), 2);
        assert_eq!(author.children[1].default, Some(json!(30)));
    }

    #[test]
    fn outputs_become_allow_list() {
        let header = parse("outputs:\n  - summary\n  - title\n").unwrap();
        assert_eq!(header.outputs, Some(vec!["summary".into(), "title".into()]));
    }

    #[test]
    fn string_default_keeps_text() {
        let header = parse("inputs:\n  greeting: string = hello world\n").unwrap();
        assert_eq!(header.inputs[0].default, Some(json!("hello world")));
    }
}
