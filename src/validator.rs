//! Structural validation
//!
//! Walks the parsed tree collecting problems instead of failing: missing
//! names, bad field kinds, missing sub-flow files, empty messages, and
//! PascalCase tags in prose that were silently demoted by the parser.
//! An empty result means valid; the caller decides whether to abort.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{FieldDef, WorkflowDefinition, WorkflowNode};
use crate::parser::KNOWN_COMPONENTS;

/// Matches anything that looks like an opening component tag
static TAG_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Z][A-Za-z0-9]*)").expect("static regex compiles"));

/// One structural problem found in a parsed workflow
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingName { component: &'static str },
    MissingProp { component: &'static str, prop: &'static str, name: String },
    InvalidFieldKind { field: String, kind: String },
    FlowFileMissing { name: String, path: String },
    UnknownComponent { tag: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingName { component } => {
                write!(f, "<{component}> requires a non-empty name")
            }
            ValidationError::MissingProp { component, prop, name } => {
                write!(f, "<{component} name=\"{name}\"> requires a non-empty {prop}")
            }
            ValidationError::InvalidFieldKind { field, kind } => write!(
                f,
                "field '{field}' has unrecognized type '{kind}' (expected string, number, boolean, list, or object)"
            ),
            ValidationError::FlowFileMissing { name, path } => {
                write!(f, "<Flow name=\"{name}\"> references missing file '{path}'")
            }
            ValidationError::UnknownComponent { tag } => {
                write!(f, "unknown component <{tag}>")
            }
        }
    }
}

/// Validate a definition. When `base_path` is supplied, Flow src paths
/// are checked for existence on disk; otherwise that check is skipped.
pub fn validate(def: &WorkflowDefinition, base_path: Option<&Path>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_nodes(&def.nodes, base_path, &mut errors);
    errors
}

fn validate_nodes(
    nodes: &[WorkflowNode],
    base_path: Option<&Path>,
    errors: &mut Vec<ValidationError>,
) {
    for node in nodes {
        match node {
            WorkflowNode::Prose { text } => scan_prose(text, errors),
            WorkflowNode::Generation(g) => {
                require_name(&g.name, "Generation", errors);
            }
            WorkflowNode::Structured(s) => {
                require_name(&s.name, "Structured", errors);
                validate_fields(&s.fields, errors);
            }
            WorkflowNode::WebSearch { name, .. } => require_name(name, "WebSearch", errors),
            WorkflowNode::WebFetch { name, .. } => require_name(name, "WebFetch", errors),
            WorkflowNode::Loop(l) => {
                require_name(&l.name, "Loop", errors);
                validate_nodes(&l.children, base_path, errors);
            }
            WorkflowNode::If(params) => {
                validate_nodes(&params.children, base_path, errors);
                validate_nodes(&params.else_children, base_path, errors);
            }
            WorkflowNode::Set { name, .. } => require_name(name, "Set", errors),
            WorkflowNode::Flow(flow) => {
                require_name(&flow.name, "Flow", errors);
                if flow.src.is_empty() {
                    errors.push(ValidationError::MissingProp {
                        component: "Flow",
                        prop: "src",
                        name: flow.name.clone(),
                    });
                } else if let Some(base) = base_path {
                    let resolved = base.join(&flow.src);
                    if !resolved.exists() {
                        errors.push(ValidationError::FlowFileMissing {
                            name: flow.name.clone(),
                            path: resolved.display().to_string(),
                        });
                    }
                }
            }
            WorkflowNode::Prompt(p) => {
                require_name(&p.name, "Prompt", errors);
                require_message(&p.message, "Prompt", &p.name, errors);
            }
            WorkflowNode::Select(s) => {
                require_name(&s.name, "Select", errors);
                require_message(&s.message, "Select", &s.name, errors);
            }
            WorkflowNode::Confirm(c) => {
                require_name(&c.name, "Confirm", errors);
                require_message(&c.message, "Confirm", &c.name, errors);
            }
            WorkflowNode::Log { .. } | WorkflowNode::Comment { .. } => {}
        }
    }
}

fn validate_fields(fields: &[FieldDef], errors: &mut Vec<ValidationError>) {
    for field in fields {
        if field.value_kind().is_none() {
            errors.push(ValidationError::InvalidFieldKind {
                field: field.name.clone(),
                kind: field.kind.clone(),
            });
        }
        validate_fields(&field.children, errors);
    }
}

/// The parser demotes unknown tags to prose; this is where they surface
fn scan_prose(text: &str, errors: &mut Vec<ValidationError>) {
    for capture in TAG_LIKE.captures_iter(text) {
        let tag = &capture[1];
        if !KNOWN_COMPONENTS.contains(&tag) {
            errors.push(ValidationError::UnknownComponent { tag: tag.to_string() });
        }
    }
}

fn require_name(name: &str, component: &'static str, errors: &mut Vec<ValidationError>) {
    if name.trim().is_empty() {
        errors.push(ValidationError::MissingName { component });
    }
}

fn require_message(
    message: &str,
    component: &'static str,
    name: &str,
    errors: &mut Vec<ValidationError>,
) {
    if message.trim().is_empty() {
        errors.push(ValidationError::MissingProp {
            component,
            prop: "message",
            name: name.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn valid_document_has_no_errors() {
        let def = parse(
            r#"Intro <Generation name="a"/> <Prompt name="p" message="Pick one"/>"#,
        )
        .unwrap();
        assert!(validate(&def, None).is_empty());
    }

    #[test]
    fn missing_name_reported() {
        let def = parse(r#"<Generation/>"#).unwrap();
        let errors = validate(&def, None);
        assert_eq!(errors, vec![ValidationError::MissingName { component: "Generation" }]);
    }

    #[test]
    fn unknown_component_found_in_prose() {
        let def = parse("before <Madeup thing=\"x\"/> after").unwrap();
        let errors = validate(&def, None);
        assert_eq!(
            errors,
            vec![ValidationError::UnknownComponent { tag: "Madeup".to_string() }]
        );
    }

    #[test]
    fn bad_field_kind_reported_recursively() {
        let def = parse(
            r#"<Structured name="s">
                <Field name="outer" type="list">
                    <Field name="inner" type="tuple"/>
                </Field>
            </Structured>"#,
        )
        .unwrap();
        let errors = validate(&def, None);
        assert_eq!(
            errors,
            vec![ValidationError::InvalidFieldKind {
                field: "inner".to_string(),
                kind: "tuple".to_string(),
            }]
        );
    }

    #[test]
    fn branches_are_walked() {
        let def = parse(r#"<If condition={x}><Set value={1}/></If><Else><Prompt name="p"/></Else>"#)
            .unwrap();
        let errors = validate(&def, None);
        assert!(errors.contains(&ValidationError::MissingName { component: "Set" }));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::MissingProp { component: "Prompt", prop: "message", .. }
        )));
    }

    #[test]
    fn flow_requires_src_and_existing_file() {
        let def = parse(r#"<Flow name="sub"/>"#).unwrap();
        let errors = validate(&def, None);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::MissingProp { component: "Flow", prop: "src", .. }
        )));

        let def = parse(r#"<Flow name="sub" src="does-not-exist.md"/>"#).unwrap();
        let errors = validate(&def, Some(Path::new("/tmp")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::FlowFileMissing { .. })));
    }
}
