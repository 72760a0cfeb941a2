//! Parser and validator integration tests
//!
//! End-to-end checks over realistic documents: frontmatter plus a body
//! exercising every component kind, and the validator catching what the
//! parser deliberately lets through.

use folio::{parse, validate, FolioError, ValueKind, WorkflowNode};

const FULL_DOC: &str = r#"---
name: research-brief
description: Draft and refine a short research brief
inputs:
  topic: string
  depth: number = 2
  tags: list<string>
outputs:
  - brief
  - decision
---
You are drafting a research brief about {topic}.

{/* context setup ends here */}

<WebSearch name="background" query={`latest work on ${topic}`}/>

<Generation name="draft" model="anthropic/claude-sonnet-4-5" temperature={0.3}/>

<Loop name="refinements" count={depth}>
Refine the draft further.
<Generation name="pass"/>
</Loop>

<If condition={depth > 1}>
The brief went through multiple passes.
</If>
<Else>
Single-pass brief.
</Else>

<Structured name="brief" description="The final brief">
  <Field name="title" type="string" description="A short title"/>
  <Field name="sections" type="list">
    <Field name="heading" type="string"/>
    <Field name="body" type="string"/>
  </Field>
</Structured>

<Confirm name="decision" message="Publish this brief?" default={false}/>

<Log message="Finished with depth {depth}"/>
"#;

#[test]
fn full_document_parses_with_every_kind() {
    let def = parse(FULL_DOC).unwrap();
    assert_eq!(def.name, "research-brief");
    assert_eq!(def.inputs.len(), 3);
    assert_eq!(def.inputs[1].default, Some(serde_json::json!(2)));
    assert_eq!(def.inputs[2].kind, ValueKind::List);
    assert_eq!(def.outputs.as_deref().unwrap().len(), 2);

    let kinds: Vec<&str> = def.nodes.iter().map(|n| n.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "prose",
            "comment",
            "web_search",
            "generation",
            "loop",
            "if",
            "structured",
            "confirm",
            "log",
        ]
    );
}

#[test]
fn full_document_validates_clean() {
    let def = parse(FULL_DOC).unwrap();
    assert!(validate(&def, None).is_empty());
}

#[test]
fn template_query_is_captured_whole() {
    let def = parse(FULL_DOC).unwrap();
    let search = def
        .nodes
        .iter()
        .find_map(|n| match n {
            WorkflowNode::WebSearch { query, .. } => Some(query),
            _ => None,
        })
        .unwrap();
    assert!(!search.is_static);
    assert_eq!(search.raw, "`latest work on ${topic}`");
}

#[test]
fn else_is_attached_not_a_sibling() {
    let def = parse(FULL_DOC).unwrap();
    let ifs: Vec<_> = def
        .nodes
        .iter()
        .filter_map(|n| match n {
            WorkflowNode::If(params) => Some(params),
            _ => None,
        })
        .collect();
    assert_eq!(ifs.len(), 1);
    assert!(!ifs[0].else_children.is_empty());
}

#[test]
fn reparse_yields_identical_tree() {
    assert_eq!(parse(FULL_DOC).unwrap(), parse(FULL_DOC).unwrap());
}

#[test]
fn nested_prop_braces_survive() {
    let doc = r#"<Set name="cfg" value={{retries: 3, on: {error: "skip"}, steps: [1, 2]}}/>"#;
    let def = parse(doc).unwrap();
    match &def.nodes[0] {
        WorkflowNode::Set { value, .. } => {
            assert_eq!(value.raw, r#"{retries: 3, on: {error: "skip"}, steps: [1, 2]}"#);
        }
        other => panic!("Expected set, got {other:?}"),
    }
}

#[test]
fn unclosed_tag_reports_document_line() {
    let doc = "---\nname: broken\n---\nSome prose\nmore prose\n<Loop name=\"x\" count={1}>";
    match parse(doc).unwrap_err() {
        FolioError::Parse { line, reason } => {
            assert_eq!(line, 6);
            assert!(reason.contains("Loop"));
        }
        other => panic!("Expected parse error, got {other}"),
    }
}

#[test]
fn unknown_component_is_caught_by_validation_not_parsing() {
    let doc = "Intro <Widget id=\"w\"/> outro";
    let def = parse(doc).unwrap();
    assert_eq!(def.nodes.len(), 1, "unknown tag stays in prose");

    let errors = validate(&def, None);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("Widget"));
}

#[test]
fn flow_src_checked_against_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("exists.md"), "hello").unwrap();

    let ok = parse(r#"<Flow name="a" src="exists.md"/>"#).unwrap();
    assert!(validate(&ok, Some(dir.path())).is_empty());

    let missing = parse(r#"<Flow name="a" src="missing.md"/>"#).unwrap();
    assert_eq!(validate(&missing, Some(dir.path())).len(), 1);
}

#[test]
fn whitespace_only_prose_is_dropped() {
    let def = parse("  \n\n  <Set name=\"x\" value={1}/>  \n ").unwrap();
    assert_eq!(def.nodes.len(), 1);
    assert!(matches!(def.nodes[0], WorkflowNode::Set { .. }));
}
