//! Markup parser
//!
//! Turns a document (optional frontmatter + a body mixing prose with
//! PascalCase component tags) into a `WorkflowDefinition`. The body is
//! scanned character by character with a prose accumulator; at each
//! position the tokenizer checks, in order: an MDX-style comment, a
//! self-closing tag, an opening tag whose close is found by a
//! depth-counting scan, a broken tag (parse error), otherwise prose.
//!
//! Unknown PascalCase tags degrade to literal prose so the validator,
//! not the parser, reports them; only an unclosed tag is a parse error.

pub mod frontmatter;
pub mod props;

use std::collections::HashMap;

use crate::ast::{
    ConfirmParams, Expression, FieldDef, FlowParams, GenerationParams, IfParams, LoopParams,
    PromptParams, SelectParams, StructuredParams, WorkflowDefinition, WorkflowNode,
};
use crate::error::FolioError;
use crate::scan;

/// Component names the parser recognizes
pub const KNOWN_COMPONENTS: &[&str] = &[
    "Generation",
    "Structured",
    "Field",
    "WebSearch",
    "WebFetch",
    "Loop",
    "If",
    "Else",
    "Set",
    "Log",
    "Comment",
    "Flow",
    "Prompt",
    "Select",
    "Confirm",
];

/// Parse a document into a workflow definition
pub fn parse(source: &str) -> Result<WorkflowDefinition, FolioError> {
    let (front, body, line_offset) = frontmatter::split(source);
    let header = match front {
        Some(text) => frontmatter::parse(text)?,
        None => frontmatter::Header::default(),
    };

    let chars: Vec<char> = body.chars().collect();
    let nodes = parse_nodes(&chars, 0, chars.len(), line_offset)?;

    Ok(WorkflowDefinition {
        name: header.name,
        description: header.description,
        inputs: header.inputs,
        outputs: header.outputs,
        nodes,
    })
}

/// A recognized tag occurrence within the body
struct Tag {
    name: String,
    props: HashMap<String, Expression>,
    /// Child span for block tags: (start, end) within `chars`
    inner: Option<(usize, usize)>,
    /// Index just past the tag (or past its close tag)
    after: usize,
    /// Source span of the opening tag text itself
    open_span: (usize, usize),
}

fn parse_nodes(
    chars: &[char],
    start: usize,
    end: usize,
    line_offset: usize,
) -> Result<Vec<WorkflowNode>, FolioError> {
    let mut nodes = Vec::new();
    let mut prose = String::new();
    let mut i = start;

    while i < end {
        // MDX-style comment
        if starts_comment(chars, i) {
            if let Some(close) = comment_end(chars, i + 3, end) {
                flush_prose(&mut nodes, &mut prose);
                let text: String = chars[i + 3..close].iter().collect();
                nodes.push(WorkflowNode::Comment { text: text.trim().to_string() });
                i = close + 3;
                continue;
            }
            prose.push(chars[i]);
            i += 1;
            continue;
        }

        // Component tag
        if chars[i] == '<' && chars.get(i + 1).is_some_and(|c| c.is_ascii_uppercase()) {
            let tag = read_tag(chars, i, end, line_offset)?;
            match tag {
                Some(tag) if KNOWN_COMPONENTS.contains(&tag.name.as_str()) => {
                    // A stray Else or Field here has no meaning; let it fall
                    // through to prose so the validator can surface it
                    if tag.name == "Else" || tag.name == "Field" {
                        let span: String =
                            chars[tag.open_span.0..tag.open_span.1].iter().collect();
                        prose.push_str(&span);
                        i = tag.open_span.1;
                        continue;
                    }
                    flush_prose(&mut nodes, &mut prose);
                    let after = tag.after;
                    let mut next = after;
                    let node = build_node(chars, tag, end, line_offset, &mut next)?;
                    if let Some(node) = node {
                        nodes.push(node);
                    }
                    i = next;
                }
                Some(tag) => {
                    // Unknown component: the tag text itself becomes prose
                    // and scanning resumes right after the opening tag
                    let span: String = chars[tag.open_span.0..tag.open_span.1].iter().collect();
                    prose.push_str(&span);
                    i = tag.open_span.1;
                }
                None => {
                    prose.push(chars[i]);
                    i += 1;
                }
            }
            continue;
        }

        prose.push(chars[i]);
        i += 1;
    }

    flush_prose(&mut nodes, &mut prose);
    Ok(nodes)
}

/// Read the tag at `i` (which points at `<` followed by an uppercase
/// letter). For block tags the matching close is located by a
/// depth-counting scan. `Ok(None)` when this is not actually a tag.
fn read_tag(
    chars: &[char],
    i: usize,
    end: usize,
    line_offset: usize,
) -> Result<Option<Tag>, FolioError> {
    let mut name_end = i + 1;
    while name_end < end && (chars[name_end].is_ascii_alphanumeric()) {
        name_end += 1;
    }
    let name: String = chars[i + 1..name_end].iter().collect();

    // Must be followed by whitespace, `>`, or `/>` to be a tag at all
    match chars.get(name_end) {
        Some(c) if c.is_whitespace() || *c == '>' || *c == '/' => {}
        _ => return Ok(None),
    }

    let (gt, self_closing) = match props::scan_region(&chars[..end], name_end) {
        Some(found) => found,
        None => {
            return Err(parse_error(chars, i, line_offset, format!("tag <{name}> never closes")))
        }
    };

    let attr_end = if self_closing { gt - 1 } else { gt };
    let attrs: String = chars[name_end..attr_end].iter().collect();
    let props = props::parse(&attrs);

    if self_closing {
        return Ok(Some(Tag {
            name,
            props,
            inner: None,
            after: gt + 1,
            open_span: (i, gt + 1),
        }));
    }

    let Some((content_end, after_close)) = scan_to_close(chars, gt + 1, end, &name) else {
        return Err(parse_error(
            chars,
            i,
            line_offset,
            format!("tag <{name}> is opened but never closed"),
        ));
    };

    Ok(Some(Tag {
        name,
        props,
        inner: Some((gt + 1, content_end)),
        after: after_close,
        open_span: (i, gt + 1),
    }))
}

/// Locate the close tag for `name`, starting just past the open tag.
///
/// Depth-counts nested same-named block tags, recognizes self-closing
/// same-named tags (which must not perturb depth), and skips attribute
/// regions and comments so their contents are never scanned for tags.
/// Returns (index of the close tag's `<`, index just past its `>`).
fn scan_to_close(chars: &[char], from: usize, end: usize, name: &str) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut i = from;

    while i < end {
        if starts_comment(chars, i) {
            match comment_end(chars, i + 3, end) {
                Some(close) => {
                    i = close + 3;
                    continue;
                }
                None => return None,
            }
        }
        if chars[i] != '<' {
            i += 1;
            continue;
        }

        // Close tag?
        if chars.get(i + 1) == Some(&'/') {
            if let Some(after) = match_close_tag(chars, i, end, name) {
                depth -= 1;
                if depth == 0 {
                    return Some((i, after));
                }
                i = after;
                continue;
            }
            i += 1;
            continue;
        }

        // Another open tag: skip its attribute region whole so strings and
        // expressions inside it cannot fake a close tag
        if chars.get(i + 1).is_some_and(|c| c.is_ascii_uppercase()) {
            let mut name_end = i + 1;
            while name_end < end && chars[name_end].is_ascii_alphanumeric() {
                name_end += 1;
            }
            let tag_name: String = chars[i + 1..name_end].iter().collect();
            let boundary_ok = matches!(
                chars.get(name_end),
                Some(c) if c.is_whitespace() || *c == '>' || *c == '/'
            );
            if boundary_ok {
                if let Some((gt, self_closing)) = props::scan_region(&chars[..end], name_end) {
                    if tag_name == name && !self_closing {
                        depth += 1;
                    }
                    i = gt + 1;
                    continue;
                }
                return None;
            }
        }
        i += 1;
    }
    None
}

/// Match `</Name>` (whitespace allowed before `>`) at `i`; returns the
/// index just past `>`
fn match_close_tag(chars: &[char], i: usize, end: usize, name: &str) -> Option<usize> {
    let mut j = i + 2;
    for expected in name.chars() {
        if chars.get(j) != Some(&expected) {
            return None;
        }
        j += 1;
    }
    while j < end && chars[j].is_whitespace() {
        j += 1;
    }
    (chars.get(j) == Some(&'>')).then_some(j + 1)
}

/// Build a workflow node from a recognized tag. `next` is advanced when
/// the node consumes trailing content (If swallowing its Else).
fn build_node(
    chars: &[char],
    tag: Tag,
    end: usize,
    line_offset: usize,
    next: &mut usize,
) -> Result<Option<WorkflowNode>, FolioError> {
    let props = &tag.props;
    let node = match tag.name.as_str() {
        "Generation" => Some(WorkflowNode::Generation(GenerationParams {
            name: prop_string(props, "name"),
            model: props.get("model").cloned(),
            temperature: props.get("temperature").cloned(),
            max_tokens: props.get("maxTokens").cloned(),
            stop: props.get("stop").cloned(),
        })),
        "Structured" => {
            let fields = match tag.inner {
                Some((start, end)) => parse_fields(chars, start, end, line_offset)?,
                None => Vec::new(),
            };
            Some(WorkflowNode::Structured(StructuredParams {
                name: prop_string(props, "name"),
                model: props.get("model").cloned(),
                description: opt_prop_string(props, "description"),
                fields,
            }))
        }
        "WebSearch" => Some(WorkflowNode::WebSearch {
            name: prop_string(props, "name"),
            query: props.get("query").cloned().unwrap_or_else(|| Expression::literal("")),
        }),
        "WebFetch" => Some(WorkflowNode::WebFetch {
            name: prop_string(props, "name"),
            url: props.get("url").cloned().unwrap_or_else(|| Expression::literal("")),
        }),
        "Loop" => {
            let children = match tag.inner {
                Some((start, end)) => parse_nodes(chars, start, end, line_offset)?,
                None => Vec::new(),
            };
            Some(WorkflowNode::Loop(LoopParams {
                name: prop_string(props, "name"),
                over: props.get("over").cloned(),
                count: props.get("count").cloned(),
                children,
            }))
        }
        "If" => {
            let children = match tag.inner {
                Some((start, end)) => parse_nodes(chars, start, end, line_offset)?,
                None => Vec::new(),
            };
            let else_children = attach_else(chars, end, line_offset, next)?;
            Some(WorkflowNode::If(IfParams {
                condition: props
                    .get("condition")
                    .cloned()
                    .unwrap_or_else(|| Expression::dynamic("false")),
                children,
                else_children,
            }))
        }
        "Set" => Some(WorkflowNode::Set {
            name: prop_string(props, "name"),
            value: props.get("value").cloned().unwrap_or_else(|| Expression::literal("")),
        }),
        "Log" => {
            let message = match opt_prop_string(props, "message") {
                Some(message) => message,
                None => inner_text(chars, tag.inner),
            };
            Some(WorkflowNode::Log { message })
        }
        "Comment" => Some(WorkflowNode::Comment { text: inner_text(chars, tag.inner) }),
        "Flow" => Some(WorkflowNode::Flow(FlowParams {
            name: prop_string(props, "name"),
            src: prop_string(props, "src"),
            inputs: props.get("inputs").cloned(),
        })),
        "Prompt" => Some(WorkflowNode::Prompt(PromptParams {
            name: prop_string(props, "name"),
            message: prop_string(props, "message"),
            default: props.get("default").cloned(),
            input_type: opt_prop_string(props, "type"),
        })),
        "Select" => Some(WorkflowNode::Select(SelectParams {
            name: prop_string(props, "name"),
            message: prop_string(props, "message"),
            options: props.get("options").cloned().unwrap_or_else(|| Expression::dynamic("[]")),
            label_key: opt_prop_string(props, "labelKey"),
            value_key: opt_prop_string(props, "valueKey"),
            default: props.get("default").cloned(),
        })),
        "Confirm" => Some(WorkflowNode::Confirm(ConfirmParams {
            name: prop_string(props, "name"),
            message: prop_string(props, "message"),
            default: props.get("default").cloned(),
        })),
        _ => None,
    };
    Ok(node)
}

/// Look ahead past an If's close tag (skipping whitespace and comments)
/// for an immediately-following Else; consumes it when found
fn attach_else(
    chars: &[char],
    end: usize,
    line_offset: usize,
    next: &mut usize,
) -> Result<Vec<WorkflowNode>, FolioError> {
    let mut j = *next;
    loop {
        while j < end && chars[j].is_whitespace() {
            j += 1;
        }
        if starts_comment(chars, j) {
            match comment_end(chars, j + 3, end) {
                Some(close) => {
                    j = close + 3;
                    continue;
                }
                None => return Ok(Vec::new()),
            }
        }
        break;
    }

    if j >= end || chars.get(j) != Some(&'<') || !matches_word(chars, j + 1, "Else") {
        return Ok(Vec::new());
    }

    let Some(tag) = read_tag(chars, j, end, line_offset)? else {
        return Ok(Vec::new());
    };
    if tag.name != "Else" {
        return Ok(Vec::new());
    }

    *next = tag.after;
    match tag.inner {
        Some((start, end)) => parse_nodes(chars, start, end, line_offset),
        None => Ok(Vec::new()),
    }
}

/// Parse the Field tags inside a Structured (or nested Field) body;
/// anything that is not a Field is ignored here
fn parse_fields(
    chars: &[char],
    start: usize,
    end: usize,
    line_offset: usize,
) -> Result<Vec<FieldDef>, FolioError> {
    let mut fields = Vec::new();
    let mut i = start;

    while i < end {
        if chars[i] == '<' && matches_word(chars, i + 1, "Field") {
            let Some(tag) = read_tag(chars, i, end, line_offset)? else {
                i += 1;
                continue;
            };
            let children = match tag.inner {
                Some((inner_start, inner_end)) => {
                    parse_fields(chars, inner_start, inner_end, line_offset)?
                }
                None => Vec::new(),
            };
            fields.push(FieldDef {
                name: prop_string(&tag.props, "name"),
                kind: opt_prop_string(&tag.props, "type").unwrap_or_else(|| "string".to_string()),
                description: prop_string(&tag.props, "description"),
                children,
            });
            i = tag.after;
            continue;
        }
        i += 1;
    }
    Ok(fields)
}

fn starts_comment(chars: &[char], i: usize) -> bool {
    chars.get(i) == Some(&'{') && chars.get(i + 1) == Some(&'/') && chars.get(i + 2) == Some(&'*')
}

/// Index of the `*` in the `*/}` terminator
fn comment_end(chars: &[char], from: usize, end: usize) -> Option<usize> {
    let mut i = from;
    while i + 2 < end {
        if chars[i] == '*' && chars[i + 1] == '/' && chars[i + 2] == '}' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Whether `word` appears at `i` with a tag-boundary character after it
fn matches_word(chars: &[char], i: usize, word: &str) -> bool {
    let mut j = i;
    for expected in word.chars() {
        if chars.get(j) != Some(&expected) {
            return false;
        }
        j += 1;
    }
    matches!(chars.get(j), Some(c) if c.is_whitespace() || *c == '>' || *c == '/')
        || chars.get(j).is_none()
}

fn flush_prose(nodes: &mut Vec<WorkflowNode>, prose: &mut String) {
    let text = prose.trim();
    if !text.is_empty() {
        nodes.push(WorkflowNode::Prose { text: text.to_string() });
    }
    prose.clear();
}

fn prop_string(props: &HashMap<String, Expression>, key: &str) -> String {
    props.get(key).map(|e| e.raw.clone()).unwrap_or_default()
}

fn opt_prop_string(props: &HashMap<String, Expression>, key: &str) -> Option<String> {
    props.get(key).map(|e| e.raw.clone())
}

fn inner_text(chars: &[char], inner: Option<(usize, usize)>) -> String {
    match inner {
        Some((start, end)) => chars[start..end].iter().collect::<String>().trim().to_string(),
        None => String::new(),
    }
}

fn parse_error(chars: &[char], pos: usize, line_offset: usize, reason: String) -> FolioError {
    FolioError::Parse { line: line_offset + scan::line_of(chars, pos), reason }
}
