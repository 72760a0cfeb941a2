//! Workflow AST
//!
//! The parsed representation of a document: a `WorkflowDefinition` owning an
//! ordered list of `WorkflowNode`s. Nodes are produced once by the parser and
//! never mutated afterwards; the executor keeps all transient state in its
//! own run context.

use serde_json::Value;

/// A parsed workflow document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    /// Declared inputs, in frontmatter order
    pub inputs: Vec<InputDef>,
    /// Output allow-list; `None` means return everything
    pub outputs: Option<Vec<String>>,
    pub nodes: Vec<WorkflowNode>,
}

/// A declared workflow input
#[derive(Debug, Clone, PartialEq)]
pub struct InputDef {
    pub name: String,
    pub kind: ValueKind,
    /// Required when no default was supplied
    pub required: bool,
    pub default: Option<Value>,
    /// Element type for `list<...>` declarations
    pub element: Option<ValueKind>,
    /// Child inputs for object-typed declarations (nested mapping form)
    pub children: Vec<InputDef>,
}

/// The five recognized semantic value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    List,
    Object,
}

impl ValueKind {
    /// Parse a declaration token; `None` for anything outside the five kinds
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "string" | "text" => Some(ValueKind::String),
            "number" => Some(ValueKind::Number),
            "boolean" | "bool" => Some(ValueKind::Boolean),
            "list" | "array" => Some(ValueKind::List),
            "object" => Some(ValueKind::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
            ValueKind::Object => "object",
        }
    }
}

/// A field of a Structured node's target JSON shape
///
/// `kind` holds the raw declared type so the validator, not the parser,
/// reports unrecognized kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: String,
    pub description: String,
    /// Nested fields for list/object kinds
    pub children: Vec<FieldDef>,
}

impl FieldDef {
    /// The declared kind, when it is one of the five recognized ones
    pub fn value_kind(&self) -> Option<ValueKind> {
        ValueKind::parse(&self.kind)
    }
}

/// A prop value: either a literal or source text evaluated at run time.
///
/// The parser never evaluates; the executor never re-parses. `is_static`
/// is the whole contract between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub raw: String,
    pub is_static: bool,
}

impl Expression {
    /// A literal value, passed through unchanged at resolution time
    pub fn literal(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), is_static: true }
    }

    /// Source text evaluated against the live scope at execution time
    pub fn dynamic(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), is_static: false }
    }

    /// The implicit `true` of a bare prop key with no `=`
    pub fn flag() -> Self {
        Self::dynamic("true")
    }
}

/// One parsed unit of the workflow tree
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowNode {
    /// A contiguous span of literal prose (interpolated at run time)
    Prose { text: String },
    Generation(GenerationParams),
    Structured(StructuredParams),
    WebSearch { name: String, query: Expression },
    WebFetch { name: String, url: Expression },
    Loop(LoopParams),
    If(IfParams),
    Set { name: String, value: Expression },
    Log { message: String },
    Flow(FlowParams),
    Prompt(PromptParams),
    Select(SelectParams),
    Confirm(ConfirmParams),
    /// Authoring no-op; preserves position across parses
    Comment { text: String },
}

impl WorkflowNode {
    /// Name of the output this node produces, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            WorkflowNode::Generation(g) => Some(&g.name),
            WorkflowNode::Structured(s) => Some(&s.name),
            WorkflowNode::WebSearch { name, .. } | WorkflowNode::WebFetch { name, .. } => {
                Some(name)
            }
            WorkflowNode::Loop(l) => Some(&l.name),
            WorkflowNode::Set { name, .. } => Some(name),
            WorkflowNode::Flow(f) => Some(&f.name),
            WorkflowNode::Prompt(p) => Some(&p.name),
            WorkflowNode::Select(s) => Some(&s.name),
            WorkflowNode::Confirm(c) => Some(&c.name),
            WorkflowNode::Prose { .. }
            | WorkflowNode::If(_)
            | WorkflowNode::Log { .. }
            | WorkflowNode::Comment { .. } => None,
        }
    }

    /// Component kind as a display string
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowNode::Prose { .. } => "prose",
            WorkflowNode::Generation(_) => "generation",
            WorkflowNode::Structured(_) => "structured",
            WorkflowNode::WebSearch { .. } => "web_search",
            WorkflowNode::WebFetch { .. } => "web_fetch",
            WorkflowNode::Loop(_) => "loop",
            WorkflowNode::If(_) => "if",
            WorkflowNode::Set { .. } => "set",
            WorkflowNode::Log { .. } => "log",
            WorkflowNode::Flow(_) => "flow",
            WorkflowNode::Prompt(_) => "prompt",
            WorkflowNode::Select(_) => "select",
            WorkflowNode::Confirm(_) => "confirm",
            WorkflowNode::Comment { .. } => "comment",
        }
    }
}

/// Free-text LLM call fed the accumulated context
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub name: String,
    pub model: Option<Expression>,
    pub temperature: Option<Expression>,
    pub max_tokens: Option<Expression>,
    pub stop: Option<Expression>,
}

/// LLM call constrained to a JSON shape described by `fields`
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredParams {
    pub name: String,
    pub model: Option<Expression>,
    pub description: Option<String>,
    pub fields: Vec<FieldDef>,
}

/// Iteration over an array (`over`) or a count (`count`)
#[derive(Debug, Clone, PartialEq)]
pub struct LoopParams {
    pub name: String,
    pub over: Option<Expression>,
    pub count: Option<Expression>,
    pub children: Vec<WorkflowNode>,
}

/// Conditional branch; `else_children` comes from an adjacent Else tag
#[derive(Debug, Clone, PartialEq)]
pub struct IfParams {
    pub condition: Expression,
    pub children: Vec<WorkflowNode>,
    pub else_children: Vec<WorkflowNode>,
}

/// Sub-flow invocation: an isolated execution of another document
#[derive(Debug, Clone, PartialEq)]
pub struct FlowParams {
    pub name: String,
    pub src: String,
    /// Object-literal expression mapping the child's input names to values
    pub inputs: Option<Expression>,
}

/// Free-text human input
#[derive(Debug, Clone, PartialEq)]
pub struct PromptParams {
    pub name: String,
    pub message: String,
    pub default: Option<Expression>,
    /// "text" (default) or "number"
    pub input_type: Option<String>,
}

/// Human choice from a normalized option list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectParams {
    pub name: String,
    pub message: String,
    pub options: Expression,
    pub label_key: Option<String>,
    pub value_key: Option<String>,
    pub default: Option<Expression>,
}

/// Human yes/no gate
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmParams {
    pub name: String,
    pub message: String,
    pub default: Option<Expression>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_kind_parses_the_five_kinds() {
        assert_eq!(ValueKind::parse("string"), Some(ValueKind::String));
        assert_eq!(ValueKind::parse("number"), Some(ValueKind::Number));
        assert_eq!(ValueKind::parse("boolean"), Some(ValueKind::Boolean));
        assert_eq!(ValueKind::parse("list"), Some(ValueKind::List));
        assert_eq!(ValueKind::parse("object"), Some(ValueKind::Object));
        assert_eq!(ValueKind::parse("tuple"), None);
    }

    #[test]
    fn node_names_only_on_output_producers() {
        let set = WorkflowNode::Set {
            name: "x".into(),
            value: Expression::literal("1"),
        };
        assert_eq!(set.name(), Some("x"));

        let prose = WorkflowNode::Prose { text: "hello".into() };
        assert_eq!(prose.name(), None);
    }

    #[test]
    fn flag_expression_evaluates_true_dynamically() {
        let flag = Expression::flag();
        assert!(!flag.is_static);
        assert_eq!(flag.raw, "true");
    }
}
