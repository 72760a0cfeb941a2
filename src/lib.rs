//! Folio - document-driven workflow engine for AI tasks
//!
//! Documents mix prose with PascalCase component tags; the parser turns
//! them into a typed node tree, the validator checks structural
//! invariants, and the executor runs the tree top-to-bottom, feeding an
//! accumulated context to a language model at Generation/Structured nodes.

pub mod ast;
pub mod context;
pub mod error;
pub mod event;
pub mod executor;
pub mod expr;
pub mod parser;
pub mod provider;
pub mod scan;
pub mod validator;

pub use ast::{Expression, FieldDef, InputDef, ValueKind, WorkflowDefinition, WorkflowNode};
pub use context::WorkflowContext;
pub use error::{FixSuggestion, FolioError};
pub use event::{Event, EventKind, EventLog, EventSink, NoopSink};
pub use executor::inputs::{InputRequest, InputResolver, SelectOption};
pub use executor::Executor;
pub use parser::parse;
pub use provider::{create_provider, split_model, Provider, StreamChunk, StreamRequest};
pub use validator::{validate, ValidationError};
