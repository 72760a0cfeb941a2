//! Workflow executor
//!
//! Interprets a parsed node tree in document order, threading the run
//! context through each handler: prose and LLM responses accumulate on the
//! context stack, named results accumulate in outputs, and every later
//! generation sees exactly what executed before it. The only suspension
//! points are awaiting an LLM stream and awaiting the input resolver.

pub mod inputs;
pub mod structured;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::ast::{
    ConfirmParams, Expression, FlowParams, GenerationParams, IfParams, LoopParams, PromptParams,
    SelectParams, StructuredParams, WorkflowDefinition, WorkflowNode,
};
use crate::context::WorkflowContext;
use crate::error::FolioError;
use crate::event::{EventKind, EventSink, NoopSink};
use crate::expr::{self, display, truthy, Scope};
use crate::parser;
use crate::provider::{
    create_provider, split_model, Provider, StreamChunk, StreamRequest, DEFAULT_MODEL,
};

use self::inputs::{normalize_options, InputRequest, InputResolver};

/// Executes one workflow definition against one run context.
///
/// A fresh executor/context pair is constructed for every sub-flow, so a
/// parent and child never share mutable state beyond the one-way input
/// mapping computed before the child starts.
pub struct Executor {
    initial_inputs: Map<String, Value>,
    model_override: Option<String>,
    verbose: bool,
    sink: Arc<dyn EventSink>,
    base_path: PathBuf,
    resolver: Option<Arc<dyn InputResolver>>,
    /// Cached providers (lock-free), shared with sub-flow executors
    providers: Arc<DashMap<String, Arc<dyn Provider>>>,
}

impl Executor {
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            initial_inputs: inputs,
            model_override: None,
            verbose: false,
            sink: Arc::new(NoopSink),
            base_path: PathBuf::from("."),
            resolver: None,
            providers: Arc::new(DashMap::new()),
        }
    }

    /// Run-level model override; wins over node-level `model` props
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Base directory for resolving relative sub-flow paths
    pub fn with_base_path(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_path = base.into();
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn InputResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Pre-seed the provider cache; the test seam for injecting mocks
    pub fn with_provider(self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Execute the workflow and return its output mapping
    pub async fn execute(
        &self,
        def: &WorkflowDefinition,
    ) -> Result<Map<String, Value>, FolioError> {
        let start = Instant::now();
        self.sink.emit(EventKind::RunStarted {
            workflow: def.name.clone(),
            node_count: def.nodes.len(),
        });

        match self.run(def).await {
            Ok(outputs) => {
                self.sink.emit(EventKind::RunCompleted {
                    outputs: Value::Object(outputs.clone()),
                    duration_ms: start.elapsed().as_millis() as u64,
                });
                Ok(outputs)
            }
            Err(error) => {
                self.sink.emit(EventKind::RunFailed { error: error.to_string() });
                Err(error)
            }
        }
    }

    /// Execute without run-level events; sub-flows enter here so their
    /// lifecycle is reported as flow start/end, not a second run
    async fn run(&self, def: &WorkflowDefinition) -> Result<Map<String, Value>, FolioError> {
        let inputs = self.resolve_inputs(def)?;
        let ctx = WorkflowContext::new(inputs);
        let ctx = self.run_sequence(&def.nodes, ctx).await?;
        Ok(ctx.into_result(def.outputs.as_deref()))
    }

    /// Apply declared defaults, then check required inputs
    fn resolve_inputs(&self, def: &WorkflowDefinition) -> Result<Map<String, Value>, FolioError> {
        let mut inputs = self.initial_inputs.clone();
        for input in &def.inputs {
            if inputs.contains_key(&input.name) {
                continue;
            }
            match &input.default {
                Some(default) => {
                    inputs.insert(input.name.clone(), default.clone());
                }
                None if input.required => {
                    return Err(FolioError::MissingInput { name: input.name.clone() });
                }
                None => {}
            }
        }
        Ok(inputs)
    }

    fn run_sequence<'a>(
        &'a self,
        nodes: &'a [WorkflowNode],
        ctx: WorkflowContext,
    ) -> BoxFuture<'a, Result<WorkflowContext, FolioError>> {
        Box::pin(async move {
            let mut ctx = ctx;
            for node in nodes {
                ctx = self.run_node(node, ctx).await?;
            }
            Ok(ctx)
        })
    }

    #[instrument(skip(self, ctx, node), fields(kind = node.kind(), name = node.name()))]
    async fn run_node(
        &self,
        node: &WorkflowNode,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        debug!("Executing node");
        match node {
            WorkflowNode::Prose { text } => {
                let rendered = expr::interpolate(text, &ctx.scope());
                ctx.push_context(rendered);
                Ok(ctx)
            }
            WorkflowNode::Generation(params) => self.run_generation(params, ctx).await,
            WorkflowNode::Structured(params) => self.run_structured(params, ctx).await,
            WorkflowNode::WebSearch { name, query } => {
                let query = display(&expr::resolve(query, &ctx.scope()));
                let node_name: Arc<str> = Arc::from(name.as_str());
                self.sink.emit(EventKind::ToolStarted {
                    name: Arc::clone(&node_name),
                    tool: "web_search".to_string(),
                    input: json!({ "query": query }),
                });

                // Retrieval is an external capability boundary; a real
                // backend plugs in here behind the same result shape
                let result = json!({ "query": query, "results": [] });
                ctx.push_context(format!("Web search for \"{query}\": no results available."));
                ctx.set_output(name, result.clone());

                self.sink.emit(EventKind::ToolCompleted {
                    name: Arc::clone(&node_name),
                    tool: "web_search".to_string(),
                    output_len: result.to_string().len(),
                });
                self.emit_output(&node_name, &result);
                Ok(ctx)
            }
            WorkflowNode::WebFetch { name, url } => {
                let url = display(&expr::resolve(url, &ctx.scope()));
                let node_name: Arc<str> = Arc::from(name.as_str());
                self.sink.emit(EventKind::ToolStarted {
                    name: Arc::clone(&node_name),
                    tool: "web_fetch".to_string(),
                    input: json!({ "url": url }),
                });

                let result = json!({
                    "url": url,
                    "title": "",
                    "content": "",
                    "fetchedAt": chrono::Utc::now().to_rfc3339(),
                });
                ctx.push_context(format!("Fetched \"{url}\": no content available."));
                ctx.set_output(name, result.clone());

                self.sink.emit(EventKind::ToolCompleted {
                    name: Arc::clone(&node_name),
                    tool: "web_fetch".to_string(),
                    output_len: result.to_string().len(),
                });
                self.emit_output(&node_name, &result);
                Ok(ctx)
            }
            WorkflowNode::Loop(params) => self.run_loop(params, ctx).await,
            WorkflowNode::If(params) => self.run_if(params, ctx).await,
            WorkflowNode::Set { name, value } => {
                let resolved = expr::resolve(value, &ctx.scope());
                let node_name: Arc<str> = Arc::from(name.as_str());
                self.sink.emit(EventKind::VariableSet {
                    name: Arc::clone(&node_name),
                    value: resolved.clone(),
                });
                // Bookkeeping only: no context-stack entry
                ctx.set_output(name, resolved.clone());
                self.emit_output(&node_name, &resolved);
                Ok(ctx)
            }
            WorkflowNode::Log { message } => {
                let rendered = expr::interpolate(message, &ctx.scope());
                if self.verbose {
                    tracing::info!(target: "folio::log", "{rendered}");
                }
                self.sink.emit(EventKind::LogMessage { message: rendered });
                Ok(ctx)
            }
            WorkflowNode::Flow(params) => self.run_flow(params, ctx).await,
            WorkflowNode::Prompt(params) => self.run_prompt(params, ctx).await,
            WorkflowNode::Select(params) => self.run_select(params, ctx).await,
            WorkflowNode::Confirm(params) => self.run_confirm(params, ctx).await,
            WorkflowNode::Comment { .. } => Ok(ctx),
        }
    }

    async fn run_generation(
        &self,
        params: &GenerationParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let scope = ctx.scope();
        let node_name: Arc<str> = Arc::from(params.name.as_str());
        self.sink.emit(EventKind::NodeStarted {
            name: Arc::clone(&node_name),
            kind: "generation".to_string(),
        });

        let request = self.build_request(ctx.joined_context(), params, &scope);
        let provider = self.provider_for(&self.model_spec(params.model.as_ref(), &scope))?;
        let text = self.stream_llm(&node_name, provider, request).await?;

        self.sink.emit(EventKind::GenerationCompleted {
            name: Arc::clone(&node_name),
            output_len: text.len(),
        });

        let output = Value::String(text.clone());
        ctx.set_output(&params.name, output.clone());
        ctx.push_context(text);
        self.emit_output(&node_name, &output);
        Ok(ctx)
    }

    async fn run_structured(
        &self,
        params: &StructuredParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let scope = ctx.scope();
        let node_name: Arc<str> = Arc::from(params.name.as_str());
        self.sink.emit(EventKind::NodeStarted {
            name: Arc::clone(&node_name),
            kind: "structured".to_string(),
        });

        let schema = structured::field_schema(&params.fields);
        let mut prompt = ctx.joined_context();
        prompt.push_str("\n\n");
        if let Some(description) = &params.description {
            prompt.push_str(description);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Produce a JSON object with these fields:\n");
        prompt.push_str(&structured::field_summary(&params.fields));
        prompt.push_str("\n\nThe response must match this JSON schema:\n");
        prompt.push_str(&serde_json::to_string_pretty(&schema)?);
        prompt.push_str("\n\nRespond with only the JSON object, no other text.");

        let model_spec = self.model_spec(params.model.as_ref(), &scope);
        let (_, model) = split_model(&model_spec);
        let request = StreamRequest::new(prompt, model);
        let provider = self.provider_for(&model_spec)?;
        let text = self.stream_llm(&node_name, provider, request).await?;

        self.sink.emit(EventKind::GenerationCompleted {
            name: Arc::clone(&node_name),
            output_len: text.len(),
        });

        // Malformed model output is expected and recoverable; degrade to a
        // sentinel instead of failing the run
        let parsed = structured::recover_json(&text)
            .unwrap_or_else(|| structured::sentinel(&text));

        ctx.push_context(serde_json::to_string_pretty(&parsed)?);
        ctx.set_output(&params.name, parsed.clone());
        self.emit_output(&node_name, &parsed);
        Ok(ctx)
    }

    async fn run_loop(
        &self,
        params: &LoopParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let scope = ctx.scope();
        let items: Vec<Value> = if let Some(over) = &params.over {
            match expr::resolve(over, &scope) {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                single => vec![single],
            }
        } else if let Some(count) = &params.count {
            let count = as_number(&expr::resolve(count, &scope)).unwrap_or(0.0);
            let count = count.max(0.0) as usize;
            (0..count).map(|i| json!(i)).collect()
        } else {
            Vec::new()
        };

        let node_name: Arc<str> = Arc::from(params.name.as_str());
        let total = items.len();
        self.sink.emit(EventKind::LoopStarted { name: Arc::clone(&node_name), total });

        // Iterations are mutually blind: every one starts from the
        // pre-loop stack snapshot
        let snapshot = ctx.stack_len();
        let prior_item = ctx.get_output("item").cloned();
        let prior_index = ctx.get_output("index").cloned();
        let mut records: Vec<Value> = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            self.sink.emit(EventKind::LoopIteration {
                name: Arc::clone(&node_name),
                index,
            });
            ctx.truncate_stack(snapshot);

            let before = ctx.outputs().clone();
            ctx.set_output("item", item.clone());
            ctx.set_output("index", json!(index));

            ctx = self.run_sequence(&params.children, ctx).await?;

            let mut record = Map::new();
            record.insert("item".to_string(), item);
            record.insert("index".to_string(), json!(index));
            for (key, value) in ctx.outputs() {
                if key == "item" || key == "index" {
                    continue;
                }
                if before.get(key) != Some(value) {
                    record.insert(key.clone(), value.clone());
                }
            }
            records.push(Value::Object(record));
        }

        restore_binding(&mut ctx, "item", prior_item);
        restore_binding(&mut ctx, "index", prior_index);
        ctx.truncate_stack(snapshot);

        // Loop internals stay invisible downstream except through this
        // one summary entry, keeping prompts bounded
        ctx.push_context(format!(
            "Completed {total} iteration(s) of '{}'. Results: {}",
            params.name,
            serde_json::to_string(&records)?
        ));
        let output = Value::Array(records);
        ctx.set_output(&params.name, output.clone());

        self.sink.emit(EventKind::LoopCompleted {
            name: Arc::clone(&node_name),
            iterations: total,
        });
        self.emit_output(&node_name, &output);
        Ok(ctx)
    }

    async fn run_if(
        &self,
        params: &IfParams,
        ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let result = truthy(&expr::resolve(&params.condition, &ctx.scope()));
        self.sink.emit(EventKind::BranchEvaluated {
            condition: params.condition.raw.clone(),
            result,
        });

        // Exactly one branch runs; its effects merge straight into the
        // parent scope and stack (no isolation, unlike Loop)
        let branch = if result { &params.children } else { &params.else_children };
        self.run_sequence(branch, ctx).await
    }

    async fn run_flow(
        &self,
        params: &FlowParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let path = self.base_path.join(&params.src);
        let node_name: Arc<str> = Arc::from(params.name.as_str());
        self.sink.emit(EventKind::FlowStarted {
            name: Arc::clone(&node_name),
            src: params.src.clone(),
        });

        let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
            FolioError::Execution(format!("Failed to read sub-flow '{}': {e}", path.display()))
        })?;
        let child_def = parser::parse(&source)?;

        let child_inputs = match &params.inputs {
            Some(expression) => match expr::resolve(expression, &ctx.scope()) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };

        // Total isolation: the child sees only the mapped inputs, never
        // the parent's stack or outputs
        let child = Executor {
            initial_inputs: child_inputs,
            model_override: self.model_override.clone(),
            verbose: self.verbose,
            sink: Arc::clone(&self.sink),
            base_path: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            resolver: self.resolver.clone(),
            providers: Arc::clone(&self.providers),
        };
        let child_outputs = child.run(&child_def).await?;

        ctx.push_context(format!(
            "Sub-flow '{}' completed. Outputs: {}",
            params.name,
            serde_json::to_string(&child_outputs)?
        ));
        let output = Value::Object(child_outputs);
        ctx.set_output(&params.name, output.clone());

        self.sink.emit(EventKind::FlowCompleted { name: Arc::clone(&node_name) });
        self.emit_output(&node_name, &output);
        Ok(ctx)
    }

    async fn run_prompt(
        &self,
        params: &PromptParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let scope = ctx.scope();
        let message = expr::interpolate(&params.message, &scope);
        let default = params.default.as_ref().map(|e| expr::resolve(e, &scope));
        let numeric = params.input_type.as_deref() == Some("number");

        let request = InputRequest::Text {
            name: params.name.clone(),
            message: message.clone(),
            default: default.as_ref().map(display),
            numeric,
        };
        let mut value = self.await_input(&params.name, &message, request, default).await?;
        if numeric {
            if let Some(n) = as_number(&value) {
                value = json!(n);
            }
        }

        ctx.push_context(format!("User input for \"{message}\": {}", display(&value)));
        self.finish_input(&mut ctx, &params.name, value);
        Ok(ctx)
    }

    async fn run_select(
        &self,
        params: &SelectParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let scope = ctx.scope();
        let message = expr::interpolate(&params.message, &scope);
        let options_value = expr::resolve(&params.options, &scope);
        let options = normalize_options(
            &options_value,
            params.label_key.as_deref().unwrap_or("label"),
            params.value_key.as_deref().unwrap_or("value"),
        );
        let default = params.default.as_ref().map(|e| expr::resolve(e, &scope));

        let request = InputRequest::Select {
            name: params.name.clone(),
            message: message.clone(),
            options: options.clone(),
            default: default.clone(),
        };
        let value = self.await_input(&params.name, &message, request, default).await?;

        let label = options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.clone())
            .unwrap_or_else(|| display(&value));

        ctx.push_context(format!("User selected \"{label}\" for \"{message}\""));
        self.finish_input(&mut ctx, &params.name, value);
        Ok(ctx)
    }

    async fn run_confirm(
        &self,
        params: &ConfirmParams,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowContext, FolioError> {
        let scope = ctx.scope();
        let message = expr::interpolate(&params.message, &scope);
        let default = params
            .default
            .as_ref()
            .map(|e| Value::Bool(truthy(&expr::resolve(e, &scope))));

        let request = InputRequest::Confirm {
            name: params.name.clone(),
            message: message.clone(),
            default: default.as_ref().map(truthy),
        };
        let value = self.await_input(&params.name, &message, request, default).await?;
        let confirmed = truthy(&value);

        ctx.push_context(format!(
            "User confirmed \"{message}\": {}",
            if confirmed { "yes" } else { "no" }
        ));
        self.finish_input(&mut ctx, &params.name, Value::Bool(confirmed));
        Ok(ctx)
    }

    /// Emit the request event, then suspend on the resolver; with no
    /// resolver wired this is the headless path resolving from defaults
    async fn await_input(
        &self,
        name: &str,
        message: &str,
        request: InputRequest,
        default: Option<Value>,
    ) -> Result<Value, FolioError> {
        let node_name: Arc<str> = Arc::from(name);
        self.sink.emit(EventKind::InputRequested {
            name: Arc::clone(&node_name),
            message: message.to_string(),
        });

        let value = match &self.resolver {
            Some(resolver) => resolver
                .resolve(request)
                .await
                .map_err(|e| FolioError::Execution(format!("Input resolution failed: {e}")))?,
            None => default
                .filter(|v| !v.is_null())
                .ok_or_else(|| FolioError::MissingInput { name: name.to_string() })?,
        };

        self.sink.emit(EventKind::InputResolved {
            name: node_name,
            value: value.clone(),
        });
        Ok(value)
    }

    fn finish_input(&self, ctx: &mut WorkflowContext, name: &str, value: Value) {
        ctx.set_output(name, value.clone());
        self.emit_output(&Arc::from(name), &value);
    }

    fn build_request(
        &self,
        prompt: String,
        params: &GenerationParams,
        scope: &Scope,
    ) -> StreamRequest {
        let model_spec = self.model_spec(params.model.as_ref(), scope);
        let (_, model) = split_model(&model_spec);
        let mut request = StreamRequest::new(prompt, model);
        request.temperature = params
            .temperature
            .as_ref()
            .and_then(|e| as_number(&expr::resolve(e, scope)))
            .map(|n| n as f32);
        request.max_tokens = params
            .max_tokens
            .as_ref()
            .and_then(|e| as_number(&expr::resolve(e, scope)))
            .map(|n| n as u32);
        request.stop = params
            .stop
            .as_ref()
            .map(|e| match expr::resolve(e, scope) {
                Value::Array(items) => items.iter().map(display).collect(),
                Value::String(s) => vec![s],
                _ => Vec::new(),
            })
            .unwrap_or_default();
        request
    }

    /// Model precedence: run-level override > node prop > env > default
    fn model_spec(&self, node_model: Option<&Expression>, scope: &Scope) -> String {
        if let Some(model) = &self.model_override {
            return model.clone();
        }
        if let Some(expression) = node_model {
            let text = display(&expr::resolve(expression, scope));
            if !text.is_empty() {
                return text;
            }
        }
        std::env::var("FOLIO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
    }

    /// Get or create a cached provider (atomic via DashMap entry API)
    fn provider_for(&self, model_spec: &str) -> Result<Arc<dyn Provider>, FolioError> {
        use dashmap::mapref::entry::Entry;

        let (provider_name, _) = split_model(model_spec);
        match self.providers.entry(provider_name.to_string()) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let provider: Arc<dyn Provider> = Arc::from(
                    create_provider(provider_name)
                        .map_err(|e| FolioError::Provider(e.to_string()))?,
                );
                e.insert(Arc::clone(&provider));
                Ok(provider)
            }
        }
    }

    /// Stream one LLM call, forwarding deltas to the event sink
    async fn stream_llm(
        &self,
        name: &Arc<str>,
        provider: Arc<dyn Provider>,
        request: StreamRequest,
    ) -> Result<String, FolioError> {
        let (tx, mut rx) = mpsc::channel::<StreamChunk>(64);
        let sink = Arc::clone(&self.sink);
        let chunk_name = Arc::clone(name);
        let forwarder = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if let StreamChunk::Delta(delta) = chunk {
                    sink.emit(EventKind::GenerationChunk {
                        name: Arc::clone(&chunk_name),
                        delta,
                    });
                }
            }
        });

        let result = provider
            .stream(request, tx)
            .await
            .map_err(|e| FolioError::Provider(e.to_string()));
        let _ = forwarder.await;
        result
    }

    fn emit_output(&self, name: &Arc<str>, output: &Value) {
        self.sink.emit(EventKind::NodeOutput {
            name: Arc::clone(name),
            output: output.clone(),
        });
    }
}

/// Numeric coercion for props that may arrive as static strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Put a shadowed binding back, or clear it if there was none
fn restore_binding(ctx: &mut WorkflowContext, name: &str, prior: Option<Value>) {
    match prior {
        Some(value) => ctx.set_output(name, value),
        None => {
            ctx.remove_output(name);
        }
    }
}
