//! Folio CLI - document-driven workflow runner

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Map, Value};

use folio::error::{FixSuggestion, FolioError};
use folio::event::{Event, EventKind, EventLog, EventSink};
use folio::executor::inputs::{InputRequest, InputResolver};
use folio::executor::Executor;
use folio::expr::display;
use folio::{parse, validate};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio - document-driven workflow engine for AI tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a workflow document
    Check {
        /// Path to the workflow document
        file: PathBuf,
    },

    /// Run a workflow document
    Run {
        /// Path to the workflow document
        file: PathBuf,

        /// Input value as name=value (repeatable, overrides --inputs-file)
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// JSON file with an object of input values
        #[arg(long)]
        inputs_file: Option<PathBuf>,

        /// Override the model for every generation (provider/model)
        #[arg(short, long)]
        model: Option<String>,

        /// Output format for the final result
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,

        /// Resolve prompts from declared defaults instead of stdin
        #[arg(long)]
        non_interactive: bool,

        /// Log diagnostic events to stderr
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Json,
    Yaml,
    /// Stream every execution event as one JSON object per line
    Ndjson,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Run { file, inputs, inputs_file, model, format, non_interactive, verbose } => {
            run(&file, inputs, inputs_file, model, format, non_interactive, verbose).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(e.exit_code());
    }
}

fn check(file: &Path) -> Result<(), FolioError> {
    let source = std::fs::read_to_string(file)?;
    let def = parse(&source)?;
    let errors = validate(&def, file.parent());

    if !errors.is_empty() {
        eprintln!("{} {} is invalid:", "✗".red(), file.display());
        for error in &errors {
            eprintln!("  {} {}", "•".red(), error);
        }
        return Err(FolioError::Validation(errors.len()));
    }

    println!("{} {} is valid", "✓".green(), file.display());
    if !def.name.is_empty() {
        println!("  Name: {}", def.name);
    }
    println!("  Inputs: {}", def.inputs.len());
    println!("  Nodes: {}", def.nodes.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run(
    file: &Path,
    input_flags: Vec<String>,
    inputs_file: Option<PathBuf>,
    model: Option<String>,
    format: Format,
    non_interactive: bool,
    verbose: bool,
) -> Result<(), FolioError> {
    let source = tokio::fs::read_to_string(file).await?;
    let def = parse(&source)?;

    let errors = validate(&def, file.parent());
    if !errors.is_empty() {
        eprintln!("{} {} is invalid:", "✗".red(), file.display());
        for error in &errors {
            eprintln!("  {} {}", "•".red(), error);
        }
        return Err(FolioError::Validation(errors.len()));
    }

    // Precedence: CLI flag > inputs file > declared default
    let mut inputs = Map::new();
    if let Some(path) = inputs_file {
        let text = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => inputs.extend(map),
            _ => {
                return Err(FolioError::Execution(format!(
                    "Inputs file '{}' must contain a JSON object",
                    path.display()
                )))
            }
        }
    }
    for flag in &input_flags {
        let Some((name, raw)) = flag.split_once('=') else {
            return Err(FolioError::Execution(format!(
                "Invalid --input '{flag}' (expected name=value)"
            )));
        };
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        inputs.insert(name.to_string(), value);
    }

    let base = file.parent().unwrap_or(Path::new(".")).to_path_buf();
    let log = EventLog::new();
    let sink: Arc<dyn EventSink> = match format {
        Format::Ndjson => Arc::new(NdjsonSink::new()),
        _ => Arc::new(log.clone()),
    };

    let mut executor = Executor::new(inputs)
        .with_base_path(base)
        .with_sink(sink)
        .with_verbose(verbose);
    if let Some(model) = model {
        executor = executor.with_model(model);
    }
    if !non_interactive {
        executor = executor.with_resolver(Arc::new(StdinResolver));
    }

    let outputs = executor.execute(&def).await?;

    match format {
        Format::Pretty => {
            if verbose {
                for event in log.events() {
                    if let EventKind::LogMessage { message } = event.kind {
                        eprintln!("{} {message}", "log:".dimmed());
                    }
                }
            }
            if !outputs.is_empty() {
                println!("{}", "Outputs:".cyan().bold());
                for (name, value) in &outputs {
                    println!("  {}: {}", name.cyan(), display(value));
                }
            }
        }
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&Value::Object(outputs))?)
        }
        Format::Yaml => {
            let yaml = serde_yaml::to_string(&Value::Object(outputs))
                .map_err(|e| FolioError::Execution(e.to_string()))?;
            print!("{yaml}");
        }
        Format::Ndjson => {}
    }
    Ok(())
}

/// Sink that streams every event to stdout as one JSON line
struct NdjsonSink {
    start: Instant,
    next_id: AtomicU64,
}

impl NdjsonSink {
    fn new() -> Self {
        Self { start: Instant::now(), next_id: AtomicU64::new(0) }
    }
}

impl EventSink for NdjsonSink {
    fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start.elapsed().as_millis() as u64,
            kind,
        };
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
        id
    }
}

/// Interactive resolver reading answers from stdin
struct StdinResolver;

#[async_trait]
impl InputResolver for StdinResolver {
    async fn resolve(&self, request: InputRequest) -> Result<Value> {
        tokio::task::spawn_blocking(move || resolve_blocking(request)).await?
    }
}

fn resolve_blocking(request: InputRequest) -> Result<Value> {
    match request {
        InputRequest::Text { message, default, numeric, .. } => {
            match &default {
                Some(d) => eprint!("{} {message} [{d}]: ", "?".cyan()),
                None => eprint!("{} {message}: ", "?".cyan()),
            }
            let line = read_line()?;
            let answer = if line.is_empty() {
                default.unwrap_or_default()
            } else {
                line
            };
            if numeric {
                if let Ok(n) = answer.parse::<f64>() {
                    return Ok(serde_json::json!(n));
                }
            }
            Ok(Value::String(answer))
        }
        InputRequest::Select { message, options, default, .. } => {
            eprintln!("{} {message}", "?".cyan());
            for (i, option) in options.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, option.label);
            }
            eprint!("Choice [1-{}]: ", options.len());
            let line = read_line()?;
            if line.is_empty() {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            let choice: usize = line.parse().unwrap_or(1);
            let index = choice.saturating_sub(1).min(options.len().saturating_sub(1));
            options
                .get(index)
                .map(|option| option.value.clone())
                .ok_or_else(|| anyhow::anyhow!("No options to select from"))
        }
        InputRequest::Confirm { message, default, .. } => {
            let hint = match default {
                Some(true) => "[Y/n]",
                Some(false) => "[y/N]",
                None => "[y/n]",
            };
            eprint!("{} {message} {hint}: ", "?".cyan());
            let line = read_line()?.to_lowercase();
            let answer = match line.as_str() {
                "" => default.unwrap_or(false),
                "y" | "yes" => true,
                _ => false,
            };
            Ok(Value::Bool(answer))
        }
    }
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
