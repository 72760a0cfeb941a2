//! Execution events
//!
//! The executor's sole observability channel: an ordered stream of typed
//! events consumed by a UI or CLI layer through the `EventSink` trait.
//! `EventLog` is the standard sink - a thread-safe, append-only log with
//! monotonic ids and run-relative timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since run start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All event types (3 levels: run / node / fine-grained)
///
/// Uses Arc<str> for node names to enable zero-cost cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        workflow: String,
        node_count: usize,
    },
    RunCompleted {
        outputs: Value,
        duration_ms: u64,
    },
    RunFailed {
        error: String,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    NodeStarted {
        name: Arc<str>,
        kind: String,
    },
    /// Final named output recorded for a node
    NodeOutput {
        name: Arc<str>,
        output: Value,
    },
    GenerationChunk {
        name: Arc<str>,
        delta: String,
    },
    GenerationCompleted {
        name: Arc<str>,
        output_len: usize,
    },
    ToolStarted {
        name: Arc<str>,
        tool: String,
        input: Value,
    },
    ToolCompleted {
        name: Arc<str>,
        tool: String,
        output_len: usize,
    },
    LoopStarted {
        name: Arc<str>,
        total: usize,
    },
    LoopIteration {
        name: Arc<str>,
        index: usize,
    },
    LoopCompleted {
        name: Arc<str>,
        iterations: usize,
    },
    BranchEvaluated {
        condition: String,
        result: bool,
    },
    VariableSet {
        name: Arc<str>,
        value: Value,
    },
    LogMessage {
        message: String,
    },
    FlowStarted {
        name: Arc<str>,
        src: String,
    },
    FlowCompleted {
        name: Arc<str>,
    },

    // ═══════════════════════════════════════════
    // HUMAN INPUT
    // ═══════════════════════════════════════════
    InputRequested {
        name: Arc<str>,
        message: String,
    },
    InputResolved {
        name: Arc<str>,
        value: Value,
    },
}

impl EventKind {
    /// Extract the node name if the event is node-scoped
    pub fn node_name(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { name, .. }
            | Self::NodeOutput { name, .. }
            | Self::GenerationChunk { name, .. }
            | Self::GenerationCompleted { name, .. }
            | Self::ToolStarted { name, .. }
            | Self::ToolCompleted { name, .. }
            | Self::LoopStarted { name, .. }
            | Self::LoopIteration { name, .. }
            | Self::LoopCompleted { name, .. }
            | Self::VariableSet { name, .. }
            | Self::FlowStarted { name, .. }
            | Self::FlowCompleted { name }
            | Self::InputRequested { name, .. }
            | Self::InputResolved { name, .. } => Some(name),
            Self::RunStarted { .. }
            | Self::RunCompleted { .. }
            | Self::RunFailed { .. }
            | Self::BranchEvaluated { .. }
            | Self::LogMessage { .. } => None,
        }
    }

    /// Check if this is a run-level event
    pub fn is_run_event(&self) -> bool {
        matches!(
            self,
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. }
        )
    }
}

/// Where the executor sends its events
pub trait EventSink: Send + Sync {
    /// Emit an event and return its ID
    fn emit(&self, kind: EventKind) -> u64;
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at run start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by node name
    pub fn filter_node(&self, name: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.node_name() == Some(name))
            .collect()
    }

    /// Filter run-level events only
    pub fn run_events(&self) -> Vec<Event> {
        self.events().into_iter().filter(|e| e.kind.is_run_event()).collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };
        self.events.write().push(event);
        id
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

/// No-op sink for tests and headless embedding
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _kind: EventKind) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_name_extraction() {
        let started = EventKind::NodeStarted { name: "draft".into(), kind: "generation".into() };
        assert_eq!(started.node_name(), Some("draft"));

        let run = EventKind::RunStarted { workflow: "demo".into(), node_count: 5 };
        assert_eq!(run.node_name(), None);
    }

    #[test]
    fn emit_returns_monotonic_ids() {
        let log = EventLog::new();
        let id1 = log.emit(EventKind::RunStarted { workflow: "w".into(), node_count: 1 });
        let id2 = log.emit(EventKind::LogMessage { message: "hi".into() });
        assert_eq!(id1, 0);
        assert_eq!(id2, 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn serializes_with_type_tag() {
        let kind = EventKind::VariableSet { name: "count".into(), value: json!(3) };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "variable_set");
        assert_eq!(json["name"], "count");
        assert_eq!(json["value"], 3);
    }

    #[test]
    fn filter_node_returns_only_matching() {
        let log = EventLog::new();
        log.emit(EventKind::NodeStarted { name: "alpha".into(), kind: "generation".into() });
        log.emit(EventKind::NodeStarted { name: "beta".into(), kind: "set".into() });
        log.emit(EventKind::NodeOutput { name: "alpha".into(), output: json!("done") });

        assert_eq!(log.filter_node("alpha").len(), 2);
        assert_eq!(log.filter_node("beta").len(), 1);
    }

    #[test]
    fn run_events_filtered() {
        let log = EventLog::new();
        log.emit(EventKind::RunStarted { workflow: "w".into(), node_count: 1 });
        log.emit(EventKind::LogMessage { message: "m".into() });
        log.emit(EventKind::RunCompleted { outputs: json!({}), duration_ms: 10 });
        assert_eq!(log.run_events().len(), 2);
    }

    #[test]
    fn cloned_log_shares_storage() {
        let log = EventLog::new();
        let cloned = log.clone();
        log.emit(EventKind::LogMessage { message: "m".into() });
        assert_eq!(cloned.len(), 1);
    }

    #[test]
    fn concurrent_emits_get_unique_ids() {
        use std::thread;

        let log = EventLog::new();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let log = log.clone();
                thread::spawn(move || {
                    log.emit(EventKind::LogMessage { message: format!("m{i}") })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut ids: Vec<u64> = log.events().iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}
