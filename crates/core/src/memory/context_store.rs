//! Append-only trace plus a map of published facts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workers::WorkerResult;

/// Fact key holding the problem statement of the run
pub const PROBLEM_KEY: &str = "problem";

/// Fact key under which a worker's result is published
pub fn analysis_key(worker_id: &str) -> String {
    format!("{}_analysis", worker_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceAction {
    Think,
    Plan,
    Result,
    Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub worker_id: String,
    pub action: TraceAction,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct ContextStore {
    trace: Vec<TraceEntry>,
    facts: BTreeMap<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trace entry stamped with the current time
    pub fn record(&mut self, worker_id: &str, action: TraceAction, content: impl Into<String>) {
        let entry = TraceEntry {
            timestamp: Utc::now(),
            worker_id: worker_id.to_string(),
            action,
            content: content.into(),
        };
        tracing::debug!(worker = %entry.worker_id, action = ?entry.action, "{}", entry.content);
        self.trace.push(entry);
    }

    /// Set a fact, replacing any previous value under `key`
    pub fn publish(&mut self, key: impl Into<String>, value: Value) {
        self.facts.insert(key.into(), value);
    }

    /// Publish a result under `<worker_id>_analysis`
    ///
    /// A later result from the same worker replaces the earlier one.
    pub fn publish_analysis(&mut self, worker_id: &str, result: &WorkerResult) {
        match serde_json::to_value(result) {
            Ok(value) => self.publish(analysis_key(worker_id), value),
            Err(e) => tracing::error!("Could not publish analysis of '{}': {}", worker_id, e),
        }
    }

    pub fn fact(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    /// The published result of `worker_id`, if any
    pub fn analysis(&self, worker_id: &str) -> Option<WorkerResult> {
        self.fact(&analysis_key(worker_id))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Frozen copy of the current facts
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot(Arc::new(self.facts.clone()))
    }
}

/// Read-only view of the facts at the time it was taken
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot(Arc<BTreeMap<String, Value>>);

impl ContextSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn problem(&self) -> Option<&str> {
        self.get(PROBLEM_KEY).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Facts as a JSON object string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self.0.as_ref()).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_is_ordered_and_append_only() {
        let mut store = ContextStore::new();
        store.record("manager", TraceAction::Plan, "3 tasks");
        store.record("finance", TraceAction::Think, "Auditing");
        store.record("finance", TraceAction::Result, "Margins down");

        let trace = store.trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].action, TraceAction::Plan);
        assert_eq!(trace[2].content, "Margins down");
        assert!(trace[0].timestamp <= trace[2].timestamp);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut store = ContextStore::new();
        store.publish(PROBLEM_KEY, json!("Margins fell"));
        let snapshot = store.snapshot();

        store.publish_analysis("finance", &WorkerResult::degraded("late"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.problem(), Some("Margins fell"));
        assert!(snapshot.get("finance_analysis").is_none());
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_publish_analysis_replaces() {
        let mut store = ContextStore::new();
        store.publish_analysis("ops", &WorkerResult::degraded("first"));
        store.publish_analysis("ops", &WorkerResult::timeout_fallback());

        let stored = store.analysis("ops").unwrap();
        assert!(stored.is_timeout());
        assert_eq!(store.fact("ops_analysis").unwrap()["confidence"], 10);
    }

    #[test]
    fn test_snapshot_json() {
        let mut store = ContextStore::new();
        assert_eq!(store.snapshot().to_json(), "{}");
        store.publish("region", json!("EMEA"));
        let parsed: Value = serde_json::from_str(&store.snapshot().to_json()).unwrap();
        assert_eq!(parsed, json!({ "region": "EMEA" }));
    }
}
