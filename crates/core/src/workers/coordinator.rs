//! # Coordinator Worker
//!
//! Splits a problem into tasks for the registered specialists and merges
//! their results into the final report. Neither operation fails: bad
//! payloads degrade to an empty task list or a degraded report.

use std::sync::Arc;

use serde_json::Value;

use super::prompts;
use super::types::{AttributedResult, Task};
use super::WorkerProfile;
use crate::backend::json::parse_json;
use crate::backend::GenerationBackend;
use crate::report::Report;
use crate::state::weights::WeightVector;

pub struct Coordinator {
    profile: WorkerProfile,
    backend: Arc<dyn GenerationBackend>,
    catalog: Vec<WorkerProfile>,
}

impl Coordinator {
    pub fn new(backend: Arc<dyn GenerationBackend>, catalog: Vec<WorkerProfile>) -> Self {
        Self {
            profile: WorkerProfile::coordinator(),
            backend,
            catalog,
        }
    }

    pub fn profile(&self) -> &WorkerProfile {
        &self.profile
    }

    pub fn catalog(&self) -> &[WorkerProfile] {
        &self.catalog
    }

    /// Ask the backend for a task list
    ///
    /// Anything but a JSON array yields no tasks. Array elements that are not
    /// tasks are dropped one by one. Ids are not checked against the catalog
    /// here; dispatch drops tasks for unknown workers.
    #[tracing::instrument(skip(self, problem), fields(worker = %self.profile.id))]
    pub async fn decompose(&self, problem: &str) -> Vec<Task> {
        let system = prompts::decompose_system(&self.profile, &self.catalog);
        let raw = self
            .backend
            .generate(&prompts::problem_line(problem), &system)
            .await;

        let items = match parse_json::<Value>(&raw, "task list") {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                tracing::warn!(
                    "Decomposition returned a JSON {} instead of an array, no tasks dispatched",
                    json_kind(&other)
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("{}, no tasks dispatched", e);
                return Vec::new();
            }
        };

        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value::<Task>(item) {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::warn!("Dropping invalid task #{}: {}", index, e);
                    None
                }
            })
            .collect()
    }

    /// Merge every settled result into one report
    ///
    /// Results are sorted by worker id then task so arrival order never
    /// changes the request. Weights are passed to the backend as advice.
    #[tracing::instrument(skip_all, fields(worker = %self.profile.id))]
    pub async fn synthesize(
        &self,
        problem: &str,
        results: &[Option<AttributedResult>],
        weights: &WeightVector,
    ) -> Report {
        let mut settled: Vec<&AttributedResult> = results.iter().flatten().collect();
        settled.sort_by(|a, b| (&a.worker_id, &a.task).cmp(&(&b.worker_id, &b.task)));
        tracing::debug!("Synthesizing {} analyst results", settled.len());

        let ids = self.catalog.iter().map(|p| p.id.as_str());
        let system = prompts::synthesize_system(&self.profile, &weights.entries_for(ids));
        let reports = serde_json::to_string_pretty(&settled).unwrap_or_else(|_| "[]".to_string());

        let raw = self
            .backend
            .generate(&prompts::synthesize_prompt(problem, &reports), &system)
            .await;
        Report::from_backend(&raw)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::workers::default_roster;
    use crate::workers::prompts::{DECOMPOSE_MODE, SYNTHESIZE_MODE};
    use crate::workers::types::{Priority, WorkerResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt and answers with a fixed payload
    struct Recorder {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn generate(&self, prompt: &str, _system_prompt: &str) -> String {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn coordinator(backend: ScriptedBackend) -> Coordinator {
        Coordinator::new(Arc::new(backend), default_roster())
    }

    fn attributed(worker: &str, task: &str, confidence: u8) -> Option<AttributedResult> {
        Some(AttributedResult {
            worker_id: worker.to_string(),
            task: task.to_string(),
            result: WorkerResult {
                confidence,
                ..WorkerResult::degraded(&format!("{} view", worker))
            },
        })
    }

    #[tokio::test]
    async fn test_decompose_parses_fenced_array() {
        let backend = ScriptedBackend::new().on(
            DECOMPOSE_MODE,
            "```json\n[{\"agentId\": \"finance\", \"task\": \"Audit P&L\", \"priority\": \"HIGH\"},\
             {\"agentId\": \"ops\", \"task\": \"Check logistics\"}]\n```",
        );
        let tasks = coordinator(backend).decompose("Margins fell").await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0], Task::new("finance", "Audit P&L", Priority::High));
        assert_eq!(tasks[1].priority, Priority::Medium);
    }

    #[tokio::test]
    async fn test_decompose_malformed_is_empty() {
        let backend = ScriptedBackend::new().on(DECOMPOSE_MODE, "Sure! Here are some tasks.");
        assert!(coordinator(backend).decompose("anything").await.is_empty());

        let backend = ScriptedBackend::new().on(DECOMPOSE_MODE, "{\"agentId\": \"finance\"}");
        assert!(coordinator(backend).decompose("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_decompose_drops_invalid_elements() {
        let backend = ScriptedBackend::new().on(
            DECOMPOSE_MODE,
            "[{\"agentId\": \"hr\", \"task\": \"Review churn\"}, 42, {\"task\": \"orphan\"}]",
        );
        let tasks = coordinator(backend).decompose("Attrition").await;
        assert_eq!(tasks, vec![Task::new("hr", "Review churn", Priority::Medium)]);
    }

    #[tokio::test]
    async fn test_synthesize_degrades_for_any_result_count() {
        let coordinator = coordinator(ScriptedBackend::new().on(SYNTHESIZE_MODE, "not a report"));
        let weights = WeightVector::default();

        let empty = coordinator.synthesize("p", &[], &weights).await;
        assert_eq!(empty.overall_confidence, 50);
        assert_eq!(empty.executive_summary, vec!["not a report".to_string()]);

        let results = vec![attributed("finance", "a", 92), None, attributed("ops", "b", 10)];
        let report = coordinator.synthesize("p", &results, &weights).await;
        assert_eq!(report.overall_confidence, 50);
        assert!(!report.executive_summary.is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_request_ignores_arrival_order() {
        let backend = Arc::new(Recorder {
            reply: "{}".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let coordinator = Coordinator::new(backend.clone(), default_roster());
        let weights = WeightVector::default();

        let forward = vec![attributed("finance", "a", 92), attributed("ops", "b", 10), None];
        let backward = vec![None, attributed("ops", "b", 10), attributed("finance", "a", 92)];
        coordinator.synthesize("p", &forward, &weights).await;
        coordinator.synthesize("p", &backward, &weights).await;

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert!(prompts[0].find("finance view") < prompts[0].find("ops view"));
    }
}
