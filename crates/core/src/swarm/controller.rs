//! # Pipeline Controller
//!
//! Drives one run from problem to report: decompose, dispatch every task
//! concurrently under its own deadline, wait for all of them, synthesize.
//! The controller is the only writer of the shared context.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::backend::GenerationBackend;
use crate::error::PipelineError;
use crate::memory::context_store::PROBLEM_KEY;
use crate::memory::{ContextStore, TraceAction, TraceEntry};
use crate::models::ModelConfig;
use crate::report::Report;
use crate::state::WeightVector;
use crate::workers::specialist::DEFAULT_TIMEOUT_MS;
use crate::workers::{
    default_roster, AttributedResult, Task, Worker, WorkerProfile, WorkerRegistry, COORDINATOR_ID,
};

use super::events::{PipelineEvent, PipelineEventKind};
use super::pipeline::{Pipeline, PipelineStage};

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Configuration for the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Backend selection shared by every worker
    #[serde(default)]
    pub model: ModelConfig,
    /// Deadline of each specialist call
    #[serde(default = "default_timeout_ms")]
    pub specialist_timeout_ms: u64,
    /// Specialists available to decomposition
    #[serde(default = "default_roster")]
    pub roster: Vec<WorkerProfile>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            specialist_timeout_ms: DEFAULT_TIMEOUT_MS,
            roster: default_roster(),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub problem: String,
    pub tasks: Vec<Task>,
    /// Results in the order they settled
    pub results: Vec<AttributedResult>,
    pub report: Report,
    pub events: Vec<PipelineEvent>,
    pub trace: Vec<TraceEntry>,
}

/// The pipeline controller
pub struct Controller {
    config: ControllerConfig,
    backend: Arc<dyn GenerationBackend>,
    registry: WorkerRegistry,
    weights: WeightVector,
    pipeline: Pipeline,
    store: ContextStore,
    events: Vec<PipelineEvent>,
    event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl Controller {
    /// Create a controller using the backend named by `config.model`
    pub fn new(config: ControllerConfig) -> Self {
        let backend = config.model.create_backend();
        Self::with_backend(config, backend)
    }

    /// Create a controller around an existing backend
    pub fn with_backend(config: ControllerConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        let registry = WorkerRegistry::new(
            backend.clone(),
            &config.roster,
            Duration::from_millis(config.specialist_timeout_ms),
        );
        let ids: Vec<String> = registry.workers().iter().map(|w| w.id().to_string()).collect();
        tracing::debug!(workers = ?ids, "Registered workers");
        Self {
            config,
            backend,
            registry,
            weights: WeightVector::default(),
            pipeline: Pipeline::new(),
            store: ContextStore::new(),
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Weights handed to synthesis
    pub fn with_weights(mut self, weights: WeightVector) -> Self {
        self.weights = weights;
        self
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.pipeline.stage()
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Emit an event
    fn emit(&mut self, kind: PipelineEventKind) {
        let event = PipelineEvent::new(self.events.len() as u64, kind);
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            // A dropped receiver only means nobody is listening any more
            let _ = tx.send(event);
        }
    }

    fn status(&mut self, message: impl Into<String>) {
        self.emit(PipelineEventKind::Status {
            message: message.into(),
        });
    }

    /// Run the pipeline on `problem`
    ///
    /// A controller runs once. Only a backend that is not ready fails the
    /// run; every worker-level problem degrades into the report instead.
    #[tracing::instrument(skip(self), fields(problem_preview = %problem.chars().take(50).collect::<String>()))]
    pub async fn run(&mut self, problem: &str) -> Result<RunOutcome, PipelineError> {
        if self.pipeline.stage() != PipelineStage::Idle {
            return Err(PipelineError::InvalidState(self.pipeline.stage().to_string()));
        }

        if let Err(e) = self.backend.ensure_ready() {
            tracing::error!("Run abandoned: {}", e);
            self.pipeline.fail();
            self.status(format!("[SYSTEM] Run aborted: {}", e));
            return Err(e);
        }

        self.status("[SYSTEM] Initializing analysis protocol...");
        self.store.publish(PROBLEM_KEY, Value::String(problem.to_string()));

        // Decompose
        self.pipeline.advance();
        let coordinator = self.registry.coordinator();
        let tasks = coordinator.decompose(problem).await;
        self.store.record(
            COORDINATOR_ID,
            TraceAction::Plan,
            format!("Decomposed problem into {} tasks", tasks.len()),
        );
        self.emit(PipelineEventKind::TaskDecomposed {
            tasks: tasks.clone(),
        });
        self.status(format!(
            "[MANAGER] Problem decomposed into {} sub-routines.",
            tasks.len()
        ));

        // Dispatch
        self.pipeline.advance();
        let snapshot = self.store.snapshot();
        let mut results: Vec<Option<AttributedResult>> = Vec::with_capacity(tasks.len());
        let mut pending = FuturesUnordered::new();

        for task in &tasks {
            let specialist = match self.registry.worker(&task.worker_id) {
                Some(Worker::Specialist(specialist)) => specialist,
                Some(worker @ Worker::Coordinator(_)) => {
                    tracing::warn!(
                        "Dropping task addressed to {} '{}': {}",
                        worker.kind(),
                        worker.id(),
                        task.description
                    );
                    results.push(None);
                    continue;
                }
                None => {
                    tracing::warn!(
                        "Dropping task for unknown worker '{}': {}",
                        task.worker_id,
                        task.description
                    );
                    results.push(None);
                    continue;
                }
            };

            self.status(format!(
                "[PROVISIONING] Spawning {} analyst...",
                task.worker_id.to_uppercase()
            ));
            self.emit(PipelineEventKind::AgentThinking {
                worker_id: task.worker_id.clone(),
                note: format!("Working on: {}", task.description),
            });
            self.store
                .record(&task.worker_id, TraceAction::Think, task.description.clone());

            let snapshot = snapshot.clone();
            let task = task.clone();
            pending.push(async move {
                let result = specialist.execute(&task.description, &snapshot).await;
                (task, result)
            });
        }

        while let Some((task, result)) = pending.next().await {
            self.store
                .record(&task.worker_id, TraceAction::Result, result.analysis.clone());
            self.store.publish_analysis(&task.worker_id, &result);
            self.emit(PipelineEventKind::AgentResult {
                worker_id: task.worker_id.clone(),
                task: task.description.clone(),
                result: result.clone(),
            });
            self.status(format!(
                "[{}] Analysis complete.",
                task.worker_id.to_uppercase()
            ));
            results.push(Some(AttributedResult {
                worker_id: task.worker_id,
                task: task.description,
                result,
            }));
        }

        // Synthesize
        self.pipeline.advance();
        self.status("[MANAGER] Aggregating intelligence layers...");
        let report = coordinator.synthesize(problem, &results, &self.weights).await;
        self.store.record(
            COORDINATOR_ID,
            TraceAction::Decision,
            report.executive_summary.first().cloned().unwrap_or_default(),
        );
        self.emit(PipelineEventKind::FinalDecision {
            report: report.clone(),
        });
        self.status("[SYSTEM] Strategic consensus ready.");
        self.pipeline.advance();

        tracing::info!(
            tasks = tasks.len(),
            confidence = report.overall_confidence,
            "Run complete"
        );

        Ok(RunOutcome {
            problem: problem.to_string(),
            tasks,
            results: results.into_iter().flatten().collect(),
            report,
            events: self.events.clone(),
            trace: self.store.trace().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::models::BackendProvider;
    use crate::workers::prompts::{analyze_mode, DECOMPOSE_MODE, SYNTHESIZE_MODE};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const REPORT: &str = r#"{
        "overall_confidence": 81,
        "executive_summary": ["Cut vendor costs first."],
        "department_insights": {"Finance": "Costs up", "Ops": "Delays"},
        "recommended_action_plan": {"Short_Term": "Renegotiate", "Long_Term": "Integrate"}
    }"#;

    /// Wraps a backend and keeps every synthesis request
    struct Recording {
        inner: ScriptedBackend,
        synthesis_prompts: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(inner: ScriptedBackend) -> Arc<Self> {
            Arc::new(Self {
                inner,
                synthesis_prompts: Mutex::new(Vec::new()),
            })
        }

        fn synthesis_prompts(&self) -> Vec<String> {
            self.synthesis_prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn generate(&self, prompt: &str, system_prompt: &str) -> String {
            if system_prompt.contains(SYNTHESIZE_MODE) {
                self.synthesis_prompts.lock().unwrap().push(prompt.to_string());
            }
            self.inner.generate(prompt, system_prompt).await
        }
    }

    fn controller(backend: Arc<dyn GenerationBackend>) -> Controller {
        Controller::with_backend(ControllerConfig::default(), backend)
    }

    fn names(events: &[PipelineEvent]) -> Vec<&'static str> {
        events
            .iter()
            .filter(|e| !e.is_status())
            .map(PipelineEvent::name)
            .collect()
    }

    #[tokio::test]
    async fn test_demo_run() {
        let mut controller = Controller::new(ControllerConfig::default());
        let outcome = controller
            .run("Our profit margin dropped 8% this quarter")
            .await
            .unwrap();

        assert_eq!(controller.stage(), PipelineStage::Done);
        assert_eq!(outcome.tasks.len(), 3);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.report.overall_confidence, 87);
        assert_eq!(
            names(&outcome.events),
            vec![
                "task_decomposed",
                "agent_thinking",
                "agent_thinking",
                "agent_thinking",
                "agent_result",
                "agent_result",
                "agent_result",
                "final_decision",
            ]
        );
        assert!(outcome.events.windows(2).all(|w| w[0].seq + 1 == w[1].seq));

        for task in &outcome.tasks {
            assert!(controller.store().analysis(&task.worker_id).is_some());
        }
        assert_eq!(outcome.trace.first().unwrap().action, TraceAction::Plan);
        assert_eq!(outcome.trace.last().unwrap().action, TraceAction::Decision);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_fast_and_one_timed_out_specialist() {
        let backend = Recording::new(
            ScriptedBackend::new()
                .on(
                    DECOMPOSE_MODE,
                    r#"[{"agentId": "finance", "task": "Audit costs", "priority": "HIGH"},
                        {"agentId": "ops", "task": "Check delays", "priority": "MEDIUM"}]"#,
                )
                .on_delayed(
                    analyze_mode("finance"),
                    r#"{"analysis": "Vendor costs up 15%", "confidence": 92}"#,
                    Duration::from_millis(100),
                )
                .on_delayed(
                    analyze_mode("ops"),
                    r#"{"analysis": "Never arrives", "confidence": 99}"#,
                    Duration::from_secs(30),
                )
                .on(SYNTHESIZE_MODE, REPORT),
        );

        let start = Instant::now();
        let mut controller = controller(backend.clone());
        let outcome = controller.run("Margins are falling").await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
        assert_eq!(outcome.results.len(), 2);

        // The fast result settles first
        assert_eq!(outcome.results[0].worker_id, "finance");
        assert_eq!(outcome.results[0].result.confidence, 92);
        assert_eq!(outcome.results[1].worker_id, "ops");
        assert!(outcome.results[1].result.is_timeout());
        assert_eq!(outcome.results[1].result.confidence, 10);

        let prompts = backend.synthesis_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Vendor costs up 15%"));
        assert!(prompts[0].contains("TIMEOUT"));
        assert!(!prompts[0].contains("Never arrives"));
        assert_eq!(outcome.report.overall_confidence, 81);
    }

    #[tokio::test]
    async fn test_empty_decomposition_still_synthesizes() {
        let backend = ScriptedBackend::new().on(DECOMPOSE_MODE, "[]");
        let mut controller = controller(Arc::new(backend));
        let outcome = controller.run("Anything").await.unwrap();

        assert!(outcome.tasks.is_empty());
        assert!(outcome.results.is_empty());
        assert!(!outcome.report.executive_summary.is_empty());
        assert_eq!(outcome.report.overall_confidence, 50);
        assert_eq!(names(&outcome.events), vec!["task_decomposed", "final_decision"]);
    }

    #[tokio::test]
    async fn test_malformed_decomposition_dispatches_nothing() {
        let backend = ScriptedBackend::new()
            .on(DECOMPOSE_MODE, "I would start with finance.")
            .on(SYNTHESIZE_MODE, REPORT);
        let mut controller = controller(Arc::new(backend));
        let outcome = controller.run("Anything").await.unwrap();

        assert!(outcome.tasks.is_empty());
        assert_eq!(outcome.report.overall_confidence, 81);
    }

    #[tokio::test]
    async fn test_unknown_workers_are_dropped() {
        let backend = ScriptedBackend::new()
            .on(
                DECOMPOSE_MODE,
                r#"[{"agentId": "legal", "task": "Review contracts"},
                    {"agentId": "hr", "task": "Review churn"}]"#,
            )
            .on(analyze_mode("hr"), r#"{"analysis": "Churn is high", "confidence": 70}"#)
            .on(SYNTHESIZE_MODE, REPORT);
        let mut controller = controller(Arc::new(backend));
        let outcome = controller.run("Attrition").await.unwrap();

        assert_eq!(outcome.tasks.len(), 2);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].worker_id, "hr");
        assert!(controller.store().analysis("legal").is_none());
    }

    #[tokio::test]
    async fn test_sales_analyst_is_dispatched() {
        let backend = ScriptedBackend::new()
            .on(
                DECOMPOSE_MODE,
                r#"[{"agentId": "sales", "task": "Review the pipeline", "priority": "HIGH"}]"#,
            )
            .on(analyze_mode("sales"), r#"{"analysis": "Win rate fell to 18%", "confidence": 74}"#)
            .on(SYNTHESIZE_MODE, REPORT);
        let mut controller = controller(Arc::new(backend));
        let outcome = controller.run("Bookings are flat").await.unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].worker_id, "sales");
        assert_eq!(outcome.results[0].result.confidence, 74);
        assert!(controller.store().analysis("sales").is_some());
    }

    #[tokio::test]
    async fn test_tasks_for_the_coordinator_are_dropped() {
        let backend = ScriptedBackend::new()
            .on(
                DECOMPOSE_MODE,
                r#"[{"agentId": "manager", "task": "Decide everything"},
                    {"agentId": "ops", "task": "Check delays"}]"#,
            )
            .on(analyze_mode("ops"), r#"{"analysis": "Delays are seasonal", "confidence": 65}"#)
            .on(SYNTHESIZE_MODE, REPORT);
        let mut controller = controller(Arc::new(backend));
        let outcome = controller.run("Late shipments").await.unwrap();

        assert_eq!(outcome.tasks.len(), 2);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].worker_id, "ops");
        assert_eq!(
            names(&outcome.events),
            vec!["task_decomposed", "agent_thinking", "agent_result", "final_decision"]
        );
    }

    async fn run_with_tasks(tasks: &str) -> RunOutcome {
        let backend = ScriptedBackend::new()
            .on(DECOMPOSE_MODE, tasks)
            .on_delayed(
                analyze_mode("finance"),
                r#"{"analysis": "F", "confidence": 90}"#,
                Duration::from_millis(30),
            )
            .on_delayed(
                analyze_mode("market"),
                r#"{"analysis": "M", "confidence": 60}"#,
                Duration::from_millis(10),
            )
            .on(analyze_mode("ops"), r#"{"analysis": "O", "confidence": 75}"#)
            .on(SYNTHESIZE_MODE, REPORT);
        controller(Arc::new(backend)).run("Margins").await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_order_does_not_change_results() {
        let forward = run_with_tasks(
            r#"[{"agentId": "finance", "task": "a"}, {"agentId": "market", "task": "b"}, {"agentId": "ops", "task": "c"}]"#,
        )
        .await;
        let backward = run_with_tasks(
            r#"[{"agentId": "ops", "task": "c"}, {"agentId": "market", "task": "b"}, {"agentId": "finance", "task": "a"}]"#,
        )
        .await;

        let by_worker = |outcome: &RunOutcome| {
            let mut pairs: Vec<(String, u8)> = outcome
                .results
                .iter()
                .map(|r| (r.worker_id.clone(), r.result.confidence))
                .collect();
            pairs.sort();
            pairs
        };
        assert_eq!(by_worker(&forward), by_worker(&backward));
        assert_eq!(
            forward.report.department_insights.keys().collect::<Vec<_>>(),
            backward.report.department_insights.keys().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_the_run() {
        let config = ControllerConfig {
            model: ModelConfig::with_provider(BackendProvider::Gemini, "gemini-1.5-flash")
                .with_api_key(""),
            ..ControllerConfig::default()
        };
        let mut controller = Controller::new(config);

        let err = controller.run("Margins").await.unwrap_err();
        assert!(matches!(err, PipelineError::BackendUnavailable(_)));
        assert_eq!(controller.stage(), PipelineStage::Failed);
        assert!(controller.store().trace().is_empty());
    }

    #[tokio::test]
    async fn test_controller_runs_once() {
        let mut controller = controller(Arc::new(ScriptedBackend::demo()));
        controller.run("Margins").await.unwrap();

        let err = controller.run("Margins again").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(stage) if stage == "DONE"));
    }

    #[tokio::test]
    async fn test_event_channel_mirrors_outcome() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller =
            controller(Arc::new(ScriptedBackend::demo())).with_event_channel(tx);
        let outcome = controller.run("We are hiring too slowly").await.unwrap();

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received, outcome.events);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut controller =
            controller(Arc::new(ScriptedBackend::demo())).with_event_channel(tx);
        let outcome = controller.run("Simulate a price rise").await.unwrap();
        assert!(outcome.report.scenario_comparison.is_some());
    }

    #[test]
    fn test_controller_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.specialist_timeout_ms, 3000);
        assert_eq!(config.roster.len(), 5);

        let parsed: ControllerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.specialist_timeout_ms, 3000);
        assert_eq!(parsed.roster, default_roster());
    }
}
