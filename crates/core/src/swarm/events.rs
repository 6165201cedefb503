//! # Pipeline Events
//!
//! Lifecycle events published while a run progresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::Report;
use crate::workers::{Task, WorkerResult};

/// Kind of pipeline event, with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Decomposition finished with these tasks
    TaskDecomposed { tasks: Vec<Task> },
    /// A specialist received its task
    AgentThinking { worker_id: String, note: String },
    /// A specialist settled, with a real or fallback result
    AgentResult {
        worker_id: String,
        task: String,
        result: WorkerResult,
    },
    /// Synthesis produced the report
    FinalDecision { report: Report },
    /// Human-readable progress line
    Status { message: String },
}

impl PipelineEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEventKind::TaskDecomposed { .. } => "task_decomposed",
            PipelineEventKind::AgentThinking { .. } => "agent_thinking",
            PipelineEventKind::AgentResult { .. } => "agent_result",
            PipelineEventKind::FinalDecision { .. } => "final_decision",
            PipelineEventKind::Status { .. } => "status",
        }
    }
}

/// An event of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Position within the run, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: PipelineEventKind,
}

impl PipelineEvent {
    pub fn new(seq: u64, kind: PipelineEventKind) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_status(&self) -> bool {
        matches!(self.kind, PipelineEventKind::Status { .. })
    }
}
