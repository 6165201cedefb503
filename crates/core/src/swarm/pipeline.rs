//! # Pipeline Stages
//!
//! Stages of a single run.
//!
//! ```text
//! Idle → Decomposing → Dispatching → Synthesizing → Done
//!   └──────────────────── Failed ◄───────────────────┘ (abandoned run)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    /// Not started
    #[default]
    Idle,
    /// Coordinator splitting the problem into tasks
    Decomposing,
    /// Specialists answering their tasks
    Dispatching,
    /// Coordinator merging the results
    Synthesizing,
    /// Report produced
    Done,
    /// Run abandoned before a report
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "IDLE",
            PipelineStage::Decomposing => "DECOMPOSING",
            PipelineStage::Dispatching => "DISPATCHING",
            PipelineStage::Synthesizing => "SYNTHESIZING",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline state machine
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stage: PipelineStage,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Advance to the next stage; terminal stages stay put
    pub fn advance(&mut self) -> PipelineStage {
        self.stage = match self.stage {
            PipelineStage::Idle => PipelineStage::Decomposing,
            PipelineStage::Decomposing => PipelineStage::Dispatching,
            PipelineStage::Dispatching => PipelineStage::Synthesizing,
            PipelineStage::Synthesizing => PipelineStage::Done,
            PipelineStage::Done => PipelineStage::Done,
            PipelineStage::Failed => PipelineStage::Failed,
        };
        tracing::debug!("Pipeline stage: {}", self.stage);
        self.stage
    }

    /// Abandon the run
    pub fn fail(&mut self) {
        self.stage = PipelineStage::Failed;
    }

    /// Check if pipeline reached a terminal stage
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, PipelineStage::Done | PipelineStage::Failed)
    }

    /// Check if pipeline produced a report
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Done
    }
}
