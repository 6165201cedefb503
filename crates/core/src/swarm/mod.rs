//! # Swarm Orchestration
//!
//! Runs the analyst panel for one problem.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Problem → Coordinator::decompose → [Specialist::execute ∥ ...] → Coordinator::synthesize → Report
//! ```

pub mod controller;
pub mod events;
pub mod pipeline;

pub use controller::{Controller, ControllerConfig, RunOutcome};
pub use events::{PipelineEvent, PipelineEventKind};
pub use pipeline::{Pipeline, PipelineStage};
