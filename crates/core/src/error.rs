//! # Error Taxonomy
//!
//! Only [`PipelineError`] ever leaves a run. [`MalformedResponse`] is raised
//! while parsing backend payloads and is always recovered by the worker that
//! made the call.

use thiserror::Error;

/// Run-level failures surfaced to the caller of `Controller::run`
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The live backend is missing its credential or configuration
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The controller was asked to run from a stage other than idle
    #[error("pipeline cannot start from stage {0}")]
    InvalidState(String),
}

/// A backend payload that could not be read as the expected JSON contract
#[derive(Debug, Error)]
#[error("malformed {expected} response: {reason}")]
pub struct MalformedResponse {
    pub expected: &'static str,
    pub reason: String,
}

impl MalformedResponse {
    pub fn new(expected: &'static str, reason: impl Into<String>) -> Self {
        Self {
            expected,
            reason: reason.into(),
        }
    }
}
