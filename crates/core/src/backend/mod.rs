//! # Generation Backends
//!
//! The external text/JSON-producing service used by every worker.
//!
//! ```text
//! Worker ──prompt + system prompt──▶ GenerationBackend ──▶ String
//!                                      ├── ScriptedBackend (deterministic)
//!                                      └── GeminiBackend   (live, HTTPS)
//! ```
//!
//! `generate` never fails: transport problems come back as a degraded
//! payload and callers validate the text against their own JSON contract.

pub mod gemini;
pub mod json;
pub mod scripted;

use async_trait::async_trait;

use crate::error::PipelineError;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use scripted::{ScriptRule, ScriptedBackend};

/// Contract shared by the scripted and live backends
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Produce free text (usually JSON) for a prompt within a role context
    async fn generate(&self, prompt: &str, system_prompt: &str) -> String;

    /// Check that the backend has the credentials it needs to serve a run
    fn ensure_ready(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}
