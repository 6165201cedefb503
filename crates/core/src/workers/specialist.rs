//! # Specialist Worker
//!
//! One domain analyst. Each `execute` makes exactly one backend call that
//! races a fixed deadline; the first to settle wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::prompts;
use super::types::WorkerResult;
use super::WorkerProfile;
use crate::backend::GenerationBackend;
use crate::memory::ContextSnapshot;

/// Default per-call deadline in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

pub struct Specialist {
    profile: WorkerProfile,
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl Specialist {
    pub fn new(profile: WorkerProfile, backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self {
            profile,
            backend,
            timeout,
        }
    }

    pub fn profile(&self) -> &WorkerProfile {
        &self.profile
    }

    /// Analyze one task against a frozen view of the shared context
    ///
    /// Resolves within the deadline. The backend call runs on its own task
    /// and is not aborted when the deadline wins; it notices the closed
    /// channel and drops its response.
    #[tracing::instrument(skip_all, fields(worker = %self.profile.id))]
    pub async fn execute(&self, task: &str, context: &ContextSnapshot) -> WorkerResult {
        let system = prompts::analyst_system(&self.profile);
        let prompt = prompts::analyst_prompt(context.problem(), task, &context.to_json());

        let (tx, rx) = oneshot::channel::<String>();
        let backend = self.backend.clone();
        let worker = self.profile.id.clone();
        tokio::spawn(async move {
            let raw = backend.generate(&prompt, &system).await;
            if tx.is_closed() {
                tracing::debug!(worker = %worker, "Discarding late analyst response");
                return;
            }
            let _ = tx.send(raw);
        });

        tokio::select! {
            received = rx => match received {
                Ok(raw) => WorkerResult::parse(&raw),
                Err(_) => {
                    tracing::error!("Analyst call ended without a response");
                    WorkerResult::degraded("Analyst call ended without a response.")
                }
            },
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!(
                    "Analyst exceeded {}ms, using fallback result",
                    self.timeout.as_millis()
                );
                WorkerResult::timeout_fallback()
            }
        }
    }
}
