//! # Boardroom Models
//!
//! Centralized generation-backend configuration for the Boardroom system.
//! Workers never pick a backend themselves; the controller builds one from
//! a [`ModelConfig`] and shares it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{gemini, GeminiBackend, GeminiConfig, GenerationBackend, ScriptedBackend};

/// Supported generation backends
///
/// - Scripted - deterministic demo responder, no credentials
/// - Gemini (Google) - `GEMINI_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    #[default]
    Scripted,
    Gemini,
}

impl BackendProvider {
    /// Get all available providers
    pub fn all() -> Vec<BackendProvider> {
        vec![BackendProvider::Scripted, BackendProvider::Gemini]
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendProvider::Scripted => "Scripted",
            BackendProvider::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the provider's credential, if any
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            BackendProvider::Scripted => None,
            BackendProvider::Gemini => Some(gemini::API_KEY_ENV),
        }
    }

    /// Parse a provider name as typed in settings or on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "scripted" | "mock" => Some(BackendProvider::Scripted),
            "gemini" => Some(BackendProvider::Gemini),
            _ => None,
        }
    }

    /// Gemini when a key is configured in the environment, scripted otherwise
    pub fn detect() -> Self {
        match std::env::var(gemini::API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => BackendProvider::Gemini,
            _ => BackendProvider::Scripted,
        }
    }
}

/// Configuration for backend selection
///
/// ## Example
/// ```rust,ignore
/// use boardroom_core::models::{BackendProvider, ModelConfig};
///
/// // Offline demo
/// let config = ModelConfig::default();
///
/// // Live Gemini
/// let config = ModelConfig::with_provider(BackendProvider::Gemini, "gemini-1.5-flash");
/// let backend = config.create_backend();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend provider to use
    #[serde(default)]
    pub provider: BackendProvider,
    /// Model name (e.g., "gemini-1.5-flash"); ignored by the scripted backend
    pub model: String,
    /// Optional endpoint override for the live backend
    #[serde(default)]
    pub base_url: Option<String>,
    /// Explicit credential; falls back to the provider's environment variable
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Simulated thinking time of the scripted backend
    #[serde(default)]
    pub scripted_latency_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: BackendProvider::Scripted,
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            api_key: None,
            scripted_latency_ms: 0,
        }
    }
}

impl ModelConfig {
    /// Create config for a specific provider
    pub fn with_provider(provider: BackendProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set endpoint URL (for proxies or regional endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the credential explicitly instead of reading the environment
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Create the backend for the configured provider
    ///
    /// Missing credentials are not an error here; the controller checks
    /// `ensure_ready` before a run and fails it with `BackendUnavailable`.
    pub fn create_backend(&self) -> Arc<dyn GenerationBackend> {
        match self.provider {
            BackendProvider::Scripted => Arc::new(
                ScriptedBackend::demo()
                    .with_latency(Duration::from_millis(self.scripted_latency_ms)),
            ),
            BackendProvider::Gemini => {
                let mut config = GeminiConfig {
                    api_key: self
                        .api_key
                        .clone()
                        .or_else(|| std::env::var(gemini::API_KEY_ENV).ok()),
                    model: self.model.clone(),
                    ..GeminiConfig::default()
                };
                if let Some(base_url) = &self.base_url {
                    config.endpoint = base_url.clone();
                }
                Arc::new(GeminiBackend::new(config))
            }
        }
    }
}
