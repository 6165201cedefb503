//! # Persisted Settings
//!
//! User settings stored at `.boardroom/config.json` and merged from partial
//! updates. Unset fields fall back to the controller defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use boardroom_core::models::{BackendProvider, ModelConfig};
use boardroom_core::state::io::runtime_file;
use boardroom_core::swarm::ControllerConfig;
use boardroom_core::workers::specialist::DEFAULT_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// File name of the settings inside the runtime directory
pub const CONFIG_FILE: &str = "config.json";

/// Persisted configuration (subset of ControllerConfig exposed to clients)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct Settings {
    /// `scripted` or `gemini`; unset picks Gemini when a key is present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripted_latency_ms: Option<u64>,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        runtime_file(CONFIG_FILE)
    }

    /// Read settings; a missing or unreadable file gives the defaults
    pub async fn load_from(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings at {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write settings: {:?}", path))
    }

    /// Overlay every field set in `other`
    pub fn merge(&mut self, other: Settings) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.specialist_timeout_ms.is_some() {
            self.specialist_timeout_ms = other.specialist_timeout_ms;
        }
        if other.scripted_latency_ms.is_some() {
            self.scripted_latency_ms = other.scripted_latency_ms;
        }
    }

    pub fn provider(&self) -> Result<BackendProvider> {
        match &self.provider {
            Some(name) => BackendProvider::from_name(name)
                .with_context(|| format!("Unknown provider '{}'", name)),
            None => Ok(BackendProvider::detect()),
        }
    }

    /// Controller configuration with these settings applied
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let defaults = ModelConfig::default();
        let mut model = ModelConfig::with_provider(
            self.provider()?,
            self.model.clone().unwrap_or(defaults.model),
        );
        if let Some(url) = &self.base_url {
            model = model.with_base_url(url.clone());
        }
        model.scripted_latency_ms = self.scripted_latency_ms.unwrap_or(0);

        Ok(ControllerConfig {
            model,
            specialist_timeout_ms: self.specialist_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            ..ControllerConfig::default()
        })
    }
}

/// Values used for unset fields
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigDefaults {
    pub provider: &'static str,
    pub model: String,
    pub specialist_timeout_ms: u64,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        let provider = match BackendProvider::detect() {
            BackendProvider::Scripted => "scripted",
            BackendProvider::Gemini => "gemini",
        };
        Self {
            provider,
            model: ModelConfig::default().model,
            specialist_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut settings = Settings {
            provider: Some("gemini".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            ..Settings::default()
        };
        settings.merge(Settings {
            model: Some("gemini-1.5-flash".to_string()),
            specialist_timeout_ms: Some(5000),
            ..Settings::default()
        });

        assert_eq!(settings.provider.as_deref(), Some("gemini"));
        assert_eq!(settings.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(settings.specialist_timeout_ms, Some(5000));
    }

    #[test]
    fn test_controller_config() {
        let settings = Settings {
            provider: Some("mock".to_string()),
            specialist_timeout_ms: Some(1500),
            scripted_latency_ms: Some(200),
            ..Settings::default()
        };
        let config = settings.controller_config().unwrap();
        assert_eq!(config.model.provider, BackendProvider::Scripted);
        assert_eq!(config.model.scripted_latency_ms, 200);
        assert_eq!(config.specialist_timeout_ms, 1500);
        assert_eq!(config.roster.len(), 5);

        let unknown = Settings {
            provider: Some("openai".to_string()),
            ..Settings::default()
        };
        assert!(unknown.controller_config().is_err());
    }

    #[tokio::test]
    async fn test_load_and_save() {
        let path = std::env::temp_dir()
            .join(format!("boardroom-settings-{}", std::process::id()))
            .join(CONFIG_FILE);
        assert_eq!(Settings::load_from(&path).await, Settings::default());

        let settings = Settings {
            provider: Some("scripted".to_string()),
            ..Settings::default()
        };
        settings.save_to(&path).await.unwrap();
        assert_eq!(Settings::load_from(&path).await, settings);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
