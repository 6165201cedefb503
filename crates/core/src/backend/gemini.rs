//! # Gemini Backend
//!
//! Live backend calling Google's Generative Language `generateContent`
//! endpoint. Transport and API failures are logged and turned into a
//! degraded JSON payload so that `generate` never fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::json::strip_code_fences;
use super::GenerationBackend;
use crate::error::PipelineError;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Payload returned when the live call fails for any reason
const DEGRADED_PAYLOAD: &str = r#"{"error": "Failed to generate insight."}"#;

/// Gemini backend configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key; `None` or blank makes the backend unavailable
    pub api_key: Option<String>,
    /// Model name (e.g., "gemini-1.5-flash")
    pub model: String,
    /// Base endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
enum GeminiError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Live network-backed responder
pub struct GeminiBackend {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client, config }
    }

    /// Build a backend for `model`, reading the key from `GEMINI_API_KEY`
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::new(GeminiConfig {
            api_key: std::env::var(API_KEY_ENV).ok(),
            model: model.into(),
            ..GeminiConfig::default()
        })
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Endpoint of the model; the key travels in a header so it never shows up in errors
    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.model
        )
    }

    async fn request(&self, prompt: &str, system_prompt: &str) -> Result<String, GeminiError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: format!("{}\n\nPlease output ONLY JSON where applicable.", prompt),
                }],
            }],
            system_instruction: (!system_prompt.is_empty()).then(|| GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: system_prompt.to_string(),
                }],
            }),
        };

        let response = self
            .client
            .post(self.build_url())
            .header(API_KEY_HEADER, self.api_key().unwrap_or_default())
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(GeminiError::Response(format!("HTTP {}: {}", status, text)));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| GeminiError::Serialization(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(GeminiError::Response(error.message));
        }

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GeminiError::Response("No content in response".to_string()))
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, system_prompt: &str) -> String {
        match self.request(prompt, system_prompt).await {
            Ok(text) => strip_code_fences(&text),
            Err(e) => {
                tracing::error!(model = %self.config.model, "Gemini request failed: {}", e);
                DEGRADED_PAYLOAD.to_string()
            }
        }
    }

    fn ensure_ready(&self) -> Result<(), PipelineError> {
        match self.api_key() {
            Some(_) => Ok(()),
            None => Err(PipelineError::BackendUnavailable(format!(
                "{} is not set",
                API_KEY_ENV
            ))),
        }
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
