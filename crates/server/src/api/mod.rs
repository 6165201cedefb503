//! # Boardroom HTTP API
//!
//! Axum routes under `/api/v1`. Runs stream their lifecycle events to every
//! SSE subscriber through a broadcast channel.

pub mod history;
pub mod runs;
pub mod settings;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use boardroom_core::state::KeyValueStore;
use boardroom_core::swarm::PipelineEvent;
use boardroom_core::PipelineError;
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use utoipa::{OpenApi, ToSchema};

/// Capacity of the event fan-out; slow subscribers skip what they miss
pub const EVENT_BUFFER: usize = 256;

/// Application state
pub struct AppState {
    /// Weights and history
    pub store: Arc<dyn KeyValueStore>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    /// Location of the persisted settings
    pub config_path: PathBuf,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, config_path: PathBuf) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            event_tx,
            config_path,
        }
    }

    /// Run a store operation on the blocking pool
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn KeyValueStore) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| ApiError::Internal(format!("Store task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

pub type SharedState = Arc<AppState>;

// === Errors ===

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failure of a handler, mapped onto an HTTP status
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// The generation backend cannot serve runs
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::Unavailable(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::BackendUnavailable(_) => ApiError::Unavailable(err.to_string()),
            PipelineError::InvalidState(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(status_code = %status_code, error_message = %self.message(), "Request failed");
        } else {
            tracing::debug!(status_code = %status_code, error_message = %self.message(), "Request rejected");
        }

        let body = ErrorResponse {
            error: self.message().to_string(),
        };
        (status_code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Boardroom API",
        version = "1.0.0",
        description = "API for the Boardroom multi-analyst decision pipeline"
    ),
    paths(
        runs::create_run,
        history::list_history,
        history::get_history,
        settings::get_weights,
        settings::put_weights,
        settings::get_config,
        settings::update_config,
        settings::get_providers
    ),
    components(
        schemas(
            ErrorResponse,
            runs::RunRequest,
            runs::RunResponse,
            history::HistorySummary,
            history::ReplayResponse,
            settings::WeightsBody,
            settings::ConfigResponse,
            settings::ProvidersResponse,
            settings::ProviderInfo,
            crate::config::Settings,
            crate::config::ConfigDefaults
        )
    ),
    tags(
        (name = "runs", description = "Pipeline runs and their events"),
        (name = "history", description = "Stored reports"),
        (name = "weights", description = "Analyst weighting"),
        (name = "config", description = "Configuration management")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
async fn serve_openapi() -> Response {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => ([(header::CONTENT_TYPE, "application/json")], spec).into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1/runs", runs::routes())
        .nest("/api/v1/history", history::routes())
        .route(
            "/api/v1/weights",
            get(settings::get_weights).put(settings::put_weights),
        )
        .route(
            "/api/v1/config",
            get(settings::get_config).patch(settings::update_config),
        )
        .route("/api/v1/providers", get(settings::get_providers))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}

pub async fn run_server(state: SharedState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Boardroom server running at http://{}", addr);
    tracing::info!("Runs:    /api/v1/runs (POST), /api/v1/runs/events (SSE)");
    tracing::info!("History: /api/v1/history, /api/v1/history/:id");
    tracing::info!("Config:  /api/v1/weights (GET, PUT), /api/v1/config (GET, PATCH)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use boardroom_core::state::InMemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// State backed by memory and a scripted settings file unique to `name`
    pub(crate) async fn scripted_state(name: &str) -> SharedState {
        let config_path = std::env::temp_dir()
            .join(format!("boardroom-api-{}-{}", name, std::process::id()))
            .join(crate::config::CONFIG_FILE);
        Settings {
            provider: Some("scripted".to_string()),
            ..Settings::default()
        }
        .save_to(&config_path)
        .await
        .unwrap();
        Arc::new(AppState::new(Arc::new(InMemoryStore::new()), config_path))
    }

    pub(crate) async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[test]
    fn test_error_status_codes() {
        let err: ApiError = PipelineError::BackendUnavailable("no key".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = PipelineError::InvalidState("DONE".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ApiError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "disk full");
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let app = router(scripted_state("openapi").await);
        let (status, body) = send(&app, "GET", "/api/v1/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "Boardroom API");
        assert!(body["paths"]["/api/v1/runs"]["post"].is_object());
        assert!(body["paths"]["/api/v1/history/{id}"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_full_run_then_replay() {
        let state = scripted_state("replay").await;
        let app = router(state.clone());

        let (status, run) = send(
            &app,
            "POST",
            "/api/v1/runs",
            Some(json!({"problem": "Our profit margins dropped 8% this quarter"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["report"]["overall_confidence"], 87);
        assert_eq!(run["tasks"].as_array().unwrap().len(), 3);

        let id = run["history_id"].as_str().unwrap().to_string();
        let (status, list) = send(&app, "GET", "/api/v1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["id"], id.as_str());

        let (status, replay) = send(&app, "GET", &format!("/api/v1/history/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replay["entry"]["report"], run["report"]);
        assert!(replay["text"].as_str().unwrap().contains("87%"));
    }
}
