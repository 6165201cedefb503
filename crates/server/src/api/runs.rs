//! # Runs API
//!
//! Starts pipeline runs and streams their lifecycle events.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use boardroom_core::report::Report;
use boardroom_core::state::{RunHistory, WeightVector};
use boardroom_core::swarm::{Controller, PipelineEvent};
use boardroom_core::workers::{AttributedResult, Task};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use utoipa::ToSchema;

use super::{ApiError, ApiResult, SharedState};
use crate::config::Settings;

/// Interval without events after which a heartbeat comment is sent
const HEARTBEAT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunRequest {
    /// The business problem to analyze
    pub problem: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunResponse {
    /// Id of the stored history entry
    pub history_id: String,
    #[schema(value_type = Vec<Object>)]
    pub tasks: Vec<Task>,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<AttributedResult>,
    #[schema(value_type = Object)]
    pub report: Report,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_run))
        .route("/events", get(run_events))
}

/// Run the pipeline on a problem
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "runs",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run finished and stored in history", body = RunResponse),
        (status = 400, description = "Empty problem or invalid settings", body = super::ErrorResponse),
        (status = 503, description = "Generation backend unavailable", body = super::ErrorResponse)
    )
)]
pub async fn create_run(
    State(state): State<SharedState>,
    Json(req): Json<RunRequest>,
) -> ApiResult<RunResponse> {
    let problem = req.problem.trim();
    if problem.is_empty() {
        return Err(ApiError::BadRequest("problem must not be empty".to_string()));
    }

    let settings = Settings::load_from(&state.config_path).await;
    let config = settings
        .controller_config()
        .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    let weights = state.with_store(WeightVector::load).await?;

    // Bridge the run's channel onto the broadcast every SSE client reads
    let (tx, mut rx) = mpsc::unbounded_channel::<PipelineEvent>();
    let event_tx = state.event_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let _ = event_tx.send(event);
        }
    });

    tracing::info!("Starting run: {}", problem);
    let mut controller = Controller::new(config)
        .with_weights(weights)
        .with_event_channel(tx);
    let outcome = controller.run(problem).await?;

    let query = problem.to_string();
    let report = outcome.report.clone();
    let entry = state
        .with_store(move |store| RunHistory::new(store).append(&query, &report))
        .await?;

    Ok(Json(RunResponse {
        history_id: entry.id,
        tasks: outcome.tasks,
        results: outcome.results,
        report: outcome.report,
    }))
}

/// SSE endpoint for run events with heartbeat
pub async fn run_events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().event(event.name()).data(json)), rx))
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!("SSE subscriber lagged, skipped {} events", skipped);
                Some((Ok(Event::default().comment(format!("skipped {}", skipped))), rx))
            }
            Ok(Err(RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
