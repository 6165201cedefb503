//! # History API

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use boardroom_core::report::ConfidenceBand;
use boardroom_core::state::{HistoryEntry, RunHistory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ApiError, ApiResult, SharedState};

/// One history row without its report body
#[derive(Debug, Serialize, ToSchema)]
pub struct HistorySummary {
    pub id: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub overall_confidence: u8,
    #[schema(value_type = String)]
    pub band: ConfidenceBand,
}

impl From<&HistoryEntry> for HistorySummary {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            timestamp: entry.timestamp,
            query: entry.query.clone(),
            overall_confidence: entry.report.overall_confidence,
            band: entry.report.confidence_band(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReplayResponse {
    #[schema(value_type = Object)]
    pub entry: HistoryEntry,
    /// The stored report rendered as text
    pub text: String,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_history))
        .route("/:id", get(get_history))
}

/// List stored runs, newest first
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "history",
    responses(
        (status = 200, description = "Stored runs", body = Vec<HistorySummary>)
    )
)]
pub async fn list_history(State(state): State<SharedState>) -> ApiResult<Vec<HistorySummary>> {
    let entries = state
        .with_store(|store| RunHistory::new(store).list())
        .await?;
    Ok(Json(entries.iter().map(HistorySummary::from).collect()))
}

/// Replay one stored run
#[utoipa::path(
    get,
    path = "/api/v1/history/{id}",
    tag = "history",
    params(
        ("id" = String, Path, description = "History entry id")
    ),
    responses(
        (status = 200, description = "Stored report", body = ReplayResponse),
        (status = 404, description = "No such entry", body = super::ErrorResponse)
    )
)]
pub async fn get_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<ReplayResponse> {
    let lookup = id.clone();
    let entry = state
        .with_store(move |store| RunHistory::new(store).find(&lookup))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No history entry '{}'", id)))?;
    let text = entry.replay();
    Ok(Json(ReplayResponse { entry, text }))
}

#[cfg(test)]
mod tests {
    use super::super::router;
    use super::super::tests::{scripted_state, send};
    use super::*;
    use axum::http::StatusCode;
    use boardroom_core::report::Report;

    #[tokio::test]
    async fn test_list_and_missing_entry() {
        let state = scripted_state("history").await;
        let history = RunHistory::new(state.store.as_ref());
        history.append("first", &Report::degraded("one")).unwrap();
        let newest = history.append("second", &Report::degraded("two")).unwrap();

        let app = router(state.clone());
        let (status, list) = send(&app, "GET", "/api/v1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[0]["id"], newest.id.as_str());
        assert_eq!(list[0]["query"], "second");
        assert!(list[0].get("report").is_none());

        let (status, body) = send(&app, "GET", "/api/v1/history/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No history entry 'nope'");
    }
}
