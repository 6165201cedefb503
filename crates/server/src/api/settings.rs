//! # Settings API
//!
//! Analyst weights, persisted configuration and provider discovery.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use boardroom_core::models::BackendProvider;
use boardroom_core::state::WeightVector;
use boardroom_core::workers::default_roster;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApiError, ApiResult, SharedState};
use crate::config::{ConfigDefaults, Settings};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeightsBody {
    /// Worker id to weight in [0.1, 3.0]
    pub weights: BTreeMap<String, f64>,
}

impl WeightsBody {
    /// Every roster analyst plus any stored extras
    fn of(vector: &WeightVector) -> Self {
        let roster = default_roster();
        let weights = vector
            .entries_for(roster.iter().map(|p| p.id.as_str()))
            .into_iter()
            .collect();
        Self { weights }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: Settings,
    pub defaults: ConfigDefaults,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_var: Option<String>,
    /// Whether a run can start with this provider right now
    pub ready: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

/// Current analyst weights
#[utoipa::path(
    get,
    path = "/api/v1/weights",
    tag = "weights",
    responses(
        (status = 200, description = "Weight per analyst", body = WeightsBody)
    )
)]
pub async fn get_weights(State(state): State<SharedState>) -> ApiResult<WeightsBody> {
    let vector = state.with_store(WeightVector::load).await?;
    Ok(Json(WeightsBody::of(&vector)))
}

/// Update analyst weights; values are clamped
#[utoipa::path(
    put,
    path = "/api/v1/weights",
    tag = "weights",
    request_body = WeightsBody,
    responses(
        (status = 200, description = "Stored weights after clamping", body = WeightsBody)
    )
)]
pub async fn put_weights(
    State(state): State<SharedState>,
    Json(body): Json<WeightsBody>,
) -> ApiResult<WeightsBody> {
    let vector = state
        .with_store(move |store| {
            WeightVector::update(store, |vector| {
                for (id, weight) in body.weights {
                    let stored = vector.set(id.clone(), weight);
                    if stored != weight {
                        tracing::info!("Clamped weight for '{}' from {} to {}", id, weight, stored);
                    }
                }
            })
        })
        .await?;
    Ok(Json(WeightsBody::of(&vector)))
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration and defaults", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let config = Settings::load_from(&state.config_path).await;
    Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    })
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = Settings,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Unknown provider", body = super::ErrorResponse)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(updates): Json<Settings>,
) -> ApiResult<ConfigResponse> {
    let mut config = Settings::load_from(&state.config_path).await;
    config.merge(updates);
    config
        .provider()
        .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;

    config.save_to(&state.config_path).await?;

    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}

/// Get available generation backends
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "config",
    responses(
        (status = 200, description = "Supported generation backends", body = ProvidersResponse)
    )
)]
pub async fn get_providers() -> Json<ProvidersResponse> {
    let providers = BackendProvider::all()
        .into_iter()
        .map(|provider| {
            let env_var = provider.env_var();
            let ready = env_var.map_or(true, |var| {
                std::env::var(var).is_ok_and(|key| !key.trim().is_empty())
            });
            ProviderInfo {
                id: provider.display_name().to_ascii_lowercase(),
                name: provider.display_name().to_string(),
                env_var: env_var.map(str::to_string),
                ready,
            }
        })
        .collect();
    Json(ProvidersResponse { providers })
}
