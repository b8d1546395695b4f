//! Agent withdrawal routes

use super::{created, ApiResponse, ApiResult};
use crate::extractors::ApiJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use campus_core::{
    CampusError, Retrait, RetraitFilter, RetraitInput, RetraitStat, RetraitStatutInput,
};
use tracing::warn;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(search))
        .route("/add", post(create))
        .route("/:reference/status", patch(update_statut))
        .route("/agent/:agent_id", get(stats))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RetraitInput>,
) -> ApiResult<(StatusCode, ApiResponse<Retrait>)> {
    let retrait = state.retraits.create(input).await?;
    Ok(created(
        ApiResponse::ok(retrait).with_message("Retrait créé avec succès"),
    ))
}

/// Lookup by type and reference, both mandatory.
async fn search(
    State(state): State<AppState>,
    ApiJson(filter): ApiJson<RetraitFilter>,
) -> ApiResult<ApiResponse<Vec<Retrait>>> {
    if filter.retrait_type.is_none() || filter.reference.is_none() {
        warn!("Withdrawal search without type or reference");
        return Err(CampusError::validation("Le type et la référence sont requis").into());
    }
    Ok(ApiResponse::list(state.retraits.list(&filter).await?))
}

async fn update_statut(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    ApiJson(input): ApiJson<RetraitStatutInput>,
) -> ApiResult<ApiResponse<Retrait>> {
    let retrait = state
        .retraits
        .update_statut(&reference, input.statut)
        .await?;
    Ok(ApiResponse::ok(retrait))
}

async fn stats(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<RetraitStat>>> {
    Ok(ApiResponse::list(state.retraits.stats(&agent_id).await?))
}
