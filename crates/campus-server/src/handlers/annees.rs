//! Academic year routes

use super::{created, ApiResponse, ApiResult};
use crate::extractors::ApiJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use campus_core::{Annee, AnneeInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AnneeInput>,
) -> ApiResult<(StatusCode, ApiResponse<Annee>)> {
    let annee = state.annees.create(input).await?;
    Ok(created(ApiResponse::ok(annee)))
}

async fn list(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Annee>>> {
    Ok(ApiResponse::list(state.annees.list().await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Annee>> {
    Ok(ApiResponse::ok(state.annees.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<AnneeInput>,
) -> ApiResult<ApiResponse<Annee>> {
    Ok(ApiResponse::ok(state.annees.update(&id, input).await?))
}
