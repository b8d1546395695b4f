//! Promotion routes and their teaching units

use super::{created, ApiResponse, ApiResult, ImportRequest};
use crate::extractors::ApiJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use campus_core::{Promotion, PromotionInput, Unite, UniteInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/section/:section_id", get(by_section))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/unites", get(list_unites).post(add_unite))
        .route("/:id/unites/import", post(import_unites))
        .route("/:id/unites/:unite_id", put(update_unite).delete(remove_unite))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PromotionInput>,
) -> ApiResult<(StatusCode, ApiResponse<Promotion>)> {
    let promotion = state.promotions.create(input).await?;
    Ok(created(ApiResponse::ok(promotion)))
}

async fn list(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Promotion>>> {
    Ok(ApiResponse::list(state.promotions.list().await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Promotion>> {
    Ok(ApiResponse::ok(state.promotions.get(&id).await?))
}

async fn by_section(
    State(state): State<AppState>,
    Path(section_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<Promotion>>> {
    Ok(ApiResponse::list(
        state.promotions.by_section(&section_id).await?,
    ))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<PromotionInput>,
) -> ApiResult<ApiResponse<Promotion>> {
    Ok(ApiResponse::ok(state.promotions.update(&id, input).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Promotion>> {
    let promotion = state.promotions.delete(&id).await?;
    Ok(ApiResponse::ok(promotion).with_message("Promotion supprimée avec succès"))
}

async fn add_unite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UniteInput>,
) -> ApiResult<(StatusCode, ApiResponse<Promotion>)> {
    let promotion = state.promotions.add_unite(&id, input).await?;
    Ok(created(ApiResponse::ok(promotion)))
}

async fn list_unites(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<Unite>>> {
    Ok(ApiResponse::list(state.promotions.list_unites(&id).await?))
}

async fn update_unite(
    State(state): State<AppState>,
    Path((id, unite_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<UniteInput>,
) -> ApiResult<ApiResponse<Promotion>> {
    Ok(ApiResponse::ok(
        state.promotions.update_unite(&id, &unite_id, input).await?,
    ))
}

async fn remove_unite(
    State(state): State<AppState>,
    Path((id, unite_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<Promotion>> {
    Ok(ApiResponse::ok(
        state.promotions.remove_unite(&id, &unite_id).await?,
    ))
}

async fn import_unites(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Promotion>)> {
    let (count, promotion) = state
        .promotions
        .import_unites(&id, &request.file_name()?)
        .await?;
    let message = format!("{} unités importées avec succès", count);
    Ok(created(ApiResponse::ok(promotion).with_message(message)))
}
