//! Section routes, bureau membership included

use super::{created, ApiResponse, ApiResult, ImportRequest};
use crate::extractors::ApiJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use campus_core::{Bureau, BureauInput, Section, SectionInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/create", post(create))
        .route("/import", post(import))
        .route("/agent/:agent_id/sections", get(of_agent))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/bureaux", get(list_bureaux).post(add_bureau))
        .route(
            "/:id/bureaux/:bureau_id",
            put(update_bureau).delete(remove_bureau),
        )
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SectionInput>,
) -> ApiResult<(StatusCode, ApiResponse<Section>)> {
    let section = state.sections.create(input).await?;
    Ok(created(ApiResponse::ok(section)))
}

async fn import(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Vec<Section>>)> {
    let sections = state.sections.import(&request.file_name()?).await?;
    let message = format!("{} sections importées avec succès", sections.len());
    Ok(created(ApiResponse::list(sections).with_message(message)))
}

async fn list(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Section>>> {
    Ok(ApiResponse::list(state.sections.list().await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Section>> {
    Ok(ApiResponse::ok(state.sections.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<SectionInput>,
) -> ApiResult<ApiResponse<Section>> {
    Ok(ApiResponse::ok(state.sections.update(&id, input).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Section>> {
    let section = state.sections.delete(&id).await?;
    Ok(ApiResponse::ok(section).with_message("Section supprimée avec succès"))
}

async fn add_bureau(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<BureauInput>,
) -> ApiResult<(StatusCode, ApiResponse<Section>)> {
    let section = state.sections.add_bureau(&id, input).await?;
    Ok(created(ApiResponse::ok(section)))
}

async fn list_bureaux(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<Bureau>>> {
    Ok(ApiResponse::list(state.sections.list_bureaux(&id).await?))
}

async fn update_bureau(
    State(state): State<AppState>,
    Path((id, bureau_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<BureauInput>,
) -> ApiResult<ApiResponse<Section>> {
    Ok(ApiResponse::ok(
        state.sections.update_bureau(&id, &bureau_id, input).await?,
    ))
}

async fn remove_bureau(
    State(state): State<AppState>,
    Path((id, bureau_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<Section>> {
    Ok(ApiResponse::ok(
        state.sections.remove_bureau(&id, &bureau_id).await?,
    ))
}

async fn of_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<Section>>> {
    Ok(ApiResponse::list(
        state.sections.sections_of_agent(&agent_id).await?,
    ))
}
