//! Student routes

use super::{created, ApiResponse, ApiResult, ImportRequest};
use crate::extractors::{ApiJson, ApiQuery};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use campus_core::{CommandeProduit, Etudiant, EtudiantInput, EtudiantQuery};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/import", post(import))
        .route("/commandes/:promotion_id", get(commandes))
        .route("/:id", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductQuery {
    product: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<EtudiantInput>,
) -> ApiResult<(StatusCode, ApiResponse<Etudiant>)> {
    let etudiant = state.etudiants.create(input).await?;
    Ok(created(
        ApiResponse::ok(etudiant).with_message("Étudiant créé avec succès"),
    ))
}

async fn import(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Vec<Etudiant>>)> {
    let etudiants = state.etudiants.import(&request.file_name()?).await?;
    let message = format!("{} étudiants importés avec succès", etudiants.len());
    Ok(created(ApiResponse::list(etudiants).with_message(message)))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EtudiantQuery>,
) -> ApiResult<ApiResponse<Vec<Etudiant>>> {
    Ok(ApiResponse::list(state.etudiants.list(&query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Etudiant>> {
    Ok(ApiResponse::ok(state.etudiants.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<EtudiantInput>,
) -> ApiResult<ApiResponse<Etudiant>> {
    let etudiant = state.etudiants.update(&id, input).await?;
    Ok(ApiResponse::ok(etudiant).with_message("Étudiant mis à jour avec succès"))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Etudiant>> {
    let etudiant = state.etudiants.delete(&id).await?;
    Ok(ApiResponse::ok(etudiant).with_message("Étudiant supprimé avec succès"))
}

async fn commandes(
    State(state): State<AppState>,
    Path(promotion_id): Path<String>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<ApiResponse<Vec<CommandeProduit>>> {
    let commandes = state
        .etudiants
        .commandes_by_product(&promotion_id, query.product.as_deref())
        .await?;
    Ok(ApiResponse::list(commandes))
}
