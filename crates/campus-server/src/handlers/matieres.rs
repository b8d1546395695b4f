//! Subject routes and teaching assignments

use super::{created, ApiResponse, ApiResult, ImportRequest};
use crate::extractors::ApiJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use campus_core::{ChargeHoraire, ChargeHoraireInput, Matiere, MatiereInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/import", post(import))
        .route("/unite/:code", get(by_unite))
        .route("/promotion/:promotion_id", get(by_promotion))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/charges", get(list_charges).post(add_charge))
        .route(
            "/:id/charges/:charge_id",
            put(update_charge).delete(remove_charge),
        )
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<MatiereInput>,
) -> ApiResult<(StatusCode, ApiResponse<Matiere>)> {
    let matiere = state.matieres.create(input).await?;
    Ok(created(ApiResponse::ok(matiere)))
}

async fn import(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Vec<Matiere>>)> {
    let matieres = state.matieres.import(&request.file_name()?).await?;
    let message = format!("{} matières importées avec succès", matieres.len());
    Ok(created(ApiResponse::list(matieres).with_message(message)))
}

async fn list(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Matiere>>> {
    Ok(ApiResponse::list(state.matieres.list().await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Matiere>> {
    Ok(ApiResponse::ok(state.matieres.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<MatiereInput>,
) -> ApiResult<ApiResponse<Matiere>> {
    Ok(ApiResponse::ok(state.matieres.update(&id, input).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Matiere>> {
    let matiere = state.matieres.delete(&id).await?;
    Ok(ApiResponse::ok(matiere).with_message("Matière supprimée avec succès"))
}

async fn add_charge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ChargeHoraireInput>,
) -> ApiResult<(StatusCode, ApiResponse<Matiere>)> {
    let matiere = state.matieres.add_charge(&id, input).await?;
    Ok(created(ApiResponse::ok(matiere)))
}

async fn list_charges(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Vec<ChargeHoraire>>> {
    Ok(ApiResponse::list(state.matieres.list_charges(&id).await?))
}

async fn update_charge(
    State(state): State<AppState>,
    Path((id, charge_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<ChargeHoraireInput>,
) -> ApiResult<ApiResponse<Matiere>> {
    Ok(ApiResponse::ok(
        state.matieres.update_charge(&id, &charge_id, input).await?,
    ))
}

async fn remove_charge(
    State(state): State<AppState>,
    Path((id, charge_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<Matiere>> {
    Ok(ApiResponse::ok(
        state.matieres.delete_charge(&id, &charge_id).await?,
    ))
}

async fn by_unite(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<ApiResponse<Vec<Matiere>>> {
    Ok(ApiResponse::list(state.matieres.by_unite(&code).await?))
}

async fn by_promotion(
    State(state): State<AppState>,
    Path(promotion_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<Matiere>>> {
    Ok(ApiResponse::list(
        state.matieres.by_promotion(&promotion_id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::call;
    use crate::{app, AppState};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_subjects_by_unit() {
        let app = app(AppState::for_tests().await);

        let (status, body) = call(
            &app,
            "POST",
            "/api/matieres",
            Some(json!({"designation": "Analyse", "credit": 0, "codeUnite": "MATH1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = call(
            &app,
            "POST",
            "/api/matieres",
            Some(json!({"designation": "Analyse", "credit": 4, "codeUnite": "MATH1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&app, "GET", "/api/matieres/unite/MATH1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["designation"], "Analyse");
    }
}
