//! Staff routes

use super::{created, ApiResponse, ApiResult, ImportRequest};
use crate::extractors::{ApiJson, ApiQuery};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use campus_core::{Agent, AgentInput, AgentQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/create", post(create))
        .route("/import", post(import))
        .route("/:id", get(get_one).put(update).delete(remove))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AgentInput>,
) -> ApiResult<(StatusCode, ApiResponse<Agent>)> {
    let agent = state.agents.create(input).await?;
    Ok(created(ApiResponse::ok(agent).with_message("Agent créé avec succès")))
}

async fn import(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Vec<Agent>>)> {
    let agents = state.agents.import(&request.file_name()?).await?;
    let message = format!("{} agents importés avec succès", agents.len());
    Ok(created(ApiResponse::list(agents).with_message(message)))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AgentQuery>,
) -> ApiResult<ApiResponse<Vec<Agent>>> {
    Ok(ApiResponse::list(state.agents.list(&query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Agent>> {
    Ok(ApiResponse::ok(state.agents.get(&id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<AgentInput>,
) -> ApiResult<ApiResponse<Agent>> {
    let agent = state.agents.update(&id, input).await?;
    Ok(ApiResponse::ok(agent).with_message("Agent mis à jour avec succès"))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Agent>> {
    let agent = state.agents.delete(&id).await?;
    Ok(ApiResponse::ok(agent).with_message("Agent supprimé avec succès"))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::call;
    use crate::{app, AppState};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_agent_lifecycle() {
        let app = app(AppState::for_tests().await);
        let agent = json!({
            "nom": "Mukendi",
            "matricule": "AG-001",
            "email": "mukendi@inbtp.cd",
            "typeAgent": "enseignant"
        });

        let (status, body) = call(&app, "POST", "/api/agents/create", Some(agent.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "POST", "/api/agents/create", Some(agent)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) = call(&app, "GET", "/api/agents?search=AG-001", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (status, _) = call(&app, "DELETE", &format!("/api/agents/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", &format!("/api/agents/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_import_requires_a_file_name() {
        let app = app(AppState::for_tests().await);
        let (status, body) = call(&app, "POST", "/api/agents/import", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Nom du fichier requis");
    }

    #[tokio::test]
    async fn test_search_matches_accented_names() {
        let app = app(AppState::for_tests().await);
        for (nom, matricule) in [("Éloko", "AG-010"), ("Mbuyi", "AG-011")] {
            let (status, _) = call(
                &app,
                "POST",
                "/api/agents/create",
                Some(json!({"nom": nom, "matricule": matricule})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        // "élo" and "ÉLO", percent-encoded
        for search in ["%C3%A9lo", "%C3%89LO"] {
            let (status, body) =
                call(&app, "GET", &format!("/api/agents?search={}", search), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["count"], 1);
        }
    }
}
