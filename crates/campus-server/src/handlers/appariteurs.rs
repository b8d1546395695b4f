//! Section clerk routes

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
    AppariteurInput, AppariteurView, InscriptionInput, RetraitAppariteurInput, SouscriptionInput,
    ValidationInput,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/agent/:agent_id", get(by_agent))
        .route("/:id", get(get_one))
        .route("/:id/inscriptions", post(add_inscription))
        .route(
            "/:id/inscriptions/:inscription_id/souscriptions",
            post(add_souscription),
        )
        .route(
            "/:id/inscriptions/:inscription_id/souscriptions/:souscription_id",
            patch(update_souscription),
        )
        .route("/:id/retraits", post(make_retrait))
        .route("/:id/retraits/:retrait_id", patch(update_retrait))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AppariteurInput>,
) -> ApiResult<(StatusCode, ApiResponse<AppariteurView>)> {
    let appariteur = state.appariteurs.create(input).await?;
    Ok(created(ApiResponse::ok(appariteur.into())))
}

async fn list(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<AppariteurView>>> {
    Ok(ApiResponse::list(state.appariteurs.list().await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<AppariteurView>> {
    Ok(ApiResponse::ok(state.appariteurs.get(&id).await?))
}

async fn by_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<AppariteurView>>> {
    Ok(ApiResponse::list(state.appariteurs.by_agent(&agent_id).await?))
}

async fn add_inscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<InscriptionInput>,
) -> ApiResult<(StatusCode, ApiResponse<AppariteurView>)> {
    let appariteur = state.appariteurs.add_inscription(&id, input).await?;
    Ok(created(ApiResponse::ok(appariteur.into())))
}

async fn add_souscription(
    State(state): State<AppState>,
    Path((id, inscription_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<SouscriptionInput>,
) -> ApiResult<(StatusCode, ApiResponse<AppariteurView>)> {
    let appariteur = state
        .appariteurs
        .add_souscription(&id, &inscription_id, input)
        .await?;
    Ok(created(ApiResponse::ok(appariteur.into())))
}

async fn update_souscription(
    State(state): State<AppState>,
    Path((id, inscription_id, souscription_id)): Path<(String, String, String)>,
    ApiJson(input): ApiJson<ValidationInput>,
) -> ApiResult<ApiResponse<AppariteurView>> {
    let appariteur = state
        .appariteurs
        .update_souscription(&id, &inscription_id, &souscription_id, input.statut)
        .await?;
    Ok(ApiResponse::ok(appariteur.into()))
}

async fn make_retrait(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<RetraitAppariteurInput>,
) -> ApiResult<(StatusCode, ApiResponse<AppariteurView>)> {
    let appariteur = state.appariteurs.make_retrait(&id, input).await?;
    Ok(created(ApiResponse::ok(appariteur.into())))
}

async fn update_retrait(
    State(state): State<AppState>,
    Path((id, retrait_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<ValidationInput>,
) -> ApiResult<ApiResponse<AppariteurView>> {
    let appariteur = state
        .appariteurs
        .update_retrait(&id, &retrait_id, input.statut, input.order_number.as_deref())
        .await?;
    Ok(ApiResponse::ok(appariteur.into()))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::call;
    use crate::{app, AppState};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn id(v: &Value) -> String {
        v["data"]["_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_clerk_earns_and_pays_out() {
        let app = app(AppState::for_tests().await);

        let (_, agent) = call(
            &app,
            "POST",
            "/api/agents/create",
            Some(json!({"nom": "Ilunga", "matricule": "AG-003"})),
        )
        .await;
        let (_, section) = call(
            &app,
            "POST",
            "/api/sections/create",
            Some(json!({"titre": "Génie civil", "url": "gc", "email": "gc@inbtp.cd"})),
        )
        .await;
        let (_, annee) = call(
            &app,
            "POST",
            "/api/annees",
            Some(json!({"slogan": "Excellence", "debut": 2024, "fin": 2025})),
        )
        .await;
        let (_, promotion) = call(
            &app,
            "POST",
            "/api/promotions",
            Some(json!({"sectionId": id(&section), "niveau": "L1", "mention": "GC"})),
        )
        .await;
        let (_, etudiant) = call(
            &app,
            "POST",
            "/api/etudiants",
            Some(json!({
                "infoPerso": {"nom": "Kabila", "postNom": "Mutombo"},
                "infoSec": {"etudiantId": "2024001"}
            })),
        )
        .await;

        let clerk = json!({"agentId": id(&agent), "anneeId": id(&annee), "sectionId": id(&section)});
        let (status, body) = call(&app, "POST", "/api/appariteurs", Some(clerk.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let clerk_id = id(&body);
        let (status, _) = call(&app, "POST", "/api/appariteurs", Some(clerk)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/appariteurs/{}/inscriptions", clerk_id),
            Some(json!({"titre": "Inscription L1", "montant": 20.0, "promotionId": id(&promotion)})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let inscription_id = body["data"]["inscriptions"][0]["_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/appariteurs/{}/inscriptions/{}/souscriptions", clerk_id, inscription_id),
            Some(json!({"etudiantId": id(&etudiant)})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let souscription_id = body["data"]["inscriptions"][0]["souscriptions"][0]["_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, body) = call(
            &app,
            "PATCH",
            &format!(
                "/api/appariteurs/{}/inscriptions/{}/souscriptions/{}",
                clerk_id, inscription_id, souscription_id
            ),
            Some(json!({"statut": "OK"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], 20.0);
        assert_eq!(body["data"]["revenus"], 20.0);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/appariteurs/{}/retraits", clerk_id),
            Some(json!({"montant": 50.0, "telephone": "243810000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/appariteurs/{}/retraits", clerk_id),
            Some(json!({"montant": 15.0, "telephone": "243810000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["balance"], 5.0);

        let (_, listed) = call(&app, "GET", "/api/appariteurs", None).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["data"][0]["totalRetraits"], 1);
        assert!(listed["data"][0]["retraits"].as_array().unwrap().is_empty());
    }
}
