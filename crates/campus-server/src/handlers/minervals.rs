//! Tuition routes: minervals, tranches, payments and reports

use super::{created, ApiResponse, ApiResult};
use crate::extractors::{ApiJson, ApiQuery};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Router,
};
use campus_core::{
    Minerval, MinervalInput, MinervalQuery, MinervalSummary, MinervalView, Paiement, PaiementInput,
    PaiementStatutInput, PaiementsEtudiant, RapportMinerval, ServerMessage, TrancheInput,
};
use serde::Serialize;
use tracing::debug;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/promotion/:promotion_id", get(by_promotion))
        .route("/annee/:annee_id", get(by_annee))
        .route("/etudiant/:etudiant_id", get(by_etudiant))
        .route(
            "/rapport/promotion/:promotion_id/annee/:annee_id",
            get(report),
        )
        .route("/:id", get(get_one).put(update))
        .route("/:id/tranches", post(add_tranche))
        .route(
            "/:id/tranches/:tranche_id",
            put(update_tranche).delete(remove_tranche),
        )
        .route("/:id/paiements", post(add_payment))
        .route("/:id/paiements/:paiement_id", patch(update_payment))
        .route("/:id/etudiants/:etudiant_id", get(student_payments))
}

#[derive(Debug, Serialize)]
struct PaiementAdded {
    minerval: MinervalView,
    paiement: Paiement,
}

fn views(minervals: Vec<Minerval>) -> Vec<MinervalView> {
    minervals.into_iter().map(MinervalView::from).collect()
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MinervalQuery>,
) -> ApiResult<ApiResponse<Vec<MinervalSummary>>> {
    Ok(ApiResponse::list(state.minervals.list(&query).await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<MinervalInput>,
) -> ApiResult<(StatusCode, ApiResponse<MinervalView>)> {
    let minerval = state.minervals.create(input).await?;
    Ok(created(
        ApiResponse::ok(minerval.into()).with_message("Minerval créé avec succès"),
    ))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<MinervalView>> {
    Ok(ApiResponse::ok(state.minervals.get(&id).await?.into()))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<MinervalInput>,
) -> ApiResult<ApiResponse<MinervalView>> {
    let minerval = state.minervals.update(&id, input).await?;
    Ok(ApiResponse::ok(minerval.into()).with_message("Minerval mis à jour avec succès"))
}

async fn by_promotion(
    State(state): State<AppState>,
    Path(promotion_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<MinervalView>>> {
    Ok(ApiResponse::list(views(
        state.minervals.by_promotion(&promotion_id).await?,
    )))
}

async fn by_annee(
    State(state): State<AppState>,
    Path(annee_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<MinervalView>>> {
    Ok(ApiResponse::list(views(
        state.minervals.by_annee(&annee_id).await?,
    )))
}

async fn by_etudiant(
    State(state): State<AppState>,
    Path(etudiant_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<MinervalView>>> {
    Ok(ApiResponse::list(views(
        state.minervals.by_etudiant(&etudiant_id).await?,
    )))
}

async fn add_tranche(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<TrancheInput>,
) -> ApiResult<(StatusCode, ApiResponse<MinervalView>)> {
    let minerval = state.minervals.add_tranche(&id, input).await?;
    Ok(created(ApiResponse::ok(minerval.into())))
}

async fn update_tranche(
    State(state): State<AppState>,
    Path((id, tranche_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<TrancheInput>,
) -> ApiResult<ApiResponse<MinervalView>> {
    let minerval = state.minervals.update_tranche(&id, &tranche_id, input).await?;
    Ok(ApiResponse::ok(minerval.into()))
}

async fn remove_tranche(
    State(state): State<AppState>,
    Path((id, tranche_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<MinervalView>> {
    let minerval = state.minervals.remove_tranche(&id, &tranche_id).await?;
    Ok(ApiResponse::ok(minerval.into()))
}

/// Records the payment, then pushes it to the student's open sockets.
async fn add_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<PaiementInput>,
) -> ApiResult<(StatusCode, ApiResponse<PaiementAdded>)> {
    let (minerval, paiement) = state.minervals.add_payment(&id, input).await?;

    let delivered = state
        .connections
        .send_to_student(
            &paiement.etudiant_id,
            ServerMessage::ok("minerval:paiement-added", &paiement),
        )
        .await;
    debug!(
        "Payment {} pushed to {} connection(s)",
        paiement.id, delivered
    );

    Ok(created(
        ApiResponse::ok(PaiementAdded {
            minerval: minerval.into(),
            paiement,
        })
        .with_message("Paiement enregistré avec succès"),
    ))
}

async fn update_payment(
    State(state): State<AppState>,
    Path((id, paiement_id)): Path<(String, String)>,
    ApiJson(input): ApiJson<PaiementStatutInput>,
) -> ApiResult<ApiResponse<MinervalView>> {
    let minerval = state
        .minervals
        .update_payment_statut(&id, &paiement_id, input.statut)
        .await?;
    Ok(ApiResponse::ok(minerval.into()))
}

async fn student_payments(
    State(state): State<AppState>,
    Path((id, etudiant_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<PaiementsEtudiant>> {
    Ok(ApiResponse::ok(
        state.minervals.student_payments(&id, &etudiant_id).await?,
    ))
}

async fn report(
    State(state): State<AppState>,
    Path((promotion_id, annee_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<RapportMinerval>> {
    Ok(ApiResponse::ok(
        state.minervals.report(&promotion_id, &annee_id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::call;
    use crate::{app, AppState};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn setup(app: &axum::Router) -> (String, String, String) {
        let (_, section) = call(
            app,
            "POST",
            "/api/sections/create",
            Some(json!({"titre": "Génie civil", "url": "gc", "email": "gc@inbtp.cd"})),
        )
        .await;
        let (_, promotion) = call(
            app,
            "POST",
            "/api/promotions",
            Some(json!({"sectionId": section["data"]["_id"], "niveau": "L1", "mention": "GC"})),
        )
        .await;
        let (_, annee) = call(
            app,
            "POST",
            "/api/annees",
            Some(json!({"slogan": "Excellence", "debut": 2024, "fin": 2025})),
        )
        .await;
        let id = |v: &Value| v["data"]["_id"].as_str().unwrap().to_string();
        let (promotion_id, annee_id) = (id(&promotion), id(&annee));

        let (_, etudiant) = call(
            app,
            "POST",
            "/api/etudiants",
            Some(json!({
                "infoPerso": {"nom": "Kabila", "postNom": "Mutombo"},
                "infoSec": {"etudiantId": "2024001"},
                "infoAcad": [{"promotionId": promotion_id, "anneeId": annee_id}]
            })),
        )
        .await;
        let etudiant_id = id(&etudiant);
        (promotion_id, annee_id, etudiant_id)
    }

    #[tokio::test]
    async fn test_minerval_payments_over_http() {
        let app = app(AppState::for_tests().await);
        let (promotion_id, annee_id, etudiant_id) = setup(&app).await;

        let minerval = json!({"promotionId": promotion_id, "anneeId": annee_id, "montant": 500.0});
        let (status, body) = call(&app, "POST", "/api/minervals", Some(minerval.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, "POST", "/api/minervals", Some(minerval)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/minervals/{}/paiements", id),
            Some(json!({"etudiantId": etudiant_id, "montant": 200.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["paiement"]["montant"], 200.0);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/minervals/{}/paiements", id),
            Some(json!({"etudiantId": etudiant_id, "montant": 400.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/minervals/{}/etudiants/{}", id, etudiant_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["statistiques"]["resteAPayer"], 300.0);

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/minervals/rapport/promotion/{}/annee/{}", promotion_id, annee_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_payment_is_pushed_to_the_student_socket() {
        let state = AppState::for_tests().await;
        let app = app(state.clone());
        let (promotion_id, annee_id, etudiant_id) = setup(&app).await;

        let (bound_tx, mut bound_rx) = tokio::sync::mpsc::unbounded_channel();
        state.connections.register("c-student", bound_tx).await;
        state.connections.bind("c-student", &etudiant_id).await;
        let (other_tx, mut other_rx) = tokio::sync::mpsc::unbounded_channel();
        state.connections.register("c-anonymous", other_tx).await;

        let (_, body) = call(
            &app,
            "POST",
            "/api/minervals",
            Some(json!({"promotionId": promotion_id, "anneeId": annee_id, "montant": 500.0})),
        )
        .await;
        let id = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/minervals/{}/paiements", id),
            Some(json!({"etudiantId": etudiant_id, "montant": 150.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let paiement_id = body["data"]["paiement"]["_id"].as_str().unwrap().to_string();

        let pushed = bound_rx.try_recv().unwrap();
        assert_eq!(pushed.event, "minerval:paiement-added");
        assert!(pushed.success);
        let data = pushed.data.unwrap();
        assert_eq!(data["_id"], paiement_id.as_str());
        assert_eq!(data["etudiantId"], etudiant_id.as_str());
        assert_eq!(data["montant"], 150.0);

        assert!(bound_rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_err());
    }
}
