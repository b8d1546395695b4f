//! Request extractors whose rejections use the JSON error envelope

use crate::handlers::ApiError;
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use campus_core::CampusError;
use serde::de::DeserializeOwned;
use tracing::debug;

/// JSON body; a malformed or mistyped body is a 400 validation error.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

/// Query string, rejected the same way as [`ApiJson`].
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected body: {}", rejection.body_text());
        ApiError(CampusError::validation(format!(
            "Corps de requête invalide: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query: {}", rejection.body_text());
        ApiError(CampusError::validation(format!(
            "Paramètres de requête invalides: {}",
            rejection.body_text()
        )))
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::call;
    use crate::{app, AppState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_mistyped_body_gets_json_error() {
        let app = app(AppState::for_tests().await);
        let (status, body) = call(
            &app,
            "POST",
            "/api/agents/create",
            Some(serde_json::json!({"nom": 5, "matricule": "A1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Corps de requête invalide"));
    }

    #[tokio::test]
    async fn test_unparseable_body_and_query_get_json_errors() {
        let app = app(AppState::for_tests().await);

        let request = Request::builder()
            .method("POST")
            .uri("/api/annees")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("application/json"));

        let (status, body) = call(&app, "GET", "/api/etudiants?nom=a&nom=b", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
