//! HTTP handlers

pub mod agents;
pub mod annees;
pub mod appariteurs;
pub mod etudiants;
pub mod health;
pub mod matieres;
pub mod minervals;
pub mod promotions;
pub mod retraits;
pub mod sections;
pub mod ws;

pub use health::health;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use campus_core::validate::required;
use campus_core::CampusError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

/// Envelope of every successful REST reply.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        Self {
            success: true,
            message: None,
            count: Some(items.len()),
            data: Some(items),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `201 Created` with the envelope.
pub fn created<T: Serialize>(response: ApiResponse<T>) -> (StatusCode, ApiResponse<T>) {
    (StatusCode::CREATED, response)
}

/// Message safe to hand to a client; internal failures are not detailed.
pub fn public_message(err: &CampusError) -> String {
    match err {
        CampusError::Internal(_) => "Erreur interne du serveur".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug)]
pub struct ApiError(pub CampusError);

impl From<CampusError> for ApiError {
    fn from(e: CampusError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CampusError::Validation(_) | CampusError::InsufficientBalance(_) => {
                StatusCode::BAD_REQUEST
            }
            CampusError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CampusError::NotFound(_) => StatusCode::NOT_FOUND,
            CampusError::Conflict(_) => StatusCode::CONFLICT,
            CampusError::Gateway(_) => StatusCode::BAD_GATEWAY,
            CampusError::Mail(_) | CampusError::Serialization(_) | CampusError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }
        let body = Json(json!({
            "success": false,
            "error": public_message(&self.0),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Body of the CSV import routes.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportRequest {
    pub file_name: Option<String>,
}

impl ImportRequest {
    pub fn file_name(&self) -> Result<String, ApiError> {
        Ok(required(self.file_name.as_deref(), "Nom du fichier requis")?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    /// Sends one request through the router and decodes the JSON reply.
    pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
