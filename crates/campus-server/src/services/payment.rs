//! Mobile money gateway (FlexPay)

use crate::config::PaymentConfig;
use async_trait::async_trait;
use campus_core::{CampusError, RechargeStatut, Result};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub phone: String,
    pub amount: f64,
    pub reference: String,
    pub description: Option<String>,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResponse {
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
}

impl CollectResponse {
    /// The gateway answers code `0` when the push request was accepted.
    pub fn is_accepted(&self) -> bool {
        code_is(&self.code, "0")
    }
}

/// Transaction status of an order, merged with the gateway message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub transaction: serde_json::Map<String, Value>,
}

impl CheckResponse {
    /// Status `0` is a paid order, `1` a failed one; anything else is still
    /// waiting for the customer.
    pub fn outcome(&self) -> RechargeStatut {
        if code_is(&self.status, "0") {
            RechargeStatut::Completed
        } else if code_is(&self.status, "1") {
            RechargeStatut::Failed
        } else {
            RechargeStatut::Pending
        }
    }
}

fn code_is(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        _ => false,
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn collect(&self, request: CollectRequest) -> Result<CollectResponse>;
    async fn check(&self, order_number: &str) -> Result<CheckResponse>;
}

pub struct FlexPayGateway {
    http: ReqwestClient,
    api_url: String,
    token: String,
    merchant: String,
    callback_url: Option<String>,
}

impl FlexPayGateway {
    pub fn new(config: &PaymentConfig, token: String) -> Self {
        Self {
            http: ReqwestClient::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            merchant: config.merchant.clone(),
            callback_url: config.callback_url.clone(),
        }
    }
}

#[derive(Deserialize)]
struct CheckEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    transaction: Option<serde_json::Map<String, Value>>,
}

#[async_trait]
impl PaymentGateway for FlexPayGateway {
    async fn collect(&self, request: CollectRequest) -> Result<CollectResponse> {
        info!(
            "Collecting {} {} from {} (ref {})",
            request.amount, request.currency, request.phone, request.reference
        );

        let payload = serde_json::json!({
            "merchant": self.merchant,
            "type": "1",
            "phone": request.phone,
            "reference": request.reference,
            "amount": request.amount,
            "description": request
                .description
                .unwrap_or_else(|| "Recharge compte INBTP".to_string()),
            "currency": request.currency,
            "callbackUrl": self.callback_url,
        });

        let response = self
            .http
            .post(format!("{}/paymentService", self.api_url))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CampusError::Gateway(e.to_string()))?;

        let body: CollectResponse = response
            .json()
            .await
            .map_err(|e| CampusError::Gateway(format!("invalid collect response: {}", e)))?;

        if !body.is_accepted() {
            warn!("Collect refused: {:?}", body.message);
        }
        Ok(body)
    }

    async fn check(&self, order_number: &str) -> Result<CheckResponse> {
        let response = self
            .http
            .get(format!("{}/check/{}", self.api_url, order_number))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| CampusError::Gateway(e.to_string()))?;

        let envelope: CheckEnvelope = response
            .json()
            .await
            .map_err(|e| CampusError::Gateway(format!("invalid check response: {}", e)))?;

        let mut transaction = envelope.transaction.unwrap_or_default();
        let status = transaction.remove("status").unwrap_or(Value::Null);
        info!("Order {} status {}", order_number, status);

        Ok(CheckResponse {
            status,
            message: envelope.message,
            transaction,
        })
    }
}

/// Gateway used when no token is configured.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn collect(&self, _request: CollectRequest) -> Result<CollectResponse> {
        Err(CampusError::Gateway("passerelle de paiement non configurée".to_string()))
    }

    async fn check(&self, _order_number: &str) -> Result<CheckResponse> {
        Err(CampusError::Gateway("passerelle de paiement non configurée".to_string()))
    }
}

pub fn from_config(config: &PaymentConfig) -> Arc<dyn PaymentGateway> {
    match &config.token {
        Some(token) => Arc::new(FlexPayGateway::new(config, token.clone())),
        None => {
            warn!("payment.token not set, mobile money top-ups are disabled");
            Arc::new(DisabledGateway)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_outcome() {
        let paid = CheckResponse {
            status: json!("0"),
            ..Default::default()
        };
        assert_eq!(paid.outcome(), RechargeStatut::Completed);

        let failed = CheckResponse {
            status: json!(1),
            ..Default::default()
        };
        assert_eq!(failed.outcome(), RechargeStatut::Failed);

        assert_eq!(CheckResponse::default().outcome(), RechargeStatut::Pending);
    }

    #[test]
    fn test_collect_response_wire_format() {
        let body: CollectResponse = serde_json::from_value(json!({
            "code": "0",
            "message": "Transaction envoyée",
            "orderNumber": "ORD-42"
        }))
        .unwrap();
        assert!(body.is_accepted());
        assert_eq!(body.order_number.as_deref(), Some("ORD-42"));
    }

    #[tokio::test]
    async fn test_disabled_gateway() {
        let gateway = from_config(&crate::config::Config::default().payment);
        let err = gateway.check("ORD-1").await.unwrap_err();
        assert!(matches!(err, CampusError::Gateway(_)));
    }
}
