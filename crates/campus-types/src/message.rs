//! WebSocket message protocol
//!
//! Client frames are `{"event": "<name>", "data": {...}}`; every reply is a
//! [`ServerMessage`] carrying the event name, a success flag and either data
//! or an error message.

use crate::{CommandeInput, EtudiantInput, NameSearch, RechargeInput, RechargeStatut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client -> Server messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "auth:request-otp")]
    RequestOtp(OtpRequest),
    #[serde(rename = "auth:verify-otp")]
    VerifyOtp(OtpVerification),
    #[serde(rename = "auth:authenticate")]
    Authenticate(TokenPayload),
    #[serde(rename = "auth:logout")]
    Logout,
    #[serde(rename = "auth:search-by-name")]
    SearchByName(NameSearch),

    #[serde(rename = "etudiant:get-profile")]
    GetProfile,
    #[serde(rename = "etudiant:update-profile")]
    UpdateProfile(EtudiantInput),
    #[serde(rename = "etudiant:update-avatar")]
    UpdateAvatar(AvatarPayload),
    #[serde(rename = "etudiant:get-solde")]
    GetSolde,
    #[serde(rename = "etudiant:recharge-solde")]
    RechargeSolde(MontantPayload),
    #[serde(rename = "etudiant:get-actifs")]
    GetActifs(AnneePayload),

    #[serde(rename = "transaction:get-all")]
    GetTransactions,
    #[serde(rename = "transaction:update-solde")]
    UpdateSolde(SoldePayload),
    #[serde(rename = "transaction:add-commande")]
    AddCommande(CommandeInput),
    #[serde(rename = "transaction:update-commande")]
    UpdateCommande(CommandeUpdate),
    #[serde(rename = "transaction:delete-commande")]
    DeleteCommande(CommandeRef),
    #[serde(rename = "transaction:add-recharge")]
    AddRecharge(RechargeInput),
    #[serde(rename = "transaction:check-recharge")]
    CheckRecharge(RechargeRef),
    #[serde(rename = "transaction:update-recharge")]
    UpdateRecharge(RechargeUpdate),
    #[serde(rename = "transaction:delete-recharge")]
    DeleteRecharge(RechargeRef),

    #[serde(rename = "ping")]
    Ping,
}

impl ClientMessage {
    /// Event name the client sent, used to address failures.
    pub fn event(&self) -> &'static str {
        match self {
            ClientMessage::RequestOtp(_) => "auth:request-otp",
            ClientMessage::VerifyOtp(_) => "auth:verify-otp",
            ClientMessage::Authenticate(_) => "auth:authenticate",
            ClientMessage::Logout => "auth:logout",
            ClientMessage::SearchByName(_) => "auth:search-by-name",
            ClientMessage::GetProfile => "etudiant:get-profile",
            ClientMessage::UpdateProfile(_) => "etudiant:update-profile",
            ClientMessage::UpdateAvatar(_) => "etudiant:update-avatar",
            ClientMessage::GetSolde => "etudiant:get-solde",
            ClientMessage::RechargeSolde(_) => "etudiant:recharge-solde",
            ClientMessage::GetActifs(_) => "etudiant:get-actifs",
            ClientMessage::GetTransactions => "transaction:get-all",
            ClientMessage::UpdateSolde(_) => "transaction:update-solde",
            ClientMessage::AddCommande(_) => "transaction:add-commande",
            ClientMessage::UpdateCommande(_) => "transaction:update-commande",
            ClientMessage::DeleteCommande(_) => "transaction:delete-commande",
            ClientMessage::AddRecharge(_) => "transaction:add-recharge",
            ClientMessage::CheckRecharge(_) => "transaction:check-recharge",
            ClientMessage::UpdateRecharge(_) => "transaction:update-recharge",
            ClientMessage::DeleteRecharge(_) => "transaction:delete-recharge",
            ClientMessage::Ping => "ping",
        }
    }

    /// Whether the event needs a connection bound to a student.
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            ClientMessage::RequestOtp(_)
                | ClientMessage::VerifyOtp(_)
                | ClientMessage::Authenticate(_)
                | ClientMessage::Logout
                | ClientMessage::SearchByName(_)
                | ClientMessage::Ping
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpRequest {
    pub matricule: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpVerification {
    pub matricule: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPayload {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarPayload {
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MontantPayload {
    pub montant: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnneePayload {
    pub annee_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoldePayload {
    pub solde: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandeUpdate {
    pub commande_id: Option<String>,
    pub product: Option<String>,
    pub montant: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandeRef {
    pub commande_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RechargeUpdate {
    pub recharge_id: Option<String>,
    pub montant: Option<f64>,
    pub statut: Option<RechargeStatut>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RechargeRef {
    pub recharge_id: Option<String>,
}

/// Server -> Client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub event: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerMessage {
    pub fn ok<T: Serialize>(event: &str, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                event: event.to_string(),
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self::err(event, format!("Serialization error: {}", e)),
        }
    }

    pub fn err(event: &str, message: impl Into<String>) -> Self {
        Self {
            event: event.to_string(),
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn pong() -> Self {
        Self {
            event: "pong".to_string(),
            success: true,
            data: None,
            error: None,
        }
    }
}
