//! Agent withdrawals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetraitStatut {
    #[default]
    Pending,
    Completed,
    Failed,
    Canceled,
}

impl RetraitStatut {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetraitStatut::Pending => "pending",
            RetraitStatut::Completed => "completed",
            RetraitStatut::Failed => "failed",
            RetraitStatut::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetraitType {
    Enseignant,
    Jury,
    Departement,
}

impl RetraitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetraitType::Enseignant => "enseignant",
            RetraitType::Jury => "jury",
            RetraitType::Departement => "departement",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrait {
    #[serde(rename = "_id")]
    pub id: String,
    pub agent_id: String,
    pub date_created: DateTime<Utc>,
    pub montant: f64,
    #[serde(default)]
    pub statut: RetraitStatut,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "type")]
    pub retrait_type: RetraitType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetraitInput {
    pub agent_id: Option<String>,
    pub montant: Option<f64>,
    #[serde(rename = "type")]
    pub retrait_type: Option<RetraitType>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetraitFilter {
    #[serde(rename = "type")]
    pub retrait_type: Option<RetraitType>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub agent_id: Option<String>,
    pub statut: Option<RetraitStatut>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetraitStatutInput {
    #[serde(alias = "status")]
    pub statut: RetraitStatut,
}

/// Totals of an agent's withdrawals for one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetraitStat {
    #[serde(rename = "_id")]
    pub retrait_type: RetraitType,
    pub total: f64,
    pub count: usize,
}
