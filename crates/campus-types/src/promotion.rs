//! Promotions (cohorts) and their teaching units

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PromotionStatut {
    #[default]
    Actif,
    Inactif,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unite {
    #[serde(rename = "_id")]
    pub id: String,
    pub code: String,
    pub designation: String,
    pub categorie: String,
    #[serde(default)]
    pub matieres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    #[serde(rename = "_id")]
    pub id: String,
    pub description: Option<String>,
    pub section_id: String,
    pub niveau: String,
    pub mention: String,
    pub orientation: Option<String>,
    #[serde(default)]
    pub statut: PromotionStatut,
    #[serde(default)]
    pub unites: Vec<Unite>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    pub fn unite(&self, unite_id: &str) -> Option<&Unite> {
        self.unites.iter().find(|u| u.id == unite_id)
    }

    pub fn has_unite_code(&self, code: &str) -> bool {
        self.unites.iter().any(|u| u.code == code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromotionInput {
    pub description: Option<String>,
    pub section_id: Option<String>,
    pub niveau: Option<String>,
    pub mention: Option<String>,
    pub orientation: Option<String>,
    pub statut: Option<PromotionStatut>,
}

/// Unit payload, also one row of a unit CSV import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniteInput {
    pub code: Option<String>,
    pub designation: Option<String>,
    pub categorie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matieres: Option<Vec<String>>,
}
