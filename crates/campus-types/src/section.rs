//! Sections (faculties) with their bureau and offers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bureau {
    #[serde(rename = "_id")]
    pub id: String,
    pub grade: String,
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offre {
    #[serde(rename = "_id")]
    pub id: String,
    pub titre: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "_id")]
    pub id: String,
    pub titre: String,
    pub description: Option<String>,
    pub url: String,
    pub email: String,
    pub telephone: Option<String>,
    #[serde(default)]
    pub bureaux: Vec<Bureau>,
    #[serde(default)]
    pub offres: Vec<Offre>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Section {
    pub fn has_bureau_member(&self, agent_id: &str) -> bool {
        self.bureaux.iter().any(|b| b.agent_id == agent_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionInput {
    pub titre: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
}

/// `fonction` is accepted on creation and stored as the member's grade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BureauInput {
    pub fonction: Option<String>,
    pub grade: Option<String>,
    pub agent_id: Option<String>,
}
