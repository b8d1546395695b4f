//! Academic years

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annee {
    #[serde(rename = "_id")]
    pub id: String,
    pub slogan: String,
    pub debut: i32,
    pub fin: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or updating an academic year.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnneeInput {
    pub slogan: Option<String>,
    pub debut: Option<i32>,
    pub fin: Option<i32>,
}
