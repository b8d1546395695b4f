//! Subjects and teaching assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Semestre {
    Premier,
    Second,
}

/// A teaching assignment of a subject for one academic year.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeHoraire {
    #[serde(rename = "_id")]
    pub id: String,
    pub annee_id: String,
    pub titulaire: String,
    #[serde(default)]
    pub lecons: Vec<String>,
    #[serde(default)]
    pub travaux: Vec<String>,
    #[serde(default)]
    pub examens: Vec<String>,
    #[serde(default)]
    pub rattrapages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matiere {
    #[serde(rename = "_id")]
    pub id: String,
    pub designation: String,
    pub code: Option<String>,
    pub credit: f64,
    pub semestre: Option<Semestre>,
    pub code_unite: String,
    #[serde(rename = "charges_horaires", default)]
    pub charges_horaires: Vec<ChargeHoraire>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subject payload, also one row of a subject CSV import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatiereInput {
    pub designation: Option<String>,
    pub code: Option<String>,
    pub credit: Option<f64>,
    pub semestre: Option<Semestre>,
    #[serde(alias = "code_unite")]
    pub code_unite: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChargeHoraireInput {
    pub annee_id: Option<String>,
    pub titulaire: Option<String>,
    pub lecons: Option<Vec<String>>,
    pub travaux: Option<Vec<String>>,
    pub examens: Option<Vec<String>>,
    pub rattrapages: Option<Vec<String>>,
}
