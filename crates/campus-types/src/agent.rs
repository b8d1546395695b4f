//! Staff members

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeAgent {
    Enseignant,
    Administratif,
}

impl TypeAgent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeAgent::Enseignant => "enseignant",
            TypeAgent::Administratif => "administratif",
        }
    }
}

impl std::fmt::Display for TypeAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TypeAgent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enseignant" => Ok(TypeAgent::Enseignant),
            "administratif" => Ok(TypeAgent::Administratif),
            other => Err(format!("Type d'agent invalide: {}", other)),
        }
    }
}

/// An agent as stored and returned by the API. The password hash lives in its
/// own column and never travels with the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(rename = "_id")]
    pub id: String,
    pub nom: String,
    pub postnom: Option<String>,
    pub prenom: Option<String>,
    pub sexe: Option<String>,
    pub grade: Option<String>,
    pub matricule: String,
    pub nationalite: Option<String>,
    pub type_agent: Option<TypeAgent>,
    pub lieu_naissance: Option<String>,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub date_naissance: Option<NaiveDate>,
    pub niveau: Option<String>,
    pub solde: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn nom_complet(&self) -> String {
        [Some(&self.nom), self.postnom.as_ref(), self.prenom.as_ref()]
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Create/update payload, also the shape of one CSV import row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentInput {
    pub nom: Option<String>,
    pub postnom: Option<String>,
    pub prenom: Option<String>,
    pub sexe: Option<String>,
    pub grade: Option<String>,
    pub matricule: Option<String>,
    pub nationalite: Option<String>,
    pub type_agent: Option<String>,
    pub lieu_naissance: Option<String>,
    pub mdp: Option<String>,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub date_naissance: Option<String>,
    pub niveau: Option<String>,
    pub solde: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentQuery {
    #[serde(rename = "type")]
    pub type_agent: Option<String>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_agent_parsing() {
        assert_eq!(
            "Enseignant".parse::<TypeAgent>().unwrap(),
            TypeAgent::Enseignant
        );
        assert!("jury".parse::<TypeAgent>().is_err());
        assert_eq!(
            serde_json::to_string(&TypeAgent::Administratif).unwrap(),
            "\"administratif\""
        );
    }
}
