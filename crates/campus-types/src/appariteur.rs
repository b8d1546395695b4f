//! Section clerks, their registration offers and payouts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state shared by subscriptions and clerk payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatutValidation {
    #[default]
    #[serde(rename = "En attente")]
    EnAttente,
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NO")]
    No,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Souscription {
    #[serde(rename = "_id")]
    pub id: String,
    pub date_created: DateTime<Utc>,
    pub matricule: String,
    pub etudiant_id: String,
    #[serde(default)]
    pub statut: StatutValidation,
    pub dossier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inscription {
    #[serde(rename = "_id")]
    pub id: String,
    pub titre: String,
    pub benefices: Option<String>,
    pub banner: Option<String>,
    pub montant: f64,
    pub promotion_id: String,
    #[serde(default)]
    pub souscriptions: Vec<Souscription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetraitAppariteur {
    #[serde(rename = "_id")]
    pub id: String,
    pub date_created: DateTime<Utc>,
    pub montant: f64,
    pub telephone: String,
    pub order_number: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub statut: StatutValidation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appariteur {
    #[serde(rename = "_id")]
    pub id: String,
    pub agent_id: String,
    pub annee_id: String,
    pub section_id: String,
    #[serde(default)]
    pub inscriptions: Vec<Inscription>,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub retraits: Vec<RetraitAppariteur>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appariteur {
    pub fn total_inscriptions(&self) -> usize {
        self.inscriptions.len()
    }

    pub fn total_souscriptions(&self) -> usize {
        self.inscriptions.iter().map(|i| i.souscriptions.len()).sum()
    }

    pub fn total_retraits(&self) -> usize {
        self.retraits.len()
    }

    pub fn montant_retraits(&self) -> f64 {
        self.retraits
            .iter()
            .filter(|r| r.statut == StatutValidation::Ok)
            .map(|r| r.montant)
            .sum()
    }

    pub fn revenus(&self) -> f64 {
        self.inscriptions
            .iter()
            .map(|i| {
                let ok = i
                    .souscriptions
                    .iter()
                    .filter(|s| s.statut == StatutValidation::Ok)
                    .count();
                ok as f64 * i.montant
            })
            .sum()
    }

    pub fn inscription(&self, inscription_id: &str) -> Option<&Inscription> {
        self.inscriptions.iter().find(|i| i.id == inscription_id)
    }

    pub fn inscription_mut(&mut self, inscription_id: &str) -> Option<&mut Inscription> {
        self.inscriptions.iter_mut().find(|i| i.id == inscription_id)
    }

    /// Copy without the nested subscription and payout lists, used by
    /// listings.
    pub fn without_details(&self) -> Appariteur {
        let mut light = self.clone();
        for inscription in &mut light.inscriptions {
            inscription.souscriptions.clear();
        }
        light.retraits.clear();
        light
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppariteurView {
    #[serde(flatten)]
    pub appariteur: Appariteur,
    pub total_inscriptions: usize,
    pub total_souscriptions: usize,
    pub total_retraits: usize,
    pub montant_retraits: f64,
    pub revenus: f64,
}

impl From<Appariteur> for AppariteurView {
    fn from(appariteur: Appariteur) -> Self {
        Self {
            total_inscriptions: appariteur.total_inscriptions(),
            total_souscriptions: appariteur.total_souscriptions(),
            total_retraits: appariteur.total_retraits(),
            montant_retraits: appariteur.montant_retraits(),
            revenus: appariteur.revenus(),
            appariteur,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppariteurInput {
    pub agent_id: Option<String>,
    pub annee_id: Option<String>,
    pub section_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InscriptionInput {
    pub titre: Option<String>,
    pub benefices: Option<String>,
    pub banner: Option<String>,
    pub montant: Option<f64>,
    pub promotion_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SouscriptionInput {
    pub etudiant_id: Option<String>,
    pub matricule: Option<String>,
    pub dossier: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetraitAppariteurInput {
    pub montant: Option<f64>,
    pub telephone: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationInput {
    pub statut: StatutValidation,
    #[serde(default)]
    pub order_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statut_wire_format() {
        assert_eq!(
            serde_json::to_string(&StatutValidation::EnAttente).unwrap(),
            "\"En attente\""
        );
        let statut: StatutValidation = serde_json::from_str("\"NO\"").unwrap();
        assert_eq!(statut, StatutValidation::No);
    }
}
