//! Tuition (minerval), its instalments and payments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Devise {
    #[default]
    Usd,
    Fc,
    Eur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModePaiement {
    #[default]
    Cash,
    Mobile,
    Banque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatutPaiement {
    Pending,
    #[default]
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tranche {
    #[serde(rename = "_id")]
    pub id: String,
    pub designation: String,
    #[serde(alias = "date_fin")]
    pub date_fin: Option<DateTime<Utc>>,
    pub montant: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paiement {
    #[serde(rename = "_id")]
    pub id: String,
    pub etudiant_id: String,
    pub montant: f64,
    pub date_created: DateTime<Utc>,
    pub reference: String,
    #[serde(default)]
    pub mode: ModePaiement,
    pub tranche_id: Option<String>,
    #[serde(default)]
    pub statut: StatutPaiement,
}

impl Paiement {
    pub fn is_completed(&self) -> bool {
        self.statut == StatutPaiement::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Minerval {
    #[serde(rename = "_id")]
    pub id: String,
    pub promotion_id: String,
    pub annee_id: String,
    pub montant: f64,
    #[serde(default)]
    pub devise: Devise,
    pub description: Option<String>,
    #[serde(default)]
    pub tranches: Vec<Tranche>,
    #[serde(default)]
    pub paiements: Vec<Paiement>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Minerval {
    pub fn total_paye(&self) -> f64 {
        self.paiements
            .iter()
            .filter(|p| p.is_completed())
            .map(|p| p.montant)
            .sum()
    }

    /// Share of the tuition amount already collected, rounded to a whole
    /// percentage.
    pub fn pourcentage_perception(&self) -> f64 {
        if self.montant == 0.0 {
            return 0.0;
        }
        (self.total_paye() / self.montant * 100.0).round()
    }

    pub fn nombre_etudiants(&self) -> usize {
        self.paiements
            .iter()
            .filter(|p| p.is_completed())
            .map(|p| p.etudiant_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn paiements_etudiant(&self, etudiant_id: &str) -> Vec<Paiement> {
        self.paiements
            .iter()
            .filter(|p| p.etudiant_id == etudiant_id)
            .cloned()
            .collect()
    }

    pub fn total_paye_etudiant(&self, etudiant_id: &str) -> f64 {
        self.paiements
            .iter()
            .filter(|p| p.etudiant_id == etudiant_id && p.is_completed())
            .map(|p| p.montant)
            .sum()
    }

    pub fn reste_a_payer(&self, etudiant_id: &str) -> f64 {
        (self.montant - self.total_paye_etudiant(etudiant_id)).max(0.0)
    }

    pub fn tranches_total(&self) -> f64 {
        self.tranches.iter().map(|t| t.montant).sum()
    }

    pub fn tranche(&self, tranche_id: &str) -> Option<&Tranche> {
        self.tranches.iter().find(|t| t.id == tranche_id)
    }
}

/// A minerval with its derived collection figures, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinervalView {
    #[serde(flatten)]
    pub minerval: Minerval,
    pub total_paye: f64,
    pub pourcentage_perception: f64,
    pub nombre_etudiants: usize,
}

impl From<Minerval> for MinervalView {
    fn from(minerval: Minerval) -> Self {
        Self {
            total_paye: minerval.total_paye(),
            pourcentage_perception: minerval.pourcentage_perception(),
            nombre_etudiants: minerval.nombre_etudiants(),
            minerval,
        }
    }
}

/// List entry: same figures, payments left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinervalSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub promotion_id: String,
    pub annee_id: String,
    pub montant: f64,
    pub devise: Devise,
    pub description: Option<String>,
    pub tranches: Vec<Tranche>,
    pub total_paye: f64,
    pub pourcentage_perception: f64,
    pub nombre_etudiants: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Minerval> for MinervalSummary {
    fn from(m: &Minerval) -> Self {
        Self {
            id: m.id.clone(),
            promotion_id: m.promotion_id.clone(),
            annee_id: m.annee_id.clone(),
            montant: m.montant,
            devise: m.devise,
            description: m.description.clone(),
            tranches: m.tranches.clone(),
            total_paye: m.total_paye(),
            pourcentage_perception: m.pourcentage_perception(),
            nombre_etudiants: m.nombre_etudiants(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrancheInput {
    pub designation: Option<String>,
    #[serde(alias = "date_fin", alias = "dateLimite")]
    pub date_fin: Option<DateTime<Utc>>,
    pub montant: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MinervalInput {
    pub promotion_id: Option<String>,
    pub annee_id: Option<String>,
    pub montant: Option<f64>,
    pub devise: Option<Devise>,
    pub description: Option<String>,
    pub tranches: Option<Vec<TrancheInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MinervalQuery {
    pub promotion_id: Option<String>,
    pub annee_id: Option<String>,
}

impl MinervalQuery {
    pub fn is_empty(&self) -> bool {
        self.promotion_id.is_none() && self.annee_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaiementInput {
    pub etudiant_id: Option<String>,
    pub montant: Option<f64>,
    pub tranche_id: Option<String>,
    pub mode: Option<ModePaiement>,
    pub statut: Option<StatutPaiement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaiementStatutInput {
    pub statut: StatutPaiement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaiementStatistiques {
    pub total_paye: f64,
    pub reste_a_payer: f64,
    pub pourcentage_paye: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinervalRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub montant: f64,
    pub devise: Devise,
    pub promotion_id: String,
    pub annee_id: String,
}

/// Payments of one student against one minerval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaiementsEtudiant {
    pub etudiant_id: String,
    pub minerval: MinervalRef,
    pub paiements: Vec<Paiement>,
    pub statistiques: PaiementStatistiques,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatutRapport {
    Complet,
    Partiel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LigneRapport {
    pub etudiant_id: String,
    pub etudiant: crate::EtudiantBrief,
    pub total_paye: f64,
    pub reste_a_payer: f64,
    pub pourcentage_paye: f64,
    pub statut: StatutRapport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatistiquesRapport {
    pub total_etudiants: usize,
    pub etudiants_a_jour: usize,
    pub etudiants_partiels: usize,
    pub total_percu: f64,
    pub total_attendu: f64,
    pub pourcentage_perception: f64,
}

/// Collection report of a minerval over every enrolled student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RapportMinerval {
    pub minerval: MinervalRef,
    pub statistiques: StatistiquesRapport,
    pub details: Vec<LigneRapport>,
}

impl From<&Minerval> for MinervalRef {
    fn from(m: &Minerval) -> Self {
        Self {
            id: m.id.clone(),
            montant: m.montant,
            devise: m.devise,
            promotion_id: m.promotion_id.clone(),
            annee_id: m.annee_id.clone(),
        }
    }
}
