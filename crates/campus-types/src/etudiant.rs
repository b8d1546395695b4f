//! Students

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sexe {
    M,
    F,
}

impl Sexe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sexe::M => "M",
            Sexe::F => "F",
        }
    }
}

impl std::str::FromStr for Sexe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M" => Ok(Sexe::M),
            "F" => Ok(Sexe::F),
            other => Err(format!("Sexe invalide: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPerso {
    pub profile: Option<String>,
    pub nom: String,
    pub post_nom: String,
    pub pre_nom: Option<String>,
    pub sexe: Option<Sexe>,
    pub date_naissance: Option<NaiveDate>,
    pub lieu_naissance: Option<String>,
    pub adresse: Option<String>,
}

/// Identity and contact block. The password hash is stored apart from the
/// document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoSec {
    pub etudiant_id: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub opt_id: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub solde: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoScol {
    pub section: Option<String>,
    pub option: Option<String>,
    pub pourcentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Actifs {
    pub travaux: Vec<String>,
    pub enrollments: Vec<String>,
    pub bulletins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoAcad {
    pub promotion_id: String,
    pub annee_id: String,
    #[serde(default)]
    pub actifs: Actifs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Etudiant {
    #[serde(rename = "_id")]
    pub id: String,
    pub info_perso: InfoPerso,
    pub info_sec: InfoSec,
    #[serde(default)]
    pub info_scol: InfoScol,
    #[serde(default)]
    pub info_acad: Vec<InfoAcad>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Etudiant {
    pub fn nom_complet(&self) -> String {
        let mut parts = vec![self.info_perso.nom.as_str(), self.info_perso.post_nom.as_str()];
        if let Some(pre_nom) = &self.info_perso.pre_nom {
            parts.push(pre_nom);
        }
        parts.join(" ")
    }

    /// Name used to greet the student.
    pub fn prenom_usuel(&self) -> &str {
        self.info_perso
            .pre_nom
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.info_perso.nom)
    }

    pub fn matricule(&self) -> Option<&str> {
        self.info_sec.etudiant_id.as_deref()
    }

    pub fn is_enrolled(&self, promotion_id: &str, annee_id: &str) -> bool {
        self.info_acad
            .iter()
            .any(|acad| acad.promotion_id == promotion_id && acad.annee_id == annee_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoPersoInput {
    pub profile: Option<String>,
    pub nom: Option<String>,
    pub post_nom: Option<String>,
    pub pre_nom: Option<String>,
    pub sexe: Option<String>,
    pub date_naissance: Option<String>,
    pub lieu_naissance: Option<String>,
    pub adresse: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoSecInput {
    pub etudiant_id: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub opt_id: Option<String>,
    pub mdp: Option<String>,
    pub avatar: Option<String>,
    pub solde: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtudiantInput {
    pub info_perso: Option<InfoPersoInput>,
    pub info_sec: Option<InfoSecInput>,
    pub info_scol: Option<InfoScol>,
    pub info_acad: Option<Vec<InfoAcad>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtudiantQuery {
    pub nom: Option<String>,
    pub postnom: Option<String>,
    pub prenom: Option<String>,
    pub sexe: Option<String>,
    pub section: Option<String>,
    pub option: Option<String>,
    pub matricule: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub annee_id: Option<String>,
    pub promotion_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NameSearch {
    pub nom: Option<String>,
    pub post_nom: Option<String>,
    pub pre_nom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameSearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    pub nom: String,
    pub post_nom: String,
    pub pre_nom: Option<String>,
    pub matricule: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
}

impl From<&Etudiant> for NameSearchHit {
    fn from(e: &Etudiant) -> Self {
        Self {
            id: e.id.clone(),
            nom: e.info_perso.nom.clone(),
            post_nom: e.info_perso.post_nom.clone(),
            pre_nom: e.info_perso.pre_nom.clone(),
            matricule: e.info_sec.etudiant_id.clone(),
            email: e.info_sec.email.clone(),
            telephone: e.info_sec.telephone.clone(),
        }
    }
}

/// Short identity attached to rows that join a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtudiantBrief {
    pub nom: String,
    pub postnom: String,
    pub prenom: Option<String>,
    pub matricule: Option<String>,
}

impl From<&Etudiant> for EtudiantBrief {
    fn from(e: &Etudiant) -> Self {
        Self {
            nom: e.info_perso.nom.clone(),
            postnom: e.info_perso.post_nom.clone(),
            prenom: e.info_perso.pre_nom.clone(),
            matricule: e.info_sec.etudiant_id.clone(),
        }
    }
}
