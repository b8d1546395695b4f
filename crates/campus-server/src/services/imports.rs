//! CSV imports from the assets directory
//!
//! Files are `;`-separated with a header row; headers and values are trimmed.

use campus_core::{CampusError, EtudiantInput, InfoAcad, InfoPersoInput, InfoScol, InfoSecInput, Result, SectionInput};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

pub struct CsvImporter {
    assets_dir: PathBuf,
}

impl CsvImporter {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self { assets_dir }
    }

    /// Path of `file_name` inside the assets directory. Names that would
    /// leave the directory are rejected.
    fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        let name = Path::new(file_name.trim());
        let plain = !file_name.trim().is_empty()
            && name
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(CampusError::validation(format!(
                "Nom de fichier invalide: {}",
                file_name
            )));
        }
        Ok(self.assets_dir.join(name))
    }

    pub async fn read<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>> {
        let path = self.resolve(file_name)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            warn!("Cannot read import file {}: {}", path.display(), e);
            CampusError::not_found(format!("Fichier introuvable: {}", file_name))
        })?;

        let rows = parse_rows(&bytes)?;
        info!("Read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

pub fn parse_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(bytes);

    reader
        .deserialize()
        .enumerate()
        .map(|(index, row)| {
            row.map_err(|e| CampusError::validation(format!("Ligne {} invalide: {}", index + 2, e)))
        })
        .collect()
}

/// One line of a student import file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtudiantRow {
    pub nom: Option<String>,
    pub post_nom: Option<String>,
    pub pre_nom: Option<String>,
    pub sexe: Option<String>,
    pub date_naissance: Option<String>,
    pub lieu_naissance: Option<String>,
    pub adresse: Option<String>,
    pub etudiant_id: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub opt_id: Option<String>,
    pub section: Option<String>,
    pub option: Option<String>,
    pub pourcentage: Option<f64>,
    pub promotion_id: Option<String>,
    pub annee_id: Option<String>,
}

impl From<EtudiantRow> for EtudiantInput {
    fn from(row: EtudiantRow) -> Self {
        let info_acad = match (row.promotion_id, row.annee_id) {
            (Some(promotion_id), Some(annee_id)) => Some(vec![InfoAcad {
                promotion_id,
                annee_id,
                actifs: Default::default(),
            }]),
            _ => None,
        };

        EtudiantInput {
            info_perso: Some(InfoPersoInput {
                profile: None,
                nom: row.nom,
                post_nom: row.post_nom,
                pre_nom: row.pre_nom,
                sexe: row.sexe,
                date_naissance: row.date_naissance,
                lieu_naissance: row.lieu_naissance,
                adresse: row.adresse,
            }),
            info_sec: Some(InfoSecInput {
                etudiant_id: row.etudiant_id,
                email: row.email,
                telephone: row.telephone,
                opt_id: row.opt_id,
                ..Default::default()
            }),
            info_scol: Some(InfoScol {
                section: row.section,
                option: row.option,
                pourcentage: row.pourcentage,
            }),
            info_acad,
        }
    }
}

/// One line of a section import file; the email column is `e_mail`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SectionRow {
    pub titre: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub e_mail: Option<String>,
    pub telephone: Option<String>,
}

impl From<SectionRow> for SectionInput {
    fn from(row: SectionRow) -> Self {
        SectionInput {
            titre: row.titre,
            description: row.description,
            url: row.url,
            email: row.e_mail,
            telephone: row.telephone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::{AgentInput, MatiereInput, Semestre};

    #[test]
    fn test_parse_trims_headers_and_values() {
        let data = " nom ; matricule ;typeAgent;solde\n MUKENDI ; AG-01 ;enseignant;\n";
        let rows: Vec<AgentInput> = parse_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nom.as_deref(), Some("MUKENDI"));
        assert_eq!(rows[0].matricule.as_deref(), Some("AG-01"));
        assert_eq!(rows[0].type_agent.as_deref(), Some("enseignant"));
        assert_eq!(rows[0].solde, None);
    }

    #[test]
    fn test_student_row_builds_enrolment() {
        let data = "nom;postNom;etudiantId;promotionId;anneeId;pourcentage\nkasa;mbala;2024001;p1;a1;65.5\n";
        let rows: Vec<EtudiantRow> = parse_rows(data.as_bytes()).unwrap();
        let input = EtudiantInput::from(rows.into_iter().next().unwrap());
        let acad = input.info_acad.unwrap();
        assert_eq!(acad[0].promotion_id, "p1");
        assert_eq!(input.info_scol.unwrap().pourcentage, Some(65.5));
    }

    #[test]
    fn test_subject_rows_and_bad_values() {
        let data = "designation;credit;code;semestre;code_unite\nRésistance;4;UE1_RES;Premier;\n";
        let rows: Vec<MatiereInput> = parse_rows(data.as_bytes()).unwrap();
        assert_eq!(rows[0].semestre, Some(Semestre::Premier));
        assert_eq!(rows[0].credit, Some(4.0));

        let bad = "designation;credit\nRésistance;beaucoup\n";
        let err = parse_rows::<MatiereInput>(bad.as_bytes()).unwrap_err();
        assert!(err.to_string().starts_with("Ligne 2 invalide"));
    }

    #[test]
    fn test_file_names_cannot_escape_assets() {
        let importer = CsvImporter::new(PathBuf::from("assets"));
        assert!(importer.resolve("agents.csv").is_ok());
        assert!(importer.resolve("../secret.csv").is_err());
        assert!(importer.resolve("/etc/passwd").is_err());
        assert!(importer.resolve(" ").is_err());
    }
}
