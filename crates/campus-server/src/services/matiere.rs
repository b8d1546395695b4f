//! Subjects and their teaching assignments

use super::imports::CsvImporter;
use crate::storage::Database;
use campus_core::validate::{clean, required};
use campus_core::{
    Agent, Annee, CampusError, ChargeHoraire, ChargeHoraireInput, Matiere, MatiereInput,
    Promotion, Result,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct MatiereService {
    db: Arc<Database>,
    importer: Arc<CsvImporter>,
}

fn check_credit(credit: Option<f64>) -> Result<f64> {
    match credit {
        Some(c) if c.is_finite() && c >= 1.0 => Ok(c),
        Some(_) => Err(CampusError::validation("Le crédit doit être au moins 1")),
        None => Err(CampusError::validation("Le crédit est requis")),
    }
}

impl MatiereService {
    pub fn new(db: Arc<Database>, importer: Arc<CsvImporter>) -> Self {
        Self { db, importer }
    }

    pub async fn create(&self, input: MatiereInput) -> Result<Matiere> {
        let now = Utc::now();
        let matiere = Matiere {
            id: campus_core::new_id(),
            designation: required(input.designation.as_deref(), "La désignation est requise")?,
            code: clean(input.code.as_deref()),
            credit: check_credit(input.credit)?,
            semestre: input.semestre,
            code_unite: required(input.code_unite.as_deref(), "Le code de l'unité est requis")?,
            charges_horaires: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&matiere).await?;

        info!("Created subject {} in unit {}", matiere.designation, matiere.code_unite);
        Ok(matiere)
    }

    /// Rows without a `code_unite` column take the part of `code` before `_`.
    pub async fn import(&self, file_name: &str) -> Result<Vec<Matiere>> {
        let rows: Vec<MatiereInput> = self.importer.read(file_name).await?;
        let mut matieres = Vec::with_capacity(rows.len());
        for mut row in rows {
            if clean(row.code_unite.as_deref()).is_none() {
                row.code_unite = row
                    .code
                    .as_deref()
                    .and_then(|code| code.split('_').next())
                    .map(str::to_string);
            }
            matieres.push(self.create(row).await?);
        }
        info!("Imported {} subjects from {}", matieres.len(), file_name);
        Ok(matieres)
    }

    pub async fn list(&self) -> Result<Vec<Matiere>> {
        Ok(self.db.list("created_at DESC").await?)
    }

    pub async fn get(&self, id: &str) -> Result<Matiere> {
        self.db
            .get(id)
            .await?
            .ok_or_else(|| CampusError::not_found("Matière non trouvée"))
    }

    pub async fn update(&self, id: &str, input: MatiereInput) -> Result<Matiere> {
        let mut matiere = self.get(id).await?;

        if let Some(designation) = clean(input.designation.as_deref()) {
            matiere.designation = designation;
        }
        if input.code.is_some() {
            matiere.code = clean(input.code.as_deref());
        }
        if input.credit.is_some() {
            matiere.credit = check_credit(input.credit)?;
        }
        if input.semestre.is_some() {
            matiere.semestre = input.semestre;
        }
        if let Some(code_unite) = clean(input.code_unite.as_deref()) {
            matiere.code_unite = code_unite;
        }

        self.db.update(&mut matiere).await?;
        info!("Updated subject {}", id);
        Ok(matiere)
    }

    pub async fn delete(&self, id: &str) -> Result<Matiere> {
        let matiere = self.get(id).await?;
        self.db.delete::<Matiere>(id).await?;
        info!("Deleted subject {}", id);
        Ok(matiere)
    }

    async fn check_charge_refs(&self, annee_id: &str, titulaire: &str) -> Result<()> {
        if self.db.get::<Annee>(annee_id).await?.is_none() {
            return Err(CampusError::not_found("Année académique non trouvée"));
        }
        if self.db.get::<Agent>(titulaire).await?.is_none() {
            return Err(CampusError::not_found("Titulaire non trouvé"));
        }
        Ok(())
    }

    pub async fn add_charge(&self, matiere_id: &str, input: ChargeHoraireInput) -> Result<Matiere> {
        let annee_id = required(input.annee_id.as_deref(), "L'année académique est requise")?;
        let titulaire = required(input.titulaire.as_deref(), "Le titulaire est requis")?;

        let mut matiere = self.get(matiere_id).await?;
        self.check_charge_refs(&annee_id, &titulaire).await?;

        matiere.charges_horaires.push(ChargeHoraire {
            id: campus_core::new_id(),
            annee_id,
            titulaire,
            lecons: input.lecons.unwrap_or_default(),
            travaux: input.travaux.unwrap_or_default(),
            examens: input.examens.unwrap_or_default(),
            rattrapages: input.rattrapages.unwrap_or_default(),
            created_at: Utc::now(),
        });
        self.db.update(&mut matiere).await?;

        info!("Added teaching assignment to subject {}", matiere_id);
        Ok(matiere)
    }

    pub async fn update_charge(
        &self,
        matiere_id: &str,
        charge_id: &str,
        input: ChargeHoraireInput,
    ) -> Result<Matiere> {
        let mut matiere = self.get(matiere_id).await?;
        let current = matiere
            .charges_horaires
            .iter()
            .find(|c| c.id == charge_id)
            .ok_or_else(|| CampusError::not_found("Charge horaire non trouvée"))?;

        let annee_id = clean(input.annee_id.as_deref()).unwrap_or_else(|| current.annee_id.clone());
        let titulaire = clean(input.titulaire.as_deref()).unwrap_or_else(|| current.titulaire.clone());
        self.check_charge_refs(&annee_id, &titulaire).await?;

        if let Some(charge) = matiere.charges_horaires.iter_mut().find(|c| c.id == charge_id) {
            charge.annee_id = annee_id;
            charge.titulaire = titulaire;
            let lists = [
                (&mut charge.lecons, input.lecons),
                (&mut charge.travaux, input.travaux),
                (&mut charge.examens, input.examens),
                (&mut charge.rattrapages, input.rattrapages),
            ];
            for (field, value) in lists {
                if let Some(value) = value {
                    *field = value;
                }
            }
        }

        self.db.update(&mut matiere).await?;
        Ok(matiere)
    }

    pub async fn delete_charge(&self, matiere_id: &str, charge_id: &str) -> Result<Matiere> {
        let mut matiere = self.get(matiere_id).await?;
        let before = matiere.charges_horaires.len();
        matiere.charges_horaires.retain(|c| c.id != charge_id);
        if matiere.charges_horaires.len() == before {
            return Err(CampusError::not_found("Charge horaire non trouvée"));
        }

        self.db.update(&mut matiere).await?;
        Ok(matiere)
    }

    pub async fn list_charges(&self, matiere_id: &str) -> Result<Vec<ChargeHoraire>> {
        Ok(self.get(matiere_id).await?.charges_horaires)
    }

    pub async fn by_unite(&self, code_unite: &str) -> Result<Vec<Matiere>> {
        Ok(self.db.matieres_by_unite(code_unite).await?)
    }

    /// Subjects of every unit of the promotion.
    pub async fn by_promotion(&self, promotion_id: &str) -> Result<Vec<Matiere>> {
        let promotion: Promotion = self
            .db
            .get(promotion_id)
            .await?
            .ok_or_else(|| CampusError::not_found("Promotion non trouvée"))?;
        let codes: Vec<String> = promotion.unites.iter().map(|u| u.code.clone()).collect();
        Ok(self.db.matieres_by_unites(&codes).await?)
    }
}
