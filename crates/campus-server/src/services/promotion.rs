//! Promotions and their teaching units

use super::imports::CsvImporter;
use crate::storage::Database;
use campus_core::validate::{clean, required};
use campus_core::{
    CampusError, Promotion, PromotionInput, Result, Section, Unite, UniteInput,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct PromotionService {
    db: Arc<Database>,
    importer: Arc<CsvImporter>,
}

fn duplicate_code(code: &str) -> CampusError {
    CampusError::conflict(format!("Une unité avec le code {} existe déjà", code))
}

fn build_unite(input: UniteInput) -> Result<Unite> {
    const MISSING: &str = "Le code, la désignation et la catégorie sont requis";
    Ok(Unite {
        id: campus_core::new_id(),
        code: required(input.code.as_deref(), MISSING)?,
        designation: required(input.designation.as_deref(), MISSING)?,
        categorie: required(input.categorie.as_deref(), MISSING)?,
        matieres: input.matieres.unwrap_or_default(),
    })
}

impl PromotionService {
    pub fn new(db: Arc<Database>, importer: Arc<CsvImporter>) -> Self {
        Self { db, importer }
    }

    async fn ensure_section(&self, section_id: &str) -> Result<()> {
        match self.db.get::<Section>(section_id).await? {
            Some(_) => Ok(()),
            None => Err(CampusError::not_found("Section non trouvée")),
        }
    }

    pub async fn create(&self, input: PromotionInput) -> Result<Promotion> {
        const MISSING: &str = "La mention, la section et le niveau sont requis";
        let mention = required(input.mention.as_deref(), MISSING)?;
        let section_id = required(input.section_id.as_deref(), MISSING)?;
        let niveau = required(input.niveau.as_deref(), MISSING)?;
        self.ensure_section(&section_id).await?;

        let now = Utc::now();
        let promotion = Promotion {
            id: campus_core::new_id(),
            description: clean(input.description.as_deref()),
            section_id,
            niveau,
            mention,
            orientation: clean(input.orientation.as_deref()),
            statut: input.statut.unwrap_or_default(),
            unites: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&promotion).await?;

        info!("Created promotion {} {}", promotion.niveau, promotion.mention);
        Ok(promotion)
    }

    pub async fn list(&self) -> Result<Vec<Promotion>> {
        Ok(self.db.list("created_at DESC").await?)
    }

    pub async fn get(&self, id: &str) -> Result<Promotion> {
        self.db
            .get(id)
            .await?
            .ok_or_else(|| CampusError::not_found("Promotion non trouvée"))
    }

    pub async fn by_section(&self, section_id: &str) -> Result<Vec<Promotion>> {
        Ok(self.db.promotions_by_section(section_id).await?)
    }

    pub async fn update(&self, id: &str, input: PromotionInput) -> Result<Promotion> {
        let mut promotion = self.get(id).await?;

        if let Some(section_id) = clean(input.section_id.as_deref()) {
            self.ensure_section(&section_id).await?;
            promotion.section_id = section_id;
        }
        if let Some(niveau) = clean(input.niveau.as_deref()) {
            promotion.niveau = niveau;
        }
        if let Some(mention) = clean(input.mention.as_deref()) {
            promotion.mention = mention;
        }
        if input.description.is_some() {
            promotion.description = clean(input.description.as_deref());
        }
        if input.orientation.is_some() {
            promotion.orientation = clean(input.orientation.as_deref());
        }
        if let Some(statut) = input.statut {
            promotion.statut = statut;
        }

        self.db.update(&mut promotion).await?;
        info!("Updated promotion {}", id);
        Ok(promotion)
    }

    pub async fn delete(&self, id: &str) -> Result<Promotion> {
        let promotion = self.get(id).await?;
        self.db.delete::<Promotion>(id).await?;
        info!("Deleted promotion {}", id);
        Ok(promotion)
    }

    pub async fn add_unite(&self, promotion_id: &str, input: UniteInput) -> Result<Promotion> {
        let unite = build_unite(input)?;
        let mut promotion = self.get(promotion_id).await?;
        if promotion.has_unite_code(&unite.code) {
            return Err(duplicate_code(&unite.code));
        }

        promotion.unites.push(unite);
        self.db.update(&mut promotion).await?;
        Ok(promotion)
    }

    pub async fn list_unites(&self, promotion_id: &str) -> Result<Vec<Unite>> {
        Ok(self.get(promotion_id).await?.unites)
    }

    pub async fn update_unite(
        &self,
        promotion_id: &str,
        unite_id: &str,
        input: UniteInput,
    ) -> Result<Promotion> {
        let mut promotion = self.get(promotion_id).await?;
        if promotion.unite(unite_id).is_none() {
            return Err(CampusError::not_found("Unité non trouvée"));
        }

        let code = clean(input.code.as_deref());
        if let Some(code) = &code {
            let taken = promotion
                .unites
                .iter()
                .any(|u| u.id != unite_id && &u.code == code);
            if taken {
                return Err(duplicate_code(code));
            }
        }

        if let Some(unite) = promotion.unites.iter_mut().find(|u| u.id == unite_id) {
            if let Some(code) = code {
                unite.code = code;
            }
            if let Some(designation) = clean(input.designation.as_deref()) {
                unite.designation = designation;
            }
            if let Some(categorie) = clean(input.categorie.as_deref()) {
                unite.categorie = categorie;
            }
            if let Some(matieres) = input.matieres {
                unite.matieres = matieres;
            }
        }

        self.db.update(&mut promotion).await?;
        Ok(promotion)
    }

    pub async fn remove_unite(&self, promotion_id: &str, unite_id: &str) -> Result<Promotion> {
        let mut promotion = self.get(promotion_id).await?;
        let before = promotion.unites.len();
        promotion.unites.retain(|u| u.id != unite_id);
        if promotion.unites.len() == before {
            return Err(CampusError::not_found("Unité non trouvée"));
        }

        self.db.update(&mut promotion).await?;
        Ok(promotion)
    }

    /// Adds every unit of the file, or none: all codes are checked against
    /// the promotion and against each other first.
    pub async fn import_unites(&self, promotion_id: &str, file_name: &str) -> Result<(usize, Promotion)> {
        let mut promotion = self.get(promotion_id).await?;
        let rows: Vec<UniteInput> = self.importer.read(file_name).await?;

        let unites = rows
            .into_iter()
            .map(build_unite)
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for unite in &unites {
            if promotion.has_unite_code(&unite.code) || !seen.insert(unite.code.as_str()) {
                warn!("Import into promotion {} rejected: code {}", promotion_id, unite.code);
                return Err(duplicate_code(&unite.code));
            }
        }

        let count = unites.len();
        promotion.unites.extend(unites);
        self.db.update(&mut promotion).await?;

        info!("Imported {} units into promotion {}", count, promotion_id);
        Ok((count, promotion))
    }
}
