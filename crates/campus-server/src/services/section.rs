//! Sections and their bureau

use super::imports::{CsvImporter, SectionRow};
use crate::storage::Database;
use campus_core::validate::{clean, email, required};
use campus_core::{Agent, Bureau, BureauInput, CampusError, Result, Section, SectionInput};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct SectionService {
    db: Arc<Database>,
    importer: Arc<CsvImporter>,
}

impl SectionService {
    pub fn new(db: Arc<Database>, importer: Arc<CsvImporter>) -> Self {
        Self { db, importer }
    }

    pub async fn create(&self, input: SectionInput) -> Result<Section> {
        const MISSING: &str = "Le titre, l'url et l'email sont obligatoires";
        let titre = required(input.titre.as_deref(), MISSING)?;
        let url = required(input.url.as_deref(), MISSING)?;
        let email = email(input.email.as_deref())?.ok_or_else(|| CampusError::validation(MISSING))?;

        let now = Utc::now();
        let section = Section {
            id: campus_core::new_id(),
            titre,
            description: clean(input.description.as_deref()),
            url,
            email,
            telephone: clean(input.telephone.as_deref()),
            bureaux: Vec::new(),
            offres: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&section).await?;

        info!("Created section {} ({})", section.titre, section.id);
        Ok(section)
    }

    pub async fn import(&self, file_name: &str) -> Result<Vec<Section>> {
        let rows: Vec<SectionRow> = self.importer.read(file_name).await?;
        let mut sections = Vec::with_capacity(rows.len());
        for row in rows {
            sections.push(self.create(row.into()).await?);
        }
        info!("Imported {} sections from {}", sections.len(), file_name);
        Ok(sections)
    }

    pub async fn list(&self) -> Result<Vec<Section>> {
        Ok(self.db.list("created_at DESC").await?)
    }

    pub async fn get(&self, id: &str) -> Result<Section> {
        self.db
            .get(id)
            .await?
            .ok_or_else(|| CampusError::not_found("Section non trouvée"))
    }

    /// Updates the base fields; bureau and offers have their own operations.
    pub async fn update(&self, id: &str, input: SectionInput) -> Result<Section> {
        let mut section = self.get(id).await?;

        if let Some(titre) = input.titre {
            section.titre = required(Some(&titre), "Le titre est obligatoire")?;
        }
        if let Some(url) = input.url {
            section.url = required(Some(&url), "L'url est obligatoire")?;
        }
        if let Some(address) = email(input.email.as_deref())? {
            section.email = address;
        }
        if input.description.is_some() {
            section.description = clean(input.description.as_deref());
        }
        if input.telephone.is_some() {
            section.telephone = clean(input.telephone.as_deref());
        }

        self.db.update(&mut section).await?;
        info!("Updated section {}", id);
        Ok(section)
    }

    pub async fn delete(&self, id: &str) -> Result<Section> {
        let section = self.get(id).await?;
        self.db.delete::<Section>(id).await?;
        info!("Deleted section {}", id);
        Ok(section)
    }

    pub async fn add_bureau(&self, section_id: &str, input: BureauInput) -> Result<Section> {
        const MISSING: &str = "La fonction et l'agent sont requis";
        let fonction = required(input.fonction.as_deref(), MISSING)?;
        let agent_id = required(input.agent_id.as_deref(), MISSING)?;

        let mut section = self.get(section_id).await?;
        if self.db.get::<Agent>(&agent_id).await?.is_none() {
            return Err(CampusError::not_found("Agent non trouvé"));
        }
        if section.has_bureau_member(&agent_id) {
            return Err(CampusError::conflict("Cet agent fait déjà partie du bureau"));
        }

        section.bureaux.push(Bureau {
            id: campus_core::new_id(),
            grade: fonction,
            agent_id,
        });
        self.db.update(&mut section).await?;

        info!("Added bureau member to section {}", section_id);
        Ok(section)
    }

    pub async fn list_bureaux(&self, section_id: &str) -> Result<Vec<Bureau>> {
        Ok(self.get(section_id).await?.bureaux)
    }

    pub async fn update_bureau(
        &self,
        section_id: &str,
        bureau_id: &str,
        input: BureauInput,
    ) -> Result<Section> {
        let mut section = self.get(section_id).await?;

        let agent_id = clean(input.agent_id.as_deref());
        if let Some(agent_id) = &agent_id {
            if self.db.get::<Agent>(agent_id).await?.is_none() {
                return Err(CampusError::not_found("Agent non trouvé"));
            }
        }

        let bureau = section
            .bureaux
            .iter_mut()
            .find(|b| b.id == bureau_id)
            .ok_or_else(|| CampusError::not_found("Membre du bureau non trouvé"))?;
        if let Some(grade) = clean(input.grade.as_deref()).or_else(|| clean(input.fonction.as_deref())) {
            bureau.grade = grade;
        }
        if let Some(agent_id) = agent_id {
            bureau.agent_id = agent_id;
        }

        self.db.update(&mut section).await?;
        Ok(section)
    }

    pub async fn remove_bureau(&self, section_id: &str, bureau_id: &str) -> Result<Section> {
        let mut section = self.get(section_id).await?;
        let before = section.bureaux.len();
        section.bureaux.retain(|b| b.id != bureau_id);
        if section.bureaux.len() == before {
            return Err(CampusError::not_found("Membre du bureau non trouvé"));
        }

        self.db.update(&mut section).await?;
        info!("Removed bureau member {} from section {}", bureau_id, section_id);
        Ok(section)
    }

    pub async fn sections_of_agent(&self, agent_id: &str) -> Result<Vec<Section>> {
        Ok(self.db.sections_of_agent(agent_id).await?)
    }
}
