//! Academic years

use crate::storage::Database;
use campus_core::validate::required;
use campus_core::{Annee, AnneeInput, CampusError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct AnneeService {
    db: Arc<Database>,
}

fn check_bounds(debut: i32, fin: i32) -> Result<()> {
    if debut < 2000 {
        return Err(CampusError::validation(
            "L'année de début doit être supérieure ou égale à 2000",
        ));
    }
    if fin < debut {
        return Err(CampusError::validation(
            "L'année de fin doit être supérieure ou égale à l'année de début",
        ));
    }
    Ok(())
}

impl AnneeService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: AnneeInput) -> Result<Annee> {
        let slogan = required(input.slogan.as_deref(), "Le slogan est requis")?;
        let debut = input
            .debut
            .ok_or_else(|| CampusError::validation("L'année de début est requise"))?;
        let fin = input
            .fin
            .ok_or_else(|| CampusError::validation("L'année de fin est requise"))?;
        check_bounds(debut, fin)?;

        let now = Utc::now();
        let annee = Annee {
            id: campus_core::new_id(),
            slogan,
            debut,
            fin,
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&annee).await?;

        info!("Created academic year {}-{}", debut, fin);
        Ok(annee)
    }

    pub async fn list(&self) -> Result<Vec<Annee>> {
        Ok(self.db.list("debut DESC").await?)
    }

    pub async fn get(&self, id: &str) -> Result<Annee> {
        self.db
            .get(id)
            .await?
            .ok_or_else(|| CampusError::not_found("Année académique non trouvée"))
    }

    pub async fn update(&self, id: &str, input: AnneeInput) -> Result<Annee> {
        let mut annee = self.get(id).await?;

        if let Some(slogan) = input.slogan {
            annee.slogan = required(Some(&slogan), "Le slogan est requis")?;
        }
        annee.debut = input.debut.unwrap_or(annee.debut);
        annee.fin = input.fin.unwrap_or(annee.fin);
        check_bounds(annee.debut, annee.fin)?;

        self.db.update(&mut annee).await?;
        info!("Updated academic year {}", id);
        Ok(annee)
    }
}
