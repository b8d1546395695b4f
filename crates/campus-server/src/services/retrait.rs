//! Agent withdrawals

use crate::storage::{Database, MemoryCache};
use campus_core::reference::retrait_reference;
use campus_core::validate::{non_negative_amount, required};
use campus_core::{
    Agent, CampusError, Result, Retrait, RetraitFilter, RetraitInput, RetraitStat, RetraitStatut,
    RetraitType,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

fn stats_key(agent_id: &str) -> String {
    format!("retraits:{}", agent_id)
}

pub struct RetraitService {
    db: Arc<Database>,
    cache: Arc<MemoryCache>,
}

impl RetraitService {
    pub fn new(db: Arc<Database>, cache: Arc<MemoryCache>) -> Self {
        Self { db, cache }
    }

    pub async fn create(&self, input: RetraitInput) -> Result<Retrait> {
        const INCOMPLETE: &str = "Données incomplètes pour le retrait";
        let agent_id = required(input.agent_id.as_deref(), INCOMPLETE)?;
        let montant = non_negative_amount(input.montant, INCOMPLETE)?;
        let retrait_type = input
            .retrait_type
            .ok_or_else(|| CampusError::validation(INCOMPLETE))?;
        let description = required(input.description.as_deref(), INCOMPLETE)?;

        if self.db.get::<Agent>(&agent_id).await?.is_none() {
            return Err(CampusError::not_found("Agent non trouvé"));
        }

        let now = Utc::now();
        let retrait = Retrait {
            id: campus_core::new_id(),
            agent_id,
            date_created: now,
            montant,
            statut: RetraitStatut::Pending,
            reference: retrait_reference(now),
            retrait_type,
            description,
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&retrait).await?;
        self.cache.delete(&stats_key(&retrait.agent_id));

        info!(
            "Withdrawal {} of {} for agent {}",
            retrait.reference, retrait.montant, retrait.agent_id
        );
        Ok(retrait)
    }

    pub async fn list(&self, filter: &RetraitFilter) -> Result<Vec<Retrait>> {
        Ok(self.db.list_retraits(filter).await?)
    }

    pub async fn update_statut(&self, reference: &str, statut: RetraitStatut) -> Result<Retrait> {
        let mut retrait = self
            .db
            .retrait_by_ref(reference)
            .await?
            .ok_or_else(|| CampusError::not_found("Retrait non trouvé"))?;

        retrait.statut = statut;
        self.db.update(&mut retrait).await?;
        self.cache.delete(&stats_key(&retrait.agent_id));

        info!("Withdrawal {} now {}", reference, statut.as_str());
        Ok(retrait)
    }

    /// Total amount and count of an agent's withdrawals, per type.
    pub async fn stats(&self, agent_id: &str) -> Result<Vec<RetraitStat>> {
        let ttl = self.cache.default_ttl();
        self.cache
            .cached(&stats_key(agent_id), ttl, || async {
                let filter = RetraitFilter {
                    agent_id: Some(agent_id.to_string()),
                    ..Default::default()
                };
                let retraits = self.db.list_retraits(&filter).await?;

                let mut totals: BTreeMap<&'static str, (RetraitType, f64, usize)> = BTreeMap::new();
                for retrait in &retraits {
                    let entry = totals
                        .entry(retrait.retrait_type.as_str())
                        .or_insert((retrait.retrait_type, 0.0, 0));
                    entry.1 += retrait.montant;
                    entry.2 += 1;
                }
                Ok::<_, CampusError>(
                    totals
                        .into_values()
                        .map(|(retrait_type, total, count)| RetraitStat {
                            retrait_type,
                            total,
                            count,
                        })
                        .collect(),
                )
            })
            .await
    }
}
