//! Section clerks: registration offers, student subscriptions and payouts

use crate::storage::{is_unique_violation, Database, DbTx};
use campus_core::clerk::{ensure_balance, retrait_delta, souscription_delta};
use campus_core::validate::{clean, positive_amount, required};
use campus_core::{
    Agent, Annee, Appariteur, AppariteurInput, AppariteurView, CampusError, Etudiant, Inscription,
    InscriptionInput, Promotion, Result, RetraitAppariteur, RetraitAppariteurInput, Section,
    Souscription, SouscriptionInput, StatutValidation,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CURRENCY: &str = "FC";

fn not_found() -> CampusError {
    CampusError::not_found("Appariteur non trouvé")
}

fn inscription_not_found() -> CampusError {
    CampusError::not_found("Inscription non trouvée")
}

fn duplicate() -> CampusError {
    CampusError::conflict(
        "Un appariteur existe déjà pour cet agent dans cette section et année académique",
    )
}

pub struct AppariteurService {
    db: Arc<Database>,
}

impl AppariteurService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn load(tx: &mut DbTx, id: &str) -> Result<Appariteur> {
        tx.get(id).await?.ok_or_else(not_found)
    }

    pub async fn create(&self, input: AppariteurInput) -> Result<Appariteur> {
        const MISSING: &str = "L'agent, l'année académique et la section sont requis";
        let agent_id = required(input.agent_id.as_deref(), MISSING)?;
        let annee_id = required(input.annee_id.as_deref(), MISSING)?;
        let section_id = required(input.section_id.as_deref(), MISSING)?;

        if self.db.get::<Agent>(&agent_id).await?.is_none() {
            return Err(CampusError::not_found("Agent non trouvé"));
        }
        if self.db.get::<Annee>(&annee_id).await?.is_none() {
            return Err(CampusError::not_found("Année académique non trouvée"));
        }
        if self.db.get::<Section>(&section_id).await?.is_none() {
            return Err(CampusError::not_found("Section non trouvée"));
        }
        if self
            .db
            .appariteur_exists(&agent_id, &annee_id, &section_id)
            .await?
        {
            return Err(duplicate());
        }

        let now = Utc::now();
        let appariteur = Appariteur {
            id: campus_core::new_id(),
            agent_id,
            annee_id,
            section_id,
            inscriptions: Vec::new(),
            balance: 0.0,
            retraits: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&appariteur).await.map_err(|e| {
            if is_unique_violation(&e) {
                duplicate()
            } else {
                e.into()
            }
        })?;

        info!(
            "Agent {} is clerk of section {} ({})",
            appariteur.agent_id, appariteur.section_id, appariteur.id
        );
        Ok(appariteur)
    }

    /// Every clerk, without subscriptions and payouts.
    pub async fn list(&self) -> Result<Vec<AppariteurView>> {
        let appariteurs: Vec<Appariteur> = self.db.list("created_at DESC").await?;
        Ok(appariteurs
            .into_iter()
            .map(|a| {
                let mut view = AppariteurView::from(a);
                view.appariteur = view.appariteur.without_details();
                view
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<AppariteurView> {
        let appariteur: Appariteur = self.db.get(id).await?.ok_or_else(not_found)?;
        Ok(appariteur.into())
    }

    pub async fn by_agent(&self, agent_id: &str) -> Result<Vec<AppariteurView>> {
        let appariteurs = self.db.appariteurs_by_agent(agent_id).await?;
        Ok(appariteurs.into_iter().map(AppariteurView::from).collect())
    }

    pub async fn add_inscription(&self, id: &str, input: InscriptionInput) -> Result<Appariteur> {
        const MISSING: &str = "Le titre, le montant et la promotion sont requis";
        let titre = required(input.titre.as_deref(), MISSING)?;
        let montant = positive_amount(input.montant, MISSING)?;
        let promotion_id = required(input.promotion_id.as_deref(), MISSING)?;

        let mut tx = self.db.begin().await?;
        let mut appariteur = Self::load(&mut tx, id).await?;
        if tx.get::<Promotion>(&promotion_id).await?.is_none() {
            return Err(CampusError::not_found("Promotion non trouvée"));
        }
        if appariteur
            .inscriptions
            .iter()
            .any(|i| i.promotion_id == promotion_id)
        {
            return Err(CampusError::conflict(
                "Une inscription existe déjà pour cette promotion",
            ));
        }

        appariteur.inscriptions.push(Inscription {
            id: campus_core::new_id(),
            titre,
            benefices: clean(input.benefices.as_deref()),
            banner: clean(input.banner.as_deref()),
            montant,
            promotion_id,
            souscriptions: Vec::new(),
        });
        tx.update(&mut appariteur).await?;
        tx.commit().await?;
        Ok(appariteur)
    }

    pub async fn add_souscription(
        &self,
        id: &str,
        inscription_id: &str,
        input: SouscriptionInput,
    ) -> Result<Appariteur> {
        let etudiant_id = required(input.etudiant_id.as_deref(), "L'étudiant est requis")?;

        let mut tx = self.db.begin().await?;
        let mut appariteur = Self::load(&mut tx, id).await?;
        let etudiant: Etudiant = tx
            .get(&etudiant_id)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé"))?;

        let inscription = appariteur
            .inscription_mut(inscription_id)
            .ok_or_else(inscription_not_found)?;
        if inscription
            .souscriptions
            .iter()
            .any(|s| s.etudiant_id == etudiant.id)
        {
            return Err(CampusError::conflict(
                "Cet étudiant a déjà souscrit à cette inscription",
            ));
        }

        let matricule = clean(input.matricule.as_deref())
            .or_else(|| etudiant.matricule().map(str::to_string))
            .unwrap_or_default();
        inscription.souscriptions.push(Souscription {
            id: campus_core::new_id(),
            date_created: Utc::now(),
            matricule,
            etudiant_id: etudiant.id.clone(),
            statut: StatutValidation::EnAttente,
            dossier: clean(input.dossier.as_deref()),
        });

        tx.update(&mut appariteur).await?;
        tx.commit().await?;
        info!("Student {} subscribed to {}", etudiant.id, inscription_id);
        Ok(appariteur)
    }

    /// The clerk earns the inscription amount while a subscription is `OK`.
    pub async fn update_souscription(
        &self,
        id: &str,
        inscription_id: &str,
        souscription_id: &str,
        statut: StatutValidation,
    ) -> Result<Appariteur> {
        let mut tx = self.db.begin().await?;
        let mut appariteur = Self::load(&mut tx, id).await?;

        let inscription = appariteur
            .inscription_mut(inscription_id)
            .ok_or_else(inscription_not_found)?;
        let montant = inscription.montant;
        let souscription = inscription
            .souscriptions
            .iter_mut()
            .find(|s| s.id == souscription_id)
            .ok_or_else(|| CampusError::not_found("Souscription non trouvée"))?;

        let delta = souscription_delta(souscription.statut, statut, montant);
        souscription.statut = statut;
        appariteur.balance += delta;

        tx.update(&mut appariteur).await?;
        tx.commit().await?;
        info!(
            "Subscription {} now {:?}, clerk balance {}",
            souscription_id, statut, appariteur.balance
        );
        Ok(appariteur)
    }

    /// Requests a payout; the amount leaves the balance immediately.
    pub async fn make_retrait(&self, id: &str, input: RetraitAppariteurInput) -> Result<Appariteur> {
        let montant = positive_amount(input.montant, "Montant invalide")?;
        let telephone = required(input.telephone.as_deref(), "Le numéro de téléphone est requis")?;

        let mut tx = self.db.begin().await?;
        let mut appariteur = Self::load(&mut tx, id).await?;
        if let Err(e) = ensure_balance(appariteur.balance, montant) {
            warn!("Clerk {} payout refused: {}", id, e);
            return Err(e);
        }

        appariteur.balance -= montant;
        appariteur.retraits.push(RetraitAppariteur {
            id: campus_core::new_id(),
            date_created: Utc::now(),
            montant,
            telephone,
            order_number: None,
            currency: clean(input.currency.as_deref()).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            statut: StatutValidation::EnAttente,
        });

        tx.update(&mut appariteur).await?;
        tx.commit().await?;
        info!("Clerk {} requested a payout of {}", id, montant);
        Ok(appariteur)
    }

    /// A rejected (`NO`) payout is refunded; reopening it debits again.
    pub async fn update_retrait(
        &self,
        id: &str,
        retrait_id: &str,
        statut: StatutValidation,
        order_number: Option<&str>,
    ) -> Result<Appariteur> {
        let mut tx = self.db.begin().await?;
        let mut appariteur = Self::load(&mut tx, id).await?;
        let balance = appariteur.balance;

        let retrait = appariteur
            .retraits
            .iter_mut()
            .find(|r| r.id == retrait_id)
            .ok_or_else(|| CampusError::not_found("Retrait non trouvé"))?;

        let delta = retrait_delta(retrait.statut, statut, retrait.montant);
        if delta < 0.0 {
            ensure_balance(balance, -delta)?;
        }
        retrait.statut = statut;
        if let Some(order_number) = clean(order_number) {
            retrait.order_number = Some(order_number);
        }
        appariteur.balance += delta;

        tx.update(&mut appariteur).await?;
        tx.commit().await?;
        Ok(appariteur)
    }
}
