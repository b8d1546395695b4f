//! Tuition: amounts, instalments, payments and collection reports

use crate::storage::{is_unique_violation, Database, MemoryCache};
use campus_core::reference::payment_reference;
use campus_core::tuition::{
    build_report, check_new_tranche, check_payment, check_tranche_change, check_tranches_total,
    student_statement,
};
use campus_core::validate::{clean, non_negative_amount, positive_amount, required};
use campus_core::{
    Annee, CampusError, Etudiant, Minerval, MinervalInput, MinervalQuery, MinervalSummary,
    Paiement, PaiementInput, PaiementsEtudiant, Promotion, RapportMinerval, Result,
    StatutPaiement, Tranche, TrancheInput,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const LIST_TTL: Duration = Duration::from_secs(3600);
const CACHE_PREFIX: &str = "minervals:";

fn list_key(query: &MinervalQuery) -> Result<String> {
    if query.is_empty() {
        Ok(format!("{}all", CACHE_PREFIX))
    } else {
        Ok(format!("{}{}", CACHE_PREFIX, serde_json::to_string(query)?))
    }
}

fn not_found() -> CampusError {
    CampusError::not_found("Minerval non trouvé")
}

fn build_tranche(input: TrancheInput) -> Result<Tranche> {
    Ok(Tranche {
        id: campus_core::new_id(),
        designation: required(input.designation.as_deref(), "La désignation de la tranche est requise")?,
        date_fin: input.date_fin,
        montant: non_negative_amount(input.montant, "Montant de tranche invalide")?,
    })
}

pub struct MinervalService {
    db: Arc<Database>,
    cache: Arc<MemoryCache>,
}

impl MinervalService {
    pub fn new(db: Arc<Database>, cache: Arc<MemoryCache>) -> Self {
        Self { db, cache }
    }

    fn invalidate(&self) {
        self.cache.delete_prefix(CACHE_PREFIX);
    }

    async fn save(&self, minerval: &mut Minerval) -> Result<()> {
        self.db.update(minerval).await.map_err(|e| {
            if is_unique_violation(&e) {
                CampusError::conflict("Un minerval existe déjà pour cette promotion et année académique")
            } else {
                e.into()
            }
        })?;
        self.invalidate();
        Ok(())
    }

    async fn ensure_refs(&self, promotion_id: &str, annee_id: &str) -> Result<()> {
        if self.db.get::<Promotion>(promotion_id).await?.is_none() {
            return Err(CampusError::not_found("Promotion non trouvée"));
        }
        if self.db.get::<Annee>(annee_id).await?.is_none() {
            return Err(CampusError::not_found("Année académique non trouvée"));
        }
        Ok(())
    }

    pub async fn create(&self, input: MinervalInput) -> Result<Minerval> {
        const MISSING: &str = "Promotion, année académique et montant sont requis";
        let promotion_id = required(input.promotion_id.as_deref(), MISSING)?;
        let annee_id = required(input.annee_id.as_deref(), MISSING)?;
        let montant = positive_amount(input.montant, MISSING)?;
        self.ensure_refs(&promotion_id, &annee_id).await?;

        let tranches = input
            .tranches
            .unwrap_or_default()
            .into_iter()
            .map(build_tranche)
            .collect::<Result<Vec<_>>>()?;
        check_tranches_total(montant, tranches.iter().map(|t| t.montant).sum())?;

        let now = Utc::now();
        let minerval = Minerval {
            id: campus_core::new_id(),
            promotion_id,
            annee_id,
            montant,
            devise: input.devise.unwrap_or_default(),
            description: clean(input.description.as_deref()),
            tranches,
            paiements: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert(&minerval).await.map_err(|e| {
            if is_unique_violation(&e) {
                warn!(
                    "Minerval already exists for {} / {}",
                    minerval.promotion_id, minerval.annee_id
                );
                CampusError::conflict("Un minerval existe déjà pour cette promotion et année académique")
            } else {
                e.into()
            }
        })?;
        self.invalidate();

        info!(
            "Created minerval {} for promotion {} ({} {:?})",
            minerval.id, minerval.promotion_id, minerval.montant, minerval.devise
        );
        Ok(minerval)
    }

    /// Minervals without their payments, cached for an hour per filter.
    pub async fn list(&self, query: &MinervalQuery) -> Result<Vec<MinervalSummary>> {
        let key = list_key(query)?;
        self.cache
            .cached(&key, LIST_TTL, || async {
                let minervals = self.db.list_minervals(query).await?;
                Ok::<_, CampusError>(minervals.iter().map(MinervalSummary::from).collect())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Minerval> {
        self.db.get(id).await?.ok_or_else(not_found)
    }

    pub async fn by_promotion(&self, promotion_id: &str) -> Result<Vec<Minerval>> {
        let query = MinervalQuery {
            promotion_id: Some(promotion_id.to_string()),
            annee_id: None,
        };
        Ok(self.db.list_minervals(&query).await?)
    }

    pub async fn by_annee(&self, annee_id: &str) -> Result<Vec<Minerval>> {
        let query = MinervalQuery {
            promotion_id: None,
            annee_id: Some(annee_id.to_string()),
        };
        Ok(self.db.list_minervals(&query).await?)
    }

    pub async fn by_etudiant(&self, etudiant_id: &str) -> Result<Vec<Minerval>> {
        Ok(self.db.minervals_paid_by(etudiant_id).await?)
    }

    /// Changes devise, promotion, year or the instalment list. The amount is
    /// frozen once payments exist.
    pub async fn update(&self, id: &str, input: MinervalInput) -> Result<Minerval> {
        let mut minerval = self.get(id).await?;

        if let Some(montant) = input.montant {
            if !minerval.paiements.is_empty() && montant != minerval.montant {
                return Err(CampusError::validation(
                    "Impossible de modifier le montant total après la création des paiements",
                ));
            }
            minerval.montant = positive_amount(Some(montant), "Montant invalide")?;
        }
        if let Some(devise) = input.devise {
            minerval.devise = devise;
        }
        if input.description.is_some() {
            minerval.description = clean(input.description.as_deref());
        }

        let promotion_id = clean(input.promotion_id.as_deref());
        let annee_id = clean(input.annee_id.as_deref());
        if promotion_id.is_some() || annee_id.is_some() {
            minerval.promotion_id = promotion_id.unwrap_or(minerval.promotion_id);
            minerval.annee_id = annee_id.unwrap_or(minerval.annee_id);
            self.ensure_refs(&minerval.promotion_id, &minerval.annee_id)
                .await?;
        }

        if let Some(tranches) = input.tranches {
            minerval.tranches = tranches
                .into_iter()
                .map(build_tranche)
                .collect::<Result<Vec<_>>>()?;
        }
        check_tranches_total(minerval.montant, minerval.tranches_total())?;

        self.save(&mut minerval).await?;
        info!("Updated minerval {}", id);
        Ok(minerval)
    }

    pub async fn add_tranche(&self, id: &str, input: TrancheInput) -> Result<Minerval> {
        let tranche = build_tranche(input)?;
        let mut minerval = self.get(id).await?;
        check_new_tranche(&minerval, tranche.montant)?;

        minerval.tranches.push(tranche);
        self.save(&mut minerval).await?;
        Ok(minerval)
    }

    /// Unspecified fields keep their value.
    pub async fn update_tranche(
        &self,
        id: &str,
        tranche_id: &str,
        input: TrancheInput,
    ) -> Result<Minerval> {
        let mut minerval = self.get(id).await?;
        if let Some(montant) = input.montant {
            let montant = non_negative_amount(Some(montant), "Montant de tranche invalide")?;
            check_tranche_change(&minerval, tranche_id, montant)?;
        }

        let tranche = minerval
            .tranches
            .iter_mut()
            .find(|t| t.id == tranche_id)
            .ok_or_else(|| CampusError::not_found("Tranche non trouvée"))?;
        if let Some(designation) = clean(input.designation.as_deref()) {
            tranche.designation = designation;
        }
        if input.date_fin.is_some() {
            tranche.date_fin = input.date_fin;
        }
        if let Some(montant) = input.montant {
            tranche.montant = montant;
        }

        self.save(&mut minerval).await?;
        Ok(minerval)
    }

    pub async fn remove_tranche(&self, id: &str, tranche_id: &str) -> Result<Minerval> {
        let mut minerval = self.get(id).await?;
        let before = minerval.tranches.len();
        minerval.tranches.retain(|t| t.id != tranche_id);
        if minerval.tranches.len() == before {
            return Err(CampusError::not_found("Tranche non trouvée"));
        }

        self.save(&mut minerval).await?;
        Ok(minerval)
    }

    /// Records a payment; the checks and the write share one store
    /// transaction so two concurrent payments cannot both pass the ceiling.
    pub async fn add_payment(&self, id: &str, input: PaiementInput) -> Result<(Minerval, Paiement)> {
        let etudiant_id = required(input.etudiant_id.as_deref(), "L'étudiant est requis")?;
        let montant = positive_amount(input.montant, "Montant invalide")?;
        let tranche_id = clean(input.tranche_id.as_deref());

        let mut tx = self.db.begin().await?;
        let mut minerval: Minerval = tx.get(id).await?.ok_or_else(not_found)?;
        let etudiant: Etudiant = tx
            .get(&etudiant_id)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé"))?;
        check_payment(&minerval, &etudiant, montant, tranche_id.as_deref())?;

        let now = Utc::now();
        let paiement = Paiement {
            id: campus_core::new_id(),
            etudiant_id: etudiant.id.clone(),
            montant,
            date_created: now,
            reference: payment_reference(now, &etudiant.id),
            mode: input.mode.unwrap_or_default(),
            tranche_id,
            statut: input.statut.unwrap_or_default(),
        };
        minerval.paiements.push(paiement.clone());
        tx.update(&mut minerval).await?;
        tx.commit().await?;
        self.invalidate();

        info!(
            "Payment {} of {} recorded on minerval {}",
            paiement.reference, paiement.montant, id
        );
        Ok((minerval, paiement))
    }

    pub async fn update_payment_statut(
        &self,
        id: &str,
        paiement_id: &str,
        statut: StatutPaiement,
    ) -> Result<Minerval> {
        let mut minerval = self.get(id).await?;
        let paiement = minerval
            .paiements
            .iter()
            .find(|p| p.id == paiement_id)
            .ok_or_else(|| CampusError::not_found("Paiement non trouvé"))?;

        if statut == StatutPaiement::Completed && !paiement.is_completed() {
            let paid = minerval.total_paye_etudiant(&paiement.etudiant_id);
            if paid + paiement.montant > minerval.montant {
                return Err(CampusError::validation("Le montant dépasse le reste à payer"));
            }
        }

        if let Some(paiement) = minerval.paiements.iter_mut().find(|p| p.id == paiement_id) {
            paiement.statut = statut;
        }
        self.save(&mut minerval).await?;
        info!("Payment {} of minerval {} now {:?}", paiement_id, id, statut);
        Ok(minerval)
    }

    pub async fn student_payments(&self, id: &str, etudiant_id: &str) -> Result<PaiementsEtudiant> {
        let minerval = self.get(id).await?;
        Ok(student_statement(&minerval, etudiant_id))
    }

    pub async fn report(&self, promotion_id: &str, annee_id: &str) -> Result<RapportMinerval> {
        let query = MinervalQuery {
            promotion_id: Some(promotion_id.to_string()),
            annee_id: Some(annee_id.to_string()),
        };
        let minerval = self
            .db
            .list_minervals(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CampusError::not_found("Minerval non trouvé pour cette promotion et année académique")
            })?;
        let etudiants = self.db.etudiants_enrolled(promotion_id, annee_id).await?;
        Ok(build_report(&minerval, &etudiants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::{Actifs, InfoAcad, InfoPerso, PromotionStatut};

    struct Fixture {
        service: MinervalService,
        db: Arc<Database>,
        cache: Arc<MemoryCache>,
        promotion_id: String,
        annee_id: String,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
        let now = Utc::now();
        let promotion = Promotion {
            id: campus_core::new_id(),
            description: None,
            section_id: "s1".to_string(),
            niveau: "L1".to_string(),
            mention: "GC".to_string(),
            orientation: None,
            statut: PromotionStatut::Actif,
            unites: vec![],
            created_at: now,
            updated_at: now,
        };
        let annee = Annee {
            id: campus_core::new_id(),
            slogan: "Excellence".to_string(),
            debut: 2024,
            fin: 2025,
            created_at: now,
            updated_at: now,
        };
        db.insert(&promotion).await.unwrap();
        db.insert(&annee).await.unwrap();
        Fixture {
            service: MinervalService::new(db.clone(), cache.clone()),
            db,
            cache,
            promotion_id: promotion.id,
            annee_id: annee.id,
        }
    }

    async fn student(f: &Fixture, enrolled: bool) -> String {
        let now = Utc::now();
        let info_acad = if enrolled {
            vec![InfoAcad {
                promotion_id: f.promotion_id.clone(),
                annee_id: f.annee_id.clone(),
                actifs: Actifs::default(),
            }]
        } else {
            vec![]
        };
        let etudiant = Etudiant {
            id: campus_core::new_id(),
            info_perso: InfoPerso {
                nom: "KABILA".to_string(),
                post_nom: "MUTOMBO".to_string(),
                ..Default::default()
            },
            info_sec: Default::default(),
            info_scol: Default::default(),
            info_acad,
            created_at: now,
            updated_at: now,
        };
        f.db.insert(&etudiant).await.unwrap();
        etudiant.id
    }

    fn input(f: &Fixture, montant: f64) -> MinervalInput {
        MinervalInput {
            promotion_id: Some(f.promotion_id.clone()),
            annee_id: Some(f.annee_id.clone()),
            montant: Some(montant),
            ..Default::default()
        }
    }

    fn payment(etudiant_id: &str, montant: f64) -> PaiementInput {
        PaiementInput {
            etudiant_id: Some(etudiant_id.to_string()),
            montant: Some(montant),
            ..Default::default()
        }
    }

    fn tranche(designation: &str, montant: f64) -> TrancheInput {
        TrancheInput {
            designation: Some(designation.to_string()),
            date_fin: None,
            montant: Some(montant),
        }
    }

    #[tokio::test]
    async fn test_one_minerval_per_promotion_and_year() {
        let f = fixture().await;
        let minerval = f.service.create(input(&f, 300.0)).await.unwrap();
        assert_eq!(minerval.devise, campus_core::Devise::Usd);

        let err = f.service.create(input(&f, 200.0)).await.unwrap_err();
        assert!(matches!(err, CampusError::Conflict(_)));

        let mut missing = input(&f, 300.0);
        missing.annee_id = Some("nope".to_string());
        assert!(matches!(
            f.service.create(missing).await,
            Err(CampusError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_cached_until_a_write() {
        let f = fixture().await;
        assert!(f.service.list(&MinervalQuery::default()).await.unwrap().is_empty());
        assert!(f.cache.exists("minervals:all"));

        f.service.create(input(&f, 300.0)).await.unwrap();
        assert!(!f.cache.exists("minervals:all"));

        let listed = f.service.list(&MinervalQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].total_paye, 0.0);
    }

    #[tokio::test]
    async fn test_tranches_stay_under_amount() {
        let f = fixture().await;
        let minerval = f.service.create(input(&f, 300.0)).await.unwrap();

        let minerval = f.service.add_tranche(&minerval.id, tranche("T1", 200.0)).await.unwrap();
        assert!(f.service.add_tranche(&minerval.id, tranche("T2", 150.0)).await.is_err());
        let minerval = f.service.add_tranche(&minerval.id, tranche("T2", 100.0)).await.unwrap();

        let t1 = minerval.tranches[0].id.clone();
        assert!(f
            .service
            .update_tranche(&minerval.id, &t1, TrancheInput { montant: Some(250.0), ..Default::default() })
            .await
            .is_err());
        let minerval = f
            .service
            .update_tranche(&minerval.id, &t1, TrancheInput { montant: Some(150.0), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(minerval.tranches[0].designation, "T1");
        assert_eq!(minerval.tranches[0].montant, 150.0);

        let minerval = f.service.remove_tranche(&minerval.id, &t1).await.unwrap();
        assert_eq!(minerval.tranches.len(), 1);
    }

    #[tokio::test]
    async fn test_payments_and_report() {
        let f = fixture().await;
        let minerval = f.service.create(input(&f, 300.0)).await.unwrap();
        let paid = student(&f, true).await;
        let partial = student(&f, true).await;
        let outsider = student(&f, false).await;

        let (_, paiement) = f.service.add_payment(&minerval.id, payment(&paid, 300.0)).await.unwrap();
        assert!(paiement.reference.starts_with("PAY-"));
        assert_eq!(paiement.statut, StatutPaiement::Completed);

        assert!(f.service.add_payment(&minerval.id, payment(&paid, 1.0)).await.is_err());
        assert!(f.service.add_payment(&minerval.id, payment(&outsider, 10.0)).await.is_err());
        let mut bad_tranche = payment(&partial, 10.0);
        bad_tranche.tranche_id = Some("nope".to_string());
        assert!(f.service.add_payment(&minerval.id, bad_tranche).await.is_err());

        f.service.add_payment(&minerval.id, payment(&partial, 100.0)).await.unwrap();

        let statement = f.service.student_payments(&minerval.id, &partial).await.unwrap();
        assert_eq!(statement.statistiques.total_paye, 100.0);
        assert_eq!(statement.statistiques.reste_a_payer, 200.0);

        let report = f.service.report(&f.promotion_id, &f.annee_id).await.unwrap();
        assert_eq!(report.statistiques.total_etudiants, 2);
        assert_eq!(report.statistiques.etudiants_a_jour, 1);
        assert_eq!(report.statistiques.total_percu, 400.0);
        assert_eq!(report.statistiques.total_attendu, 600.0);

        assert_eq!(f.service.by_etudiant(&paid).await.unwrap().len(), 1);
        assert!(f.service.by_etudiant(&outsider).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_amount_is_frozen_after_payments() {
        let f = fixture().await;
        let minerval = f.service.create(input(&f, 300.0)).await.unwrap();
        let etudiant = student(&f, true).await;
        let (_, paiement) = f
            .service
            .add_payment(&minerval.id, payment(&etudiant, 100.0))
            .await
            .unwrap();

        let err = f
            .service
            .update(&minerval.id, MinervalInput { montant: Some(400.0), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, CampusError::Validation(_)));

        let updated = f
            .service
            .update(
                &minerval.id,
                MinervalInput { devise: Some(campus_core::Devise::Fc), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.devise, campus_core::Devise::Fc);

        let updated = f
            .service
            .update_payment_statut(&minerval.id, &paiement.id, StatutPaiement::Canceled)
            .await
            .unwrap();
        assert_eq!(updated.total_paye(), 0.0);
    }
}
