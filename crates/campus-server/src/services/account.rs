//! Student wallets
//!
//! Every balance change is written to the wallet and mirrored into the
//! student's `infoSec.solde` inside one store transaction.

use super::etudiant::{commandes_prefix, profile_key};
use super::payment::{CollectRequest, PaymentGateway};
use crate::storage::{is_unique_violation, Database, MemoryCache};
use campus_core::reference::{commande_reference, commande_scope, recharge_reference};
use campus_core::validate::{clean, positive_amount, required};
use campus_core::wallet;
use campus_core::{
    Account, AccountView, CampusError, Commande, CommandeInput, Etudiant, Recharge, RechargeInput,
    RechargeStatut, Result,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CURRENCY: &str = "CDF";

pub fn account_key(etudiant_id: &str) -> String {
    format!("account:{}", etudiant_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandeResult {
    pub commande: Commande,
    pub solde: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RechargeResult {
    pub recharge: Recharge,
    pub solde: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RechargeCheck {
    pub recharge: Recharge,
    pub solde: f64,
    pub message: Option<String>,
}

fn empty_account(etudiant: &Etudiant) -> Account {
    let now = Utc::now();
    Account {
        id: campus_core::new_id(),
        etudiant_id: etudiant.id.clone(),
        solde: etudiant.info_sec.solde,
        frais_acad: 0.0,
        commandes: Vec::new(),
        recharges: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn commande_not_found() -> CampusError {
    CampusError::not_found("Commande non trouvée")
}

fn recharge_not_found() -> CampusError {
    CampusError::not_found("Recharge non trouvée")
}

fn commande_mut<'a>(account: &'a mut Account, id: &str) -> Result<&'a mut Commande> {
    account
        .commandes
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(commande_not_found)
}

fn recharge_mut<'a>(account: &'a mut Account, id: &str) -> Result<&'a mut Recharge> {
    account
        .recharges
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(recharge_not_found)
}

pub struct AccountService {
    db: Arc<Database>,
    cache: Arc<MemoryCache>,
    gateway: Arc<dyn PaymentGateway>,
}

impl AccountService {
    pub fn new(db: Arc<Database>, cache: Arc<MemoryCache>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { db, cache, gateway }
    }

    fn invalidate(&self, etudiant_id: &str) {
        self.cache.delete(&account_key(etudiant_id));
        self.cache.delete(&profile_key(etudiant_id));
    }

    /// Runs `change` on the student's wallet (created on first use) and
    /// writes the wallet and the mirrored student balance together.
    async fn mutate<R, F>(&self, etudiant_id: &str, change: F) -> Result<(Account, R)>
    where
        F: FnOnce(&mut Account) -> Result<R>,
    {
        let mut tx = self.db.begin().await?;
        let mut etudiant: Etudiant = tx
            .get(etudiant_id)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé"))?;

        let (mut account, created) = match tx.account_by_etudiant(etudiant_id).await? {
            Some(account) => (account, false),
            None => (empty_account(&etudiant), true),
        };

        let result = change(&mut account)?;
        if !account.solde.is_finite() {
            return Err(CampusError::validation("Solde invalide"));
        }

        if created {
            account.updated_at = Utc::now();
            tx.insert(&account).await?;
        } else {
            tx.update(&mut account).await?;
        }
        if etudiant.info_sec.solde != account.solde {
            etudiant.info_sec.solde = account.solde;
            tx.update(&mut etudiant).await?;
        }
        tx.commit().await?;

        self.invalidate(etudiant_id);
        Ok((account, result))
    }

    pub async fn get_or_create(&self, etudiant_id: &str) -> Result<Account> {
        if let Some(account) = self.db.account_by_etudiant(etudiant_id).await? {
            return Ok(account);
        }

        let etudiant: Etudiant = self
            .db
            .get(etudiant_id)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé"))?;
        let account = empty_account(&etudiant);
        match self.db.insert(&account).await {
            Ok(()) => {
                info!("Opened wallet for student {}", etudiant_id);
                Ok(account)
            }
            // created concurrently
            Err(e) if is_unique_violation(&e) => self
                .db
                .account_by_etudiant(etudiant_id)
                .await?
                .ok_or_else(|| e.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Wallet with its totals, read through the cache.
    pub async fn view(&self, etudiant_id: &str) -> Result<AccountView> {
        let ttl = self.cache.default_ttl();
        self.cache
            .cached(&account_key(etudiant_id), ttl, || async {
                self.get_or_create(etudiant_id).await.map(AccountView::from)
            })
            .await
    }

    pub async fn set_solde(&self, etudiant_id: &str, solde: Option<f64>) -> Result<f64> {
        let solde = solde
            .filter(|s| s.is_finite())
            .ok_or_else(|| CampusError::validation("Solde invalide"))?;
        let (account, ()) = self
            .mutate(etudiant_id, |account| {
                account.solde = solde;
                Ok(())
            })
            .await?;
        info!("Wallet of student {} set to {}", etudiant_id, account.solde);
        Ok(account.solde)
    }

    /// A caller-supplied `ref` is kept so that promotion-scoped purchases
    /// (`<promotionId>=...`) can be reported per promotion.
    pub async fn add_commande(&self, etudiant_id: &str, input: CommandeInput) -> Result<CommandeResult> {
        const INVALID: &str = "Données de commande invalides";
        let product = required(input.product.as_deref(), INVALID)?;
        let montant = positive_amount(input.montant, INVALID)?;
        let now = Utc::now();
        let commande = Commande {
            id: campus_core::new_id(),
            product,
            montant,
            reference: clean(input.reference.as_deref()).unwrap_or_else(|| commande_reference(now)),
            date_created: now,
        };

        let (account, commande) = self
            .mutate(etudiant_id, move |account| {
                account.solde -= commande.montant;
                account.commandes.push(commande.clone());
                Ok(commande)
            })
            .await?;

        if let Some(scope) = commande_scope(&commande.reference) {
            self.cache.delete_prefix(&commandes_prefix(scope));
        }
        info!(
            "Student {} bought {} for {}",
            etudiant_id, commande.product, commande.montant
        );
        Ok(CommandeResult {
            commande,
            solde: account.solde,
        })
    }

    pub async fn update_commande(
        &self,
        etudiant_id: &str,
        commande_id: Option<&str>,
        product: Option<&str>,
        montant: Option<f64>,
    ) -> Result<CommandeResult> {
        let commande_id = required(commande_id, "ID de commande requis")?;
        if product.is_none() && montant.is_none() {
            return Err(CampusError::validation("Données de mise à jour invalides"));
        }
        let montant = montant
            .map(|m| positive_amount(Some(m), "Montant invalide"))
            .transpose()?;
        let product = clean(product);

        let (account, commande) = self
            .mutate(etudiant_id, |account| {
                let commande = commande_mut(account, &commande_id)?;
                let delta = wallet::commande_updated(commande.montant, montant);
                if let Some(product) = product {
                    commande.product = product;
                }
                if let Some(montant) = montant {
                    commande.montant = montant;
                }
                let commande = commande.clone();
                account.solde += delta;
                Ok(commande)
            })
            .await?;

        Ok(CommandeResult {
            commande,
            solde: account.solde,
        })
    }

    /// Refunds the purchase and returns the new balance.
    pub async fn delete_commande(&self, etudiant_id: &str, commande_id: Option<&str>) -> Result<f64> {
        let commande_id = required(commande_id, "ID de commande requis")?;
        let (account, removed) = self
            .mutate(etudiant_id, |account| {
                let index = account
                    .commandes
                    .iter()
                    .position(|c| c.id == commande_id)
                    .ok_or_else(commande_not_found)?;
                let removed = account.commandes.remove(index);
                account.solde += removed.montant;
                Ok(removed)
            })
            .await?;

        if let Some(scope) = commande_scope(&removed.reference) {
            self.cache.delete_prefix(&commandes_prefix(scope));
        }
        Ok(account.solde)
    }

    /// Records a top-up. With a phone number the top-up starts `pending` and
    /// the customer is asked to pay through the gateway.
    pub async fn add_recharge(&self, etudiant_id: &str, input: RechargeInput) -> Result<RechargeResult> {
        let montant = positive_amount(input.montant, "Données de recharge invalides")?;
        let now = Utc::now();
        let phone = clean(input.phone.as_deref());
        let mut recharge = Recharge {
            id: campus_core::new_id(),
            montant,
            statut: input.statut.unwrap_or(RechargeStatut::Completed),
            reference: recharge_reference(now),
            order_number: None,
            phone: phone.clone(),
            date_created: now,
        };

        if let Some(phone) = phone {
            let response = self
                .gateway
                .collect(CollectRequest {
                    phone,
                    amount: montant,
                    reference: recharge.reference.clone(),
                    description: Some(format!("Recharge portefeuille {}", etudiant_id)),
                    currency: CURRENCY.to_string(),
                })
                .await?;
            if !response.is_accepted() {
                warn!(
                    "Gateway refused top-up {}: {:?}",
                    recharge.reference, response.message
                );
                return Err(CampusError::Gateway(
                    response
                        .message
                        .unwrap_or_else(|| "Paiement refusé".to_string()),
                ));
            }
            recharge.statut = RechargeStatut::Pending;
            recharge.order_number = response.order_number;
        }

        let (account, recharge) = self
            .mutate(etudiant_id, move |account| {
                account.solde += wallet::recharge_created(recharge.statut, recharge.montant);
                account.recharges.push(recharge.clone());
                Ok(recharge)
            })
            .await?;

        info!(
            "Top-up {} of {} for student {} ({:?})",
            recharge.reference, recharge.montant, etudiant_id, recharge.statut
        );
        Ok(RechargeResult {
            recharge,
            solde: account.solde,
        })
    }

    pub async fn update_recharge(
        &self,
        etudiant_id: &str,
        recharge_id: Option<&str>,
        montant: Option<f64>,
        statut: Option<RechargeStatut>,
    ) -> Result<RechargeResult> {
        let recharge_id = required(recharge_id, "ID de recharge requis")?;
        if montant.is_none() && statut.is_none() {
            return Err(CampusError::validation("Données de mise à jour invalides"));
        }
        let montant = montant
            .map(|m| positive_amount(Some(m), "Montant invalide"))
            .transpose()?;

        let (account, recharge) = self
            .mutate(etudiant_id, |account| {
                let recharge = recharge_mut(account, &recharge_id)?;
                let delta = wallet::recharge_updated(recharge.statut, recharge.montant, statut, montant);
                if let Some(statut) = statut {
                    recharge.statut = statut;
                }
                if let Some(montant) = montant {
                    recharge.montant = montant;
                }
                let recharge = recharge.clone();
                account.solde += delta;
                Ok(recharge)
            })
            .await?;

        debug!("Top-up {} now {:?}", recharge.id, recharge.statut);
        Ok(RechargeResult {
            recharge,
            solde: account.solde,
        })
    }

    /// Asks the gateway where a pending top-up stands and applies the answer.
    pub async fn check_recharge(&self, etudiant_id: &str, recharge_id: Option<&str>) -> Result<RechargeCheck> {
        let recharge_id = required(recharge_id, "ID de recharge requis")?;
        let account = self.get_or_create(etudiant_id).await?;
        let recharge = account
            .recharges
            .iter()
            .find(|r| r.id == recharge_id)
            .ok_or_else(recharge_not_found)?;
        let order_number = recharge.order_number.clone().ok_or_else(|| {
            CampusError::validation("Cette recharge n'a pas de numéro de commande")
        })?;

        let status = self.gateway.check(&order_number).await?;
        let outcome = status.outcome();
        if recharge.statut != RechargeStatut::Pending || outcome == RechargeStatut::Pending {
            return Ok(RechargeCheck {
                recharge: recharge.clone(),
                solde: account.solde,
                message: status.message,
            });
        }

        let updated = self
            .update_recharge(etudiant_id, Some(&recharge_id), None, Some(outcome))
            .await?;
        info!("Top-up {} settled as {:?}", recharge_id, outcome);
        Ok(RechargeCheck {
            recharge: updated.recharge,
            solde: updated.solde,
            message: status.message,
        })
    }

    /// Removes a top-up and returns the new balance.
    pub async fn delete_recharge(&self, etudiant_id: &str, recharge_id: Option<&str>) -> Result<f64> {
        let recharge_id = required(recharge_id, "ID de recharge requis")?;
        let (account, ()) = self
            .mutate(etudiant_id, |account| {
                let index = account
                    .recharges
                    .iter()
                    .position(|r| r.id == recharge_id)
                    .ok_or_else(recharge_not_found)?;
                let removed = account.recharges.remove(index);
                account.solde += wallet::recharge_deleted(removed.statut, removed.montant);
                Ok(())
            })
            .await?;
        Ok(account.solde)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payment::{CheckResponse, CollectResponse};
    use async_trait::async_trait;
    use campus_core::{InfoPerso, InfoSec};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Accepts every collect and reports whatever status is queued.
    #[derive(Default)]
    struct FakeGateway {
        status: Mutex<String>,
        collected: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn collect(&self, request: CollectRequest) -> Result<CollectResponse> {
            self.collected.lock().unwrap().push(request.phone);
            Ok(CollectResponse {
                code: serde_json::json!("0"),
                message: Some("ok".to_string()),
                order_number: Some("ORD-1".to_string()),
            })
        }

        async fn check(&self, _order_number: &str) -> Result<CheckResponse> {
            Ok(CheckResponse {
                status: serde_json::json!(self.status.lock().unwrap().clone()),
                message: Some("checked".to_string()),
                transaction: Default::default(),
            })
        }
    }

    async fn setup(solde: f64) -> (AccountService, Arc<Database>, Arc<MemoryCache>, Arc<FakeGateway>, String) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
        let gateway = Arc::new(FakeGateway::default());
        let now = Utc::now();
        let etudiant = Etudiant {
            id: campus_core::new_id(),
            info_perso: InfoPerso {
                nom: "KABILA".to_string(),
                post_nom: "MUTOMBO".to_string(),
                ..Default::default()
            },
            info_sec: InfoSec {
                solde,
                ..Default::default()
            },
            info_scol: Default::default(),
            info_acad: vec![],
            created_at: now,
            updated_at: now,
        };
        db.insert(&etudiant).await.unwrap();
        let service = AccountService::new(db.clone(), cache.clone(), gateway.clone());
        (service, db, cache, gateway, etudiant.id)
    }

    async fn student_solde(db: &Database, id: &str) -> f64 {
        db.get::<Etudiant>(id).await.unwrap().unwrap().info_sec.solde
    }

    fn commande(product: &str, montant: f64) -> CommandeInput {
        CommandeInput {
            product: Some(product.to_string()),
            montant: Some(montant),
            reference: None,
        }
    }

    #[tokio::test]
    async fn test_wallet_starts_from_student_balance() {
        let (service, _, _, _, id) = setup(40.0).await;
        let view = service.view(&id).await.unwrap();
        assert_eq!(view.account.solde, 40.0);
        assert_eq!(view.total_depense, 0.0);
        assert!(service.get_or_create("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_commandes_move_both_balances() {
        let (service, db, cache, _, id) = setup(100.0).await;
        service.view(&id).await.unwrap();

        let added = service.add_commande(&id, commande("carte", 30.0)).await.unwrap();
        assert_eq!(added.solde, 70.0);
        assert!(added.commande.reference.starts_with("CMD-"));
        assert_eq!(student_solde(&db, &id).await, 70.0);
        assert!(!cache.exists(&account_key(&id)));

        let updated = service
            .update_commande(&id, Some(&added.commande.id), None, Some(45.0))
            .await
            .unwrap();
        assert_eq!(updated.solde, 55.0);

        let solde = service
            .delete_commande(&id, Some(&added.commande.id))
            .await
            .unwrap();
        assert_eq!(solde, 100.0);
        assert_eq!(student_solde(&db, &id).await, 100.0);

        assert!(matches!(
            service.delete_commande(&id, Some("nope")).await,
            Err(CampusError::NotFound(_))
        ));
        assert!(service.add_commande(&id, commande("carte", 0.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_reference_is_kept() {
        let (service, _, _, _, id) = setup(0.0).await;
        let mut input = commande("carte", 5.0);
        input.reference = Some("p1=carte-2024".to_string());
        let added = service.add_commande(&id, input).await.unwrap();
        assert_eq!(added.commande.reference, "p1=carte-2024");
    }

    #[tokio::test]
    async fn test_recharge_status_changes() {
        let (service, db, _, _, id) = setup(0.0).await;
        let pending = service
            .add_recharge(
                &id,
                RechargeInput {
                    montant: Some(50.0),
                    statut: Some(RechargeStatut::Pending),
                    phone: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(pending.solde, 0.0);

        let completed = service
            .update_recharge(&id, Some(&pending.recharge.id), None, Some(RechargeStatut::Completed))
            .await
            .unwrap();
        assert_eq!(completed.solde, 50.0);

        let raised = service
            .update_recharge(&id, Some(&pending.recharge.id), Some(80.0), None)
            .await
            .unwrap();
        assert_eq!(raised.solde, 80.0);

        let failed = service
            .update_recharge(&id, Some(&pending.recharge.id), None, Some(RechargeStatut::Failed))
            .await
            .unwrap();
        assert_eq!(failed.solde, 0.0);
        assert_eq!(student_solde(&db, &id).await, 0.0);

        let view = service.view(&id).await.unwrap();
        assert_eq!(view.total_recharge, 0.0);
        let solde = service
            .delete_recharge(&id, Some(&pending.recharge.id))
            .await
            .unwrap();
        assert_eq!(solde, 0.0);
    }

    #[tokio::test]
    async fn test_mobile_money_recharge() {
        let (service, db, _, gateway, id) = setup(10.0).await;
        let added = service
            .add_recharge(
                &id,
                RechargeInput {
                    montant: Some(25.0),
                    statut: None,
                    phone: Some("243810000000".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(added.recharge.statut, RechargeStatut::Pending);
        assert_eq!(added.recharge.order_number.as_deref(), Some("ORD-1"));
        assert_eq!(added.solde, 10.0);
        assert_eq!(gateway.collected.lock().unwrap().len(), 1);

        *gateway.status.lock().unwrap() = "2".to_string();
        let waiting = service.check_recharge(&id, Some(&added.recharge.id)).await.unwrap();
        assert_eq!(waiting.recharge.statut, RechargeStatut::Pending);

        *gateway.status.lock().unwrap() = "0".to_string();
        let settled = service.check_recharge(&id, Some(&added.recharge.id)).await.unwrap();
        assert_eq!(settled.recharge.statut, RechargeStatut::Completed);
        assert_eq!(settled.solde, 35.0);
        assert_eq!(student_solde(&db, &id).await, 35.0);
    }

    #[tokio::test]
    async fn test_set_solde() {
        let (service, db, _, _, id) = setup(10.0).await;
        assert_eq!(service.set_solde(&id, Some(99.5)).await.unwrap(), 99.5);
        assert_eq!(student_solde(&db, &id).await, 99.5);
        assert!(service.set_solde(&id, Some(f64::NAN)).await.is_err());
        assert!(service.set_solde(&id, None).await.is_err());
    }
}
