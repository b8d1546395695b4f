//! Students: records, imports, profile reads and wallet purchase reports

use super::account::account_key;
use super::auth::hash_password;
use super::imports::{CsvImporter, EtudiantRow};
use crate::storage::{is_unique_violation, Database, MemoryCache};
use campus_core::dates::parse_optional_date;
use campus_core::reference::commande_scope;
use campus_core::validate::{clean, email};
use campus_core::{
    Actifs, Annee, CampusError, CommandeProduit, Etudiant, EtudiantBrief, EtudiantInput,
    EtudiantQuery, InfoPerso, InfoPersoInput, InfoScol, InfoSec, InfoSecInput, NameSearch,
    NameSearchHit, Promotion, Result, Sexe,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const COMMANDES_TTL: Duration = Duration::from_secs(300);

pub fn profile_key(etudiant_id: &str) -> String {
    format!("etudiant:{}:profile", etudiant_id)
}

pub fn commandes_prefix(promotion_id: &str) -> String {
    format!("commandes:produit:{}:", promotion_id)
}

/// A student's assets for one academic year, with the year and promotion
/// resolved when they still exist.
#[derive(Debug, Clone, Serialize)]
pub struct ActifsView {
    pub annee: Option<Annee>,
    pub promotion: Option<Promotion>,
    pub actifs: Actifs,
}

pub struct EtudiantService {
    db: Arc<Database>,
    cache: Arc<MemoryCache>,
    importer: Arc<CsvImporter>,
}

fn upper(value: Option<&str>) -> Option<String> {
    clean(value).map(|v| v.to_uppercase())
}

fn parse_sexe(value: Option<&str>) -> Result<Option<Sexe>> {
    clean(value)
        .map(|s| s.parse::<Sexe>().map_err(CampusError::Validation))
        .transpose()
}

fn check_scol(scol: &InfoScol) -> Result<()> {
    if let Some(p) = scol.pourcentage {
        if !(0.0..=100.0).contains(&p) {
            return Err(CampusError::validation(
                "Le pourcentage doit être compris entre 0 et 100",
            ));
        }
    }
    Ok(())
}

fn conflict_message(field: &str) -> &'static str {
    match field {
        "matricule" => "Ce matricule est déjà utilisé",
        "email" => "Cet email est déjà utilisé",
        _ => "Ce numéro de téléphone est déjà utilisé",
    }
}

fn build_perso(input: InfoPersoInput) -> Result<InfoPerso> {
    let (Some(nom), Some(post_nom)) = (
        upper(input.nom.as_deref()),
        upper(input.post_nom.as_deref()),
    ) else {
        return Err(CampusError::validation(
            "Le nom et le post-nom sont obligatoires",
        ));
    };

    Ok(InfoPerso {
        profile: clean(input.profile.as_deref()),
        nom,
        post_nom,
        pre_nom: upper(input.pre_nom.as_deref()),
        sexe: parse_sexe(input.sexe.as_deref())?,
        date_naissance: parse_optional_date(input.date_naissance.as_deref())?,
        lieu_naissance: clean(input.lieu_naissance.as_deref()),
        adresse: clean(input.adresse.as_deref()),
    })
}

fn merge_perso(perso: &mut InfoPerso, input: InfoPersoInput) -> Result<()> {
    if let Some(nom) = upper(input.nom.as_deref()) {
        perso.nom = nom;
    }
    if let Some(post_nom) = upper(input.post_nom.as_deref()) {
        perso.post_nom = post_nom;
    }
    if input.pre_nom.is_some() {
        perso.pre_nom = upper(input.pre_nom.as_deref());
    }
    if let Some(sexe) = parse_sexe(input.sexe.as_deref())? {
        perso.sexe = Some(sexe);
    }
    if let Some(date) = parse_optional_date(input.date_naissance.as_deref())? {
        perso.date_naissance = Some(date);
    }
    let optional_fields = [
        (&mut perso.profile, input.profile),
        (&mut perso.lieu_naissance, input.lieu_naissance),
        (&mut perso.adresse, input.adresse),
    ];
    for (field, value) in optional_fields {
        if value.is_some() {
            *field = clean(value.as_deref());
        }
    }
    Ok(())
}

impl EtudiantService {
    pub fn new(db: Arc<Database>, cache: Arc<MemoryCache>, importer: Arc<CsvImporter>) -> Self {
        Self {
            db,
            cache,
            importer,
        }
    }

    async fn check_duplicates(&self, sec: &InfoSec, exclude_id: Option<&str>) -> Result<()> {
        let fields = [
            ("matricule", sec.etudiant_id.as_deref()),
            ("email", sec.email.as_deref()),
            ("telephone", sec.telephone.as_deref()),
        ];
        if let Some(field) = self.db.find_conflict::<Etudiant>(&fields, exclude_id).await? {
            warn!("Student {} already taken", field);
            return Err(CampusError::conflict(conflict_message(field)));
        }
        Ok(())
    }

    fn map_write_error(e: anyhow::Error) -> CampusError {
        if is_unique_violation(&e) {
            CampusError::conflict("Étudiant déjà enregistré")
        } else {
            e.into()
        }
    }

    async fn store_password(&self, id: &str, mdp: Option<&str>) -> Result<()> {
        if let Some(password) = clean(mdp) {
            let hash = hash_password(&password)?;
            self.db.set_password::<Etudiant>(id, Some(&hash)).await?;
        }
        Ok(())
    }

    pub async fn create(&self, input: EtudiantInput) -> Result<Etudiant> {
        let info_perso = build_perso(input.info_perso.unwrap_or_default())?;
        let sec_input = input.info_sec.unwrap_or_default();
        let info_sec = InfoSec {
            etudiant_id: clean(sec_input.etudiant_id.as_deref()),
            email: email(sec_input.email.as_deref())?,
            telephone: clean(sec_input.telephone.as_deref()),
            opt_id: clean(sec_input.opt_id.as_deref()),
            avatar: clean(sec_input.avatar.as_deref()),
            solde: sec_input.solde.filter(|s| s.is_finite()).unwrap_or(0.0),
        };
        let info_scol = input.info_scol.unwrap_or_default();
        check_scol(&info_scol)?;

        self.check_duplicates(&info_sec, None).await?;

        let now = Utc::now();
        let etudiant = Etudiant {
            id: campus_core::new_id(),
            info_perso,
            info_sec,
            info_scol,
            info_acad: input.info_acad.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.db
            .insert(&etudiant)
            .await
            .map_err(Self::map_write_error)?;
        self.store_password(&etudiant.id, sec_input.mdp.as_deref())
            .await?;

        info!(
            "Created student {} ({})",
            etudiant.nom_complet(),
            etudiant.id
        );
        Ok(etudiant)
    }

    /// One student and one enrolment per row; stops at the first failure.
    pub async fn import(&self, file_name: &str) -> Result<Vec<Etudiant>> {
        let rows: Vec<EtudiantRow> = self.importer.read(file_name).await?;
        let mut etudiants = Vec::with_capacity(rows.len());
        for row in rows {
            etudiants.push(self.create(row.into()).await?);
        }
        info!("Imported {} students from {}", etudiants.len(), file_name);
        Ok(etudiants)
    }

    pub async fn list(&self, query: &EtudiantQuery) -> Result<Vec<Etudiant>> {
        Ok(self.db.list_etudiants(query).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Etudiant> {
        self.db
            .get(id)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé"))
    }

    pub async fn update(&self, id: &str, input: EtudiantInput) -> Result<Etudiant> {
        let mut etudiant = self.get(id).await?;

        if let Some(perso) = input.info_perso {
            merge_perso(&mut etudiant.info_perso, perso)?;
        }

        let mut mdp = None;
        let mut new_solde = None;
        if let Some(sec) = input.info_sec {
            let InfoSecInput {
                etudiant_id,
                email: address,
                telephone,
                opt_id,
                mdp: password,
                avatar,
                solde,
            } = sec;
            if let Some(matricule) = clean(etudiant_id.as_deref()) {
                etudiant.info_sec.etudiant_id = Some(matricule);
            }
            if let Some(address) = email(address.as_deref())? {
                etudiant.info_sec.email = Some(address);
            }
            if let Some(telephone) = clean(telephone.as_deref()) {
                etudiant.info_sec.telephone = Some(telephone);
            }
            if opt_id.is_some() {
                etudiant.info_sec.opt_id = clean(opt_id.as_deref());
            }
            if avatar.is_some() {
                etudiant.info_sec.avatar = clean(avatar.as_deref());
            }
            if let Some(solde) = solde.filter(|s| s.is_finite()) {
                etudiant.info_sec.solde = solde;
                new_solde = Some(solde);
            }
            mdp = password;
        }

        if let Some(scol) = input.info_scol {
            check_scol(&scol)?;
            etudiant.info_scol = scol;
        }
        if let Some(info_acad) = input.info_acad {
            etudiant.info_acad = info_acad;
        }

        self.check_duplicates(&etudiant.info_sec, Some(id)).await?;

        // The wallet and the student balance move together; a wallet opened
        // later starts from the student balance.
        let mut tx = self.db.begin().await?;
        tx.update(&mut etudiant)
            .await
            .map_err(Self::map_write_error)?;
        if let Some(solde) = new_solde {
            if let Some(mut account) = tx.account_by_etudiant(id).await? {
                if account.solde != solde {
                    account.solde = solde;
                    tx.update(&mut account).await?;
                }
            }
        }
        tx.commit().await?;

        self.store_password(id, mdp.as_deref()).await?;
        self.cache.delete(&profile_key(id));
        if new_solde.is_some() {
            self.cache.delete(&account_key(id));
        }

        info!("Updated student {}", id);
        Ok(etudiant)
    }

    pub async fn delete(&self, id: &str) -> Result<Etudiant> {
        let etudiant = self.get(id).await?;
        let mut tx = self.db.begin().await?;
        tx.delete::<Etudiant>(id).await?;
        let had_wallet = tx.delete_account_of(id).await?;
        tx.commit().await?;

        self.cache.delete(&profile_key(id));
        self.cache.delete(&account_key(id));
        info!("Deleted student {} (wallet removed: {})", id, had_wallet);
        Ok(etudiant)
    }

    /// Profile as shown to the connected student, read through the cache.
    pub async fn profile(&self, id: &str) -> Result<Etudiant> {
        let ttl = self.cache.default_ttl();
        self.cache
            .cached(&profile_key(id), ttl, || self.get(id))
            .await
    }

    pub async fn update_avatar(&self, id: &str, avatar: Option<&str>) -> Result<String> {
        let avatar = clean(avatar).ok_or_else(|| CampusError::validation("Avatar requis"))?;
        let mut etudiant = self.get(id).await?;
        etudiant.info_sec.avatar = Some(avatar.clone());
        self.db.update(&mut etudiant).await?;
        self.cache.delete(&profile_key(id));
        debug!("Avatar of student {} updated", id);
        Ok(avatar)
    }

    pub async fn solde(&self, id: &str) -> Result<f64> {
        Ok(self.get(id).await?.info_sec.solde)
    }

    pub async fn actifs(&self, id: &str, annee_id: Option<&str>) -> Result<ActifsView> {
        let annee_id =
            clean(annee_id).ok_or_else(|| CampusError::validation("ID de l'année requis"))?;
        let etudiant = self.get(id).await?;
        let acad = etudiant
            .info_acad
            .into_iter()
            .find(|acad| acad.annee_id == annee_id)
            .ok_or_else(|| {
                CampusError::not_found("Année académique non trouvée pour cet étudiant")
            })?;

        Ok(ActifsView {
            annee: self.db.get(&acad.annee_id).await?,
            promotion: self.db.get(&acad.promotion_id).await?,
            actifs: acad.actifs,
        })
    }

    pub async fn search_by_name(&self, search: &NameSearch) -> Result<Vec<NameSearchHit>> {
        let given = [&search.nom, &search.post_nom, &search.pre_nom]
            .iter()
            .any(|part| clean(part.as_deref()).is_some());
        if !given {
            return Err(CampusError::validation(
                "Au moins un critère de recherche est requis",
            ));
        }

        let etudiants = self.db.search_etudiants_by_name(search).await?;
        Ok(etudiants.iter().map(NameSearchHit::from).collect())
    }

    /// Wallet purchases scoped to a promotion (`ref` = `<promotionId>=...`),
    /// optionally for one product, newest first.
    pub async fn commandes_by_product(
        &self,
        promotion_id: &str,
        product: Option<&str>,
    ) -> Result<Vec<CommandeProduit>> {
        let product = clean(product);
        let key = format!(
            "{}{}",
            commandes_prefix(promotion_id),
            product.as_deref().unwrap_or("all")
        );

        self.cache
            .cached(&key, COMMANDES_TTL, || async {
                let mut rows = Vec::new();
                for account in self.db.accounts_with_scope(promotion_id).await? {
                    let Some(etudiant) = self.db.get::<Etudiant>(&account.etudiant_id).await?
                    else {
                        continue;
                    };
                    let brief = EtudiantBrief::from(&etudiant);
                    for commande in &account.commandes {
                        let in_scope = commande_scope(&commande.reference) == Some(promotion_id);
                        let wanted = product.as_deref().map_or(true, |p| commande.product == p);
                        if in_scope && wanted {
                            rows.push(CommandeProduit {
                                account_id: account.id.clone(),
                                etudiant: brief.clone(),
                                commande: commande.clone(),
                            });
                        }
                    }
                }
                rows.sort_by(|a, b| b.commande.date_created.cmp(&a.commande.date_created));
                Ok::<_, CampusError>(rows)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::verify_password;
    use crate::services::payment::DisabledGateway;
    use crate::services::AccountService;
    use campus_core::{Account, Commande, InfoAcad};

    async fn setup() -> (EtudiantService, Arc<Database>, Arc<MemoryCache>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
        let importer = Arc::new(CsvImporter::new(std::env::temp_dir()));
        (
            EtudiantService::new(db.clone(), cache.clone(), importer),
            db,
            cache,
        )
    }

    fn input(matricule: &str, email: &str) -> EtudiantInput {
        EtudiantInput {
            info_perso: Some(InfoPersoInput {
                nom: Some(" kabila ".to_string()),
                post_nom: Some("mutombo".to_string()),
                pre_nom: Some("jean".to_string()),
                sexe: Some("m".to_string()),
                date_naissance: Some("07/03/1998".to_string()),
                ..Default::default()
            }),
            info_sec: Some(InfoSecInput {
                etudiant_id: Some(matricule.to_string()),
                email: Some(email.to_string()),
                mdp: Some("secret".to_string()),
                ..Default::default()
            }),
            info_scol: None,
            info_acad: Some(vec![InfoAcad {
                promotion_id: "p1".to_string(),
                annee_id: "a1".to_string(),
                actifs: Actifs::default(),
            }]),
        }
    }

    #[tokio::test]
    async fn test_create_normalises_and_hashes() {
        let (service, db, _) = setup().await;
        let etudiant = service
            .create(input("2024001", "Jean@INBTP.cd"))
            .await
            .unwrap();

        assert_eq!(etudiant.info_perso.nom, "KABILA");
        assert_eq!(etudiant.info_perso.pre_nom.as_deref(), Some("JEAN"));
        assert_eq!(etudiant.info_perso.sexe, Some(Sexe::M));
        assert_eq!(etudiant.info_sec.email.as_deref(), Some("jean@inbtp.cd"));

        let hash = db
            .password_hash::<Etudiant>(&etudiant.id)
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("secret", &hash));
    }

    #[tokio::test]
    async fn test_validation_and_duplicates() {
        let (service, _, _) = setup().await;
        let missing = EtudiantInput {
            info_perso: Some(InfoPersoInput {
                nom: Some("KABILA".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            service.create(missing).await,
            Err(CampusError::Validation(_))
        ));

        let mut bad_percent = input("2024009", "x@inbtp.cd");
        bad_percent.info_scol = Some(InfoScol {
            pourcentage: Some(120.0),
            ..Default::default()
        });
        assert!(service.create(bad_percent).await.is_err());

        service.create(input("2024001", "a@inbtp.cd")).await.unwrap();
        let err = service
            .create(input("2024001", "b@inbtp.cd"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Ce matricule est déjà utilisé");
        let err = service
            .create(input("2024002", "A@inbtp.cd"))
            .await
            .unwrap_err();
        assert!(matches!(err, CampusError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_profile_cache_is_invalidated_on_update() {
        let (service, _, cache) = setup().await;
        let etudiant = service.create(input("2024001", "a@inbtp.cd")).await.unwrap();

        service.profile(&etudiant.id).await.unwrap();
        assert!(cache.exists(&profile_key(&etudiant.id)));

        let updated = service
            .update(
                &etudiant.id,
                EtudiantInput {
                    info_perso: Some(InfoPersoInput {
                        adresse: Some("Gombe".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.info_perso.adresse.as_deref(), Some("Gombe"));
        assert_eq!(updated.info_perso.nom, "KABILA");
        assert!(!cache.exists(&profile_key(&etudiant.id)));

        let avatar = service
            .update_avatar(&etudiant.id, Some("avatar.png"))
            .await
            .unwrap();
        assert_eq!(avatar, "avatar.png");
        assert!(service.update_avatar(&etudiant.id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_actifs_and_name_search() {
        let (service, _, _) = setup().await;
        let etudiant = service.create(input("2024001", "a@inbtp.cd")).await.unwrap();

        let view = service.actifs(&etudiant.id, Some("a1")).await.unwrap();
        assert!(view.annee.is_none());
        assert!(view.actifs.travaux.is_empty());
        assert!(matches!(
            service.actifs(&etudiant.id, Some("a2")).await,
            Err(CampusError::NotFound(_))
        ));

        assert!(service.search_by_name(&NameSearch::default()).await.is_err());
        let hits = service
            .search_by_name(&NameSearch {
                post_nom: Some("muto".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matricule.as_deref(), Some("2024001"));
    }

    #[tokio::test]
    async fn test_commandes_by_product() {
        let (service, db, _) = setup().await;
        let etudiant = service.create(input("2024001", "a@inbtp.cd")).await.unwrap();

        let now = Utc::now();
        let commande = |reference: &str, product: &str, minutes: i64| Commande {
            id: campus_core::new_id(),
            product: product.to_string(),
            montant: 10.0,
            reference: reference.to_string(),
            date_created: now + chrono::Duration::minutes(minutes),
        };
        let account = Account {
            id: campus_core::new_id(),
            etudiant_id: etudiant.id.clone(),
            solde: 0.0,
            frais_acad: 0.0,
            commandes: vec![
                commande("p1=carte", "carte", 1),
                commande("p1=syllabus", "syllabus", 2),
                commande("p2=carte", "carte", 3),
                commande("CMD-1-2", "carte", 4),
            ],
            recharges: vec![],
            created_at: now,
            updated_at: now,
        };
        db.insert(&account).await.unwrap();

        let all = service.commandes_by_product("p1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].commande.product, "syllabus");
        assert_eq!(all[0].etudiant.matricule.as_deref(), Some("2024001"));

        let cartes = service
            .commandes_by_product("p1", Some("carte"))
            .await
            .unwrap();
        assert_eq!(cartes.len(), 1);
    }

    fn wallet(service: &EtudiantService) -> AccountService {
        AccountService::new(
            service.db.clone(),
            service.cache.clone(),
            Arc::new(DisabledGateway),
        )
    }

    #[tokio::test]
    async fn test_solde_edit_reaches_the_wallet() {
        let (service, db, cache) = setup().await;
        let etudiant = service.create(input("2024001", "a@inbtp.cd")).await.unwrap();
        let accounts = wallet(&service);
        accounts.set_solde(&etudiant.id, Some(10.0)).await.unwrap();
        accounts.view(&etudiant.id).await.unwrap();
        assert!(cache.exists(&account_key(&etudiant.id)));

        let edit = EtudiantInput {
            info_sec: Some(InfoSecInput {
                solde: Some(500.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = service.update(&etudiant.id, edit).await.unwrap();
        assert_eq!(updated.info_sec.solde, 500.0);
        assert!(!cache.exists(&account_key(&etudiant.id)));
        let account = db.account_by_etudiant(&etudiant.id).await.unwrap().unwrap();
        assert_eq!(account.solde, 500.0);

        let purchase = campus_core::CommandeInput {
            product: Some("carte".to_string()),
            montant: Some(1.0),
            reference: None,
        };
        let result = accounts.add_commande(&etudiant.id, purchase).await.unwrap();
        assert_eq!(result.solde, 499.0);
        assert_eq!(service.solde(&etudiant.id).await.unwrap(), 499.0);
    }

    #[tokio::test]
    async fn test_delete_drops_the_wallet() {
        let (service, db, cache) = setup().await;
        let etudiant = service.create(input("2024001", "a@inbtp.cd")).await.unwrap();
        let accounts = wallet(&service);
        accounts.view(&etudiant.id).await.unwrap();
        assert!(cache.exists(&account_key(&etudiant.id)));

        service.delete(&etudiant.id).await.unwrap();
        assert!(db.account_by_etudiant(&etudiant.id).await.unwrap().is_none());
        assert!(!cache.exists(&account_key(&etudiant.id)));
    }
}
