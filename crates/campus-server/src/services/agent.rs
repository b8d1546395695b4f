//! Staff members

use super::auth::hash_password;
use super::imports::CsvImporter;
use crate::storage::{is_unique_violation, Database};
use campus_core::dates::parse_optional_date;
use campus_core::validate::{clean, email, required};
use campus_core::{Agent, AgentInput, AgentQuery, CampusError, Result, TypeAgent};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AgentService {
    db: Arc<Database>,
    importer: Arc<CsvImporter>,
}

fn conflict_message(field: &str) -> &'static str {
    match field {
        "matricule" => "Ce matricule est déjà utilisé",
        "email" => "Cet email est déjà utilisé",
        _ => "Ce numéro de téléphone est déjà utilisé",
    }
}

fn parse_type(value: Option<&str>) -> Result<Option<TypeAgent>> {
    clean(value)
        .map(|t| t.parse::<TypeAgent>().map_err(CampusError::Validation))
        .transpose()
}

impl AgentService {
    pub fn new(db: Arc<Database>, importer: Arc<CsvImporter>) -> Self {
        Self { db, importer }
    }

    async fn check_duplicates(
        &self,
        matricule: Option<&str>,
        email: Option<&str>,
        telephone: Option<&str>,
        exclude_id: Option<&str>,
    ) -> Result<()> {
        let fields = [
            ("matricule", matricule),
            ("email", email),
            ("telephone", telephone),
        ];
        if let Some(field) = self.db.find_conflict::<Agent>(&fields, exclude_id).await? {
            warn!("Agent {} already taken", field);
            return Err(CampusError::conflict(conflict_message(field)));
        }
        Ok(())
    }

    pub async fn create(&self, input: AgentInput) -> Result<Agent> {
        let nom = clean(input.nom.as_deref());
        let matricule = clean(input.matricule.as_deref());
        let (Some(nom), Some(matricule)) = (nom, matricule) else {
            return Err(CampusError::validation(
                "Le nom et le matricule sont obligatoires",
            ));
        };
        let email = email(input.email.as_deref())?;
        let telephone = clean(input.telephone.as_deref());

        self.check_duplicates(
            Some(&matricule),
            email.as_deref(),
            telephone.as_deref(),
            None,
        )
        .await?;

        let now = Utc::now();
        let agent = Agent {
            id: campus_core::new_id(),
            nom,
            postnom: clean(input.postnom.as_deref()),
            prenom: clean(input.prenom.as_deref()),
            sexe: clean(input.sexe.as_deref()),
            grade: clean(input.grade.as_deref()),
            nationalite: clean(input.nationalite.as_deref()),
            type_agent: parse_type(input.type_agent.as_deref())?,
            lieu_naissance: clean(input.lieu_naissance.as_deref()),
            telephone,
            adresse: clean(input.adresse.as_deref()),
            email,
            avatar: clean(input.avatar.as_deref()),
            date_naissance: parse_optional_date(input.date_naissance.as_deref())?,
            niveau: clean(input.niveau.as_deref()),
            solde: input.solde,
            matricule,
            created_at: now,
            updated_at: now,
        };

        self.db.insert(&agent).await.map_err(|e| {
            if is_unique_violation(&e) {
                CampusError::conflict("Agent déjà enregistré")
            } else {
                e.into()
            }
        })?;

        // agents without a password start with their matricule
        let password = clean(input.mdp.as_deref()).unwrap_or_else(|| agent.matricule.clone());
        let hash = hash_password(&password)?;
        self.db.set_password::<Agent>(&agent.id, Some(&hash)).await?;

        info!("Created agent {} ({})", agent.matricule, agent.id);
        Ok(agent)
    }

    /// Creates every row of `<assets>/<file_name>`; stops at the first row
    /// that fails.
    pub async fn import(&self, file_name: &str) -> Result<Vec<Agent>> {
        let rows: Vec<AgentInput> = self.importer.read(file_name).await?;
        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            agents.push(self.create(row).await?);
        }
        info!("Imported {} agents from {}", agents.len(), file_name);
        Ok(agents)
    }

    pub async fn list(&self, query: &AgentQuery) -> Result<Vec<Agent>> {
        let type_agent = parse_type(query.type_agent.as_deref())?;
        let search = clean(query.search.as_deref());
        Ok(self
            .db
            .list_agents(type_agent.map(|t| t.as_str()), search.as_deref())
            .await?)
    }

    pub async fn get(&self, id: &str) -> Result<Agent> {
        self.db
            .get(id)
            .await?
            .ok_or_else(|| CampusError::not_found("Agent non trouvé"))
    }

    pub async fn update(&self, id: &str, input: AgentInput) -> Result<Agent> {
        let mut agent = self.get(id).await?;

        let matricule = clean(input.matricule.as_deref());
        let email = email(input.email.as_deref())?;
        let telephone = clean(input.telephone.as_deref());
        self.check_duplicates(
            matricule.as_deref(),
            email.as_deref(),
            telephone.as_deref(),
            Some(id),
        )
        .await?;

        if let Some(nom) = input.nom {
            agent.nom = required(Some(&nom), "Le nom est obligatoire")?;
        }
        if let Some(matricule) = matricule {
            agent.matricule = matricule;
        }
        if email.is_some() {
            agent.email = email;
        }
        if telephone.is_some() {
            agent.telephone = telephone;
        }
        if let Some(date) = parse_optional_date(input.date_naissance.as_deref())? {
            agent.date_naissance = Some(date);
        }
        if let Some(type_agent) = parse_type(input.type_agent.as_deref())? {
            agent.type_agent = Some(type_agent);
        }

        let optional_fields = [
            (&mut agent.postnom, input.postnom),
            (&mut agent.prenom, input.prenom),
            (&mut agent.sexe, input.sexe),
            (&mut agent.grade, input.grade),
            (&mut agent.nationalite, input.nationalite),
            (&mut agent.lieu_naissance, input.lieu_naissance),
            (&mut agent.adresse, input.adresse),
            (&mut agent.avatar, input.avatar),
            (&mut agent.niveau, input.niveau),
        ];
        for (field, value) in optional_fields {
            if value.is_some() {
                *field = clean(value.as_deref());
            }
        }
        if input.solde.is_some() {
            agent.solde = input.solde;
        }

        self.db.update(&mut agent).await.map_err(|e| {
            if is_unique_violation(&e) {
                CampusError::conflict("Agent déjà enregistré")
            } else {
                e.into()
            }
        })?;

        if let Some(password) = clean(input.mdp.as_deref()) {
            let hash = hash_password(&password)?;
            self.db.set_password::<Agent>(id, Some(&hash)).await?;
        }

        info!("Updated agent {}", id);
        Ok(agent)
    }

    pub async fn delete(&self, id: &str) -> Result<Agent> {
        let agent = self.get(id).await?;
        self.db.delete::<Agent>(id).await?;
        info!("Deleted agent {}", id);
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::verify_password;
    use std::path::PathBuf;

    async fn service() -> (AgentService, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let importer = Arc::new(CsvImporter::new(std::env::temp_dir()));
        (AgentService::new(db.clone(), importer), db)
    }

    fn input(matricule: &str, email: Option<&str>) -> AgentInput {
        AgentInput {
            nom: Some("MUKENDI".to_string()),
            prenom: Some("Paul".to_string()),
            matricule: Some(matricule.to_string()),
            email: email.map(str::to_string),
            type_agent: Some("enseignant".to_string()),
            date_naissance: Some("12/03/1980".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_matricule_fails() {
        let (service, _) = service().await;
        service.create(input("AG-001", None)).await.unwrap();

        let err = service.create(input("AG-001", None)).await.unwrap_err();
        assert!(matches!(err, CampusError::Conflict(_)));
        assert_eq!(err.to_string(), "Ce matricule est déjà utilisé");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let (service, _) = service().await;
        let agent = service
            .create(input("AG-001", Some("Paul@INBTP.cd")))
            .await
            .unwrap();
        assert_eq!(agent.email.as_deref(), Some("paul@inbtp.cd"));
        assert_eq!(
            agent.date_naissance,
            chrono::NaiveDate::from_ymd_opt(1980, 3, 12)
        );

        let err = service
            .create(input("AG-002", Some("paul@inbtp.cd")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cet email est déjà utilisé");
    }

    #[tokio::test]
    async fn test_required_fields_and_password() {
        let (service, db) = service().await;
        let err = service
            .create(AgentInput {
                nom: Some("MUKENDI".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CampusError::Validation(_)));

        let agent = service.create(input("AG-001", None)).await.unwrap();
        let hash = db.password_hash::<Agent>(&agent.id).await.unwrap().unwrap();
        assert!(verify_password("AG-001", &hash));

        let json = serde_json::to_value(&agent).unwrap();
        assert!(json.get("mdp").is_none());
    }

    #[tokio::test]
    async fn test_update_excludes_self_and_delete() {
        let (service, _) = service().await;
        let agent = service
            .create(input("AG-001", Some("paul@inbtp.cd")))
            .await
            .unwrap();
        service.create(input("AG-002", None)).await.unwrap();

        let updated = service
            .update(
                &agent.id,
                AgentInput {
                    email: Some("paul@inbtp.cd".to_string()),
                    grade: Some("Professeur".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.grade.as_deref(), Some("Professeur"));

        let err = service
            .update(
                &agent.id,
                AgentInput {
                    matricule: Some("AG-002".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CampusError::Conflict(_)));

        service.delete(&agent.id).await.unwrap();
        assert!(matches!(
            service.get(&agent.id).await,
            Err(CampusError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (service, _) = service().await;
        service.create(input("AG-001", None)).await.unwrap();
        let mut admin = input("ADM-7", None);
        admin.nom = Some("KALALA".to_string());
        admin.type_agent = Some("administratif".to_string());
        service.create(admin).await.unwrap();

        let teachers = service
            .list(&AgentQuery {
                type_agent: Some("enseignant".to_string()),
                search: None,
            })
            .await
            .unwrap();
        assert_eq!(teachers.len(), 1);

        let found = service
            .list(&AgentQuery {
                type_agent: None,
                search: Some("kala".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matricule, "ADM-7");
    }

    #[tokio::test]
    async fn test_import_from_assets() {
        let dir = std::env::temp_dir().join(format!("campus-assets-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("agents.csv"),
            "nom;matricule;email;typeAgent\nMUKENDI;AG-001;paul@inbtp.cd;enseignant\nKALALA;AG-002;;administratif\n",
        )
        .unwrap();

        let db = Arc::new(Database::in_memory().await.unwrap());
        let service = AgentService::new(db, Arc::new(CsvImporter::new(PathBuf::from(&dir))));
        let agents = service.import("agents.csv").await.unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(agents.len(), 2);
        assert_eq!(agents[1].type_agent, Some(TypeAgent::Administratif));
        assert!(agents[1].email.is_none());
    }
}
