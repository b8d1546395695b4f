//! Collection-specific lookups on top of the document tables

use super::db::{decode, decode_all, Database, DbTx};
use super::document::Document;
use anyhow::{Context, Result};
use campus_core::{
    Account, Agent, Appariteur, Etudiant, EtudiantQuery, Matiere, Minerval, MinervalQuery,
    NameSearch, Promotion, Retrait, RetraitFilter, Section,
};
use sqlx::{Executor, QueryBuilder, Sqlite};

/// Substring pattern over a folded `*_key` column; `%`, `_` and `\` are escaped with a backslash.
fn like(value: &str) -> String {
    let mut pattern = String::from("%");
    for c in value.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn fetch_all<'e, T, E>(executor: E, mut qb: QueryBuilder<'_, Sqlite>) -> Result<Vec<T>>
where
    T: Document,
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<String> = qb
        .build_query_scalar()
        .fetch_all(executor)
        .await
        .with_context(|| format!("Failed to query {}", T::TABLE))?;
    decode_all(rows)
}

async fn fetch_account_by_etudiant<'e, E>(executor: E, etudiant_id: &str) -> Result<Option<Account>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<String> = sqlx::query_scalar("SELECT doc FROM accounts WHERE etudiant_id = ?")
        .bind(etudiant_id)
        .fetch_optional(executor)
        .await
        .context("Failed to read account")?;
    row.map(|body| decode(&body)).transpose()
}

impl DbTx {
    pub async fn account_by_etudiant(&mut self, etudiant_id: &str) -> Result<Option<Account>> {
        fetch_account_by_etudiant(self.conn(), etudiant_id).await
    }

    pub async fn delete_account_of(&mut self, etudiant_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE etudiant_id = ?")
            .bind(etudiant_id)
            .execute(self.conn())
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected() > 0)
    }
}

impl Database {
    /// First of `fields` whose value is already taken by another row of `T`.
    pub async fn find_conflict<T: Document>(
        &self,
        fields: &[(&'static str, Option<&str>)],
        exclude_id: Option<&str>,
    ) -> Result<Option<&'static str>> {
        for (column, value) in fields {
            let Some(value) = value else { continue };
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ? AND id != ?",
                T::TABLE,
                column
            );
            let count: i64 = sqlx::query_scalar(&sql)
                .bind(*value)
                .bind(exclude_id.unwrap_or(""))
                .fetch_one(self.pool())
                .await
                .with_context(|| format!("Failed to check {}.{}", T::TABLE, column))?;
            if count > 0 {
                return Ok(Some(*column));
            }
        }
        Ok(None)
    }

    /// Store a password hash next to an agent or student document.
    pub async fn set_password<T: Document>(&self, id: &str, hash: Option<&str>) -> Result<()> {
        let sql = format!("UPDATE {} SET mdp = ? WHERE id = ?", T::TABLE);
        sqlx::query(&sql)
            .bind(hash)
            .bind(id)
            .execute(self.pool())
            .await
            .with_context(|| format!("Failed to store password for {}", id))?;
        Ok(())
    }

    pub async fn password_hash<T: Document>(&self, id: &str) -> Result<Option<String>> {
        let sql = format!("SELECT mdp FROM {} WHERE id = ?", T::TABLE);
        let hash: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .with_context(|| format!("Failed to read password for {}", id))?;
        Ok(hash.flatten())
    }

    pub async fn list_agents(
        &self,
        type_agent: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Agent>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM agents WHERE 1 = 1");
        if let Some(type_agent) = type_agent {
            qb.push(" AND type_agent = ").push_bind(type_agent.to_string());
        }
        if let Some(search) = search {
            let pattern = like(search);
            qb.push(" AND (coalesce(nom_key, '') LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR coalesce(prenom_key, '') LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR coalesce(matricule_key, '') LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        qb.push(" ORDER BY created_at DESC");
        fetch_all(self.pool(), qb).await
    }

    pub async fn sections_of_agent(&self, agent_id: &str) -> Result<Vec<Section>> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT s.doc FROM sections s
            WHERE EXISTS (
                SELECT 1 FROM json_each(s.doc, '$.bureaux') b
                WHERE json_extract(b.value, '$.agentId') = ?
            )
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(agent_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query sections of agent")?;
        decode_all(rows)
    }

    pub async fn promotions_by_section(&self, section_id: &str) -> Result<Vec<Promotion>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT doc FROM promotions WHERE section_id = ? ORDER BY created_at DESC",
        )
        .bind(section_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query promotions of section")?;
        decode_all(rows)
    }

    pub async fn matieres_by_unite(&self, code_unite: &str) -> Result<Vec<Matiere>> {
        self.matieres_by_unites(&[code_unite.to_string()]).await
    }

    pub async fn matieres_by_unites(&self, codes: &[String]) -> Result<Vec<Matiere>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM matieres WHERE code_unite IN (");
        let mut separated = qb.separated(", ");
        for code in codes {
            separated.push_bind(code.clone());
        }
        qb.push(") ORDER BY created_at DESC");
        fetch_all(self.pool(), qb).await
    }

    pub async fn list_etudiants(&self, query: &EtudiantQuery) -> Result<Vec<Etudiant>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM etudiants WHERE 1 = 1");

        let substring_filters = [
            ("nom_key", query.nom.as_deref()),
            ("post_nom_key", query.postnom.as_deref()),
            ("pre_nom_key", query.prenom.as_deref()),
            ("email_key", query.email.as_deref()),
            ("telephone_key", query.telephone.as_deref()),
        ];
        for (column, value) in substring_filters {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                qb.push(format!(" AND coalesce({}, '') LIKE ", column))
                    .push_bind(like(value))
                    .push(" ESCAPE '\\'");
            }
        }

        if let Some(sexe) = query.sexe.as_deref() {
            qb.push(" AND sexe = ").push_bind(sexe.trim().to_uppercase());
        }
        if let Some(section) = query.section.as_deref() {
            qb.push(" AND section = ").push_bind(section.to_string());
        }
        if let Some(option) = query.option.as_deref() {
            qb.push(" AND scol_option = ").push_bind(option.to_string());
        }
        if let Some(matricule) = query.matricule.as_deref() {
            qb.push(" AND matricule = ").push_bind(matricule.to_string());
        }

        if query.annee_id.is_some() || query.promotion_id.is_some() {
            qb.push(" AND EXISTS (SELECT 1 FROM json_each(etudiants.doc, '$.infoAcad') a WHERE 1 = 1");
            if let Some(annee_id) = query.annee_id.as_deref() {
                qb.push(" AND json_extract(a.value, '$.anneeId') = ")
                    .push_bind(annee_id.to_string());
            }
            if let Some(promotion_id) = query.promotion_id.as_deref() {
                qb.push(" AND json_extract(a.value, '$.promotionId') = ")
                    .push_bind(promotion_id.to_string());
            }
            qb.push(")");
        }

        qb.push(" ORDER BY created_at DESC");
        fetch_all(self.pool(), qb).await
    }

    pub async fn etudiants_enrolled(
        &self,
        promotion_id: &str,
        annee_id: &str,
    ) -> Result<Vec<Etudiant>> {
        let query = EtudiantQuery {
            promotion_id: Some(promotion_id.to_string()),
            annee_id: Some(annee_id.to_string()),
            ..Default::default()
        };
        self.list_etudiants(&query).await
    }

    /// Case-insensitive substring search on whichever name parts are given.
    pub async fn search_etudiants_by_name(&self, search: &NameSearch) -> Result<Vec<Etudiant>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM etudiants WHERE 1 = 1");
        let parts = [
            ("nom_key", search.nom.as_deref()),
            ("post_nom_key", search.post_nom.as_deref()),
            ("pre_nom_key", search.pre_nom.as_deref()),
        ];
        for (column, value) in parts {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                qb.push(format!(" AND coalesce({}, '') LIKE ", column))
                    .push_bind(like(value))
                    .push(" ESCAPE '\\'");
            }
        }
        qb.push(" ORDER BY nom, post_nom LIMIT 50");
        fetch_all(self.pool(), qb).await
    }

    pub async fn etudiant_by_credentials(
        &self,
        matricule: &str,
        email: &str,
    ) -> Result<Option<Etudiant>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT doc FROM etudiants WHERE matricule = ? AND email = ?")
                .bind(matricule)
                .bind(email)
                .fetch_optional(self.pool())
                .await
                .context("Failed to look up student")?;
        row.map(|body| decode(&body)).transpose()
    }

    pub async fn list_minervals(&self, query: &MinervalQuery) -> Result<Vec<Minerval>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM minervals WHERE 1 = 1");
        if let Some(promotion_id) = query.promotion_id.as_deref() {
            qb.push(" AND promotion_id = ").push_bind(promotion_id.to_string());
        }
        if let Some(annee_id) = query.annee_id.as_deref() {
            qb.push(" AND annee_id = ").push_bind(annee_id.to_string());
        }
        qb.push(" ORDER BY created_at DESC");
        fetch_all(self.pool(), qb).await
    }

    pub async fn minervals_paid_by(&self, etudiant_id: &str) -> Result<Vec<Minerval>> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT m.doc FROM minervals m
            WHERE EXISTS (
                SELECT 1 FROM json_each(m.doc, '$.paiements') p
                WHERE json_extract(p.value, '$.etudiantId') = ?
            )
            ORDER BY m.created_at DESC
            "#,
        )
        .bind(etudiant_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query minervals of student")?;
        decode_all(rows)
    }

    pub async fn account_by_etudiant(&self, etudiant_id: &str) -> Result<Option<Account>> {
        fetch_account_by_etudiant(self.pool(), etudiant_id).await
    }

    /// Wallets holding at least one purchase scoped to `promotion_id`.
    pub async fn accounts_with_scope(&self, promotion_id: &str) -> Result<Vec<Account>> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT a.doc FROM accounts a
            WHERE EXISTS (
                SELECT 1 FROM json_each(a.doc, '$.commandes') c
                WHERE substr(json_extract(c.value, '$.ref'), 1, ?) = ?
            )
            "#,
        )
        .bind(promotion_id.len() as i64 + 1)
        .bind(format!("{}=", promotion_id))
        .fetch_all(self.pool())
        .await
        .context("Failed to query scoped purchases")?;
        decode_all(rows)
    }

    pub async fn list_retraits(&self, filter: &RetraitFilter) -> Result<Vec<Retrait>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM retraits WHERE 1 = 1");
        if let Some(retrait_type) = filter.retrait_type {
            qb.push(" AND retrait_type = ").push_bind(retrait_type.as_str());
        }
        if let Some(reference) = filter.reference.as_deref() {
            qb.push(" AND reference = ").push_bind(reference.to_string());
        }
        if let Some(agent_id) = filter.agent_id.as_deref() {
            qb.push(" AND agent_id = ").push_bind(agent_id.to_string());
        }
        if let Some(statut) = filter.statut {
            qb.push(" AND statut = ").push_bind(statut.as_str());
        }
        qb.push(" ORDER BY date_created DESC");
        fetch_all(self.pool(), qb).await
    }

    pub async fn retrait_by_ref(&self, reference: &str) -> Result<Option<Retrait>> {
        let row: Option<String> = sqlx::query_scalar("SELECT doc FROM retraits WHERE reference = ?")
            .bind(reference)
            .fetch_optional(self.pool())
            .await
            .context("Failed to look up withdrawal")?;
        row.map(|body| decode(&body)).transpose()
    }

    pub async fn appariteurs_by_agent(&self, agent_id: &str) -> Result<Vec<Appariteur>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT doc FROM appariteurs WHERE agent_id = ? ORDER BY created_at DESC",
        )
        .bind(agent_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query appariteurs of agent")?;
        decode_all(rows)
    }

    pub async fn appariteur_exists(
        &self,
        agent_id: &str,
        annee_id: &str,
        section_id: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appariteurs WHERE agent_id = ? AND annee_id = ? AND section_id = ?",
        )
        .bind(agent_id)
        .bind(annee_id)
        .bind(section_id)
        .fetch_one(self.pool())
        .await
        .context("Failed to check appariteur")?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::{
        Actifs, Bureau, Commande, InfoAcad, InfoPerso, InfoScol, InfoSec, Sexe,
    };
    use chrono::Utc;

    fn etudiant(nom: &str, matricule: &str, promotion_id: &str) -> Etudiant {
        let now = Utc::now();
        Etudiant {
            id: campus_core::new_id(),
            info_perso: InfoPerso {
                nom: nom.to_string(),
                post_nom: "MUTOMBO".to_string(),
                sexe: Some(Sexe::F),
                ..Default::default()
            },
            info_sec: InfoSec {
                etudiant_id: Some(matricule.to_string()),
                email: Some(format!("{}@inbtp.cd", matricule)),
                ..Default::default()
            },
            info_scol: InfoScol::default(),
            info_acad: vec![InfoAcad {
                promotion_id: promotion_id.to_string(),
                annee_id: "a1".to_string(),
                actifs: Actifs::default(),
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_student_filters() {
        let db = Database::in_memory().await.unwrap();
        db.insert(&etudiant("KABILA", "2024001", "p1")).await.unwrap();
        db.insert(&etudiant("KASONGO", "2024002", "p2")).await.unwrap();

        let by_name = db
            .list_etudiants(&EtudiantQuery {
                nom: Some("kab".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);

        let enrolled = db.etudiants_enrolled("p2", "a1").await.unwrap();
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].matricule(), Some("2024002"));

        let by_sexe = db
            .list_etudiants(&EtudiantQuery {
                sexe: Some("f".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_sexe.len(), 2);

        let found = db
            .etudiant_by_credentials("2024001", "2024001@inbtp.cd")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_name_search_folds_accents_and_escapes_wildcards() {
        let db = Database::in_memory().await.unwrap();
        db.insert(&etudiant("ÉLISE", "2024001", "p1")).await.unwrap();
        db.insert(&etudiant("KA_BILA", "2024002", "p1")).await.unwrap();
        db.insert(&etudiant("KASONGO", "2024003", "p1")).await.unwrap();

        for nom in ["élise", "ÉLISE", "Éli"] {
            let found = db
                .search_etudiants_by_name(&NameSearch {
                    nom: Some(nom.to_string()),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(found.len(), 1, "search for {}", nom);
        }

        let underscore = db
            .list_etudiants(&EtudiantQuery {
                nom: Some("_".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].info_perso.nom, "KA_BILA");

        let percent = db
            .list_etudiants(&EtudiantQuery {
                nom: Some("%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(percent.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_lookup_excludes_self() {
        let db = Database::in_memory().await.unwrap();
        let e = etudiant("KABILA", "2024001", "p1");
        db.insert(&e).await.unwrap();

        let fields = [
            ("matricule", Some("2024001")),
            ("email", Some("autre@inbtp.cd")),
        ];
        let conflict = db.find_conflict::<Etudiant>(&fields, None).await.unwrap();
        assert_eq!(conflict, Some("matricule"));

        let conflict = db
            .find_conflict::<Etudiant>(&fields, Some(&e.id))
            .await
            .unwrap();
        assert_eq!(conflict, None);
    }

    #[tokio::test]
    async fn test_nested_array_lookups() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();

        let section = Section {
            id: campus_core::new_id(),
            titre: "Génie civil".to_string(),
            description: None,
            url: "genie-civil".to_string(),
            email: "gc@inbtp.cd".to_string(),
            telephone: None,
            bureaux: vec![Bureau {
                id: campus_core::new_id(),
                grade: "Chef de section".to_string(),
                agent_id: "ag1".to_string(),
            }],
            offres: vec![],
            created_at: now,
            updated_at: now,
        };
        db.insert(&section).await.unwrap();
        assert_eq!(db.sections_of_agent("ag1").await.unwrap().len(), 1);
        assert!(db.sections_of_agent("ag2").await.unwrap().is_empty());

        let account = Account {
            id: campus_core::new_id(),
            etudiant_id: "e1".to_string(),
            solde: 0.0,
            frais_acad: 0.0,
            commandes: vec![Commande {
                id: campus_core::new_id(),
                product: "Syllabus".to_string(),
                montant: 5.0,
                reference: "p1=syllabus".to_string(),
                date_created: now,
            }],
            recharges: vec![],
            created_at: now,
            updated_at: now,
        };
        db.insert(&account).await.unwrap();
        assert_eq!(db.accounts_with_scope("p1").await.unwrap().len(), 1);
        assert!(db.accounts_with_scope("p").await.unwrap().is_empty());

        let mut tx = db.begin().await.unwrap();
        assert!(tx.account_by_etudiant("e1").await.unwrap().is_some());
        tx.commit().await.unwrap();
    }
}
