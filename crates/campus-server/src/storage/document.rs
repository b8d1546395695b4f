//! Mapping between domain documents and SQLite rows.
//!
//! Every collection table has an `id` primary key, a `doc` column holding the
//! JSON document, and a few scalar columns mirrored from the document for
//! lookups, ordering and unique constraints.

use campus_core::{
    Account, Agent, Annee, Appariteur, Etudiant, Matiere, Minerval, Promotion, Retrait, Section,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Value of a mirrored column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Option<String>),
    Integer(Option<i64>),
}

impl Column {
    pub fn text<S: AsRef<str>>(value: Option<S>) -> Self {
        Column::Text(value.map(|v| v.as_ref().to_string()))
    }

    /// Lower-cased copy for case-insensitive search. SQLite's `lower()` only
    /// folds ASCII, so folding happens here.
    pub fn folded<S: AsRef<str>>(value: Option<S>) -> Self {
        Column::Text(value.map(|v| v.as_ref().to_lowercase()))
    }

    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Column::Text(Some(timestamp(value)))
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn columns(&self) -> Vec<(&'static str, Column)>;

    /// Stamp the modification time before a write.
    fn touch(&mut self, now: DateTime<Utc>);
}

impl Document for Annee {
    const TABLE: &'static str = "annees";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("debut", Column::Integer(Some(self.debut as i64))),
            ("fin", Column::Integer(Some(self.fin as i64))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Agent {
    const TABLE: &'static str = "agents";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("matricule", Column::text(Some(&self.matricule))),
            ("email", Column::text(self.email.as_deref())),
            ("telephone", Column::text(self.telephone.as_deref())),
            ("type_agent", Column::text(self.type_agent.map(|t| t.as_str()))),
            ("nom", Column::text(Some(&self.nom))),
            ("prenom", Column::text(self.prenom.as_deref())),
            ("nom_key", Column::folded(Some(&self.nom))),
            ("prenom_key", Column::folded(self.prenom.as_deref())),
            ("matricule_key", Column::folded(Some(&self.matricule))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Section {
    const TABLE: &'static str = "sections";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("titre", Column::text(Some(&self.titre))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Promotion {
    const TABLE: &'static str = "promotions";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("section_id", Column::text(Some(&self.section_id))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Matiere {
    const TABLE: &'static str = "matieres";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("code_unite", Column::text(Some(&self.code_unite))),
            ("code", Column::text(self.code.as_deref())),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Etudiant {
    const TABLE: &'static str = "etudiants";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        let perso = &self.info_perso;
        let sec = &self.info_sec;
        vec![
            ("matricule", Column::text(sec.etudiant_id.as_deref())),
            ("email", Column::text(sec.email.as_deref())),
            ("telephone", Column::text(sec.telephone.as_deref())),
            ("nom", Column::text(Some(&perso.nom))),
            ("post_nom", Column::text(Some(&perso.post_nom))),
            ("pre_nom", Column::text(perso.pre_nom.as_deref())),
            ("nom_key", Column::folded(Some(&perso.nom))),
            ("post_nom_key", Column::folded(Some(&perso.post_nom))),
            ("pre_nom_key", Column::folded(perso.pre_nom.as_deref())),
            ("email_key", Column::folded(sec.email.as_deref())),
            ("telephone_key", Column::folded(sec.telephone.as_deref())),
            ("sexe", Column::text(perso.sexe.map(|s| s.as_str()))),
            ("section", Column::text(self.info_scol.section.as_deref())),
            ("scol_option", Column::text(self.info_scol.option.as_deref())),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Minerval {
    const TABLE: &'static str = "minervals";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("promotion_id", Column::text(Some(&self.promotion_id))),
            ("annee_id", Column::text(Some(&self.annee_id))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Account {
    const TABLE: &'static str = "accounts";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("etudiant_id", Column::text(Some(&self.etudiant_id))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Retrait {
    const TABLE: &'static str = "retraits";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("agent_id", Column::text(Some(&self.agent_id))),
            ("reference", Column::text(Some(&self.reference))),
            ("retrait_type", Column::text(Some(self.retrait_type.as_str()))),
            ("statut", Column::text(Some(self.statut.as_str()))),
            ("date_created", Column::timestamp(self.date_created)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Document for Appariteur {
    const TABLE: &'static str = "appariteurs";

    fn id(&self) -> &str {
        &self.id
    }

    fn columns(&self) -> Vec<(&'static str, Column)> {
        vec![
            ("agent_id", Column::text(Some(&self.agent_id))),
            ("annee_id", Column::text(Some(&self.annee_id))),
            ("section_id", Column::text(Some(&self.section_id))),
            ("created_at", Column::timestamp(self.created_at)),
        ]
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
