//! SQLite database layer (embedded, no external dependencies)

use super::document::{Column, Document};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        tracing::info!("SQLite connection established, running migrations...");
        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database initialization complete");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Private in-memory database. A single connection keeps it alive for the
    /// lifetime of the pool.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        const SCHEMA: &[&str] = &[
            r#"
            CREATE TABLE IF NOT EXISTS annees (
                id TEXT PRIMARY KEY,
                debut INTEGER NOT NULL,
                fin INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                matricule TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE,
                telephone TEXT UNIQUE,
                type_agent TEXT,
                nom TEXT NOT NULL,
                prenom TEXT,
                nom_key TEXT,
                prenom_key TEXT,
                matricule_key TEXT,
                mdp TEXT,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sections (
                id TEXT PRIMARY KEY,
                titre TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS promotions (
                id TEXT PRIMARY KEY,
                section_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS matieres (
                id TEXT PRIMARY KEY,
                code_unite TEXT NOT NULL,
                code TEXT,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS etudiants (
                id TEXT PRIMARY KEY,
                matricule TEXT UNIQUE,
                email TEXT UNIQUE,
                telephone TEXT UNIQUE,
                nom TEXT NOT NULL,
                post_nom TEXT NOT NULL,
                pre_nom TEXT,
                nom_key TEXT,
                post_nom_key TEXT,
                pre_nom_key TEXT,
                email_key TEXT,
                telephone_key TEXT,
                sexe TEXT,
                section TEXT,
                scol_option TEXT,
                mdp TEXT,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS minervals (
                id TEXT PRIMARY KEY,
                promotion_id TEXT NOT NULL,
                annee_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL,
                UNIQUE (promotion_id, annee_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                etudiant_id TEXT UNIQUE NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS retraits (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                reference TEXT UNIQUE NOT NULL,
                retrait_type TEXT NOT NULL,
                statut TEXT NOT NULL,
                date_created TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS appariteurs (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                annee_id TEXT NOT NULL,
                section_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL,
                UNIQUE (agent_id, annee_id, section_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_promotions_section ON promotions(section_id)",
            "CREATE INDEX IF NOT EXISTS idx_matieres_unite ON matieres(code_unite)",
            "CREATE INDEX IF NOT EXISTS idx_etudiants_nom ON etudiants(nom, post_nom)",
            "CREATE INDEX IF NOT EXISTS idx_retraits_agent ON retraits(agent_id)",
            "CREATE INDEX IF NOT EXISTS idx_appariteurs_agent ON appariteurs(agent_id)",
        ];

        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }

        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a store transaction for a multi-step mutation.
    pub async fn begin(&self) -> Result<DbTx> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;
        Ok(DbTx { tx })
    }

    pub async fn insert<T: Document>(&self, doc: &T) -> Result<()> {
        insert_doc(&*self.pool, doc).await
    }

    pub async fn get<T: Document>(&self, id: &str) -> Result<Option<T>> {
        fetch_doc(&*self.pool, id).await
    }

    /// Write the whole document back; false when the row no longer exists.
    pub async fn update<T: Document>(&self, doc: &mut T) -> Result<bool> {
        doc.touch(Utc::now());
        update_doc(&*self.pool, doc).await
    }

    pub async fn delete<T: Document>(&self, id: &str) -> Result<bool> {
        delete_doc::<T, _>(&*self.pool, id).await
    }

    /// Every document of a collection; `order_by` is a trusted SQL fragment.
    pub async fn list<T: Document>(&self, order_by: &str) -> Result<Vec<T>> {
        let sql = format!("SELECT doc FROM {} ORDER BY {}", T::TABLE, order_by);
        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .fetch_all(&*self.pool)
            .await
            .with_context(|| format!("Failed to list {}", T::TABLE))?;
        decode_all(rows)
    }
}

/// An open store transaction. Dropping it without [`DbTx::commit`] rolls
/// back.
pub struct DbTx {
    tx: Transaction<'static, Sqlite>,
}

impl DbTx {
    pub async fn get<T: Document>(&mut self, id: &str) -> Result<Option<T>> {
        fetch_doc(&mut *self.tx, id).await
    }

    pub async fn insert<T: Document>(&mut self, doc: &T) -> Result<()> {
        insert_doc(&mut *self.tx, doc).await
    }

    pub async fn update<T: Document>(&mut self, doc: &mut T) -> Result<bool> {
        doc.touch(Utc::now());
        update_doc(&mut *self.tx, doc).await
    }

    pub async fn delete<T: Document>(&mut self, id: &str) -> Result<bool> {
        delete_doc::<T, _>(&mut *self.tx, id).await
    }

    /// Runs a finder written against a single connection inside this
    /// transaction.
    pub(crate) fn conn(&mut self) -> &mut sqlx::SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).context("Failed to decode stored document")
}

pub(crate) fn decode_all<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>> {
    rows.iter().map(|body| decode(body)).collect()
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: Column) {
    match value {
        Column::Text(v) => {
            qb.push_bind(v);
        }
        Column::Integer(v) => {
            qb.push_bind(v);
        }
    }
}

async fn fetch_doc<'e, T, E>(executor: E, id: &str) -> Result<Option<T>>
where
    T: Document,
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT doc FROM {} WHERE id = ?", T::TABLE);
    let row: Option<String> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .with_context(|| format!("Failed to read {} {}", T::TABLE, id))?;
    row.map(|body| decode(&body)).transpose()
}

async fn insert_doc<'e, T, E>(executor: E, doc: &T) -> Result<()>
where
    T: Document,
    E: Executor<'e, Database = Sqlite>,
{
    let body = serde_json::to_string(doc).context("Failed to encode document")?;
    let columns = doc.columns();

    let mut qb = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (id, doc", T::TABLE));
    for (name, _) in &columns {
        qb.push(", ").push(*name);
    }
    qb.push(") VALUES (");
    qb.push_bind(doc.id().to_string());
    qb.push(", ");
    qb.push_bind(body);
    for (_, value) in columns {
        qb.push(", ");
        push_value(&mut qb, value);
    }
    qb.push(")");

    qb.build()
        .execute(executor)
        .await
        .with_context(|| format!("Failed to insert into {}", T::TABLE))?;
    Ok(())
}

async fn update_doc<'e, T, E>(executor: E, doc: &T) -> Result<bool>
where
    T: Document,
    E: Executor<'e, Database = Sqlite>,
{
    let body = serde_json::to_string(doc).context("Failed to encode document")?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET doc = ", T::TABLE));
    qb.push_bind(body);
    for (name, value) in doc.columns() {
        qb.push(", ").push(name).push(" = ");
        push_value(&mut qb, value);
    }
    qb.push(" WHERE id = ");
    qb.push_bind(doc.id().to_string());

    let result = qb
        .build()
        .execute(executor)
        .await
        .with_context(|| format!("Failed to update {} {}", T::TABLE, doc.id()))?;
    Ok(result.rows_affected() > 0)
}

async fn delete_doc<'e, T, E>(executor: E, id: &str) -> Result<bool>
where
    T: Document,
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
    let result = sqlx::query(&sql)
        .bind(id)
        .execute(executor)
        .await
        .with_context(|| format!("Failed to delete {} {}", T::TABLE, id))?;
    Ok(result.rows_affected() > 0)
}

/// True when the error chain carries a UNIQUE constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|e| e.is_unique_violation())
            .unwrap_or(false)
    })
}
