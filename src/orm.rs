//! Minimal async persistence layer (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! auto_migrate(Arc::new(db.clone())).await?;
//! db.fetch_all::<(i64,)>("SELECT id FROM phoning_temporaire").await?
pub use futures::future::BoxFuture;
use log::{debug, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::Row;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, SqlitePool};
use std::sync::Arc;

const MIGRATIONS_TABLE: &str = "__phoning_migrations";

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// A registered schema migration, collected through `inventory`.
pub struct Migration(pub MigrationFn);

impl std::ops::Deref for Migration {
    type Target = MigrationFn;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Migration function pointer for a model.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        db.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT UNIQUE NOT NULL,
                schema_sql TEXT NOT NULL,
                hash TEXT NOT NULL,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )"
        ))
        .await?;

        let recorded: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT hash FROM {MIGRATIONS_TABLE} WHERE table_name = ?"
        ))
        .bind(table_name)
        .fetch_all(db.pool())
        .await?;

        if recorded.is_empty() {
            db.execute(&create_sql).await?;
            sqlx::query(&format!(
                "INSERT INTO {MIGRATIONS_TABLE} (table_name, schema_sql, hash) VALUES (?, ?, ?)"
            ))
            .bind(table_name)
            .bind(&create_sql)
            .bind(&schema_hash)
            .execute(db.pool())
            .await?;
            info!("Migrated `{}` (table created).", table_name);
            return Ok(());
        }

        if recorded[0].0 == schema_hash {
            info!("No schema changes detected for `{}`.", table_name);
            return Ok(());
        }

        let existing: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(db.pool())
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !existing.contains(&name) {
                db.execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table_name, name, sqltype
                ))
                .await?;
                added.push((name, sqltype));
            }
        }

        for (name, sqltype) in &added {
            info!("Added column `{}.{}` {}", table_name, name, sqltype);
        }
        sqlx::query(&format!(
            "UPDATE {MIGRATIONS_TABLE} \
             SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
             WHERE table_name = ?"
        ))
        .bind(&create_sql)
        .bind(&schema_hash)
        .bind(table_name)
        .execute(db.pool())
        .await?;
        Ok(())
    }
}

// Helper function to hash a SQL string
fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI.
    ///
    /// In-memory databases live only as long as their connection, so they get a
    /// single pinned connection.
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let pool = if uri.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(uri)
                .await?
        } else {
            SqlitePool::connect(uri).await?
        };
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute an arbitrary SQL statement without bind parameters, e.g. DDL.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        if let Err(e) = &result {
            log::error!("SQL execution failed: {}", e);
        }
        result.map(|_| ())
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, sqlx::Error> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        result
    }
}

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
    info!("Starting auto migration of all registered models...");
    let mut total = 0;
    for m in inventory::iter::<Migration> {
        total += 1;
        if let Err(e) = m(db.clone()).await {
            log::error!("Auto-migration failed for a model: {}", e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}
