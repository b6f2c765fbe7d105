use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::{debug, info};

use crate::models::{NewVolunteer, TABLE_NAME, Volunteer};
use crate::orm::Db;

/// SQLSTATE for unique_violation.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_PRIMARYKEY.
const SQLITE_UNIQUE_CODES: [&str; 2] = ["2067", "1555"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a volunteer with this email already exists")]
    Duplicate(#[source] sqlx::Error),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Sort a driver error into duplicate or anything else.
    pub fn classify(err: sqlx::Error) -> Self {
        if is_duplicate(&err) {
            StoreError::Duplicate(err)
        } else {
            StoreError::Database(err)
        }
    }
}

fn is_duplicate(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    if db_err.is_unique_violation() {
        return true;
    }
    if let Some(code) = db_err.code() {
        if code == PG_UNIQUE_VIOLATION || SQLITE_UNIQUE_CODES.contains(&code.as_ref()) {
            return true;
        }
    }
    message_signals_duplicate(db_err.message())
}

pub fn message_signals_duplicate(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("unique") || message.contains("duplicate")
}

/// The authoritative store of submissions.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    async fn insert(&self, new: &NewVolunteer) -> Result<Volunteer, StoreError>;
}

#[derive(Clone)]
pub struct SqliteVolunteerStore {
    db: Arc<Db>,
}

impl SqliteVolunteerStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Volunteer>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT * FROM {TABLE_NAME} WHERE email = ?"))
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"))
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl PrimaryStore for SqliteVolunteerStore {
    async fn insert(&self, new: &NewVolunteer) -> Result<Volunteer, StoreError> {
        debug!("Inserting volunteer into `{}`", TABLE_NAME);
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let (id,): (i64,) = sqlx::query_as(&format!(
            "INSERT INTO {TABLE_NAME} \
             (prenom, nom, mobile, email, ville, code_postal, disponibilite, experience, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id"
        ))
        .bind(&new.prenom)
        .bind(&new.nom)
        .bind(&new.mobile)
        .bind(&new.email)
        .bind(&new.ville)
        .bind(&new.code_postal)
        .bind(&new.disponibilite)
        .bind(&new.experience)
        .bind(&created_at)
        .fetch_one(self.db.pool())
        .await
        .map_err(StoreError::classify)?;

        info!("Volunteer {} stored", id);
        Ok(Volunteer::from_new(id, created_at, new.clone()))
    }
}
