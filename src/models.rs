use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::orm::{Db, Migration, Model};

pub const TABLE_NAME: &str = "phoning_temporaire";

/// Body of a sign-up submission, field names as the form posts them.
///
/// Absent keys deserialize as empty strings so they fail validation instead of
/// the JSON decode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoningForm {
    pub prenom: String,
    pub nom: String,
    pub mobile: String,
    pub email: String,
    pub ville: String,
    pub code_postal: String,
    pub disponibilite: String,
    pub experience: String,
}

/// A submission that passed server validation, ready for insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVolunteer {
    pub prenom: String,
    pub nom: String,
    pub mobile: String,
    pub email: String,
    pub ville: String,
    pub code_postal: String,
    pub disponibilite: String,
    pub experience: String,
}

impl From<PhoningForm> for NewVolunteer {
    fn from(form: PhoningForm) -> Self {
        NewVolunteer {
            prenom: form.prenom,
            nom: form.nom,
            mobile: form.mobile,
            email: form.email,
            ville: form.ville,
            code_postal: form.code_postal,
            disponibilite: form.disponibilite,
            experience: form.experience,
        }
    }
}

/// A row of the primary store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, FromRow)]
pub struct Volunteer {
    pub id: i64,
    pub prenom: String,
    pub nom: String,
    pub mobile: String,
    pub email: String,
    pub ville: String,
    pub code_postal: String,
    pub disponibilite: String,
    pub experience: String,
    /// RFC 3339, stamped at insert.
    pub created_at: String,
}

impl Volunteer {
    pub fn from_new(id: i64, created_at: String, new: NewVolunteer) -> Self {
        Volunteer {
            id,
            prenom: new.prenom,
            nom: new.nom,
            mobile: new.mobile,
            email: new.email,
            ville: new.ville,
            code_postal: new.code_postal,
            disponibilite: new.disponibilite,
            experience: new.experience,
            created_at,
        }
    }
}

impl Model for Volunteer {
    fn table_name() -> &'static str {
        TABLE_NAME
    }

    fn create_table_sql() -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prenom TEXT NOT NULL,
                nom TEXT NOT NULL,
                mobile TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                ville TEXT NOT NULL DEFAULT '',
                code_postal TEXT NOT NULL DEFAULT '',
                disponibilite TEXT NOT NULL,
                experience TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"
        )
    }

    fn columns() -> Vec<(String, String)> {
        [
            ("prenom", "TEXT NOT NULL DEFAULT ''"),
            ("nom", "TEXT NOT NULL DEFAULT ''"),
            ("mobile", "TEXT NOT NULL DEFAULT ''"),
            ("email", "TEXT NOT NULL DEFAULT ''"),
            ("ville", "TEXT NOT NULL DEFAULT ''"),
            ("code_postal", "TEXT NOT NULL DEFAULT ''"),
            ("disponibilite", "TEXT NOT NULL DEFAULT ''"),
            ("experience", "TEXT NOT NULL DEFAULT ''"),
            ("created_at", "TEXT NOT NULL DEFAULT ''"),
        ]
        .into_iter()
        .map(|(name, sqltype)| (name.to_string(), sqltype.to_string()))
        .collect()
    }
}

fn migrate_volunteers(db: Arc<Db>) -> crate::orm::BoxFuture<'static, Result<(), sqlx::Error>> {
    Volunteer::migrate(db)
}

inventory::submit!(Migration(migrate_volunteers));

/// Display label for an availability code; unknown codes pass through.
pub fn availability_label(code: &str) -> &str {
    match code {
        "1-2h" => "1-2h/semaine",
        "3-5h" => "3-5h/semaine",
        "5h+" => "5h et +",
        other => other,
    }
}

/// Display label for an experience code; unknown codes pass through.
pub fn experience_label(code: &str) -> &str {
    match code {
        "deja_fait" | "already_done" => "Deja fait",
        "jamais_mais_motive" | "never_but_motivated" => "Jamais fait mais motive",
        other => other,
    }
}
