//! Submission pipeline: re-validate, insert into the primary store, then
//! mirror to the spreadsheet on a best-effort basis.
//!
//! Only the primary store decides the outcome. The mirror result is logged
//! and dropped; a sheet failure never turns an accepted submission into an
//! error for the volunteer.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::models::{NewVolunteer, PhoningForm, Volunteer};
use crate::sheets::{AppendOutcome, MirrorSyncError, SheetMirror};
use crate::store::{PrimaryStore, StoreError};
use crate::validation::validate_submission;

pub const CONFLICT_MESSAGE: &str = "Cette adresse email a deja ete utilisee.";
pub const PERSISTENCE_MESSAGE: &str = "Erreur lors de l'enregistrement";
pub const UNEXPECTED_MESSAGE: &str = "Une erreur est survenue";

/// Result of one submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success(i64),
    ValidationError(&'static str),
    ConflictError,
    PersistenceError,
}

impl Outcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success(_) => 200,
            Outcome::ValidationError(_) => 400,
            Outcome::ConflictError => 409,
            Outcome::PersistenceError => 500,
        }
    }

    /// Message shown to the volunteer; `None` on success.
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::ValidationError(message) => Some(*message),
            Outcome::ConflictError => Some(CONFLICT_MESSAGE),
            Outcome::PersistenceError => Some(PERSISTENCE_MESSAGE),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn PrimaryStore>,
    mirror: Option<SheetMirror>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn PrimaryStore>, mirror: Option<SheetMirror>) -> Self {
        Self { store, mirror }
    }

    pub async fn submit(&self, form: PhoningForm) -> Outcome {
        if let Err(message) = validate_submission(&form) {
            debug!("Rejected submission: {}", message);
            return Outcome::ValidationError(message);
        }

        let volunteer = match self.store.insert(&NewVolunteer::from(form)).await {
            Ok(volunteer) => volunteer,
            Err(StoreError::Duplicate(e)) => {
                warn!("Duplicate email rejected by the primary store: {}", e);
                return Outcome::ConflictError;
            }
            Err(e) => {
                log::error!("Primary store insert failed: {}", e);
                return Outcome::PersistenceError;
            }
        };

        // Deliberately discarded after logging.
        let _ = self.mirror_sync(&volunteer).await;

        Outcome::Success(volunteer.id)
    }

    /// Push an accepted volunteer to the sheet, logging any failure.
    pub async fn mirror_sync(
        &self,
        volunteer: &Volunteer,
    ) -> Option<Result<AppendOutcome, MirrorSyncError>> {
        let mirror = self.mirror.as_ref()?;
        let result = mirror.sync(volunteer).await;
        match &result {
            Ok(AppendOutcome::Appended { row }) => {
                debug!("Volunteer {} mirrored at row {}", volunteer.id, row)
            }
            Ok(AppendOutcome::Duplicate) => {
                info!("Volunteer {} already mirrored", volunteer.id)
            }
            Err(e) => log::error!("Sheet sync failed for volunteer {}: {}", volunteer.id, e),
        }
        Some(result)
    }
}
