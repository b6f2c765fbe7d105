//! Spreadsheet mirror of accepted submissions.
//!
//! The primary store is authoritative. The sheet is a staff-facing copy with
//! its own duplicate check on the email column, since a mirror write can be
//! replayed or run against a sheet that lacks earlier rows. Both the duplicate
//! check and the next-row lookup are read-then-write and not atomic.

pub mod google;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::credentials::CredentialsError;
use crate::models::{Volunteer, availability_label, experience_label};

pub use google::GoogleSheetsClient;
pub use memory::MemorySheet;

pub const HEADERS: [&str; 9] = [
    "Date",
    "Prenom",
    "Nom",
    "Email",
    "Mobile",
    "Ville",
    "Code postal",
    "Disponibilite",
    "Experience",
];

pub const HEADER_RANGE: &str = "A1:I1";
pub const EMAIL_COLUMN: &str = "D:D";
pub const DATE_COLUMN: &str = "A:A";

#[derive(Debug, thiserror::Error)]
pub enum MirrorSyncError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheets api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("invalid range {0:?}")]
    Range(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("sheet unavailable: {0}")]
    Unavailable(String),
}

/// Rectangular cell access to one spreadsheet tab.
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Rows of the range; trailing empty rows and cells are omitted.
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, MirrorSyncError>;

    async fn write_range(&self, range: &str, values: Vec<Vec<String>>)
    -> Result<(), MirrorSyncError>;

    /// Style the first `columns` header cells and freeze the first row.
    async fn format_header(&self, columns: usize) -> Result<(), MirrorSyncError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { row: usize },
    Duplicate,
}

/// A parsed `A1`-notation range. Rows are 1-based; `None` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub start_col: usize,
    pub start_row: Option<usize>,
    pub end_col: usize,
    pub end_row: Option<usize>,
}

impl CellRange {
    /// Accepts `A1:I1`, `D:D`, `B3` and an optional `'Tab'!` prefix.
    pub fn parse(range: &str) -> Result<Self, MirrorSyncError> {
        let bare = range.rsplit_once('!').map(|(_, r)| r).unwrap_or(range);
        let (start, end) = bare.split_once(':').unwrap_or((bare, bare));
        let (start_col, start_row) =
            parse_cell(start).ok_or_else(|| MirrorSyncError::Range(range.to_string()))?;
        let (end_col, end_row) =
            parse_cell(end).ok_or_else(|| MirrorSyncError::Range(range.to_string()))?;
        if end_col < start_col {
            return Err(MirrorSyncError::Range(range.to_string()));
        }
        if let (Some(s), Some(e)) = (start_row, end_row) {
            if e < s {
                return Err(MirrorSyncError::Range(range.to_string()));
            }
        }
        Ok(CellRange {
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }
}

/// Column index is 0-based, row is 1-based.
fn parse_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let cell = cell.trim();
    let split = cell.find(|c: char| c.is_ascii_digit()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters.chars().try_fold(0usize, |acc, c| {
        acc.checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as usize - 'A' as usize + 1)
    })? - 1;
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<usize>() {
            Ok(0) | Err(_) => return None,
            Ok(n) => Some(n),
        }
    };
    Some((col, row))
}

/// Header initialisation and deduplicated row append against a `SheetClient`.
#[derive(Clone)]
pub struct SheetMirror {
    client: Arc<dyn SheetClient>,
}

impl SheetMirror {
    pub fn new(client: Arc<dyn SheetClient>) -> Self {
        Self { client }
    }

    /// Write the header row when it is missing, or always when `force` is set.
    /// Returns whether the header was written. A formatting failure is logged
    /// and does not fail the call.
    pub async fn ensure_headers(&self, force: bool) -> Result<bool, MirrorSyncError> {
        let existing = self.client.read_range(HEADER_RANGE).await?;
        if !existing.is_empty() && !force {
            debug!("Sheet headers already present");
            return Ok(false);
        }

        let header = HEADERS.iter().map(|h| h.to_string()).collect();
        self.client.write_range(HEADER_RANGE, vec![header]).await?;
        info!("Sheet headers written");

        if let Err(e) = self.client.format_header(HEADERS.len()).await {
            log::error!("Failed to format sheet headers: {}", e);
        }
        Ok(true)
    }

    /// Append `volunteer` unless its email is already in column D.
    pub async fn append_row(&self, volunteer: &Volunteer) -> Result<AppendOutcome, MirrorSyncError> {
        let emails = self.client.read_range(EMAIL_COLUMN).await?;
        let exists = emails
            .iter()
            .any(|row| row.first().map(String::as_str) == Some(volunteer.email.as_str()));
        if exists {
            info!("Email already present in sheet: {}", volunteer.email);
            return Ok(AppendOutcome::Duplicate);
        }

        let dates = self.client.read_range(DATE_COLUMN).await?;
        let next_row = dates.len().max(1) + 1;
        let range = format!("A{next_row}:I{next_row}");
        self.client.write_range(&range, vec![sheet_row(volunteer)]).await?;
        info!("Volunteer {} mirrored to sheet row {}", volunteer.id, next_row);
        Ok(AppendOutcome::Appended { row: next_row })
    }

    /// Header check followed by the append.
    pub async fn sync(&self, volunteer: &Volunteer) -> Result<AppendOutcome, MirrorSyncError> {
        self.ensure_headers(false).await?;
        self.append_row(volunteer).await
    }
}

/// The nine sheet cells for a volunteer, in header order.
pub fn sheet_row(volunteer: &Volunteer) -> Vec<String> {
    vec![
        volunteer.created_at.clone(),
        volunteer.prenom.clone(),
        volunteer.nom.clone(),
        volunteer.email.clone(),
        volunteer.mobile.clone(),
        volunteer.ville.clone(),
        volunteer.code_postal.clone(),
        availability_label(&volunteer.disponibilite).to_string(),
        experience_label(&volunteer.experience).to_string(),
    ]
}
