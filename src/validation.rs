//! Submission validation.
//!
//! Two rule sets exist. `validate_form` is the full, fail-fast check the form
//! runs before posting: it names the first invalid field so the page can scroll
//! to it and focus it. `validate_submission` is the server re-check, which only
//! requires the identity, contact and choice fields and does not name a field.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::models::PhoningForm;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

pub const MISSING_IDENTITY_MESSAGE: &str = "Prenom, nom, email et mobile sont obligatoires";
pub const MISSING_CHOICES_MESSAGE: &str = "Disponibilite et experience sont obligatoires";

/// Form fields in the order they are checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormField {
    Prenom,
    Nom,
    Mobile,
    Email,
    Ville,
    CodePostal,
    Disponibilite,
    Experience,
}

impl FormField {
    pub const ORDER: [FormField; 8] = [
        FormField::Prenom,
        FormField::Nom,
        FormField::Mobile,
        FormField::Email,
        FormField::Ville,
        FormField::CodePostal,
        FormField::Disponibilite,
        FormField::Experience,
    ];

    /// Key used in the JSON body.
    pub fn name(self) -> &'static str {
        match self {
            FormField::Prenom => "prenom",
            FormField::Nom => "nom",
            FormField::Mobile => "mobile",
            FormField::Email => "email",
            FormField::Ville => "ville",
            FormField::CodePostal => "code_postal",
            FormField::Disponibilite => "disponibilite",
            FormField::Experience => "experience",
        }
    }

    /// Element id the page scrolls into view and focuses.
    pub fn dom_id(self) -> String {
        format!("field-{}", self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: FormField,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.name(), self.message)
    }
}

impl std::error::Error for FieldError {}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Full form check; returns the first violation only.
pub fn validate_form(form: &PhoningForm) -> Result<(), FieldError> {
    let fail = |field, message| Err(FieldError { field, message });

    if form.prenom.trim().is_empty() {
        return fail(FormField::Prenom, "Le prenom est obligatoire");
    }
    if form.nom.trim().is_empty() {
        return fail(FormField::Nom, "Le nom est obligatoire");
    }
    if form.mobile.trim().is_empty() {
        return fail(FormField::Mobile, "Le numero de mobile est obligatoire");
    }
    if form.email.trim().is_empty() {
        return fail(FormField::Email, "L'email est obligatoire");
    }
    if !is_valid_email(&form.email) {
        return fail(FormField::Email, "L'email n'est pas valide");
    }
    if form.ville.trim().is_empty() {
        return fail(FormField::Ville, "La ville est obligatoire");
    }
    if form.code_postal.trim().is_empty() {
        return fail(FormField::CodePostal, "Le code postal est obligatoire");
    }
    if form.disponibilite.is_empty() {
        return fail(FormField::Disponibilite, "Veuillez indiquer votre disponibilite");
    }
    if form.experience.is_empty() {
        return fail(FormField::Experience, "Veuillez indiquer votre experience");
    }
    Ok(())
}

/// Server re-check. Presence means non-empty, whitespace counts as present.
/// City, postal code and email format are not checked here.
pub fn validate_submission(form: &PhoningForm) -> Result<(), &'static str> {
    if form.prenom.is_empty() || form.nom.is_empty() || form.email.is_empty() || form.mobile.is_empty()
    {
        return Err(MISSING_IDENTITY_MESSAGE);
    }
    if form.disponibilite.is_empty() || form.experience.is_empty() {
        return Err(MISSING_CHOICES_MESSAGE);
    }
    Ok(())
}
