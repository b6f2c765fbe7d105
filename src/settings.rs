use std::env;
use std::path::PathBuf;

use crate::credentials::CredentialSource;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://phoning.db?mode=rwc";
pub const DEFAULT_CREDENTIALS_FILE: &str = "google-credentials.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct SheetSettings {
    pub spreadsheet_id: String,
    /// Tab name; `None` targets the first sheet.
    pub sheet_name: Option<String>,
    pub credentials: CredentialSource,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// `None` disables the spreadsheet mirror.
    pub sheets: Option<SheetSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            sheets: None,
        }
    }
}

impl Settings {
    /// Read the process environment once at startup.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("PHONING_HOST").unwrap_or_else(|| {
            log::info!("PHONING_HOST not set, using default: {}", DEFAULT_HOST);
            DEFAULT_HOST.to_string()
        });

        let port = match lookup("PHONING_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| SettingsError::Invalid {
                key: "PHONING_PORT",
                value: raw.clone(),
            })?,
            None => {
                log::info!("PHONING_PORT not set, using default: {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let debug = match lookup("PHONING_DEBUG") {
            Some(raw) => parse_bool(&raw).ok_or(SettingsError::Invalid {
                key: "PHONING_DEBUG",
                value: raw.clone(),
            })?,
            None => false,
        };

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            log::warn!(
                "DATABASE_URL not set, using default: {}",
                DEFAULT_DATABASE_URL
            );
            DEFAULT_DATABASE_URL.to_string()
        });

        let sheets = match lookup("GOOGLE_SHEET_ID").filter(|id| !id.trim().is_empty()) {
            Some(spreadsheet_id) => {
                let credentials = if lookup("GOOGLE_CREDENTIALS").is_some() {
                    CredentialSource::Env("GOOGLE_CREDENTIALS".to_string())
                } else {
                    let path = lookup("GOOGLE_CREDENTIALS_FILE")
                        .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string());
                    CredentialSource::File(PathBuf::from(path))
                };
                Some(SheetSettings {
                    spreadsheet_id,
                    sheet_name: lookup("GOOGLE_SHEET_NAME").filter(|n| !n.is_empty()),
                    credentials,
                })
            }
            None => {
                log::warn!("GOOGLE_SHEET_ID not set, spreadsheet mirror disabled");
                None
            }
        };

        Ok(Settings {
            debug,
            host,
            port,
            database_url,
            sheets,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
