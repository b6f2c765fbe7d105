//! Service-account credentials for the spreadsheet mirror.
//!
//! Resolved once at process start from either an environment variable holding
//! the JSON key blob or a key file on disk.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("credential variable {0} is not set")]
    Missing(String),
    #[error("failed to read credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed credential JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credential is missing a usable private key")]
    InvalidKey,
}

/// Where the service-account key comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// Name of an environment variable holding the JSON blob.
    Env(String),
    /// Path to a JSON key file.
    File(PathBuf),
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// Keeps the key out of logs.
impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl CredentialSource {
    pub fn load(&self) -> Result<ServiceAccountCredentials, CredentialsError> {
        match self {
            CredentialSource::Env(var) => {
                let blob = env::var(var).map_err(|_| CredentialsError::Missing(var.clone()))?;
                log::info!("Loading spreadsheet credentials from ${}", var);
                ServiceAccountCredentials::from_env_json(&blob)
            }
            CredentialSource::File(path) => {
                log::info!("Loading spreadsheet credentials from {}", path.display());
                let raw = fs::read_to_string(path).map_err(|source| CredentialsError::Io {
                    path: path.clone(),
                    source,
                })?;
                ServiceAccountCredentials::from_json(&raw)
            }
        }
    }
}

impl ServiceAccountCredentials {
    pub fn from_json(raw: &str) -> Result<Self, CredentialsError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(raw)?;
        if credentials.private_key.trim().is_empty() {
            return Err(CredentialsError::InvalidKey);
        }
        Ok(credentials)
    }

    /// Environment-provided blobs often carry the key's newlines as literal `\n`.
    pub fn from_env_json(raw: &str) -> Result<Self, CredentialsError> {
        let mut credentials = Self::from_json(raw)?;
        credentials.private_key = credentials.private_key.replace("\\n", "\n");
        Ok(credentials)
    }
}
