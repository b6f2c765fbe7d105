//! Sheets v4 REST client authenticated as a service account.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::debug;
use reqwest::{Url, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::{MirrorSyncError, SheetClient};
use crate::credentials::{CredentialsError, ServiceAccountCredentials};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

// Form-encoded `urn:ietf:params:oauth:grant-type:jwt-bearer`.
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    credentials: ServiceAccountCredentials,
    spreadsheet_id: String,
    sheet_name: Option<String>,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsClient {
    pub fn new(
        credentials: ServiceAccountCredentials,
        spreadsheet_id: impl Into<String>,
        sheet_name: Option<String>,
    ) -> Self {
        GoogleSheetsClient {
            http: reqwest::Client::new(),
            credentials,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name,
            api_base: SHEETS_API_BASE.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Point the client at another API root, e.g. a local emulator.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Prefix `range` with the configured tab, quoting the tab name.
    pub fn qualify(&self, range: &str) -> String {
        match &self.sheet_name {
            Some(name) => format!("'{}'!{}", name.replace('\'', "''"), range),
            None => range.to_string(),
        }
    }

    fn values_url(&self, range: &str) -> Result<Url, MirrorSyncError> {
        let mut url = Url::parse(&format!("{}/{}/values", self.api_base, self.spreadsheet_id))
            .map_err(|e| MirrorSyncError::Decode(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MirrorSyncError::Decode(format!("cannot extend {}", self.api_base)))?
            .push(&self.qualify(range));
        Ok(url)
    }

    fn sign_assertion(&self) -> Result<String, MirrorSyncError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.credentials.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.credentials.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|_| CredentialsError::InvalidKey)?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| MirrorSyncError::Auth(e.to_string()))
    }

    async fn access_token(&self) -> Result<String, MirrorSyncError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting access token for {}", self.credentials.client_email);
        let assertion = self.sign_assertion()?;
        let response = self
            .http
            .post(&self.credentials.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("grant_type={JWT_BEARER_GRANT}&assertion={assertion}"))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MirrorSyncError::Auth(format!("{status}: {body}")));
        }
        let token: TokenResponse = response.json().await?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn first_sheet_id(&self, token: &str) -> Result<i64, MirrorSyncError> {
        let url = format!(
            "{}/{}?fields=sheets.properties(sheetId,title)",
            self.api_base, self.spreadsheet_id
        );
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let meta: SpreadsheetMeta = check(response).await?.json().await?;

        let sheet = match &self.sheet_name {
            Some(name) => meta.sheets.iter().find(|s| &s.properties.title == name),
            None => meta.sheets.first(),
        };
        Ok(sheet.map(|s| s.properties.sheet_id).unwrap_or(0))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, MirrorSyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(MirrorSyncError::Api {
        status: status.as_u16(),
        message,
    })
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, MirrorSyncError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.values_url(range)?)
            .bearer_auth(&token)
            .send()
            .await?;
        let body: ValueRange = check(response).await?.json().await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write_range(
        &self,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), MirrorSyncError> {
        let token = self.access_token().await?;
        let mut url = self.values_url(range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let response = self
            .http
            .put(url)
            .bearer_auth(&token)
            .json(&json!({ "majorDimension": "ROWS", "values": values }))
            .send()
            .await?;
        check(response).await?;
        debug!("Wrote range {}", range);
        Ok(())
    }

    async fn format_header(&self, columns: usize) -> Result<(), MirrorSyncError> {
        let token = self.access_token().await?;
        let sheet_id = self.first_sheet_id(&token).await?;
        let requests = json!({
            "requests": [
                {
                    "repeatCell": {
                        "range": {
                            "sheetId": sheet_id,
                            "startRowIndex": 0,
                            "endRowIndex": 1,
                            "startColumnIndex": 0,
                            "endColumnIndex": columns,
                        },
                        "cell": {
                            "userEnteredFormat": {
                                "backgroundColor": { "red": 0.05, "green": 0.11, "blue": 0.30 },
                                "textFormat": {
                                    "bold": true,
                                    "foregroundColor": { "red": 1, "green": 1, "blue": 1 },
                                },
                            },
                        },
                        "fields": "userEnteredFormat(backgroundColor,textFormat)",
                    },
                },
                {
                    "updateSheetProperties": {
                        "properties": {
                            "sheetId": sheet_id,
                            "gridProperties": { "frozenRowCount": 1 },
                        },
                        "fields": "gridProperties.frozenRowCount",
                    },
                },
            ],
        });
        let url = format!("{}/{}:batchUpdate", self.api_base, self.spreadsheet_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(&requests)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
