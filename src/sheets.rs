//! # Spreadsheet Client Module
//!
//! Client REST minimale per leggere le righe del foglio dei link candidati.
//!
//! ## Responsabilità:
//! - Autenticazione con service account (scope readonly)
//! - Estrazione dello spreadsheet id dall'URL condiviso
//! - Fetch dei valori del primo foglio via endpoint `values.get`
//!
//! Il chiamante (selector) tratta qualunque errore di questo modulo come
//! condizione "nessun candidato", mai come errore fatale.

use crate::error::PipelineError;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Cell range fetched from the first sheet. Wide enough for any revision
/// of the link sheet; rows past the data are simply absent in the reply.
const VALUE_RANGE: &str = "A1:Z1000";

/// Read-only client for the candidate-link spreadsheet
pub struct SheetsClient {
    http: reqwest::Client,
    auth: CustomServiceAccount,
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsClient {
    pub fn new(service_account_key: &str, sheet_url: &str) -> Result<Self, PipelineError> {
        let auth = CustomServiceAccount::from_json(service_account_key)
            .map_err(|e| PipelineError::Sheet(format!("invalid service account key: {e}")))?;

        let spreadsheet_id = extract_spreadsheet_id(sheet_url).ok_or_else(|| {
            PipelineError::Sheet(format!("could not find a spreadsheet id in {sheet_url}"))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("lofi-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            auth,
            spreadsheet_id,
        })
    }

    /// Fetch all rows of the first sheet as strings.
    ///
    /// Non-string cells (numbers, booleans) are rendered through their JSON
    /// representation so the selector can treat every cell uniformly.
    pub async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, PipelineError> {
        let token = self
            .auth
            .token(&[SHEETS_SCOPE])
            .await
            .map_err(|e| PipelineError::Sheet(format!("token acquisition failed: {e}")))?;

        let url = format!("{SHEETS_API}/{}/values/{VALUE_RANGE}", self.spreadsheet_id);
        debug!("Fetching sheet values from {url}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Sheet(format!(
                "Sheets API returned {status}: {body}"
            )));
        }

        let range: ValueRange = response.json().await?;
        let rows = range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        Ok(rows)
    }
}

fn cell_to_string(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the spreadsheet id from a shared Google Sheets URL.
pub fn extract_spreadsheet_id(url: &str) -> Option<String> {
    let marker = "/spreadsheets/d/";
    let start = url.find(marker)? + marker.len();
    let rest = &url[start..];
    let end = rest
        .find(|c| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    let id = &rest[..end];
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_spreadsheet_id() {
        assert_eq!(
            extract_spreadsheet_id(
                "https://docs.google.com/spreadsheets/d/1AbC_dEf-123/edit#gid=0"
            ),
            Some("1AbC_dEf-123".to_string())
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/xyz"),
            Some("xyz".to_string())
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/abc?usp=sharing"),
            Some("abc".to_string())
        );
        assert_eq!(extract_spreadsheet_id("https://example.com/nothing"), None);
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/"),
            None
        );
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&serde_json::json!("hello")), "hello");
        assert_eq!(cell_to_string(&serde_json::json!(42)), "42");
        assert_eq!(cell_to_string(&serde_json::json!(true)), "true");
    }
}
