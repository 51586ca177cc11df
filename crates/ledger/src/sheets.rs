//! Google Sheets ledger implementation.
//!
//! Talks to the Sheets REST API (v4) directly over `reqwest` with a bearer
//! token. Token acquisition and refresh are deployment plumbing and happen
//! outside this process.
//!
//! Operations used:
//! - `values/{range}` GET — read all rows of the primary sheet
//! - `values/{range}:append` POST — append one row
//! - `values/{range}` PUT — overwrite a single cell
//! - `spreadsheets` POST — create a new spreadsheet
//! - `spreadsheets/{id}:batchUpdate` POST — bold the header row

use async_trait::async_trait;
use serde::Deserialize;
use tallygram_core::error::LedgerError;
use tallygram_core::ledger::{CellRef, Ledger, LedgerRow};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// The range covering the whole primary sheet for reads and appends.
const FULL_RANGE: &str = "A:ZZ";

/// Google Sheets REST API ledger.
pub struct SheetsLedger {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "spreadsheetId")]
    spreadsheet_id: String,
}

impl SheetsLedger {
    /// Create a new Sheets ledger client.
    pub fn new(access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            access_token: access_token.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Map an HTTP status to a ledger error for a given spreadsheet.
    fn status_to_error(status: reqwest::StatusCode, ledger_id: &str) -> LedgerError {
        match status.as_u16() {
            404 => LedgerError::NotFound(ledger_id.to_string()),
            401 | 403 => LedgerError::PermissionDenied(ledger_id.to_string()),
            code => LedgerError::Unavailable(format!("HTTP {code} from Sheets API")),
        }
    }

    /// Build the append-row request body.
    fn append_body(row: &[String]) -> serde_json::Value {
        serde_json::json!({ "values": [row] })
    }

    /// Build the batchUpdate body that bolds the first `columns` header cells.
    fn bold_header_body(columns: usize) -> serde_json::Value {
        serde_json::json!({
            "requests": [{
                "repeatCell": {
                    "range": {
                        "sheetId": 0,
                        "startRowIndex": 0,
                        "endRowIndex": 1,
                        "startColumnIndex": 0,
                        "endColumnIndex": columns,
                    },
                    "cell": {
                        "userEnteredFormat": { "textFormat": { "bold": true } }
                    },
                    "fields": "userEnteredFormat.textFormat.bold",
                }
            }]
        })
    }

    async fn check(
        response: reqwest::Response,
        ledger_id: &str,
    ) -> Result<reqwest::Response, LedgerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(ledger_id = %ledger_id, status = %status, body = %body, "Sheets API error");
            return Err(Self::status_to_error(status, ledger_id));
        }
        Ok(response)
    }
}

#[async_trait]
impl Ledger for SheetsLedger {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn read_all_rows(&self, ledger_id: &str) -> Result<Vec<LedgerRow>, LedgerError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, ledger_id, FULL_RANGE
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let response = Self::check(response, ledger_id).await?;
        let parsed: ValuesResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("Bad values payload: {e}")))?;

        debug!(ledger_id = %ledger_id, rows = parsed.values.len(), "Read ledger rows");
        Ok(parsed.values)
    }

    async fn append_row(&self, ledger_id: &str, row: &[String]) -> Result<(), LedgerError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.base_url, ledger_id, FULL_RANGE
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&Self::append_body(row))
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        Self::check(response, ledger_id).await?;
        debug!(ledger_id = %ledger_id, cells = row.len(), "Appended ledger row");
        Ok(())
    }

    async fn set_cell(
        &self,
        ledger_id: &str,
        cell: CellRef,
        value: &str,
    ) -> Result<(), LedgerError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}?valueInputOption=USER_ENTERED",
            self.base_url,
            ledger_id,
            cell.to_a1()
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": [[value]] }))
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        Self::check(response, ledger_id).await?;
        debug!(ledger_id = %ledger_id, cell = %cell, "Cell written");
        Ok(())
    }

    async fn create(&self, title: &str) -> Result<String, LedgerError> {
        let url = format!("{}/v4/spreadsheets", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "properties": { "title": title } }))
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let response = Self::check(response, "(new)").await?;
        let parsed: CreateResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("Bad create payload: {e}")))?;

        debug!(ledger_id = %parsed.spreadsheet_id, "Spreadsheet created");
        Ok(parsed.spreadsheet_id)
    }

    async fn format_header(&self, ledger_id: &str, columns: usize) -> Result<(), LedgerError> {
        let url = format!("{}/v4/spreadsheets/{}:batchUpdate", self.base_url, ledger_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&Self::bold_header_body(columns))
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        Self::check(response, ledger_id).await?;
        Ok(())
    }
}
