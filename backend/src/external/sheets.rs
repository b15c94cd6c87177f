//! Spreadsheet export client
//!
//! Reads published sheets as CSV through the spreadsheet's export endpoint.
//! Only public export URLs are used; no credentials are handled here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use crate::store::{StoreError, StoreResult};

/// Anything that can hand back the CSV text of a named sheet
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_csv(&self, sheet: &str) -> StoreResult<String>;
}

/// HTTP client for the `gviz` CSV export of a spreadsheet
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
}

impl SheetsClient {
    /// Create a client against `base_url`, e.g. `https://docs.google.com/spreadsheets/d`
    pub fn with_base_url(
        spreadsheet_id: String,
        base_url: String,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("cannot build sheets client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
        })
    }

    fn export_request(&self, sheet: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{}/gviz/tq", self.base_url, self.spreadsheet_id))
            .query(&[("tqx", "out:csv"), ("sheet", sheet)])
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn fetch_csv(&self, sheet: &str) -> StoreResult<String> {
        tracing::debug!(sheet, "Fetching sheet export");

        let response = self
            .export_request(sheet)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("sheet {} request failed: {}", sheet, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "sheet {} export error: {} - {}",
                sheet, status, body
            )));
        }

        response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(format!("sheet {} body unreadable: {}", sheet, e)))
    }
}
