use async_trait::async_trait;
use tracing::{debug, info};

use factura_core::{AuditLog, AuditRecord, ServiceError};
use factura_platform::{SheetsConfig, build_http_client};

const SERVICE: &str = "spreadsheet";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Spreadsheet audit trail: one appended row per sent invoice, columns
/// A:F, raw values. Rows are never updated or removed from here.
pub struct SheetsAudit {
    config: SheetsConfig,
    client: reqwest::Client,
}

impl SheetsAudit {
    pub fn new(config: SheetsConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT_SECS)?,
            config,
        })
    }
}

#[async_trait]
impl AuditLog for SheetsAudit {
    async fn append_row(&self, record: &AuditRecord) -> Result<(), ServiceError> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}!A:F:append",
            self.config.api_url, self.config.spreadsheet_id, self.config.sheet_name
        );
        let body = serde_json::json!({ "values": [row_cells(record)] });

        debug!("appending audit row for {}", record.file_name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(
                SERVICE,
                format!("append returned {status}: {detail}"),
            ));
        }

        info!("audit row appended: {}", record.invoice_number);
        Ok(())
    }
}

fn row_cells(record: &AuditRecord) -> Vec<String> {
    vec![
        record.file_name.clone(),
        record.invoice_id.clone(),
        record.invoice_number.clone(),
        record.customer_email.clone(),
        record.sent_at.format("%Y-%m-%d %H:%M").to_string(),
        record.status.clone(),
    ]
}
