use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use factura_core::{InvoiceFile, InvoiceRecord, InvoiceStore, ServiceError, invoice_file_name};
use factura_platform::{DriveConfig, build_http_client};

const SERVICE: &str = "file store";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// File-store client. Invoice files are shared with the service account
/// whose bearer token is carried in the configuration; lookup is one
/// listing call filtered by exact file name.
pub struct DriveStore {
    config: DriveConfig,
    client: reqwest::Client,
}

impl DriveStore {
    pub fn new(config: DriveConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT_SECS)?,
            config,
        })
    }
}

#[async_trait]
impl InvoiceStore for DriveStore {
    async fn find_invoice_file(&self, reference: &str) -> Result<InvoiceFile, ServiceError> {
        let file_name = invoice_file_name(reference);
        let query = build_search_query(&file_name, self.config.folder_id.as_deref());

        debug!("searching file store for {file_name}");

        let response = self
            .client
            .get(format!("{}/files", self.config.api_url))
            .bearer_auth(&self.config.api_token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id, name, mimeType, modifiedTime)"),
                ("pageSize", "10"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(
                SERVICE,
                format!("listing returned {status}: {detail}"),
            ));
        }

        let listing: FileList = response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let mut files = listing.files;
        if files.is_empty() {
            return Err(ServiceError::not_found("invoice file", file_name));
        }
        if files.len() > 1 {
            // Names are unique by construction upstream; if that breaks,
            // the first listing result wins.
            warn!("{} matches for {file_name}, taking the first", files.len());
        }

        let entry = files.remove(0);
        info!("invoice file found: {} ({})", entry.name, entry.id);
        Ok(InvoiceFile {
            id: entry.id,
            name: entry.name,
            mime_type: entry.mime_type,
            modified_time: entry.modified_time,
        })
    }

    async fn download_and_parse(&self, file: &InvoiceFile) -> Result<InvoiceRecord, ServiceError> {
        debug!("downloading {} ({})", file.name, file.id);

        let response = self
            .client
            .get(format!("{}/files/{}", self.config.api_url, file.id))
            .bearer_auth(&self.config.api_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(
                SERVICE,
                format!("download returned {status}: {detail}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        info!("downloaded {} ({} bytes)", file.name, bytes.len());
        InvoiceRecord::parse(&bytes)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    name: String,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
    #[serde(rename = "modifiedTime", default)]
    modified_time: Option<String>,
}

fn build_search_query(file_name: &str, folder_id: Option<&str>) -> String {
    let mut query = format!("name='{file_name}' and trashed=false");
    if let Some(folder) = folder_id {
        query.push_str(&format!(" and '{folder}' in parents"));
    }
    query
}
