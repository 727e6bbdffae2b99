use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::{debug, info};

use factura_core::{Customer, DocumentGenerator, InvoiceRecord, Order, ServiceError};
use factura_platform::{RenderConfig, build_http_client};

const TEMPLATE_SERVICE: &str = "template API";
const PDF_SERVICE: &str = "PDF API";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const PDF_TIMEOUT_SECS: u64 = 60;

/// Clients for the two generation APIs: HTML email bodies and invoice
/// PDFs. Both are one POST per document.
pub struct RenderClient {
    config: RenderConfig,
    client: reqwest::Client,
}

impl RenderClient {
    pub fn new(config: RenderConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT_SECS)?,
            config,
        })
    }
}

#[async_trait]
impl DocumentGenerator for RenderClient {
    async fn render_email_body(
        &self,
        order: &Order,
        customer: &Customer,
        invoice: &InvoiceRecord,
    ) -> Result<String, ServiceError> {
        let payload = serde_json::json!({
            "order": order,
            "customer": customer,
            "address": {
                "customer": invoice.customer_name,
                "postcode": invoice.postcode,
                "city": invoice.city,
                "num_invoice": invoice.invoice_number(),
            }
        });

        debug!("rendering email body for order {}", order.reference);

        let response = self
            .client
            .post(&self.config.template_api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::upstream(TEMPLATE_SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(
                TEMPLATE_SERVICE,
                format!("returned {status}: {detail}"),
            ));
        }

        let rendered: TemplateResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(TEMPLATE_SERVICE, e.to_string()))?;

        let html = rendered.body.and_then(|body| body.html).unwrap_or_default();
        if html.trim().is_empty() {
            return Err(ServiceError::upstream(TEMPLATE_SERVICE, "empty HTML body"));
        }

        info!("email body rendered for order {}", order.reference);
        Ok(html)
    }

    async fn render_pdf(&self, invoice: &InvoiceRecord) -> Result<Vec<u8>, ServiceError> {
        let payload = serde_json::json!({ "data": invoice });

        debug!("rendering PDF for invoice {}", invoice.invoice_number());

        let response = self
            .client
            .post(&self.config.pdf_api_url)
            .timeout(Duration::from_secs(PDF_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::upstream(PDF_SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(
                PDF_SERVICE,
                format!("returned {status}: {detail}"),
            ));
        }

        let rendered: PdfResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::upstream(PDF_SERVICE, e.to_string()))?;

        let encoded = rendered
            .body
            .and_then(|body| body.pdf)
            .ok_or_else(|| ServiceError::upstream(PDF_SERVICE, "response missing body.pdf"))?;

        let bytes = decode_pdf(&encoded)?;
        info!("PDF rendered ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

#[derive(Debug, Deserialize)]
struct TemplateResponse {
    body: Option<TemplateBody>,
}

#[derive(Debug, Deserialize)]
struct TemplateBody {
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PdfResponse {
    body: Option<PdfBody>,
}

#[derive(Debug, Deserialize)]
struct PdfBody {
    pdf: Option<String>,
}

/// The PDF API ships its document base64-encoded; the decoded bytes must
/// start with the `%PDF-` signature.
fn decode_pdf(encoded: &str) -> Result<Vec<u8>, ServiceError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ServiceError::format("PDF payload", e.to_string()))?;

    if !bytes.starts_with(b"%PDF-") {
        return Err(ServiceError::format("PDF payload", "missing %PDF- signature"));
    }

    Ok(bytes)
}
