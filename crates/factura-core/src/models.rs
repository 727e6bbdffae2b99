use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// An order as read from the platform. Never created or deleted here; the
/// only mutation this system performs is the status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub reference: String,
    pub current_state: u32,
    pub payment: String,
    pub total_paid: Decimal,
    pub currency: String,
    pub customer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Handle to an invoice file in the store, as returned by the listing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// Naming convention for invoice source files, keyed by order reference.
pub fn invoice_file_name(reference: &str) -> String {
    format!("factura_{reference}.json")
}

/// Invoice source data. Field names follow the generating system's wire
/// format; monetary values arrive as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "num_factura")]
    pub number: String,
    #[serde(rename = "año_factura", default)]
    pub year: String,
    #[serde(rename = "cliente", default)]
    pub customer_name: String,
    #[serde(rename = "cod_postal", default)]
    pub postcode: String,
    #[serde(rename = "ciudad", default)]
    pub city: String,
    #[serde(rename = "lineas")]
    pub lines: Vec<InvoiceLine>,
    #[serde(rename = "base_imponible", default)]
    pub tax_base: Decimal,
    #[serde(rename = "iva", default)]
    pub tax: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    #[serde(rename = "concepto")]
    pub description: String,
    #[serde(rename = "cantidad")]
    pub quantity: Decimal,
    #[serde(rename = "precio")]
    pub unit_price: Decimal,
    #[serde(rename = "importe", default)]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct InvoiceEnvelope {
    data: InvoiceRecord,
}

impl InvoiceRecord {
    /// Parses the downloaded `factura_<REF>.json` payload. The envelope is
    /// `{"data": {...}}`; an invoice without a number or without line items
    /// is unusable.
    pub fn parse(bytes: &[u8]) -> Result<Self, ServiceError> {
        let envelope: InvoiceEnvelope = serde_json::from_slice(bytes)
            .map_err(|e| ServiceError::format("invoice file", e.to_string()))?;
        let record = envelope.data;

        if record.number.trim().is_empty() {
            return Err(ServiceError::format("invoice file", "missing invoice number"));
        }
        if record.lines.is_empty() {
            return Err(ServiceError::format("invoice file", "no line items"));
        }

        Ok(record)
    }

    /// Composite invoice number, e.g. `0042-2026`.
    pub fn invoice_number(&self) -> String {
        format!("{}-{}", self.number, self.year)
    }
}

/// One spreadsheet row, written after a successful send + status update.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub file_name: String,
    pub invoice_id: String,
    pub invoice_number: String,
    pub customer_email: String,
    pub sent_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NotifyLevel::Info => "INFO",
            NotifyLevel::Success => "OK",
            NotifyLevel::Warning => "WARN",
            NotifyLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": {
            "id": "F-77",
            "num_factura": "0001",
            "año_factura": "2026",
            "cliente": "Taller Pérez SL",
            "cod_postal": "28001",
            "ciudad": "Madrid",
            "lineas": [
                {"concepto": "Taladro percutor", "cantidad": "2", "precio": "59.90", "importe": "119.80"}
            ],
            "base_imponible": "119.80",
            "iva": "25.16",
            "total": "144.96"
        }
    }"#;

    #[test]
    fn parses_invoice_payload() {
        let invoice = InvoiceRecord::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(invoice.invoice_number(), "0001-2026");
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.total.to_string(), "144.96");
        assert_eq!(invoice.lines[0].quantity.to_string(), "2");
    }

    #[test]
    fn rejects_invoice_without_number() {
        let raw = r#"{"data": {"num_factura": "", "lineas": [
            {"concepto": "x", "cantidad": "1", "precio": "1"}
        ]}}"#;
        let err = InvoiceRecord::parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ServiceError::Format { .. }));
    }

    #[test]
    fn rejects_invoice_without_lines() {
        let raw = r#"{"data": {"num_factura": "0002", "año_factura": "2026", "lineas": []}}"#;
        let err = InvoiceRecord::parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ServiceError::Format { .. }));
    }

    #[test]
    fn rejects_non_json_payload() {
        let err = InvoiceRecord::parse(b"<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, ServiceError::Format { .. }));
    }

    #[test]
    fn invoice_file_name_follows_convention() {
        assert_eq!(invoice_file_name("ABCDEFGH"), "factura_ABCDEFGH.json");
    }
}
