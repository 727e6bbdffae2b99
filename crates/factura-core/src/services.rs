use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{
    AuditRecord, Customer, InvoiceFile, InvoiceRecord, NotifyLevel, Order, OutgoingEmail,
};

/// Order-management platform: eligible-order listing, customer lookup and
/// the single status mutation this system performs.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn fetch_eligible_orders(&self) -> Result<Vec<Order>, ServiceError>;
    async fn fetch_customer(&self, order: &Order) -> Result<Customer, ServiceError>;
    async fn mark_invoiced(&self, order: &Order) -> Result<(), ServiceError>;
}

/// Cloud file store holding one invoice JSON per order reference.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn find_invoice_file(&self, reference: &str) -> Result<InvoiceFile, ServiceError>;
    async fn download_and_parse(&self, file: &InvoiceFile) -> Result<InvoiceRecord, ServiceError>;
}

/// External rendering services: HTML email body and PDF invoice.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn render_email_body(
        &self,
        order: &Order,
        customer: &Customer,
        invoice: &InvoiceRecord,
    ) -> Result<String, ServiceError>;

    async fn render_pdf(&self, invoice: &InvoiceRecord) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ServiceError>;
}

/// Append-only spreadsheet trail of sent invoices.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append_row(&self, record: &AuditRecord) -> Result<(), ServiceError>;
}

/// Operational notifications. Implementations must not fail outward:
/// a notification problem is logged, never propagated into the batch.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, level: NotifyLevel, title: &str, body: &str);
}
