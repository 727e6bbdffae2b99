pub mod error;
pub mod models;
pub mod services;
pub mod summary;

pub use error::ServiceError;
pub use models::{
    AuditRecord, Customer, EmailAttachment, InvoiceFile, InvoiceLine, InvoiceRecord, NotifyLevel,
    Order, OutgoingEmail, invoice_file_name,
};
pub use services::{
    AuditLog, DocumentGenerator, InvoiceStore, MailDispatcher, Notifier, OrderGateway,
};
pub use summary::{OrderFailure, PipelineStep, RunSummary};
