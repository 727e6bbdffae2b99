use std::fmt;

use crate::error::ServiceError;

/// Steps of one order's pipeline, in execution order. A failure is reported
/// against the step that was being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    InvoiceLocated,
    InvoiceParsed,
    CustomerFetched,
    DocumentsRendered,
    EmailSent,
    StatusUpdated,
    Logged,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::InvoiceLocated => "invoice lookup",
            PipelineStep::InvoiceParsed => "invoice download",
            PipelineStep::CustomerFetched => "customer fetch",
            PipelineStep::DocumentsRendered => "document rendering",
            PipelineStep::EmailSent => "email send",
            PipelineStep::StatusUpdated => "status update",
            PipelineStep::Logged => "audit append",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct OrderFailure {
    pub reference: String,
    pub step: PipelineStep,
    pub error: ServiceError,
}

impl fmt::Display for OrderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} failed: {}", self.reference, self.step, self.error)
    }
}

/// Per-run accounting. Built fresh each run and handed to the notifier.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, failure: &OrderFailure) {
        self.processed += 1;
        self.failed += 1;
        self.errors.push(failure.to_string());
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn report_line(&self) -> String {
        format!(
            "Procesados: {} | Exitosos: {} | Omitidos: {} | Errores: {}",
            self.processed, self.succeeded, self.skipped, self.failed
        )
    }
}
