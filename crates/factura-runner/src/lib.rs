use std::collections::HashSet;

use chrono::Utc;
use tracing::{error, info, warn};

use factura_core::{
    AuditLog, AuditRecord, DocumentGenerator, EmailAttachment, InvoiceStore, MailDispatcher,
    Notifier, NotifyLevel, Order, OrderFailure, OrderGateway, OutgoingEmail, PipelineStep,
    RunSummary, ServiceError,
};

/// Drives the whole batch: enumerate eligible orders once, then run each
/// order through the fixed collaborator sequence. A failing order is
/// recorded and the loop moves on; only a failing enumeration aborts the
/// run.
pub struct InvoiceProcessor<G, S, D, M, A, N> {
    orders: G,
    store: S,
    generator: D,
    mailer: M,
    audit: A,
    notifier: N,
}

impl<G, S, D, M, A, N> InvoiceProcessor<G, S, D, M, A, N>
where
    G: OrderGateway,
    S: InvoiceStore,
    D: DocumentGenerator,
    M: MailDispatcher,
    A: AuditLog,
    N: Notifier,
{
    pub fn new(orders: G, store: S, generator: D, mailer: M, audit: A, notifier: N) -> Self {
        Self {
            orders,
            store,
            generator,
            mailer,
            audit,
            notifier,
        }
    }

    /// One complete run. `Err` only when the initial eligible-order fetch
    /// fails; per-order failures are folded into the summary.
    pub async fn run(&self) -> Result<RunSummary, ServiceError> {
        info!("starting invoice confirmation run");

        let orders = match self.orders.fetch_eligible_orders().await {
            Ok(orders) => orders,
            Err(err) => {
                error!("eligible-order fetch failed: {err}");
                self.notifier
                    .notify(
                        NotifyLevel::Error,
                        "Error crítico en confirmación de facturas",
                        &format!("No se pudieron obtener los pedidos: {err}"),
                    )
                    .await;
                return Err(err);
            }
        };

        let mut summary = RunSummary::new();

        if orders.is_empty() {
            info!("no orders pending invoice confirmation");
            self.notifier
                .notify(
                    NotifyLevel::Info,
                    "Confirmación de Facturas",
                    "No hay pedidos pendientes de confirmación de factura",
                )
                .await;
            return Ok(summary);
        }

        info!("{} orders to process", orders.len());

        let mut seen = HashSet::new();
        for order in &orders {
            if !seen.insert(order.reference.clone()) {
                warn!("order {} listed more than once, skipping duplicate", order.reference);
                summary.record_skip();
                continue;
            }

            match self.process_order(order).await {
                Ok(()) => {
                    info!("order {} processed", order.reference);
                    summary.record_success();
                }
                Err(failure) => {
                    error!("{failure}");
                    self.notifier
                        .notify(
                            NotifyLevel::Warning,
                            &format!("Error procesando pedido {}", failure.reference),
                            &failure.to_string(),
                        )
                        .await;
                    summary.record_failure(&failure);
                }
            }
        }

        let report = summary.report_line();
        info!("run finished: {report}");
        if summary.has_failures() {
            self.notifier
                .notify(
                    NotifyLevel::Warning,
                    "Confirmación de Facturas - Completado con errores",
                    &report,
                )
                .await;
        } else {
            self.notifier
                .notify(
                    NotifyLevel::Success,
                    "Confirmación de Facturas - Completado",
                    &report,
                )
                .await;
        }

        Ok(summary)
    }

    /// One order, one pass. The status transition happens only after the
    /// customer email went out, and the audit row only after the status
    /// transition; a failed audit append leaves the order successful.
    async fn process_order(&self, order: &Order) -> Result<(), OrderFailure> {
        info!("processing order {} (id {})", order.reference, order.id);

        let file = self
            .store
            .find_invoice_file(&order.reference)
            .await
            .map_err(step_failure(order, PipelineStep::InvoiceLocated))?;

        let invoice = self
            .store
            .download_and_parse(&file)
            .await
            .map_err(step_failure(order, PipelineStep::InvoiceParsed))?;
        info!("invoice {} loaded", invoice.invoice_number());

        let customer = self
            .orders
            .fetch_customer(order)
            .await
            .map_err(step_failure(order, PipelineStep::CustomerFetched))?;
        if customer.email.trim().is_empty() {
            return Err(step_failure(order, PipelineStep::CustomerFetched)(
                ServiceError::not_found("customer email", order.reference.clone()),
            ));
        }

        let html_body = self
            .generator
            .render_email_body(order, &customer, &invoice)
            .await
            .map_err(step_failure(order, PipelineStep::DocumentsRendered))?;
        let pdf = self
            .generator
            .render_pdf(&invoice)
            .await
            .map_err(step_failure(order, PipelineStep::DocumentsRendered))?;

        let invoice_number = invoice.invoice_number();
        let email = OutgoingEmail {
            to: customer.email.clone(),
            subject: format!("Factura de tu pedido {}", order.reference),
            html_body,
            attachment: Some(EmailAttachment {
                filename: format!("Factura {invoice_number} - {}.pdf", customer.firstname),
                content_type: "application/pdf".to_string(),
                bytes: pdf,
            }),
        };
        self.mailer
            .send(email)
            .await
            .map_err(step_failure(order, PipelineStep::EmailSent))?;

        self.orders
            .mark_invoiced(order)
            .await
            .map_err(step_failure(order, PipelineStep::StatusUpdated))?;

        let record = AuditRecord {
            file_name: file.name.clone(),
            invoice_id: invoice.id.clone(),
            invoice_number,
            customer_email: customer.email,
            sent_at: Utc::now(),
            status: "enviada".to_string(),
        };
        if let Err(err) = self.audit.append_row(&record).await {
            // Order is already invoiced; the trail can be repaired by hand.
            warn!("audit append failed for {}: {err}", order.reference);
        }

        Ok(())
    }
}

fn step_failure(order: &Order, step: PipelineStep) -> impl FnOnce(ServiceError) -> OrderFailure {
    let reference = order.reference.clone();
    move |error| OrderFailure {
        reference,
        step,
        error,
    }
}
