use anyhow::{Context, Result};
use tracing::info;

use factura_drive::DriveStore;
use factura_mail::SmtpMailer;
use factura_notify::WebhookNotifier;
use factura_platform::{AppConfig, init_logging};
use factura_prestashop::PrestashopGateway;
use factura_render::RenderClient;
use factura_runner::InvoiceProcessor;
use factura_sheets::SheetsAudit;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    let _log_guard = init_logging(config.environment, config.log_dir.as_deref());

    info!("starting in {:?} mode", config.environment);

    let gateway =
        PrestashopGateway::new(config.prestashop.clone()).context("order platform client")?;
    let store = DriveStore::new(config.drive.clone()).context("file store client")?;
    let generator = RenderClient::new(config.render.clone()).context("render client")?;
    let customer_mailer = SmtpMailer::new(config.orders_mail.clone(), config.environment);
    let internal_mailer = SmtpMailer::new(config.notifications_mail.clone(), config.environment);
    let audit = SheetsAudit::new(config.sheets.clone()).context("spreadsheet client")?;
    let notifier = WebhookNotifier::new(config.notify.clone(), config.environment, internal_mailer)
        .context("notifier client")?;

    let processor =
        InvoiceProcessor::new(gateway, store, generator, customer_mailer, audit, notifier);

    let summary = processor.run().await?;
    info!("process finished: {}", summary.report_line());

    Ok(())
}
