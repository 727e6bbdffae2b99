use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use factura_core::{
    AuditLog, AuditRecord, Customer, DocumentGenerator, InvoiceFile, InvoiceLine, InvoiceRecord,
    InvoiceStore, MailDispatcher, Notifier, NotifyLevel, Order, OrderGateway, OutgoingEmail,
    ServiceError, invoice_file_name,
};
use factura_runner::InvoiceProcessor;

/// Shared call journal so tests can assert on cross-collaborator ordering.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

fn order(reference: &str) -> Order {
    Order {
        id: 812,
        reference: reference.to_string(),
        current_state: 4,
        payment: "Redsys".to_string(),
        total_paid: "144.96".parse::<Decimal>().unwrap(),
        currency: "EUR".to_string(),
        customer_id: 29,
    }
}

fn invoice() -> InvoiceRecord {
    InvoiceRecord {
        id: "F-77".to_string(),
        number: "0001".to_string(),
        year: "2026".to_string(),
        customer_name: "Taller Pérez SL".to_string(),
        postcode: "28001".to_string(),
        city: "Madrid".to_string(),
        lines: vec![InvoiceLine {
            description: "Taladro percutor".to_string(),
            quantity: Decimal::ONE,
            unit_price: "59.90".parse().unwrap(),
            amount: "59.90".parse().unwrap(),
        }],
        tax_base: "59.90".parse().unwrap(),
        tax: "12.58".parse().unwrap(),
        total: "72.48".parse().unwrap(),
    }
}

struct MockGateway {
    journal: Journal,
    orders: Vec<Order>,
    fail_fetch: bool,
    fail_mark: bool,
}

#[async_trait]
impl OrderGateway for MockGateway {
    async fn fetch_eligible_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.journal.push("fetch");
        if self.fail_fetch {
            return Err(ServiceError::upstream("order platform", "listing returned 503"));
        }
        Ok(self.orders.clone())
    }

    async fn fetch_customer(&self, order: &Order) -> Result<Customer, ServiceError> {
        self.journal.push(format!("customer:{}", order.reference));
        Ok(Customer {
            id: order.customer_id,
            firstname: "Ana".to_string(),
            lastname: "García".to_string(),
            email: format!("{}@clientes.example.com", order.reference.to_lowercase()),
            company: None,
        })
    }

    async fn mark_invoiced(&self, order: &Order) -> Result<(), ServiceError> {
        self.journal.push(format!("mark:{}", order.reference));
        if self.fail_mark {
            return Err(ServiceError::upstream("order platform", "status update rejected"));
        }
        Ok(())
    }
}

struct MockStore {
    journal: Journal,
    missing: Vec<String>,
}

#[async_trait]
impl InvoiceStore for MockStore {
    async fn find_invoice_file(&self, reference: &str) -> Result<InvoiceFile, ServiceError> {
        self.journal.push(format!("find:{reference}"));
        if self.missing.iter().any(|r| r == reference) {
            return Err(ServiceError::not_found("invoice file", invoice_file_name(reference)));
        }
        Ok(InvoiceFile {
            id: format!("file-{reference}"),
            name: invoice_file_name(reference),
            mime_type: Some("application/json".to_string()),
            modified_time: None,
        })
    }

    async fn download_and_parse(&self, file: &InvoiceFile) -> Result<InvoiceRecord, ServiceError> {
        self.journal.push(format!("download:{}", file.name));
        Ok(invoice())
    }
}

struct MockGenerator {
    journal: Journal,
}

#[async_trait]
impl DocumentGenerator for MockGenerator {
    async fn render_email_body(
        &self,
        order: &Order,
        _customer: &Customer,
        _invoice: &InvoiceRecord,
    ) -> Result<String, ServiceError> {
        self.journal.push(format!("html:{}", order.reference));
        Ok("<p>Su factura</p>".to_string())
    }

    async fn render_pdf(&self, invoice: &InvoiceRecord) -> Result<Vec<u8>, ServiceError> {
        self.journal.push(format!("pdf:{}", invoice.invoice_number()));
        Ok(b"%PDF-1.7 mock".to_vec())
    }
}

struct MockMailer {
    journal: Journal,
    fail: bool,
}

#[async_trait]
impl MailDispatcher for MockMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ServiceError> {
        let kind = if email.attachment.is_some() { "pdf" } else { "plain" };
        self.journal.push(format!("send:{}:{kind}", email.to));
        if self.fail {
            return Err(ServiceError::delivery("recipient rejected"));
        }
        Ok(())
    }
}

struct MockAudit {
    journal: Journal,
    fail: bool,
}

#[async_trait]
impl AuditLog for MockAudit {
    async fn append_row(&self, record: &AuditRecord) -> Result<(), ServiceError> {
        self.journal.push(format!("audit:{}", record.invoice_number));
        if self.fail {
            return Err(ServiceError::upstream("spreadsheet", "quota exceeded"));
        }
        Ok(())
    }
}

struct MockNotifier {
    journal: Journal,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, level: NotifyLevel, title: &str, _body: &str) {
        self.journal.push(format!("notify:{level}:{title}"));
    }
}

struct Harness {
    journal: Journal,
    orders: Vec<Order>,
    fail_fetch: bool,
    fail_mark: bool,
    fail_mail: bool,
    fail_audit: bool,
    missing_files: Vec<String>,
}

impl Harness {
    fn new(orders: Vec<Order>) -> Self {
        Self {
            journal: Journal::default(),
            orders,
            fail_fetch: false,
            fail_mark: false,
            fail_mail: false,
            fail_audit: false,
            missing_files: Vec::new(),
        }
    }

    fn processor(
        &self,
    ) -> InvoiceProcessor<MockGateway, MockStore, MockGenerator, MockMailer, MockAudit, MockNotifier>
    {
        InvoiceProcessor::new(
            MockGateway {
                journal: self.journal.clone(),
                orders: self.orders.clone(),
                fail_fetch: self.fail_fetch,
                fail_mark: self.fail_mark,
            },
            MockStore {
                journal: self.journal.clone(),
                missing: self.missing_files.clone(),
            },
            MockGenerator {
                journal: self.journal.clone(),
            },
            MockMailer {
                journal: self.journal.clone(),
                fail: self.fail_mail,
            },
            MockAudit {
                journal: self.journal.clone(),
                fail: self.fail_audit,
            },
            MockNotifier {
                journal: self.journal.clone(),
            },
        )
    }
}

#[tokio::test]
async fn happy_path_sends_then_updates_status_then_audits() {
    let harness = Harness::new(vec![order("ABCDEFGH")]);
    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert!(!summary.has_failures());

    let journal = harness.journal;
    assert_eq!(journal.count("send:abcdefgh@clientes.example.com:pdf"), 1);
    assert_eq!(journal.count("mark:ABCDEFGH"), 1);
    assert_eq!(journal.count("audit:0001-2026"), 1);

    let sent = journal.position("send:abcdefgh@clientes.example.com:pdf").unwrap();
    let marked = journal.position("mark:ABCDEFGH").unwrap();
    let audited = journal.position("audit:0001-2026").unwrap();
    assert!(sent < marked, "email must go out before the status update");
    assert!(marked < audited, "status update must precede the audit row");

    assert_eq!(
        journal.count("notify:OK:Confirmación de Facturas - Completado"),
        1
    );
}

#[tokio::test]
async fn missing_invoice_file_fails_without_touching_the_order() {
    let mut harness = Harness::new(vec![order("XYZ12345")]);
    harness.missing_files.push("XYZ12345".to_string());

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 0);
    assert!(summary.errors[0].contains("invoice lookup"));

    let entries = harness.journal.entries();
    assert!(!entries.iter().any(|e| e.starts_with("mark:")));
    assert!(!entries.iter().any(|e| e.starts_with("audit:")));
    assert!(!entries.iter().any(|e| e.starts_with("send:")));
    assert_eq!(
        harness
            .journal
            .count("notify:WARN:Error procesando pedido XYZ12345"),
        1
    );
}

#[tokio::test]
async fn one_failed_order_does_not_stop_the_batch() {
    let mut harness = Harness::new(vec![order("XYZ12345"), order("ABCDEFGH")]);
    harness.missing_files.push("XYZ12345".to_string());

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.journal.count("mark:ABCDEFGH"), 1);
    assert_eq!(
        harness
            .journal
            .count("notify:WARN:Confirmación de Facturas - Completado con errores"),
        1
    );
}

#[tokio::test]
async fn audit_append_failure_leaves_the_order_successful() {
    let mut harness = Harness::new(vec![order("ABCDEFGH")]);
    harness.fail_audit = true;

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(harness.journal.count("mark:ABCDEFGH"), 1);
    assert_eq!(harness.journal.count("audit:0001-2026"), 1);
    assert_eq!(
        harness
            .journal
            .count("notify:OK:Confirmación de Facturas - Completado"),
        1
    );
}

#[tokio::test]
async fn status_update_failure_fails_the_order_before_the_audit_row() {
    let mut harness = Harness::new(vec![order("ABCDEFGH")]);
    harness.fail_mark = true;

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("status update"));
    assert!(!harness.journal.entries().iter().any(|e| e.starts_with("audit:")));
}

#[tokio::test]
async fn delivery_failure_prevents_the_status_update() {
    let mut harness = Harness::new(vec![order("ABCDEFGH")]);
    harness.fail_mail = true;

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("email send"));
    assert!(!harness.journal.entries().iter().any(|e| e.starts_with("mark:")));
}

#[tokio::test]
async fn zero_orders_notifies_info_and_never_enters_the_loop() {
    let harness = Harness::new(Vec::new());

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.processed, 0);
    let entries = harness.journal.entries();
    assert_eq!(entries, vec!["fetch", "notify:INFO:Confirmación de Facturas"]);
}

#[tokio::test]
async fn fetch_failure_notifies_error_and_aborts_the_run() {
    let mut harness = Harness::new(vec![order("ABCDEFGH")]);
    harness.fail_fetch = true;

    let result = harness.processor().run().await;

    assert!(result.is_err());
    assert_eq!(
        harness
            .journal
            .count("notify:ERROR:Error crítico en confirmación de facturas"),
        1
    );
    assert!(!harness.journal.entries().iter().any(|e| e.starts_with("find:")));
}

#[tokio::test]
async fn duplicate_references_are_skipped() {
    let harness = Harness::new(vec![order("ABCDEFGH"), order("ABCDEFGH")]);

    let summary = harness.processor().run().await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.journal.count("send:abcdefgh@clientes.example.com:pdf"), 1);
}
