use anyhow::{Context, Result};

/// Runtime mode. Development redirects customer mail to a test inbox,
/// prefixes notifications and raises the default log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => anyhow::bail!("unsupported ENVIRONMENT: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrestashopConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_password: String,
    pub shipped_state: u32,
    pub invoiced_state: u32,
    pub employee_id: u32,
    pub payment_methods: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_url: String,
    pub api_token: String,
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_url: String,
    pub api_token: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub template_api_url: String,
    pub pdf_api_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub bcc: Option<String>,
    pub dev_test_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub channel: String,
    pub recipients: Vec<String>,
}

/// Built once at process start and passed explicitly to every collaborator
/// constructor. No global lookups after this point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub prestashop: PrestashopConfig,
    pub drive: DriveConfig,
    pub sheets: SheetsConfig,
    pub render: RenderConfig,
    pub orders_mail: SmtpConfig,
    pub notifications_mail: SmtpConfig,
    pub notify: NotifyConfig,
    pub log_dir: Option<String>,
}

const DEFAULT_PAYMENT_METHODS: &str =
    "PayPal|Redsys|PayPal with fee|Pagos por transferencia bancaria";

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment: Environment = with_default("ENVIRONMENT", "production").parse()?;

        let google_token = required("GOOGLE_API_TOKEN")?;

        let orders_server = with_default("ORDERS_SMTP_SERVER", "smtp.office365.com");
        let orders_port = parse_u16(&with_default("ORDERS_SMTP_PORT", "587"), "ORDERS_SMTP_PORT")?;
        let orders_sender = required("ORDERS_SENDER_EMAIL")?;
        let orders_password = required("ORDERS_SENDER_PASSWORD")?;

        let prestashop = PrestashopConfig {
            api_url: required("PRESTASHOP_API_URL")?.trim_end_matches('/').to_string(),
            api_key: required("PRESTASHOP_API_USERNAME")?,
            api_password: optional("PRESTASHOP_API_PASSWORD").unwrap_or_default(),
            shipped_state: parse_u32(
                &with_default("PRESTASHOP_SHIPPED_STATE", "4"),
                "PRESTASHOP_SHIPPED_STATE",
            )?,
            invoiced_state: parse_u32(
                &with_default("PRESTASHOP_INVOICED_STATE", "23"),
                "PRESTASHOP_INVOICED_STATE",
            )?,
            employee_id: parse_u32(
                &with_default("PRESTASHOP_EMPLOYEE_ID", "5"),
                "PRESTASHOP_EMPLOYEE_ID",
            )?,
            payment_methods: split_payment_methods(&with_default(
                "PRESTASHOP_PAYMENT_METHODS",
                DEFAULT_PAYMENT_METHODS,
            )),
        };

        let drive = DriveConfig {
            api_url: with_default("GOOGLE_DRIVE_API_URL", "https://www.googleapis.com/drive/v3")
                .trim_end_matches('/')
                .to_string(),
            api_token: google_token.clone(),
            folder_id: optional("GOOGLE_DRIVE_FOLDER_ID"),
        };

        let sheets = SheetsConfig {
            api_url: with_default("GOOGLE_SHEETS_API_URL", "https://sheets.googleapis.com/v4")
                .trim_end_matches('/')
                .to_string(),
            api_token: google_token,
            spreadsheet_id: required("GOOGLE_SHEET_ID")?,
            sheet_name: with_default("GOOGLE_SHEET_NAME", "Facturas"),
        };

        let render = RenderConfig {
            template_api_url: required("EMAIL_TEMPLATE_API_URL")?,
            pdf_api_url: required("PDF_GENERATION_API_URL")?,
        };

        let orders_mail = SmtpConfig {
            server: orders_server.clone(),
            port: orders_port,
            sender: orders_sender.clone(),
            password: orders_password.clone(),
            bcc: optional("BCC_EMAIL"),
            dev_test_email: optional("DEV_TEST_EMAIL"),
        };

        let notifications_mail = SmtpConfig {
            server: optional("NOTIFICATIONS_SMTP_SERVER").unwrap_or(orders_server),
            port: match optional("NOTIFICATIONS_SMTP_PORT") {
                Some(raw) => parse_u16(&raw, "NOTIFICATIONS_SMTP_PORT")?,
                None => orders_port,
            },
            sender: optional("NOTIFICATIONS_SENDER_EMAIL").unwrap_or(orders_sender),
            password: optional("NOTIFICATIONS_SENDER_PASSWORD").unwrap_or(orders_password),
            bcc: None,
            dev_test_email: None,
        };

        let notify = NotifyConfig {
            webhook_url: optional("CHAT_WEBHOOK_URL"),
            channel: with_default("CHAT_WEBHOOK_CHANNEL", "#facturacion"),
            recipients: split_recipients(&optional("NOTIFICATIONS_RECIPIENTS").unwrap_or_default()),
        };

        Ok(Self {
            environment,
            prestashop,
            drive,
            sheets,
            render,
            orders_mail,
            notifications_mail,
            notify,
            log_dir: optional("LOG_DIR"),
        })
    }
}

fn required(key: &'static str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is required"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn with_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u32(raw: &str, key: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a number, got {raw:?}"))
}

fn parse_u16(raw: &str, key: &str) -> Result<u16> {
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a port number, got {raw:?}"))
}

pub fn split_payment_methods(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}
