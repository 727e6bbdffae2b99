use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use factura_core::{MailDispatcher, OutgoingEmail, ServiceError};
use factura_platform::{Environment, SmtpConfig};

/// Authenticated SMTP sender (STARTTLS on the configured port). The
/// transport is built per send, so every message gets its own session and
/// nothing stays open between calls.
///
/// Outside production the recipient is replaced with the configured test
/// address and the subject is prefixed; the BCC copy only applies in
/// production.
pub struct SmtpMailer {
    config: SmtpConfig,
    environment: Environment,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ServiceError> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            .map_err(|e| ServiceError::delivery(e.to_string()))?;
        Ok(builder
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.sender.clone(),
                self.config.password.clone(),
            ))
            .build())
    }
}

#[async_trait]
impl MailDispatcher for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ServiceError> {
        let (recipient, subject) = effective_route(
            self.environment,
            self.config.dev_test_email.as_deref(),
            &email.to,
            &email.subject,
        );
        if recipient != email.to {
            info!("redirecting mail for {} to {recipient}", email.to);
        }

        let from: Mailbox = self
            .config
            .sender
            .parse()
            .map_err(|_| ServiceError::delivery(format!("bad sender address {:?}", self.config.sender)))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| ServiceError::delivery(format!("bad recipient address {recipient:?}")))?;

        let mut builder = Message::builder().from(from).to(to).subject(&subject);
        if let Some(bcc) = effective_bcc(self.environment, self.config.bcc.as_deref()) {
            let copy: Mailbox = bcc
                .parse()
                .map_err(|_| ServiceError::delivery(format!("bad bcc address {bcc:?}")))?;
            builder = builder.bcc(copy);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::html(email.html_body));
        if let Some(attachment) = email.attachment {
            let content_type: ContentType = attachment
                .content_type
                .parse()
                .map_err(|_| ServiceError::delivery(format!("bad content type {:?}", attachment.content_type)))?;
            parts = parts
                .singlepart(Attachment::new(attachment.filename).body(attachment.bytes, content_type));
        }

        let message = builder
            .multipart(parts)
            .map_err(|e| ServiceError::delivery(e.to_string()))?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| ServiceError::delivery(e.to_string()))?;

        info!("email sent to {recipient}: {subject}");
        Ok(())
    }
}

fn effective_route(
    environment: Environment,
    dev_test_email: Option<&str>,
    to: &str,
    subject: &str,
) -> (String, String) {
    if environment.is_development() {
        if let Some(test_address) = dev_test_email {
            return (test_address.to_string(), format!("[TEST] {subject}"));
        }
    }
    (to.to_string(), subject.to_string())
}

fn effective_bcc(environment: Environment, bcc: Option<&str>) -> Option<&str> {
    match environment {
        Environment::Production => bcc,
        Environment::Development => None,
    }
}
