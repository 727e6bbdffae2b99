use async_trait::async_trait;
use tracing::{debug, error, warn};

use factura_core::{MailDispatcher, Notifier, NotifyLevel, OutgoingEmail, ServiceError};
use factura_platform::{Environment, NotifyConfig, build_http_client};

const SERVICE: &str = "chat webhook";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Operational notifications: chat webhook first, internal email as
/// fallback. Failures on both paths end in the log — a broken
/// notification channel must never take the batch down with it.
pub struct WebhookNotifier<M> {
    config: NotifyConfig,
    environment: Environment,
    client: reqwest::Client,
    mailer: M,
}

impl<M: MailDispatcher> WebhookNotifier<M> {
    pub fn new(
        config: NotifyConfig,
        environment: Environment,
        mailer: M,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT_SECS)?,
            config,
            environment,
            mailer,
        })
    }

    async fn post_webhook(&self, text: &str) -> Result<(), ServiceError> {
        let url = self
            .config
            .webhook_url
            .as_deref()
            .ok_or_else(|| ServiceError::upstream(SERVICE, "no webhook URL configured"))?;

        let response = self
            .client
            .post(url)
            .json(&webhook_payload(&self.config.channel, text))
            .send()
            .await
            .map_err(|e| ServiceError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::upstream(SERVICE, format!("returned {status}")));
        }

        Ok(())
    }

    async fn fallback_email(&self, subject: &str, body: &str, webhook_error: &ServiceError) {
        if self.config.recipients.is_empty() {
            error!("chat webhook failed and no notification recipients configured");
            return;
        }

        for recipient in &self.config.recipients {
            let email = OutgoingEmail {
                to: recipient.clone(),
                subject: subject.to_string(),
                html_body: fallback_body(body, webhook_error),
                attachment: None,
            };
            if let Err(err) = self.mailer.send(email).await {
                error!("notification fallback email to {recipient} failed: {err}");
            }
        }
    }
}

#[async_trait]
impl<M: MailDispatcher> Notifier for WebhookNotifier<M> {
    async fn notify(&self, level: NotifyLevel, title: &str, body: &str) {
        let title = decorated_title(self.environment, title);
        let text = compose_text(level, &title, body);

        match self.post_webhook(&text).await {
            Ok(()) => debug!("notification delivered to chat: {title}"),
            Err(err) => {
                warn!("chat webhook failed ({err}), falling back to email");
                self.fallback_email(&title, body, &err).await;
            }
        }
    }
}

fn webhook_payload(channel: &str, text: &str) -> serde_json::Value {
    serde_json::json!({ "channel": channel, "text": text })
}

fn decorated_title(environment: Environment, title: &str) -> String {
    if environment.is_development() {
        format!("[DEV] {title}")
    } else {
        title.to_string()
    }
}

fn compose_text(level: NotifyLevel, title: &str, body: &str) -> String {
    format!("[{level}] {title}\n{body}")
}

fn fallback_body(body: &str, webhook_error: &ServiceError) -> String {
    format!(
        "<p>{body}</p><p>Aviso: el canal de chat no respondió ({webhook_error}), \
         este mensaje llega por correo.</p>"
    )
}
