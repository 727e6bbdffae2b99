use thiserror::Error;

/// Failure taxonomy shared by every collaborator.
///
/// One order's pipeline stops at the first error; the batch does not.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {detail}")]
    Upstream { service: &'static str, detail: String },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("malformed {what}: {detail}")]
    Format { what: &'static str, detail: String },

    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

impl ServiceError {
    pub fn upstream(service: &'static str, detail: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            detail: detail.into(),
        }
    }

    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }

    pub fn format(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Format {
            what,
            detail: detail.into(),
        }
    }

    pub fn delivery(detail: impl Into<String>) -> Self {
        Self::Delivery(detail.into())
    }
}
