use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Outbound mail boundary. Callers treat delivery as fire-and-forget: a
/// failed send is logged by the caller, never surfaced to the API client.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// Mailer that writes messages to the log. Stands in for a real provider;
/// delivery mechanics are out of scope for this service.
#[derive(Debug, Default, Clone)]
pub struct LogMailer {
    pub from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body = %body,
            "Outbound mail"
        );
        Ok(())
    }
}
