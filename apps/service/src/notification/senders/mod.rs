use async_trait::async_trait;
use thiserror::Error;

use super::message::{EmailMessage, WebhookMessage};

pub mod email;
pub mod webhook;

pub use email::{SmtpMailer, SmtpSettings};
pub use webhook::HttpWebhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Delivery timed out after {0}s")]
    Timeout(u64),
}

/// Outbound mail transport
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), SenderError>;
}

/// Outbound chat webhook transport
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn post_webhook(&self, url: &str, message: &WebhookMessage) -> Result<(), SenderError>;
}
