use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{SenderError, WebhookSink};
use crate::notification::message::WebhookMessage;

/// A sender for posting notifications to a chat webhook
pub struct HttpWebhook {
    client: Client,
}

impl HttpWebhook {
    pub fn new(timeout: Duration) -> Result<Self, SenderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhook {
    async fn post_webhook(&self, url: &str, message: &WebhookMessage) -> Result<(), SenderError> {
        let response = self.client.post(url).json(message).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {}. Body: {}",
                status, error_body
            )));
        }

        Ok(())
    }
}
