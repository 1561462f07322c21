use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmailSink, SenderError};
use crate::notification::message::EmailMessage;

/// Outbound mail server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl SmtpSettings {
    /// Mail needs at least a host and a login
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && !self.username.trim().is_empty()
    }
}

/// SMTP sender using STARTTLS and plain credentials
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings, timeout: Duration) -> Result<Self, SenderError> {
        if !settings.is_configured() {
            return Err(SenderError::InvalidConfiguration("SMTP host and username are required".into()));
        }

        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| SenderError::InvalidConfiguration(e.to_string()))?
            .port(settings.port)
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport })
    }

    fn build(message: &EmailMessage) -> Result<Message, SenderError> {
        let parse = |address: &str| {
            address
                .parse::<Mailbox>()
                .map_err(|e| SenderError::InvalidConfiguration(format!("bad address {address:?}: {e}")))
        };

        let mut builder = Message::builder().from(parse(&message.from)?).subject(message.subject.clone());
        for to in &message.to {
            builder = builder.to(parse(to)?);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| SenderError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl EmailSink for SmtpMailer {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), SenderError> {
        let email = Self::build(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| SenderError::SendFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(host: &str, username: &str) -> SmtpSettings {
        SmtpSettings {
            host: host.into(),
            port: 587,
            username: username.into(),
            password: "secret".into(),
            from_address: "uppe@example.com".into(),
        }
    }

    #[test]
    fn test_unconfigured_settings_are_rejected() {
        assert!(!settings("", "user").is_configured());
        assert!(!settings("smtp.example.com", " ").is_configured());
        assert!(SmtpMailer::new(&settings("", ""), Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_build_rejects_bad_recipient() {
        let message = EmailMessage {
            from: "uppe@example.com".into(),
            to: vec!["not an address".into()],
            subject: "Website Example is DOWN".into(),
            body: "body".into(),
        };
        assert!(matches!(SmtpMailer::build(&message), Err(SenderError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_build_accepts_multiple_recipients() {
        let message = EmailMessage {
            from: "Uppe <uppe@example.com>".into(),
            to: vec!["a@example.com".into(), "b@example.com".into()],
            subject: "Website Example is UP".into(),
            body: "body".into(),
        };
        assert!(SmtpMailer::build(&message).is_ok());
    }
}
