//! Rendering of transition events into email and chat webhook messages.

use serde::Serialize;

use crate::monitoring::types::TransitionEvent;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FOOTER: &str = "This is an automated notification from your uptime monitoring system.";

/// Plain-text email ready for a mail transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn for_event(event: &TransitionEvent, from: &str) -> Self {
        let previous = event.previous.as_str().to_uppercase();
        let current = event.current.as_str().to_uppercase();
        let at = event.timestamp.format(TIME_FORMAT);

        let body = if event.is_recovery() {
            format!(
                "Website {} ({}) is now UP!\n\n\
                 Status changed from {previous} to {current} at {at}\n\
                 Response time: {}ms\n\n\
                 {FOOTER}",
                event.name, event.url, event.latency_ms,
            )
        } else {
            format!(
                "Website {} ({}) is DOWN!\n\n\
                 Status changed from {previous} to {current} at {at}\n\n\
                 Please check your website immediately.\n\n\
                 {FOOTER}",
                event.name, event.url,
            )
        };

        Self {
            from: from.to_string(),
            to: event.emails.clone(),
            subject: format!("Website {} is {current}", event.name),
            body,
        }
    }
}

/// Chat webhook payload (incoming-webhook attachment format)
#[derive(Debug, Clone, Serialize)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    pub username: String,
    pub icon_emoji: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub color: String,
    pub title: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Field {
    fn short(title: &str, value: impl Into<String>) -> Self {
        Self { title: title.to_string(), value: value.into(), short: true }
    }
}

impl WebhookMessage {
    pub fn for_event(event: &TransitionEvent) -> Self {
        let (color, title) = if event.is_recovery() {
            ("good", format!(":white_check_mark: Website {} is UP", event.name))
        } else {
            ("danger", format!(":x: Website {} is DOWN", event.name))
        };

        let mut fields = vec![
            Field::short("Website", event.name.clone()),
            Field::short("URL", event.url.clone()),
            Field::short(
                "Status Change",
                format!(
                    "{} → {}",
                    event.previous.as_str().to_uppercase(),
                    event.current.as_str().to_uppercase()
                ),
            ),
            Field::short("Time", event.timestamp.format(TIME_FORMAT).to_string()),
        ];

        // Latency of a failed probe means nothing.
        if event.is_recovery() && event.latency_ms > 0 {
            fields.push(Field::short("Response Time", format!("{}ms", event.latency_ms)));
        }

        Self {
            text: String::new(),
            username: "Uptime Monitor".to_string(),
            icon_emoji: ":computer:".to_string(),
            attachments: vec![Attachment {
                color: color.to_string(),
                title,
                timestamp: event.timestamp.timestamp(),
                fields,
            }],
        }
    }
}
