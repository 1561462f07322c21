use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::{ProbeOutcome, TargetStatus};

/// Intervals below this are replaced with [`DEFAULT_INTERVAL_SECONDS`]
pub const MIN_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;

/// Apply the minimum-interval rule used on create and update
pub fn coerce_interval(interval_seconds: u64) -> u64 {
    if interval_seconds < MIN_INTERVAL_SECONDS { DEFAULT_INTERVAL_SECONDS } else { interval_seconds }
}

/// Target model - an endpoint with its own check cadence and notification routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub interval_seconds: u64,
    pub enabled: bool,
    pub status: TargetStatus,
    pub last_latency_ms: u64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub notification_emails: Vec<String>,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// Create a new enabled target with the default interval
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            enabled: true,
            status: TargetStatus::Unknown,
            last_latency_ms: 0,
            last_checked_at: None,
            notification_emails: Vec::new(),
            webhook_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_interval(mut self, interval_seconds: u64) -> Self {
        self.interval_seconds = interval_seconds;
        self
    }

    pub fn with_emails(mut self, emails: Vec<String>) -> Self {
        self.notification_emails = emails;
        self
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Apply a partial configuration change. Returns true when the check loop has to restart.
    pub fn apply(&mut self, update: TargetUpdate) -> bool {
        let mut reschedule = false;

        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(url) = update.url {
            reschedule |= url != self.url;
            self.url = url;
        }
        if let Some(interval) = update.interval_seconds {
            let interval = coerce_interval(interval);
            reschedule |= interval != self.interval_seconds;
            self.interval_seconds = interval;
        }
        if let Some(emails) = update.notification_emails {
            self.notification_emails = emails;
        }
        if let Some(webhook) = update.webhook_url {
            self.webhook_url = webhook;
        }

        self.updated_at = Utc::now();
        reschedule
    }

    /// Record the latest probe outcome on the live record
    pub fn observe(&mut self, outcome: &ProbeOutcome) {
        self.status = outcome.status;
        self.last_latency_ms = outcome.latency_ms;
        self.last_checked_at = Some(outcome.timestamp);
    }
}

/// Partial update issued by the management layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub interval_seconds: Option<u64>,
    pub notification_emails: Option<Vec<String>>,
    /// `Some(None)` clears the webhook
    pub webhook_url: Option<Option<String>>,
}

/// One stored history point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub target_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: TargetStatus,
    pub latency_ms: u64,
}

impl From<&ProbeOutcome> for HistorySample {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            target_id: outcome.target_id,
            timestamp: outcome.timestamp,
            status: outcome.status,
            latency_ms: outcome.latency_ms,
        }
    }
}
