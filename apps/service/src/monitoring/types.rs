use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::Target;

/// Observed health of a target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl TargetStatus {
    /// Lenient parse used when reading stored rows; anything unrecognised is `Unknown`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "up" => TargetStatus::Up,
            "down" => TargetStatus::Down,
            _ => TargetStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Up => "up",
            TargetStatus::Down => "down",
            TargetStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single probe against a target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Target that was probed
    pub target_id: Uuid,

    /// When the probe finished
    pub timestamp: DateTime<Utc>,

    pub status: TargetStatus,

    /// Round trip in milliseconds, 0 when no response was received
    pub latency_ms: u64,

    /// HTTP status code, when a response was received
    pub status_code: Option<u16>,

    /// Failure detail for `down` outcomes
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// Create a new outcome; status stays `Unknown` until marked
    pub fn new(target_id: Uuid) -> Self {
        Self {
            target_id,
            timestamp: Utc::now(),
            status: TargetStatus::Unknown,
            latency_ms: 0,
            status_code: None,
            error_message: None,
        }
    }

    /// Reachable target answering with a 2xx/3xx status
    pub fn success(mut self, latency_ms: u64, status_code: Option<u16>) -> Self {
        self.status = TargetStatus::Up;
        self.latency_ms = latency_ms;
        self.status_code = status_code;
        self
    }

    /// Reachable target answering with an error status. Latency is kept.
    pub fn rejected(mut self, latency_ms: u64, status_code: u16) -> Self {
        self.status = TargetStatus::Down;
        self.latency_ms = latency_ms;
        self.status_code = Some(status_code);
        self.error_message = Some(format!("HTTP status {status_code}"));
        self
    }

    /// Unreachable target
    pub fn failure(mut self, error: String) -> Self {
        self.status = TargetStatus::Down;
        self.latency_ms = 0;
        self.status_code = None;
        self.error_message = Some(error);
        self
    }

    /// Pin the timestamp; used by replayed and scripted outcomes
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A change between two consecutive observed statuses of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub target_id: Uuid,
    pub name: String,
    pub url: String,
    pub previous: TargetStatus,
    pub current: TargetStatus,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub emails: Vec<String>,
    pub webhook_url: Option<String>,
}

impl TransitionEvent {
    pub fn new(target: &Target, previous: TargetStatus, outcome: &ProbeOutcome) -> Self {
        Self {
            target_id: target.id,
            name: target.name.clone(),
            url: target.url.clone(),
            previous,
            current: outcome.status,
            latency_ms: outcome.latency_ms,
            timestamp: outcome.timestamp,
            emails: target.notification_emails.clone(),
            webhook_url: target.webhook_url.clone(),
        }
    }

    pub fn is_recovery(&self) -> bool {
        self.current == TargetStatus::Up
    }
}
