use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

use super::checker::{Checker, HttpChecker};
use super::types::ProbeOutcome;

/// Monitoring executor - runs one check and folds every failure into the outcome
pub struct MonitoringExecutor {
    checker: Arc<dyn Checker>,
}

impl MonitoringExecutor {
    /// Create an executor backed by the HTTP checker
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        Ok(Self::with_checker(Arc::new(HttpChecker::new(timeout_seconds)?)))
    }

    pub fn with_checker(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Execute a monitoring check. Never fails: a broken target is a `down` outcome.
    pub async fn execute_check(&self, target_id: Uuid, url: &str) -> ProbeOutcome {
        let outcome = ProbeOutcome::new(target_id);

        let outcome = match self.checker.check(url).await {
            Ok(response) if response.is_healthy() => {
                outcome.success(response.latency_ms, Some(response.status_code))
            }
            Ok(response) => outcome.rejected(response.latency_ms, response.status_code),
            Err(e) => outcome.failure(e.to_string()),
        };

        outcome.at(chrono::Utc::now())
    }
}
