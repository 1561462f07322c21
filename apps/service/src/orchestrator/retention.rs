//! Automatic retention and cleanup of history samples.
//!
//! The per-target sample cap bounds history while a target is monitored.
//! This task additionally removes:
//! - samples older than the retention window
//! - samples of targets that no longer exist
//!
//! Cleanup runs periodically (every hour by default) as a background task.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::database::Database;

/// Default interval between two cleanup passes
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Retention policy for history samples
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep history samples
    pub history_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { history_days: 30 }
    }
}

impl RetentionPolicy {
    fn retention_seconds(&self) -> i64 {
        self.history_days.max(0) * 24 * 3600
    }
}

/// What one cleanup pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired: u64,
    pub orphaned: u64,
}

/// Cleanup manager for expired samples
pub struct RetentionCleanup {
    database: Arc<dyn Database>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(database: Arc<dyn Database>, policy: RetentionPolicy) -> Self {
        Self { database, policy }
    }

    /// Run one cleanup pass
    pub async fn cleanup_expired_samples(&self) -> Result<CleanupReport> {
        let cutoff = Utc::now() - ChronoDuration::seconds(self.policy.retention_seconds());
        debug!(
            "Cleaning up history samples (older than {} days, cutoff: {})",
            self.policy.history_days, cutoff
        );

        let expired = self.database.prune_samples_before(cutoff).await?;
        let orphaned = self.database.prune_orphaned_samples().await?;

        if expired + orphaned > 0 {
            info!("Retention cleanup completed: {} expired, {} orphaned samples deleted", expired, orphaned);
        }

        Ok(CleanupReport { expired, orphaned })
    }

    /// Start the background cleanup task. The first pass runs immediately.
    pub fn start_periodic_cleanup(self, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                if let Err(e) = self.cleanup_expired_samples().await {
                    warn!("Periodic history cleanup failed: {:#}", e);
                }
            }
        })
    }
}
