use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::{Row, params};
use tracing::warn;
use uuid::Uuid;

use super::models::{HistorySample, Target};
use super::stats;
use crate::monitoring::types::TargetStatus;
use crate::pool::LibsqlPool;

/// Samples kept per target unless configured otherwise
pub const DEFAULT_MAX_SAMPLES_PER_TARGET: usize = 1000;

/// Storage operations used by the monitoring pipeline
#[async_trait]
pub trait Database: Send + Sync {
    /// Load every stored target. Malformed rows are skipped and reported.
    async fn load_targets(&self) -> Result<Vec<Target>>;

    /// Replace the stored target set with `targets`
    async fn save_targets(&self, targets: &[Target]) -> Result<()>;

    /// Append one history sample, trimming the target's oldest samples
    async fn append_sample(&self, sample: &HistorySample) -> Result<()>;

    /// Samples of the last `window_hours`, oldest first
    async fn recent_samples(&self, target_id: Uuid, window_hours: u32) -> Result<Vec<HistorySample>>;

    /// Drop all history of a target
    async fn delete_history(&self, target_id: Uuid) -> Result<u64>;

    /// Drop samples older than `cutoff`
    async fn prune_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Drop samples whose target no longer exists
    async fn prune_orphaned_samples(&self) -> Result<u64>;

    /// Uptime percentage over the window; 100 when there are no samples
    async fn percent_up(&self, target_id: Uuid, window_hours: u32) -> Result<f64> {
        Ok(stats::percent_up(&self.recent_samples(target_id, window_hours).await?))
    }

    /// Mean latency of successful samples over the window
    async fn avg_latency(&self, target_id: Uuid, window_hours: u32) -> Result<f64> {
        Ok(stats::avg_latency(&self.recent_samples(target_id, window_hours).await?))
    }
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
    max_samples_per_target: usize,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool, max_samples_per_target: DEFAULT_MAX_SAMPLES_PER_TARGET }
    }

    pub fn with_max_samples(mut self, max_samples_per_target: usize) -> Self {
        self.max_samples_per_target = max_samples_per_target.max(1);
        self
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

const TARGET_COLUMNS: &str = "id, name, url, interval_seconds, enabled, status, last_latency_ms, \
     last_checked_at, notification_emails, webhook_url, created_at, updated_at";

fn target_from_row(row: &Row) -> Result<Target> {
    let id: String = row.get(0)?;
    let emails: String = row.get(8)?;

    Ok(Target {
        id: Uuid::parse_str(&id).with_context(|| format!("bad target id {id:?}"))?,
        name: row.get(1)?,
        url: row.get(2)?,
        interval_seconds: row.get::<i64>(3)?.max(0) as u64,
        enabled: row.get::<i64>(4)? != 0,
        status: TargetStatus::from_db(&row.get::<String>(5)?),
        last_latency_ms: row.get::<i64>(6)?.max(0) as u64,
        last_checked_at: row.get::<Option<i64>>(7)?.map(from_millis),
        notification_emails: serde_json::from_str(&emails)
            .with_context(|| format!("bad notification_emails for target {id}"))?,
        webhook_url: row.get(9)?,
        created_at: from_millis(row.get(10)?),
        updated_at: from_millis(row.get(11)?),
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn load_targets(&self) -> Result<Vec<Target>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(&format!("SELECT {TARGET_COLUMNS} FROM targets"), ()).await?;
        let mut targets = Vec::new();

        while let Some(row) = rows.next().await? {
            match target_from_row(&row) {
                Ok(target) => targets.push(target),
                Err(e) => warn!("Skipping malformed target record: {:#}", e),
            }
        }

        Ok(targets)
    }

    async fn save_targets(&self, targets: &[Target]) -> Result<()> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        tx.execute("DELETE FROM targets", ()).await?;

        for target in targets {
            tx.execute(
                &format!(
                    "INSERT INTO targets ({TARGET_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    target.id.to_string(),
                    target.name.clone(),
                    target.url.clone(),
                    target.interval_seconds as i64,
                    if target.enabled { 1 } else { 0 },
                    target.status.as_str(),
                    target.last_latency_ms as i64,
                    target.last_checked_at.map(to_millis),
                    serde_json::to_string(&target.notification_emails)?,
                    target.webhook_url.clone(),
                    to_millis(target.created_at),
                    to_millis(target.updated_at)
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_sample(&self, sample: &HistorySample) -> Result<()> {
        let conn = self.get_conn().await?;
        let target_id = sample.target_id.to_string();

        conn.execute(
            "INSERT INTO history_samples (target_id, timestamp, status, latency_ms) VALUES (?, ?, ?, ?)",
            params![
                target_id.clone(),
                to_millis(sample.timestamp),
                sample.status.as_str(),
                sample.latency_ms as i64
            ],
        )
        .await?;

        conn.execute(
            "DELETE FROM history_samples WHERE target_id = ?1 AND id NOT IN \
             (SELECT id FROM history_samples WHERE target_id = ?1 ORDER BY id DESC LIMIT ?2)",
            params![target_id, self.max_samples_per_target as i64],
        )
        .await?;

        Ok(())
    }

    async fn recent_samples(&self, target_id: Uuid, window_hours: u32) -> Result<Vec<HistorySample>> {
        let conn = self.get_conn().await?;
        let cutoff = Utc::now() - Duration::hours(i64::from(window_hours));

        let stmt = conn
            .prepare(
                "SELECT timestamp, status, latency_ms FROM history_samples \
                 WHERE target_id = ? AND timestamp > ? ORDER BY id ASC",
            )
            .await?;
        let mut rows = stmt.query(params![target_id.to_string(), to_millis(cutoff)]).await?;
        let mut samples = Vec::new();

        while let Some(row) = rows.next().await? {
            samples.push(HistorySample {
                target_id,
                timestamp: from_millis(row.get(0)?),
                status: TargetStatus::from_db(&row.get::<String>(1)?),
                latency_ms: row.get::<i64>(2)?.max(0) as u64,
            });
        }

        Ok(samples)
    }

    async fn delete_history(&self, target_id: Uuid) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM history_samples WHERE target_id = ?", params![target_id.to_string()])
            .await?;
        Ok(deleted)
    }

    async fn prune_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM history_samples WHERE timestamp < ?", params![to_millis(cutoff)])
            .await?;
        Ok(deleted)
    }

    async fn prune_orphaned_samples(&self) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM history_samples WHERE target_id NOT IN (SELECT id FROM targets)", ())
            .await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::create_test_database;

    fn sample(target_id: Uuid, status: TargetStatus, latency_ms: u64) -> HistorySample {
        HistorySample { target_id, timestamp: Utc::now(), status, latency_ms }
    }

    #[tokio::test]
    async fn test_targets_round_trip() -> Result<()> {
        let (database, _dir) = create_test_database().await?;

        let target = Target::new("Example", "https://example.com")
            .with_interval(120)
            .with_emails(vec!["ops@example.com".into()])
            .with_webhook("https://hooks.example.com/T000");
        database.save_targets(std::slice::from_ref(&target)).await?;

        let loaded = database.load_targets().await?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, target.id);
        assert_eq!(loaded[0].interval_seconds, 120);
        assert_eq!(loaded[0].notification_emails, vec!["ops@example.com".to_string()]);
        assert_eq!(loaded[0].webhook_url.as_deref(), Some("https://hooks.example.com/T000"));

        // Saving an empty set removes the stored targets.
        database.save_targets(&[]).await?;
        assert!(database.load_targets().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_target_is_skipped() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let good = Target::new("Good", "https://example.com");
        database.save_targets(std::slice::from_ref(&good)).await?;

        let conn = database.get_conn().await?;
        conn.execute(
            "INSERT INTO targets (id, name, url, notification_emails, created_at, updated_at) VALUES ('not-a-uuid', 'Bad', 'https://bad.example.com', '[]', 0, 0)",
            (),
        )
        .await?;
        conn.execute(
            "INSERT INTO targets (id, name, url, notification_emails, created_at, updated_at) VALUES (?, 'Bad json', 'https://bad.example.com', '{', 0, 0)",
            params![Uuid::new_v4().to_string()],
        )
        .await?;

        let loaded = database.load_targets().await?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, good.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_history_window_and_aggregates() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let target_id = Uuid::new_v4();

        assert_eq!(database.percent_up(target_id, 24).await?, 100.0);

        for _ in 0..7 {
            database.append_sample(&sample(target_id, TargetStatus::Up, 100)).await?;
        }
        for _ in 0..3 {
            database.append_sample(&sample(target_id, TargetStatus::Down, 0)).await?;
        }

        let mut old = sample(target_id, TargetStatus::Down, 0);
        old.timestamp = Utc::now() - Duration::hours(48);
        database.append_sample(&old).await?;

        assert_eq!(database.recent_samples(target_id, 24).await?.len(), 10);
        assert_eq!(database.percent_up(target_id, 24).await?, 70.0);
        assert_eq!(database.avg_latency(target_id, 24).await?, 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_history_is_capped_per_target() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let database = database.with_max_samples(5);
        let target_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        for latency in 1..=8 {
            database.append_sample(&sample(target_id, TargetStatus::Up, latency)).await?;
        }
        database.append_sample(&sample(other_id, TargetStatus::Up, 1)).await?;

        let samples = database.recent_samples(target_id, 24).await?;
        let latencies: Vec<u64> = samples.iter().map(|s| s.latency_ms).collect();
        assert_eq!(latencies, vec![4, 5, 6, 7, 8]);
        assert_eq!(database.recent_samples(other_id, 24).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_pruning() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let kept = Target::new("Kept", "https://example.com");
        database.save_targets(std::slice::from_ref(&kept)).await?;
        let orphan_id = Uuid::new_v4();

        database.append_sample(&sample(kept.id, TargetStatus::Up, 10)).await?;
        database.append_sample(&sample(orphan_id, TargetStatus::Up, 10)).await?;
        assert_eq!(database.prune_orphaned_samples().await?, 1);

        let mut stale = sample(kept.id, TargetStatus::Up, 10);
        stale.timestamp = Utc::now() - Duration::days(40);
        database.append_sample(&stale).await?;
        assert_eq!(database.prune_samples_before(Utc::now() - Duration::days(30)).await?, 1);

        assert_eq!(database.delete_history(kept.id).await?, 1);
        Ok(())
    }
}
