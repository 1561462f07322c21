/// Orchestrator module - coordinates all components
///
/// The orchestrator owns the target registry and wires the pipeline:
/// per-target check loops feed one result stream, the aggregator consumes it,
/// forwards samples to the history writer and transitions to the
/// notification dispatcher.
///
/// Start and stop are idempotent. Stopping drains the pipeline in order:
/// check loops, result stream, aggregator, history writer, dispatcher.
pub mod aggregator;
pub mod history;
pub mod retention;


pub use aggregator::ResultAggregator;
pub use retention::{CleanupReport, RetentionCleanup, RetentionPolicy};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::database::models::{HistorySample, Target, TargetUpdate};
use crate::monitoring::{MonitoringExecutor, MonitoringScheduler};
use crate::notification::{DispatcherSettings, NotificationDispatcher, Sinks};
use crate::registry::{RegistryError, TargetRegistry};

/// Runtime settings of the pipeline
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Capacity of the probe result stream
    pub result_buffer: usize,
    /// Capacity of the history writer queue
    pub history_buffer: usize,
    pub dispatcher: DispatcherSettings,
    pub retention: RetentionPolicy,
    pub cleanup_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            result_buffer: 1000,
            history_buffer: 1000,
            dispatcher: DispatcherSettings::default(),
            retention: RetentionPolicy::default(),
            cleanup_interval: retention::DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Tasks of a running pipeline
struct Running {
    scheduler: MonitoringScheduler,
    aggregator: JoinHandle<()>,
    history_writer: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    retention: JoinHandle<()>,
}

/// Main orchestrator for the uptime monitor
pub struct Orchestrator {
    registry: TargetRegistry,
    database: Arc<dyn Database>,
    executor: Arc<MonitoringExecutor>,
    sinks: Sinks,
    settings: EngineSettings,
    running: Mutex<Option<Running>>,
    /// Held from snapshot to commit so an older snapshot never overwrites a newer one
    persist_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        database: Arc<dyn Database>,
        executor: Arc<MonitoringExecutor>,
        sinks: Sinks,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry: TargetRegistry::new(),
            database,
            executor,
            sinks,
            settings,
            running: Mutex::new(None),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Load stored targets into the registry. Targets that fail validation
    /// are skipped and reported. Returns the number loaded.
    pub async fn load_from_database(&self) -> Result<usize> {
        let targets = self.database.load_targets().await?;
        let mut loaded = 0;

        for target in targets {
            let (id, name) = (target.id, target.name.clone());
            match self.registry.insert(target).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!(target_id = %id, %name, "Skipping stored target: {}", e),
            }
        }

        info!("Loaded {} targets from database", loaded);
        Ok(loaded)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start monitoring every enabled target. No-op when already running.
    pub async fn start(&self) {
        let mut state = self.running.lock().await;
        if state.is_some() {
            debug!("orchestrator already running");
            return;
        }

        info!("Starting uptime monitor...");

        let (result_tx, result_rx) = mpsc::channel(self.settings.result_buffer.max(1));
        let (history_tx, history_writer) =
            history::spawn_history_writer(self.database.clone(), self.settings.history_buffer);
        let (dispatcher, dispatcher_handle) =
            NotificationDispatcher::spawn(self.settings.dispatcher.clone(), self.sinks.clone());

        let aggregator = ResultAggregator::new(self.registry.clone(), history_tx, dispatcher);
        let aggregator = tokio::spawn(aggregator.run(result_rx));

        let scheduler = MonitoringScheduler::new(self.executor.clone(), self.registry.clone(), result_tx);
        let enabled: Vec<Uuid> = self
            .registry
            .list()
            .await
            .into_iter()
            .filter(|t| t.enabled)
            .map(|t| t.id)
            .collect();
        info!("Scheduling {} enabled targets", enabled.len());
        scheduler.schedule_all(enabled).await;

        let retention = RetentionCleanup::new(self.database.clone(), self.settings.retention.clone())
            .start_periodic_cleanup(self.settings.cleanup_interval);

        *state = Some(Running {
            scheduler,
            aggregator,
            history_writer,
            dispatcher: dispatcher_handle,
            retention,
        });

        info!("Uptime monitor started");
    }

    /// Stop all loops and drain the pipeline. No-op when not running.
    pub async fn stop(&self) {
        let mut state = self.running.lock().await;
        let Some(running) = state.take() else {
            debug!("orchestrator not running");
            return;
        };

        info!("Stopping uptime monitor...");
        let Running { scheduler, aggregator, history_writer, dispatcher, retention } = running;

        retention.abort();
        scheduler.shutdown().await;
        // Last result sender goes with the scheduler; the stream closes once
        // the aggregator has drained it.
        drop(scheduler);

        for (task, handle) in [
            ("aggregator", aggregator),
            ("history writer", history_writer),
            ("notification dispatcher", dispatcher),
        ] {
            if let Err(e) = handle.await {
                error!("{} task failed: {}", task, e);
            }
        }

        self.persist().await;
        info!("Uptime monitor stopped");
    }

    /// Add a target; its loop starts right away when running and enabled
    pub async fn register(&self, target: Target) -> Result<Target, RegistryError> {
        let target = self.registry.insert(target).await?;
        info!(target_id = %target.id, name = %target.name, url = %target.url, "target registered");

        if let Some(running) = self.running.lock().await.as_ref() {
            running.scheduler.schedule(target.id).await;
        }
        self.persist().await;
        Ok(target)
    }

    /// Remove a target together with its history
    pub async fn deregister(&self, target_id: Uuid) -> Result<Target, RegistryError> {
        let target = self.registry.remove(target_id).await?;

        if let Some(running) = self.running.lock().await.as_ref() {
            running.scheduler.unschedule(target_id).await;
        }
        self.persist().await;

        if let Err(e) = self.database.delete_history(target_id).await {
            warn!(%target_id, "Failed to delete history of removed target: {:#}", e);
        }

        info!(%target_id, name = %target.name, "target removed");
        Ok(target)
    }

    /// Enable or disable checks for a target
    pub async fn set_enabled(&self, target_id: Uuid, enabled: bool) -> Result<Target, RegistryError> {
        let Some(target) = self.registry.set_enabled(target_id, enabled).await? else {
            return self.registry.get(target_id).await.ok_or(RegistryError::NotFound(target_id));
        };

        if let Some(running) = self.running.lock().await.as_ref() {
            if enabled {
                running.scheduler.schedule(target_id).await;
            } else {
                running.scheduler.unschedule(target_id).await;
            }
        }
        self.persist().await;

        info!(%target_id, enabled, "target toggled");
        Ok(target)
    }

    /// Change a target's configuration. URL or interval changes restart its loop.
    pub async fn update_config(&self, target_id: Uuid, update: TargetUpdate) -> Result<Target, RegistryError> {
        let updated = self.registry.update(target_id, update).await?;

        if updated.reschedule && updated.target.enabled {
            if let Some(running) = self.running.lock().await.as_ref() {
                running.scheduler.reschedule(target_id).await;
            }
        }
        self.persist().await;

        info!(%target_id, reschedule = updated.reschedule, "target updated");
        Ok(updated.target)
    }

    /// Snapshot of all targets, sorted by name
    pub async fn targets(&self) -> Vec<Target> {
        self.registry.list().await
    }

    pub async fn history(&self, target_id: Uuid, window_hours: u32) -> Result<Vec<HistorySample>> {
        self.database.recent_samples(target_id, window_hours).await
    }

    pub async fn percent_up(&self, target_id: Uuid, window_hours: u32) -> Result<f64> {
        self.database.percent_up(target_id, window_hours).await
    }

    pub async fn avg_latency(&self, target_id: Uuid, window_hours: u32) -> Result<f64> {
        self.database.avg_latency(target_id, window_hours).await
    }

    /// Write the current target set to storage; failures are logged
    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let targets = self.registry.list().await;
        if let Err(e) = self.database.save_targets(&targets).await {
            error!("Failed to persist targets: {:#}", e);
        }
    }
}
