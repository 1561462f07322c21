use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::executor::MonitoringExecutor;
use super::types::ProbeOutcome;
use crate::registry::TargetRegistry;

/// A running check loop
struct LoopSlot {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

/// Monitoring scheduler - one independent check loop per enabled target
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    registry: TargetRegistry,
    result_tx: mpsc::Sender<ProbeOutcome>,
    loops: Mutex<HashMap<Uuid, LoopSlot>>,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        registry: TargetRegistry,
        result_tx: mpsc::Sender<ProbeOutcome>,
    ) -> Self {
        Self { executor, registry, result_tx, loops: Mutex::new(HashMap::new()) }
    }

    /// Start the check loop for a target. No-op when the target is disabled,
    /// unknown, or already has a live loop.
    pub async fn schedule(&self, target_id: Uuid) {
        let Some(target) = self.registry.get(target_id).await else {
            debug!(%target_id, "not scheduling unknown target");
            return;
        };
        if !target.enabled {
            debug!(%target_id, "not scheduling disabled target");
            return;
        }

        let mut loops = self.loops.lock().await;
        if loops.get(&target_id).is_some_and(|slot| !slot.handle.is_finished()) {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_check_loop(
            target_id,
            Duration::from_secs(target.interval_seconds),
            self.executor.clone(),
            self.registry.clone(),
            self.result_tx.clone(),
            stop_rx,
        ));

        loops.insert(target_id, LoopSlot { handle, stop_tx });
        info!(%target_id, name = %target.name, interval = target.interval_seconds, "check loop scheduled");
    }

    /// Schedule multiple targets
    pub async fn schedule_all(&self, target_ids: impl IntoIterator<Item = Uuid>) {
        for target_id in target_ids {
            self.schedule(target_id).await;
        }
    }

    /// Signal a target's loop to stop. Does not wait for it: the loop exits at
    /// its next observation point without emitting anything further.
    pub async fn unschedule(&self, target_id: Uuid) -> bool {
        match self.loops.lock().await.remove(&target_id) {
            Some(slot) => {
                let _ = slot.stop_tx.send(true);
                debug!(%target_id, "check loop signalled to stop");
                true
            }
            None => false,
        }
    }

    /// Stop and start a target's loop so URL or interval changes take effect
    pub async fn reschedule(&self, target_id: Uuid) {
        let slot = self.loops.lock().await.remove(&target_id);
        if let Some(slot) = slot {
            let _ = slot.stop_tx.send(true);
            let _ = slot.handle.await;
        }
        self.schedule(target_id).await;
    }

    /// Targets with a live loop
    pub async fn active_loops(&self) -> Vec<Uuid> {
        self.loops
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| !slot.handle.is_finished())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Stop every loop and wait until all of them have exited
    pub async fn shutdown(&self) {
        let slots: Vec<(Uuid, LoopSlot)> = self.loops.lock().await.drain().collect();
        let count = slots.len();

        let handles = slots.into_iter().map(|(target_id, slot)| {
            let _ = slot.stop_tx.send(true);
            async move {
                if let Err(e) = slot.handle.await {
                    error!(%target_id, "check loop ended abnormally: {}", e);
                }
            }
        });
        futures::future::join_all(handles).await;

        info!(count, "all check loops stopped");
    }
}

/// The check loop for a single target. The first check fires immediately.
async fn run_check_loop(
    target_id: Uuid,
    period: Duration,
    executor: Arc<MonitoringExecutor>,
    registry: TargetRegistry,
    result_tx: mpsc::Sender<ProbeOutcome>,
    mut stop: watch::Receiver<bool>,
) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = stop.changed() => break,
        }

        // Re-read on every tick: URL edits apply, removal or disable ends the loop.
        let Some(target) = registry.get(target_id).await.filter(|t| t.enabled) else {
            debug!(%target_id, "target removed or disabled, check loop exiting");
            break;
        };

        let outcome = tokio::select! {
            outcome = executor.execute_check(target_id, &target.url) => outcome,
            _ = stop.changed() => break,
        };

        let stopped = *stop.borrow();
        if stopped || !registry.is_active(target_id).await {
            break;
        }

        // Waits for capacity when the aggregator falls behind.
        if let Err(e) = result_tx.send(outcome).await {
            error!(%target_id, "Failed to send check result: {}", e);
            break;
        }
    }

    debug!(%target_id, "check loop stopped");
}
