use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::HistorySample;
use crate::monitoring::types::{ProbeOutcome, TargetStatus, TransitionEvent};
use crate::notification::{NotificationDispatcher, SubmitOutcome};
use crate::registry::TargetRegistry;

/// Result aggregator - the single consumer of the probe result stream.
///
/// Keeps the registry's live status current, forwards every outcome to the
/// history writer and turns status changes into transition events.
pub struct ResultAggregator {
    registry: TargetRegistry,
    /// Last status seen per target; only this task touches it
    previous: HashMap<Uuid, TargetStatus>,
    history_tx: mpsc::Sender<HistorySample>,
    dispatcher: NotificationDispatcher,
}

impl ResultAggregator {
    pub fn new(
        registry: TargetRegistry,
        history_tx: mpsc::Sender<HistorySample>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self { registry, previous: HashMap::new(), history_tx, dispatcher }
    }

    /// Drain the result stream until every producer is gone
    pub async fn run(mut self, mut results: mpsc::Receiver<ProbeOutcome>) {
        info!("Result aggregator started");

        while let Some(outcome) = results.recv().await {
            self.handle(outcome).await;
        }

        info!("Result stream closed, aggregator stopped");
    }

    /// Process one outcome and submit its transition, if any
    pub async fn handle(&mut self, outcome: ProbeOutcome) -> Option<SubmitOutcome> {
        match &outcome.error_message {
            Some(error) => {
                debug!(target_id = %outcome.target_id, status = %outcome.status, error = %error, "check result")
            }
            None => {
                debug!(target_id = %outcome.target_id, status = %outcome.status, latency_ms = outcome.latency_ms, "check result")
            }
        }

        let event = self.process(outcome).await?;
        info!(
            target_id = %event.target_id,
            name = %event.name,
            "status changed {} -> {}",
            event.previous,
            event.current
        );
        Some(self.dispatcher.submit(event))
    }

    /// Update the registry and history, and detect a transition
    pub async fn process(&mut self, outcome: ProbeOutcome) -> Option<TransitionEvent> {
        let target_id = outcome.target_id;

        let Some(target) = self.registry.record_outcome(&outcome).await else {
            debug!(%target_id, "discarding result for removed target");
            self.previous.remove(&target_id);
            self.dispatcher.forget(target_id);
            return None;
        };

        if self.history_tx.send(HistorySample::from(&outcome)).await.is_err() {
            warn!(%target_id, "history writer is gone, sample not persisted");
        }

        match self.previous.insert(target_id, outcome.status) {
            Some(previous) if previous != outcome.status => {
                Some(TransitionEvent::new(&target, previous, &outcome))
            }
            _ => None,
        }
    }
}
