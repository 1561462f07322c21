//! Throttled, lossy dispatch of transition notifications.
//!
//! `submit` never blocks: events inside a target's cool-down window are
//! throttled and events arriving while the queue is full are dropped. A single
//! consumer task drains the queue and hands each sink delivery to a fixed-size
//! worker pool, so a slow sink can neither stall the aggregator nor the other
//! sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::message::{EmailMessage, WebhookMessage};
use super::senders::{EmailSink, SenderError, WebhookSink};
use super::throttle::{DEFAULT_THROTTLE_WINDOW, Throttle};
use crate::monitoring::types::TransitionEvent;

/// One slot per sink, so a hung mailer cannot hold back the same event's webhook
pub const MIN_DELIVERY_WORKERS: usize = 2;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub throttle_window: Duration,
    pub queue_capacity: usize,
    pub delivery_timeout: Duration,
    /// Raised to [`MIN_DELIVERY_WORKERS`] when lower
    pub delivery_workers: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            queue_capacity: 100,
            delivery_timeout: Duration::from_secs(30),
            delivery_workers: 4,
        }
    }
}

/// Delivery channels available to the dispatcher
#[derive(Clone)]
pub struct Sinks {
    /// `None` when outbound mail is not configured
    pub email: Option<Arc<dyn EmailSink>>,
    pub from_address: String,
    pub webhook: Arc<dyn WebhookSink>,
}

/// What happened to a submitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    Throttled,
    Dropped,
}

/// Producer side of the dispatcher. Owns the throttle table.
pub struct NotificationDispatcher {
    queue: mpsc::Sender<TransitionEvent>,
    throttle: Throttle,
}

impl NotificationDispatcher {
    /// Create the dispatcher and spawn its consumer task. The task ends once
    /// the dispatcher is dropped and every queued event has been handled.
    pub fn spawn(settings: DispatcherSettings, sinks: Sinks) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let handle = tokio::spawn(run_delivery_loop(rx, sinks, settings.clone()));

        (Self { queue, throttle: Throttle::new(settings.throttle_window) }, handle)
    }

    /// Queue a notification for delivery without blocking
    pub fn submit(&mut self, event: TransitionEvent) -> SubmitOutcome {
        self.submit_at(event, Instant::now())
    }

    pub(crate) fn submit_at(&mut self, event: TransitionEvent, now: Instant) -> SubmitOutcome {
        let target_id = event.target_id;

        if self.throttle.is_throttled(target_id, now) {
            debug!(%target_id, status = %event.current, "notification throttled");
            return SubmitOutcome::Throttled;
        }

        match self.queue.try_send(event) {
            Ok(()) => {
                self.throttle.record(target_id, now);
                SubmitOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%target_id, "notification queue is full, dropping event");
                SubmitOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(%target_id, "notification queue is closed, dropping event");
                SubmitOutcome::Dropped
            }
        }
    }

    /// Clear the cool-down of a removed target
    pub fn forget(&mut self, target_id: Uuid) {
        self.throttle.forget(target_id);
    }
}

async fn run_delivery_loop(
    mut rx: mpsc::Receiver<TransitionEvent>,
    sinks: Sinks,
    settings: DispatcherSettings,
) {
    let workers = Arc::new(Semaphore::new(settings.delivery_workers.max(MIN_DELIVERY_WORKERS)));
    let mut in_flight = JoinSet::new();

    while let Some(event) = rx.recv().await {
        // Reap finished deliveries so the set does not grow unbounded.
        while in_flight.try_join_next().is_some() {}

        let target_id = event.target_id;

        if !event.emails.is_empty() {
            match &sinks.email {
                Some(mailer) => {
                    let message = EmailMessage::for_event(&event, &sinks.from_address);
                    let mailer = mailer.clone();
                    let Ok(permit) = workers.clone().acquire_owned().await else { break };
                    let limit = settings.delivery_timeout;
                    in_flight.spawn(async move {
                        let result = bounded(limit, mailer.send_email(&message)).await;
                        report("email", target_id, result);
                        drop(permit);
                    });
                }
                None => warn!(%target_id, "SMTP not configured, skipping email notification"),
            }
        }

        if let Some(url) = event.webhook_url.clone().filter(|url| !url.is_empty()) {
            let message = WebhookMessage::for_event(&event);
            let webhook = sinks.webhook.clone();
            let Ok(permit) = workers.clone().acquire_owned().await else { break };
            let limit = settings.delivery_timeout;
            in_flight.spawn(async move {
                let result = bounded(limit, webhook.post_webhook(&url, &message)).await;
                report("webhook", target_id, result);
                drop(permit);
            });
        }
    }

    while in_flight.join_next().await.is_some() {}
    info!("notification dispatcher stopped");
}

async fn bounded<F>(limit: Duration, delivery: F) -> Result<(), SenderError>
where
    F: Future<Output = Result<(), SenderError>>,
{
    timeout(limit, delivery).await.unwrap_or(Err(SenderError::Timeout(limit.as_secs())))
}

fn report(channel: &str, target_id: Uuid, result: Result<(), SenderError>) {
    match result {
        Ok(()) => info!(%target_id, channel, "notification sent"),
        Err(e) => error!(%target_id, channel, "Error sending notification: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::TargetStatus;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSink for RecordingMailer {
        async fn send_email(&self, message: &EmailMessage) -> Result<(), SenderError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWebhook {
        posted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebhookSink for RecordingWebhook {
        async fn post_webhook(&self, url: &str, _message: &WebhookMessage) -> Result<(), SenderError> {
            self.posted.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    /// Fails every call after a long pause
    struct StuckWebhook;

    #[async_trait]
    impl WebhookSink for StuckWebhook {
        async fn post_webhook(&self, _url: &str, _message: &WebhookMessage) -> Result<(), SenderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(SenderError::SendFailed("unreachable".into()))
        }
    }

    fn event(target_id: Uuid, current: TargetStatus) -> TransitionEvent {
        TransitionEvent {
            target_id,
            name: "Example".into(),
            url: "https://example.com".into(),
            previous: if current == TargetStatus::Up { TargetStatus::Down } else { TargetStatus::Up },
            current,
            latency_ms: 12,
            timestamp: Utc::now(),
            emails: vec!["ops@example.com".into()],
            webhook_url: Some("https://hooks.example.com/T000".into()),
        }
    }

    fn sinks(mailer: &Arc<RecordingMailer>, webhook: Arc<dyn WebhookSink>) -> Sinks {
        Sinks { email: Some(mailer.clone()), from_address: "uppe@example.com".into(), webhook }
    }

    #[tokio::test]
    async fn test_events_within_window_deliver_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let webhook = Arc::new(RecordingWebhook::default());
        let (mut dispatcher, handle) =
            NotificationDispatcher::spawn(DispatcherSettings::default(), sinks(&mailer, webhook.clone()));

        let target = Uuid::new_v4();
        let start = Instant::now();
        assert_eq!(dispatcher.submit_at(event(target, TargetStatus::Down), start), SubmitOutcome::Queued);
        assert_eq!(
            dispatcher.submit_at(event(target, TargetStatus::Up), start + Duration::from_secs(70)),
            SubmitOutcome::Throttled
        );

        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        assert_eq!(webhook.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_events_outside_window_both_deliver() {
        let mailer = Arc::new(RecordingMailer::default());
        let webhook = Arc::new(RecordingWebhook::default());
        let (mut dispatcher, handle) =
            NotificationDispatcher::spawn(DispatcherSettings::default(), sinks(&mailer, webhook.clone()));

        let target = Uuid::new_v4();
        let start = Instant::now();
        assert_eq!(dispatcher.submit_at(event(target, TargetStatus::Down), start), SubmitOutcome::Queued);
        assert_eq!(
            dispatcher.submit_at(event(target, TargetStatus::Up), start + Duration::from_secs(301)),
            SubmitOutcome::Queued
        );

        drop(dispatcher);
        handle.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Website Example is UP");
        assert_eq!(webhook.posted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_throttled_event_does_not_extend_window() {
        let mailer = Arc::new(RecordingMailer::default());
        let (mut dispatcher, handle) = NotificationDispatcher::spawn(
            DispatcherSettings::default(),
            sinks(&mailer, Arc::new(RecordingWebhook::default())),
        );

        let target = Uuid::new_v4();
        let start = Instant::now();
        dispatcher.submit_at(event(target, TargetStatus::Down), start);
        dispatcher.submit_at(event(target, TargetStatus::Up), start + Duration::from_secs(240));
        let outcome = dispatcher.submit_at(event(target, TargetStatus::Down), start + Duration::from_secs(310));
        assert_eq!(outcome, SubmitOutcome::Queued);

        drop(dispatcher);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_recording() {
        let settings = DispatcherSettings { queue_capacity: 1, delivery_workers: 1, ..Default::default() };
        let mailer = Arc::new(RecordingMailer::default());
        let (mut dispatcher, handle) = NotificationDispatcher::spawn(settings, sinks(&mailer, Arc::new(StuckWebhook)));

        // Fill the workers and the queue, then overflow.
        let now = Instant::now();
        let mut outcomes = Vec::new();
        for _ in 0..8 {
            outcomes.push(dispatcher.submit_at(event(Uuid::new_v4(), TargetStatus::Down), now));
            tokio::task::yield_now().await;
        }
        assert!(outcomes.contains(&SubmitOutcome::Dropped));

        // The consumer is parked on the stuck worker and the queue stays full.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let dropped_target = Uuid::new_v4();
        assert_eq!(
            dispatcher.submit_at(event(dropped_target, TargetStatus::Down), now),
            SubmitOutcome::Dropped
        );
        assert!(!dispatcher.throttle.is_throttled(dropped_target, now));

        handle.abort();
    }

    #[tokio::test]
    async fn test_missing_mailer_still_posts_webhook() {
        let webhook = Arc::new(RecordingWebhook::default());
        let sinks = Sinks { email: None, from_address: String::new(), webhook: webhook.clone() };
        let (mut dispatcher, handle) = NotificationDispatcher::spawn(DispatcherSettings::default(), sinks);

        dispatcher.submit(event(Uuid::new_v4(), TargetStatus::Down));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(webhook.posted.lock().unwrap().as_slice(), ["https://hooks.example.com/T000"]);
    }

    #[tokio::test]
    async fn test_slow_sink_times_out_and_other_sink_delivers() {
        let settings = DispatcherSettings { delivery_timeout: Duration::from_millis(50), ..Default::default() };
        let mailer = Arc::new(RecordingMailer::default());
        let (mut dispatcher, handle) = NotificationDispatcher::spawn(settings, sinks(&mailer, Arc::new(StuckWebhook)));

        dispatcher.submit(event(Uuid::new_v4(), TargetStatus::Down));
        drop(dispatcher);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("delivery timeout not enforced")
            .unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    /// Never answers within the test's lifetime
    struct HungMailer;

    #[async_trait]
    impl EmailSink for HungMailer {
        async fn send_email(&self, _message: &EmailMessage) -> Result<(), SenderError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_single_worker_setting_keeps_sinks_independent() {
        let settings = DispatcherSettings {
            delivery_workers: 1,
            delivery_timeout: Duration::from_secs(3600),
            ..Default::default()
        };
        let webhook = Arc::new(RecordingWebhook::default());
        let sinks = Sinks {
            email: Some(Arc::new(HungMailer)),
            from_address: "uppe@example.com".into(),
            webhook: webhook.clone(),
        };
        let (mut dispatcher, handle) = NotificationDispatcher::spawn(settings, sinks);

        dispatcher.submit(event(Uuid::new_v4(), TargetStatus::Down));

        let delivered = tokio::time::timeout(Duration::from_secs(2), async {
            while webhook.posted.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(delivered.is_ok(), "webhook waited on the hung mailer");

        handle.abort();
    }
}
