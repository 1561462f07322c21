/// Notification module - turns status transitions into throttled alerts
///
/// - `dispatcher`: throttling, bounded queue and the delivery worker pool
/// - `message`: email and webhook rendering
/// - `senders`: SMTP and HTTP webhook transports
pub mod dispatcher;
pub mod message;
pub mod senders;
pub mod throttle;

pub use dispatcher::{DispatcherSettings, NotificationDispatcher, Sinks, SubmitOutcome};
pub use senders::{EmailSink, HttpWebhook, SenderError, SmtpMailer, SmtpSettings, WebhookSink};
