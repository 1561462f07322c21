/// Monitoring module - probes targets on their own cadence
///
/// This module is responsible for:
/// - Executing HTTP/HTTPS checks
/// - Running one check loop per enabled target
/// - Validating target definitions
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use executor::MonitoringExecutor;
pub use scheduler::MonitoringScheduler;
pub use types::{ProbeOutcome, TargetStatus, TransitionEvent};
