//! Uptime monitoring service: per-target HTTP checks, status history and
//! throttled email/webhook alerts on status changes.

pub mod config;
pub mod database;
pub mod monitoring;
pub mod notification;
pub mod orchestrator;
pub mod pool;
pub mod registry;

pub use orchestrator::Orchestrator;
