//! Uptime and latency aggregates over a window of history samples.

use super::models::HistorySample;
use crate::monitoring::types::TargetStatus;

/// Percentage of `up` samples. An empty window counts as fully up: missing
/// data is not downtime.
pub fn percent_up(samples: &[HistorySample]) -> f64 {
    if samples.is_empty() {
        return 100.0;
    }

    let up = samples.iter().filter(|s| s.status == TargetStatus::Up).count();
    up as f64 / samples.len() as f64 * 100.0
}

/// Mean latency of `up` samples with a measured latency, 0 when there are none
pub fn avg_latency(samples: &[HistorySample]) -> f64 {
    let (total, count) = samples
        .iter()
        .filter(|s| s.status == TargetStatus::Up && s.latency_ms > 0)
        .fold((0u64, 0u64), |(total, count), s| (total + s.latency_ms, count + 1));

    if count == 0 { 0.0 } else { total as f64 / count as f64 }
}
