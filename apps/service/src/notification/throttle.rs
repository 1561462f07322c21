use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Cool-down window shared by every target
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Last-notified table. Owned by a single task, so no locking.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last_notified: HashMap<Uuid, Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_WINDOW)
    }
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, last_notified: HashMap::new() }
    }

    /// True while the target is inside its cool-down window
    pub fn is_throttled(&self, target_id: Uuid, now: Instant) -> bool {
        self.last_notified
            .get(&target_id)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
    }

    /// Start a new window; only called once a notification was accepted
    pub fn record(&mut self, target_id: Uuid, now: Instant) {
        self.last_notified.insert(target_id, now);
    }

    pub fn forget(&mut self, target_id: Uuid) {
        self.last_notified.remove(&target_id);
    }
}
