//! Concurrent-safe registry of monitored targets.
//!
//! All access goes through atomic operations on a single internal lock;
//! callers only ever receive clones of the records.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{Target, TargetUpdate, coerce_interval};
use crate::monitoring::types::ProbeOutcome;
use crate::monitoring::validation::validate_target;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Target {0} is already registered")]
    Duplicate(Uuid),

    #[error("Target {0} not found")]
    NotFound(Uuid),

    #[error("Invalid target: {0}")]
    Invalid(String),
}

/// Result of a configuration change
#[derive(Debug, Clone)]
pub struct Updated {
    pub target: Target,
    /// URL or interval changed, so a running loop must restart
    pub reschedule: bool,
}

#[derive(Clone, Default)]
pub struct TargetRegistry {
    targets: Arc<RwLock<HashMap<Uuid, Target>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new target after coercing its interval and validating it
    pub async fn insert(&self, mut target: Target) -> Result<Target, RegistryError> {
        target.interval_seconds = coerce_interval(target.interval_seconds);
        validate_target(&target).map_err(|e| RegistryError::Invalid(e.to_string()))?;

        let mut targets = self.targets.write().await;
        if targets.contains_key(&target.id) {
            return Err(RegistryError::Duplicate(target.id));
        }
        targets.insert(target.id, target.clone());
        Ok(target)
    }

    pub async fn remove(&self, id: Uuid) -> Result<Target, RegistryError> {
        self.targets.write().await.remove(&id).ok_or(RegistryError::NotFound(id))
    }

    pub async fn get(&self, id: Uuid) -> Option<Target> {
        self.targets.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.targets.read().await.contains_key(&id)
    }

    /// Registered and enabled
    pub async fn is_active(&self, id: Uuid) -> bool {
        self.targets.read().await.get(&id).is_some_and(|t| t.enabled)
    }

    /// Snapshot of every target, ordered by name for stable listings
    pub async fn list(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self.targets.read().await.values().cloned().collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        targets
    }

    pub async fn len(&self) -> usize {
        self.targets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.read().await.is_empty()
    }

    /// Returns the updated target, or `None` if the flag did not change
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Option<Target>, RegistryError> {
        let mut targets = self.targets.write().await;
        let target = targets.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if target.enabled == enabled {
            return Ok(None);
        }
        target.enabled = enabled;
        target.updated_at = chrono::Utc::now();
        Ok(Some(target.clone()))
    }

    /// Apply a partial update. The change is validated on a copy first, so an
    /// invalid update leaves the stored record untouched.
    pub async fn update(&self, id: Uuid, update: TargetUpdate) -> Result<Updated, RegistryError> {
        let mut targets = self.targets.write().await;
        let current = targets.get_mut(&id).ok_or(RegistryError::NotFound(id))?;

        let mut candidate = current.clone();
        let reschedule = candidate.apply(update);
        validate_target(&candidate).map_err(|e| RegistryError::Invalid(e.to_string()))?;

        *current = candidate.clone();
        Ok(Updated { target: candidate, reschedule })
    }

    /// Store the outcome on the live record. `None` when the target is gone.
    pub async fn record_outcome(&self, outcome: &ProbeOutcome) -> Option<Target> {
        let mut targets = self.targets.write().await;
        let target = targets.get_mut(&outcome.target_id)?;
        target.observe(outcome);
        Some(target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::TargetStatus;

    #[tokio::test]
    async fn test_insert_coerces_interval_and_rejects_duplicates() {
        let registry = TargetRegistry::new();
        let target = Target::new("Example", "https://example.com").with_interval(5);

        let stored = registry.insert(target.clone()).await.unwrap();
        assert_eq!(stored.interval_seconds, 60);

        assert!(matches!(registry.insert(target).await, Err(RegistryError::Duplicate(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_target() {
        let registry = TargetRegistry::new();
        let result = registry.insert(Target::new("Broken", "gopher://example.com")).await;
        assert!(matches!(result, Err(RegistryError::Invalid(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_enabled_reports_changes_only() {
        let registry = TargetRegistry::new();
        let target = registry.insert(Target::new("Example", "https://example.com")).await.unwrap();

        assert!(registry.set_enabled(target.id, true).await.unwrap().is_none());
        assert!(registry.set_enabled(target.id, false).await.unwrap().is_some());
        assert!(!registry.is_active(target.id).await);
        assert!(registry.contains(target.id).await);

        let missing = registry.set_enabled(Uuid::new_v4(), true).await;
        assert!(matches!(missing, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_record_untouched() {
        let registry = TargetRegistry::new();
        let target = registry.insert(Target::new("Example", "https://example.com")).await.unwrap();

        let update = TargetUpdate { url: Some("nope".into()), ..Default::default() };
        assert!(registry.update(target.id, update).await.is_err());
        assert_eq!(registry.get(target.id).await.unwrap().url, "https://example.com");

        let update = TargetUpdate { interval_seconds: Some(300), ..Default::default() };
        let updated = registry.update(target.id, update).await.unwrap();
        assert!(updated.reschedule);
        assert_eq!(updated.target.interval_seconds, 300);
    }

    #[tokio::test]
    async fn test_record_outcome() {
        let registry = TargetRegistry::new();
        let target = registry.insert(Target::new("Example", "https://example.com")).await.unwrap();

        let outcome = ProbeOutcome::new(target.id).success(55, Some(200));
        let updated = registry.record_outcome(&outcome).await.unwrap();
        assert_eq!(updated.status, TargetStatus::Up);
        assert_eq!(updated.last_latency_ms, 55);
        assert_eq!(updated.last_checked_at, Some(outcome.timestamp));

        registry.remove(target.id).await.unwrap();
        assert!(registry.record_outcome(&outcome).await.is_none());
    }
}
