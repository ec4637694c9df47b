//! Lock-free health snapshot store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;

use crate::domain::backend::BackendId;
use crate::domain::registry::BackendRegistry;
use crate::health::record::HealthRecord;

/// An immutable, fully-formed view of backend health.
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    generation: u64,
    records: HashMap<BackendId, HealthRecord>,
    healthy: HashSet<BackendId>,
}

impl HealthSnapshot {
    fn build(generation: u64, records: HashMap<BackendId, HealthRecord>) -> Self {
        let healthy = records
            .values()
            .filter(|r| r.healthy)
            .map(|r| r.backend_id.clone())
            .collect();
        Self {
            generation,
            records,
            healthy,
        }
    }

    /// How many publishes preceded this snapshot. The initial one is 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record for `id`, if it was ever probed (or seeded).
    pub fn get(&self, id: &BackendId) -> Option<&HealthRecord> {
        self.records.get(id)
    }

    /// Whether `id` is known and healthy. Unknown counts as unhealthy.
    pub fn is_healthy(&self, id: &BackendId) -> bool {
        self.healthy.contains(id)
    }

    /// Ids whose record says healthy.
    pub fn healthy_ids(&self) -> &HashSet<BackendId> {
        &self.healthy
    }

    /// All records in this snapshot.
    pub fn records(&self) -> &HashMap<BackendId, HealthRecord> {
        &self.records
    }
}

/// Concurrency-safe health map with all-or-nothing publication.
///
/// Uses `ArcSwap` so readers on the request path never take a lock and never
/// wait on the prober; a publish swaps the whole snapshot in one store.
#[derive(Debug)]
pub struct HealthStore {
    current: ArcSwap<HealthSnapshot>,
}

impl Default for HealthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthStore {
    /// An empty store: every backend reads as unknown (unhealthy).
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(HealthSnapshot::default()),
        }
    }

    /// A store seeded with every registry backend assumed healthy.
    pub fn optimistic(registry: &BackendRegistry) -> Self {
        let now = Utc::now();
        let records = registry
            .all()
            .iter()
            .map(|b| (b.id.clone(), HealthRecord::assumed_healthy(b.id.clone(), now)))
            .collect();
        Self {
            current: ArcSwap::from_pointee(HealthSnapshot::build(0, records)),
        }
    }

    /// Most recently published record for `id`.
    pub fn get(&self, id: &BackendId) -> Option<HealthRecord> {
        self.current.load().get(id).cloned()
    }

    /// Atomically replace every record visible to readers.
    ///
    /// Only the prober publishes, so the generation read-then-store needs no
    /// compare-and-swap.
    pub fn publish(&self, records: HashMap<BackendId, HealthRecord>) -> Arc<HealthSnapshot> {
        let generation = self.current.load().generation + 1;
        let snapshot = Arc::new(HealthSnapshot::build(generation, records));
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Ids healthy in the current snapshot.
    pub fn healthy_ids(&self) -> HashSet<BackendId> {
        self.current.load().healthy.clone()
    }

    /// The current snapshot, held for as long as the caller needs it.
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn record(url: &str, healthy: bool) -> (BackendId, HealthRecord) {
        let id = BackendId::from(url);
        let status = if healthy { 200 } else { 500 };
        (id.clone(), HealthRecord::from_status(id, status, Utc::now()))
    }

    #[test]
    fn test_unknown_backend_is_unhealthy() {
        let store = HealthStore::new();
        let id = BackendId::from("http://a/");
        assert!(store.get(&id).is_none());
        assert!(!store.snapshot().is_healthy(&id));
        assert!(store.healthy_ids().is_empty());
    }

    #[test]
    fn test_optimistic_seed() {
        let registry = BackendRegistry::load(&[
            BackendConfig::new("http://a/", 1),
            BackendConfig::new("http://b/", 1),
        ])
        .unwrap();
        let store = HealthStore::optimistic(&registry);
        assert_eq!(store.healthy_ids().len(), 2);
        assert_eq!(store.snapshot().generation(), 0);
    }

    #[test]
    fn test_publish_replaces_everything() {
        let store = HealthStore::new();
        store.publish([record("http://a/", true), record("http://b/", false)].into());
        assert_eq!(store.healthy_ids(), HashSet::from([BackendId::from("http://a/")]));

        // A backend missing from the next snapshot is no longer known.
        let snapshot = store.publish([record("http://b/", true)].into());
        assert_eq!(snapshot.generation(), 2);
        assert!(store.get(&BackendId::from("http://a/")).is_none());
        assert_eq!(store.healthy_ids(), HashSet::from([BackendId::from("http://b/")]));
    }
}
