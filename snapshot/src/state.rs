use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use lngraph_core::Graph;
use parking_lot::RwLock;
use serde::Serialize;

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Decoded from the object store.
    Cache,
    /// Rebuilt from gossip records.
    Constructed,
}

/// A loaded, immutable snapshot and how it got here.
#[derive(Debug)]
pub struct SnapshotState {
    pub graph: Arc<Graph>,
    pub object_name: String,
    pub timestamp: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub load_time_ms: f64,
    pub loaded_at: Instant,
    /// Registry generation when this entry was inserted.
    pub loaded_generation: u64,
}

/// Loaded snapshots keyed by timestamp.
///
/// Each insert or invalidation bumps the generation counter, so a caller can
/// tell whether the set changed between two status reads.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    entries: RwLock<BTreeMap<DateTime<Utc>, Arc<SnapshotState>>>,
    generation: AtomicU64,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<Arc<SnapshotState>> {
        self.entries.read().get(&timestamp).cloned()
    }

    /// Insert `state`, replacing any entry at the same timestamp.
    pub fn insert(&self, mut state: SnapshotState) -> Arc<SnapshotState> {
        let mut entries = self.entries.write();
        state.loaded_generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let state = Arc::new(state);
        entries.insert(state.timestamp, Arc::clone(&state));
        state
    }

    /// Drop the entry at `timestamp`. Returns false if nothing was loaded there.
    pub fn remove(&self, timestamp: DateTime<Utc>) -> bool {
        let removed = self.entries.write().remove(&timestamp).is_some();
        if removed {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        if !entries.is_empty() {
            entries.clear();
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Loaded entries in timestamp order.
    pub fn list(&self) -> Vec<Arc<SnapshotState>> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state(day: u32) -> SnapshotState {
        SnapshotState {
            graph: Arc::new(Graph::new()),
            object_name: format!("ln-{day}.bin"),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            origin: SnapshotOrigin::Constructed,
            load_time_ms: 0.0,
            loaded_at: Instant::now(),
            loaded_generation: 0,
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = SnapshotRegistry::new();
        let inserted = registry.insert(state(2));
        assert_eq!(inserted.loaded_generation, 1);
        assert!(registry.get(inserted.timestamp).is_some());

        assert!(registry.remove(inserted.timestamp));
        assert!(!registry.remove(inserted.timestamp));
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn test_list_in_timestamp_order() {
        let registry = SnapshotRegistry::new();
        registry.insert(state(5));
        registry.insert(state(1));
        registry.insert(state(3));
        let names: Vec<_> = registry.list().iter().map(|s| s.object_name.clone()).collect();
        assert_eq!(names, ["ln-1.bin", "ln-3.bin", "ln-5.bin"]);

        registry.clear();
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.generation(), 4);
    }
}
