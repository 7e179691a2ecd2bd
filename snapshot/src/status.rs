use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::{SnapshotOrigin, SnapshotRegistry, SnapshotState};

/// One row per loaded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotStatus {
    pub object_name: String,
    pub timestamp: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub scid_count: usize,
    pub memory_bytes: usize,
    pub load_time_ms: f64,
    pub age_secs: f64,
    pub loaded_generation: u64,
    /// True when the registry changed after this entry was loaded.
    pub superseded: bool,
}

impl SnapshotStatus {
    pub fn describe(state: &SnapshotState, current_generation: u64) -> Self {
        let graph = &state.graph;
        Self {
            object_name: state.object_name.clone(),
            timestamp: state.timestamp,
            origin: state.origin,
            vertex_count: graph.vertex_count(),
            edge_count: graph.edge_count(),
            scid_count: graph.scid_count(),
            memory_bytes: graph.memory_usage(),
            load_time_ms: state.load_time_ms,
            age_secs: state.loaded_at.elapsed().as_secs_f64(),
            loaded_generation: state.loaded_generation,
            superseded: state.loaded_generation < current_generation,
        }
    }
}

pub fn collect_status(registry: &SnapshotRegistry) -> Vec<SnapshotStatus> {
    let current = registry.generation();
    registry
        .list()
        .iter()
        .map(|state| SnapshotStatus::describe(state, current))
        .collect()
}
