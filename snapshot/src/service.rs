use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use lngraph_core::{
    analyze_bridges, compare_methods, deserialize_topology, empirical_betweenness,
    exact_betweenness, network_metrics, serialize_topology, BridgeAnalysis, CentralityComparison,
    CentralityMetrics, CostModel, Graph, NetworkMetrics,
};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::cache::{object_name, ObjectStore};
use crate::config::SnapshotConfig;
use crate::construct::construct_window;
use crate::error::Result;
use crate::source::GossipSource;
use crate::state::{SnapshotOrigin, SnapshotRegistry, SnapshotState};
use crate::status::{collect_status, SnapshotStatus};

/// Point-in-time network snapshots, loaded from cache or rebuilt from gossip.
///
/// A snapshot is resolved at most once per timestamp and kept in memory until
/// invalidated. Concurrent callers asking for an unloaded timestamp wait for
/// the first one to finish instead of building it twice.
pub struct SnapshotService<S, O> {
    config: SnapshotConfig,
    source: S,
    store: O,
    registry: SnapshotRegistry,
    build_lock: Mutex<()>,
}

impl<S: GossipSource, O: ObjectStore> SnapshotService<S, O> {
    pub fn new(config: SnapshotConfig, source: S, store: O) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            store,
            registry: SnapshotRegistry::new(),
            build_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    /// Routing cost at the configured payment size.
    pub fn cost_model(&self) -> CostModel {
        CostModel::Fee {
            payment_size_sat: self.config.payment_size_sat,
        }
    }

    pub fn object_name(&self, timestamp: DateTime<Utc>) -> String {
        object_name(&self.config.graph_name, timestamp)
    }

    pub fn graph_at(&self, timestamp: DateTime<Utc>) -> Result<Arc<Graph>> {
        Ok(Arc::clone(&self.snapshot_at(timestamp)?.graph))
    }

    /// Loaded snapshot for `timestamp`: memoized entry, else the cached
    /// object, else a fresh construction that is then exported.
    pub fn snapshot_at(&self, timestamp: DateTime<Utc>) -> Result<Arc<SnapshotState>> {
        if let Some(state) = self.registry.get(timestamp) {
            return Ok(state);
        }
        let _guard = self.build_lock.lock();
        if let Some(state) = self.registry.get(timestamp) {
            return Ok(state);
        }

        let started = Instant::now();
        let object = self.object_name(timestamp);
        let imported = match self.import(timestamp) {
            Ok(graph) => graph,
            Err(e) if e.is_corrupt_snapshot() => {
                warn!(object = %object, error = %e, "snapshot.import.corrupt");
                None
            }
            Err(e) => return Err(e),
        };

        let (graph, origin) = match imported {
            Some(graph) => (graph, SnapshotOrigin::Cache),
            None => {
                let (graph, _) = construct_window(&self.source, timestamp, &self.config)?;
                self.export(timestamp, &graph)?;
                (graph, SnapshotOrigin::Constructed)
            }
        };

        let state = self.registry.insert(SnapshotState {
            graph: Arc::new(graph),
            object_name: object,
            timestamp,
            origin,
            load_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            loaded_at: Instant::now(),
            loaded_generation: 0,
        });
        info!(
            object = %state.object_name,
            origin = ?state.origin,
            vertices = state.graph.vertex_count(),
            edges = state.graph.edge_count(),
            load_time_ms = state.load_time_ms,
            "snapshot.loaded"
        );
        Ok(state)
    }

    /// Decode the cached snapshot for `timestamp`.
    ///
    /// `Ok(None)` when no object exists or it decodes to an empty graph.
    pub fn import(&self, timestamp: DateTime<Utc>) -> Result<Option<Graph>> {
        let object = self.object_name(timestamp);
        if !self.store.exists(&self.config.bucket, &object)? {
            info!(object = %object, "snapshot.import.miss");
            return Ok(None);
        }
        let Some(bytes) = self.store.get(&self.config.bucket, &object)? else {
            info!(object = %object, "snapshot.import.miss");
            return Ok(None);
        };
        let (graph, meta) = deserialize_topology(&bytes)?;
        if graph.is_empty() {
            info!(object = %object, "snapshot.import.empty");
            return Ok(None);
        }
        info!(
            object = %object,
            graph_name = %meta.graph_name,
            vertices = meta.vertex_count,
            edges = meta.edge_count,
            "snapshot.import.completed"
        );
        Ok(Some(graph))
    }

    /// Serialize `graph` under the object name for `timestamp`. Returns the name.
    pub fn export(&self, timestamp: DateTime<Utc>, graph: &Graph) -> Result<String> {
        let object = self.object_name(timestamp);
        let bytes = serialize_topology(
            graph,
            &self.config.graph_name,
            timestamp.timestamp_millis(),
        )?;
        let size = bytes.len();
        self.store.put(&self.config.bucket, &object, bytes)?;
        info!(object = %object, bytes = size, "snapshot.export.completed");
        Ok(object)
    }

    /// Forget the loaded snapshot at `timestamp`. The cached object stays.
    pub fn invalidate(&self, timestamp: DateTime<Utc>) -> bool {
        self.registry.remove(timestamp)
    }

    pub fn status(&self) -> Vec<SnapshotStatus> {
        collect_status(&self.registry)
    }

    pub fn node_count(&self, timestamp: DateTime<Utc>) -> Result<usize> {
        Ok(self.graph_at(timestamp)?.vertex_count())
    }

    pub fn edge_count(&self, timestamp: DateTime<Utc>) -> Result<usize> {
        Ok(self.graph_at(timestamp)?.edge_count())
    }

    /// Summary metrics; path lengths are hop counts.
    pub fn network_metrics(&self, timestamp: DateTime<Utc>) -> Result<NetworkMetrics> {
        let graph = self.graph_at(timestamp)?;
        Ok(network_metrics(&graph, CostModel::Hops, self.config.top_k))
    }

    pub fn bridge_analysis(&self, timestamp: DateTime<Utc>) -> Result<BridgeAnalysis> {
        Ok(analyze_bridges(&*self.graph_at(timestamp)?))
    }

    pub fn centrality_exact(&self, timestamp: DateTime<Utc>) -> Result<CentralityMetrics> {
        Ok(exact_betweenness(&*self.graph_at(timestamp)?, self.cost_model()))
    }

    pub fn centrality_empirical(&self, timestamp: DateTime<Utc>) -> Result<CentralityMetrics> {
        Ok(empirical_betweenness(
            &*self.graph_at(timestamp)?,
            self.config.monte_carlo_runs,
            self.config.monte_carlo_seed,
            self.cost_model(),
        ))
    }

    pub fn compare_centrality(&self, timestamp: DateTime<Utc>) -> Result<CentralityComparison> {
        Ok(compare_methods(
            &*self.graph_at(timestamp)?,
            self.config.monte_carlo_runs,
            self.config.monte_carlo_seed,
            self.cost_model(),
        ))
    }
}
