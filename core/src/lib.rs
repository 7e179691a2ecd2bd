//! lngraph-core: in-memory Lightning Network topology engine.
//!
//! Holds one snapshot of the public channel graph as an arena of pooled
//! adjacency buffers and answers the structural questions asked of it:
//! cheapest routes, bridges and cut vertices, betweenness centrality (exact
//! or sampled), and whole-network summary metrics. A compact binary codec
//! persists snapshots.
//!
//! Pure computation: no I/O beyond the caller's byte buffers, no background
//! tasks. Data-parallel loops use rayon's global pool and finish before the
//! call returns.

mod centrality;
mod connectivity;
mod error;
mod graph;
mod metrics;
mod pool;
mod shared;
mod topology;
mod traversal;

pub use centrality::{
    compare_methods, empirical_betweenness, exact_betweenness, pearson_correlation,
    CentralityComparison, CentralityMetrics, DEFAULT_MONTE_CARLO_RUNS,
};
pub use connectivity::{
    analyze_bridges, articulation_points, bridges, connected_components, BridgeAnalysis,
};
pub use error::{GraphError, Result};
pub use graph::{
    pack_edge_key, unpack_edge_key, EdgeData, EdgeInput, FeeWeight, Graph, Neighbors, ScidId,
    VertexId,
};
pub use metrics::{
    average_degree, average_local_clustering, average_path_length, degree_ranking, density,
    diameter, global_clustering, local_clustering, network_metrics, path_stats, top_by_degree,
    DegreeResult, NetworkMetrics, PathStats, DEFAULT_TOP_K,
};
pub use pool::{NeighborPool, INITIAL_NEIGHBOR_CAPACITY};
pub use shared::SharedGraph;
pub use topology::{
    deserialize_topology, read_metadata, serialize_topology, TopologyMetadata, TOPOLOGY_MAGIC,
    TOPOLOGY_VERSION,
};
pub use traversal::{
    all_shortest_paths, shortest_path, single_source, AllShortestPaths, CostModel, Path,
    PathSearch, ShortestPaths, EPSILON,
};
