//! Whole-network summary statistics for one snapshot.
//!
//! Every function returns 0 (or an empty list) for graphs with fewer than two
//! vertices instead of dividing by zero.

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::graph::{Graph, VertexId};
use crate::traversal::{CostModel, PathSearch};

pub const DEFAULT_TOP_K: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkMetrics {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub diameter: f64,
    pub average_path_length: f64,
    pub average_degree: f64,
    pub average_local_clustering: f64,
    pub global_clustering: f64,
    pub density: f64,
    /// Node keys of the highest-degree vertices.
    pub top_by_degree: Vec<String>,
}

/// Degree information for a single vertex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegreeResult {
    pub vertex: VertexId,
    pub key: String,
    pub degree: usize,
}

/// Finite shortest-path distances aggregated over every ordered pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathStats {
    pub max: f64,
    pub sum: f64,
    pub pairs: u64,
}

impl PathStats {
    fn merge(self, other: Self) -> Self {
        Self {
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            pairs: self.pairs + other.pairs,
        }
    }

    pub fn average(&self) -> f64 {
        if self.pairs == 0 {
            0.0
        } else {
            self.sum / self.pairs as f64
        }
    }
}

/// One shortest-path sweep per source, run in parallel. Unreachable pairs
/// contribute nothing.
pub fn path_stats(graph: &Graph, model: CostModel) -> PathStats {
    if graph.vertex_count() < 2 {
        return PathStats::default();
    }
    let sources: Vec<VertexId> = graph.vertices().collect();
    sources
        .par_iter()
        .map_init(
            || PathSearch::new(graph, model),
            |search, &s| {
                let mut stats = PathStats::default();
                if search.sweep(s).is_err() {
                    return stats;
                }
                for (v, d) in search.reached() {
                    if v != s {
                        stats.max = stats.max.max(d);
                        stats.sum += d;
                        stats.pairs += 1;
                    }
                }
                stats
            },
        )
        .reduce(PathStats::default, PathStats::merge)
}

/// Largest finite shortest-path distance.
pub fn diameter(graph: &Graph, model: CostModel) -> f64 {
    path_stats(graph, model).max
}

/// Mean finite shortest-path distance over reachable ordered pairs.
pub fn average_path_length(graph: &Graph, model: CostModel) -> f64 {
    path_stats(graph, model).average()
}

/// `2E / N`.
pub fn average_degree(graph: &Graph) -> f64 {
    let n = graph.vertex_count();
    if n < 2 {
        return 0.0;
    }
    2.0 * graph.edge_count() as f64 / n as f64
}

/// `2E / (N(N-1))`; 1 for a complete graph.
pub fn density(graph: &Graph) -> f64 {
    let n = graph.vertex_count();
    if n < 2 {
        return 0.0;
    }
    2.0 * graph.edge_count() as f64 / (n as f64 * (n - 1) as f64)
}

/// Number of edges among each vertex's neighbors, indexed by handle.
fn neighbor_links(graph: &Graph) -> Vec<u64> {
    let slots = graph.slot_count();
    let mut links = vec![0u64; slots];
    let mut mark: Vec<VertexId> = vec![VertexId::MAX; slots];

    for v in graph.vertices() {
        let neighbors = graph.neighbor_slice(v);
        if neighbors.len() < 2 {
            continue;
        }
        for &u in neighbors {
            mark[u as usize] = v;
        }
        let mut count = 0u64;
        for &u in neighbors {
            for &w in graph.neighbor_slice(u) {
                if mark[w as usize] == v {
                    count += 1;
                }
            }
        }
        // each neighbor-neighbor edge was seen from both ends
        links[v as usize] = count / 2;
    }
    links
}

/// Local clustering coefficient of one vertex; None below degree 2.
pub fn local_clustering(graph: &Graph, vertex: VertexId) -> Option<f64> {
    let neighbors = graph.neighbor_slice(vertex);
    let d = neighbors.len();
    if d < 2 {
        return None;
    }
    let mut links = 0usize;
    for (i, &a) in neighbors.iter().enumerate() {
        for &b in &neighbors[i + 1..] {
            if graph.has_edge(a, b) {
                links += 1;
            }
        }
    }
    Some(2.0 * links as f64 / (d * (d - 1)) as f64)
}

fn clustering_from_links(graph: &Graph, links: &[u64]) -> (f64, f64) {
    let mut local_sum = 0.0;
    let mut local_count = 0usize;
    let mut closed = 0u64;
    let mut triplets = 0u64;

    for v in graph.vertices() {
        let d = graph.degree(v) as u64;
        if d < 2 {
            continue;
        }
        let possible = d * (d - 1) / 2;
        let l = links[v as usize];
        local_sum += l as f64 / possible as f64;
        local_count += 1;
        closed += l;
        triplets += possible;
    }

    let average_local = if local_count == 0 {
        0.0
    } else {
        local_sum / local_count as f64
    };
    let global = if triplets == 0 {
        0.0
    } else {
        closed as f64 / triplets as f64
    };
    (average_local, global)
}

/// Mean local clustering over vertices of degree 2 or more. Lower-degree
/// vertices are left out of the average, not counted as zero.
pub fn average_local_clustering(graph: &Graph) -> f64 {
    if graph.vertex_count() < 2 {
        return 0.0;
    }
    clustering_from_links(graph, &neighbor_links(graph)).0
}

/// Closed triplets over all connected triplets.
pub fn global_clustering(graph: &Graph) -> f64 {
    if graph.vertex_count() < 2 {
        return 0.0;
    }
    clustering_from_links(graph, &neighbor_links(graph)).1
}

/// Vertices ranked by degree, descending, lowest handle first on ties.
/// `top_n == 0` returns every vertex.
pub fn degree_ranking(graph: &Graph, top_n: usize) -> Vec<DegreeResult> {
    let mut results: Vec<DegreeResult> = graph
        .vertices()
        .map(|v| DegreeResult {
            vertex: v,
            key: graph.key_of(v).unwrap_or_default().to_string(),
            degree: graph.degree(v),
        })
        .collect();

    results.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.vertex.cmp(&b.vertex)));

    if top_n > 0 && top_n < results.len() {
        results.truncate(top_n);
    }
    results
}

/// Keys of the `k` highest-degree vertices.
pub fn top_by_degree(graph: &Graph, k: usize) -> Vec<String> {
    if graph.vertex_count() < 2 || k == 0 {
        return Vec::new();
    }
    degree_ranking(graph, k)
        .into_iter()
        .map(|r| r.key)
        .collect()
}

/// Every metric from one pass over the snapshot.
pub fn network_metrics(graph: &Graph, model: CostModel, top_k: usize) -> NetworkMetrics {
    let started = Instant::now();
    let n = graph.vertex_count();
    if n < 2 {
        return NetworkMetrics {
            vertex_count: n,
            edge_count: graph.edge_count(),
            ..NetworkMetrics::default()
        };
    }

    let stats = path_stats(graph, model);
    let (average_local_clustering, global_clustering) =
        clustering_from_links(graph, &neighbor_links(graph));

    let metrics = NetworkMetrics {
        vertex_count: n,
        edge_count: graph.edge_count(),
        diameter: stats.max,
        average_path_length: stats.average(),
        average_degree: average_degree(graph),
        average_local_clustering,
        global_clustering,
        density: density(graph),
        top_by_degree: top_by_degree(graph, top_k),
    };
    debug!(
        vertices = n,
        edges = metrics.edge_count,
        reachable_pairs = stats.pairs,
        diameter = metrics.diameter,
        duration_ms = started.elapsed().as_millis() as u64,
        "graph.metrics.completed"
    );
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chain(n: usize) -> Graph {
        let mut g = Graph::new();
        let ids = g.add_vertices_batch((0..n).map(|i| format!("n{i}")));
        for w in ids.windows(2) {
            g.add_edge(w[0], w[1], &format!("{}x0x0", w[0]), Some(2.0))
                .unwrap();
        }
        g
    }

    fn make_complete(n: usize) -> Graph {
        let mut g = Graph::new();
        g.add_vertices_batch((0..n).map(|i| format!("n{i}")));
        for a in 0..n as VertexId {
            for b in a + 1..n as VertexId {
                g.add_edge(a, b, &format!("{a}x{b}x0"), None).unwrap();
            }
        }
        g
    }

    fn make_star(leaves: usize) -> Graph {
        let mut g = Graph::new();
        let hub = g.add_vertex("hub");
        for i in 0..leaves {
            let leaf = g.add_vertex(&format!("leaf{i}"));
            g.add_edge(hub, leaf, &format!("{i}x1x0"), None).unwrap();
        }
        g
    }

    #[test]
    fn test_line_diameter_and_path_length() {
        let g = make_chain(5);
        assert_eq!(diameter(&g, CostModel::Hops), 4.0);
        assert_eq!(diameter(&g, CostModel::Stored), 8.0);
        // ordered pairs: 8 at distance 1, 6 at 2, 4 at 3, 2 at 4 => 40 / 20
        assert!((average_path_length(&g, CostModel::Hops) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unreachable_pairs_excluded() {
        let mut g = make_chain(3);
        g.add_vertex("island");
        let stats = path_stats(&g, CostModel::Hops);
        assert_eq!(stats.pairs, 6);
        assert_eq!(stats.max, 2.0);
        assert!(stats.average().is_finite());
    }

    #[test]
    fn test_complete_graph() {
        let g = make_complete(5);
        assert_eq!(density(&g), 1.0);
        assert_eq!(average_degree(&g), 4.0);
        assert_eq!(average_local_clustering(&g), 1.0);
        assert_eq!(global_clustering(&g), 1.0);
        assert_eq!(diameter(&g, CostModel::Hops), 1.0);
        assert_eq!(local_clustering(&g, 2), Some(1.0));
    }

    #[test]
    fn test_star_clustering_zero() {
        let g = make_star(4);
        assert_eq!(average_local_clustering(&g), 0.0);
        assert_eq!(global_clustering(&g), 0.0);
        assert_eq!(local_clustering(&g, 1), None);
        assert_eq!(local_clustering(&g, 0), Some(0.0));
    }

    #[test]
    fn test_local_average_skips_low_degree() {
        // triangle 0-1-2 with a pendant 3 on vertex 2
        let mut g = make_complete(3);
        let pendant = g.add_vertex("pendant");
        g.add_edge(2, pendant, "9x9x0", None).unwrap();
        // vertices 0, 1: 1.0; vertex 2: 1 of 3 pairs linked; pendant excluded
        let expected = (1.0 + 1.0 + 1.0 / 3.0) / 3.0;
        assert!((average_local_clustering(&g) - expected).abs() < 1e-12);
        // closed = 1 + 1 + 1, triplets = 1 + 1 + 3
        assert!((global_clustering(&g) - 3.0 / 5.0).abs() < 1e-12);
        assert_eq!(local_clustering(&g, 2), Some(1.0 / 3.0));
    }

    #[test]
    fn test_degenerate_graphs() {
        let empty = Graph::new();
        let m = network_metrics(&empty, CostModel::Hops, DEFAULT_TOP_K);
        assert_eq!(m, NetworkMetrics::default());

        let mut single = Graph::new();
        single.add_vertex("solo");
        let m = network_metrics(&single, CostModel::Hops, DEFAULT_TOP_K);
        assert_eq!(m.vertex_count, 1);
        assert_eq!(m.diameter, 0.0);
        assert_eq!(m.density, 0.0);
        assert_eq!(m.average_degree, 0.0);
        assert!(m.top_by_degree.is_empty());
    }

    #[test]
    fn test_degree_ranking_order() {
        let mut g = make_star(3);
        let extra = g.add_vertex("extra");
        g.add_edge(1, extra, "8x8x0", None).unwrap();
        let ranking = degree_ranking(&g, 0);
        assert_eq!(ranking[0].key, "hub");
        assert_eq!(ranking[0].degree, 3);
        assert_eq!(ranking[1].key, "leaf0");
        // remaining degree-1 vertices in handle order
        let tail: Vec<_> = ranking[2..].iter().map(|r| r.vertex).collect();
        assert_eq!(tail, vec![2, 3, 4]);

        assert_eq!(top_by_degree(&g, 2), vec!["hub", "leaf0"]);
    }

    #[test]
    fn test_network_metrics_aggregate() {
        let g = make_chain(4);
        let m = network_metrics(&g, CostModel::Hops, 2);
        assert_eq!(m.vertex_count, 4);
        assert_eq!(m.edge_count, 3);
        assert_eq!(m.diameter, 3.0);
        assert_eq!(m.average_degree, 1.5);
        assert!((m.density - 0.5).abs() < 1e-12);
        assert_eq!(m.top_by_degree, vec!["n1", "n2"]);
        assert_eq!(m.global_clustering, 0.0);
    }
}
