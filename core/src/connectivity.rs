//! Bridge and cut-vertex detection.
//!
//! One iterative low-link DFS (Tarjan) finds every bridge, every articulation
//! vertex and the connected component count. Deep Lightning chains would
//! overflow the call stack with a recursive DFS, so the walk keeps an
//! explicit stack of frames instead.

use std::collections::VecDeque;
use std::time::Instant;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::graph::{pack_edge_key, Graph, VertexId};

const UNVISITED: u32 = u32::MAX;
const NO_PARENT: VertexId = VertexId::MAX;

/// Structural fragility of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeAnalysis {
    pub bridge_count: usize,
    /// `(min, max)` handle pairs, sorted ascending.
    pub bridges: Vec<(VertexId, VertexId)>,
    /// Connected components once every bridge is removed.
    pub components_after_removal: usize,
    /// `bridge_count / edge_count`, 0 for an edgeless graph.
    pub criticality_score: f64,
    /// Cut vertices, ascending.
    pub articulation_points: Vec<VertexId>,
    /// Connected components of the unmodified graph.
    pub component_count: usize,
}

/// DFS work item: the vertex, the tree parent it was reached from, and the
/// index of the next neighbor to examine.
struct Frame {
    vertex: VertexId,
    parent: VertexId,
    next: usize,
}

struct LowLink {
    bridges: Vec<(VertexId, VertexId)>,
    cut: Vec<bool>,
    components: usize,
}

fn low_link(graph: &Graph) -> LowLink {
    let slots = graph.slot_count();
    let mut disc = vec![UNVISITED; slots];
    let mut low = vec![0u32; slots];
    let mut cut = vec![false; slots];
    let mut bridges = Vec::new();
    let mut components = 0;
    let mut timer: u32 = 0;
    let mut stack: Vec<Frame> = Vec::new();

    for root in graph.vertices() {
        if disc[root as usize] != UNVISITED {
            continue;
        }
        components += 1;
        let mut root_children = 0;
        disc[root as usize] = timer;
        low[root as usize] = timer;
        timer += 1;
        stack.push(Frame {
            vertex: root,
            parent: NO_PARENT,
            next: 0,
        });

        while let Some(top) = stack.last_mut() {
            let u = top.vertex;
            let parent = top.parent;
            let neighbors = graph.neighbor_slice(u);

            if top.next < neighbors.len() {
                let v = neighbors[top.next];
                top.next += 1;
                if v == parent {
                    continue;
                }
                if disc[v as usize] == UNVISITED {
                    disc[v as usize] = timer;
                    low[v as usize] = timer;
                    timer += 1;
                    if u == root {
                        root_children += 1;
                    }
                    stack.push(Frame {
                        vertex: v,
                        parent: u,
                        next: 0,
                    });
                } else {
                    low[u as usize] = low[u as usize].min(disc[v as usize]);
                }
                continue;
            }

            stack.pop();
            if parent == NO_PARENT {
                continue;
            }
            let (p, c) = (parent as usize, u as usize);
            low[p] = low[p].min(low[c]);
            if low[c] > disc[p] {
                bridges.push((parent.min(u), parent.max(u)));
            }
            if parent != root && low[c] >= disc[p] {
                cut[p] = true;
            }
        }

        if root_children > 1 {
            cut[root as usize] = true;
        }
    }

    bridges.sort_unstable();
    LowLink {
        bridges,
        cut,
        components,
    }
}

/// Count connected components, ignoring the edges whose packed keys are in `skip`.
fn count_components(graph: &Graph, skip: &FxHashSet<u64>) -> usize {
    let mut seen = vec![false; graph.slot_count()];
    let mut queue = VecDeque::new();
    let mut components = 0;

    for root in graph.vertices() {
        if seen[root as usize] {
            continue;
        }
        components += 1;
        seen[root as usize] = true;
        queue.push_back(root);
        while let Some(u) = queue.pop_front() {
            for &v in graph.neighbor_slice(u) {
                if seen[v as usize] || skip.contains(&pack_edge_key(u, v)) {
                    continue;
                }
                seen[v as usize] = true;
                queue.push_back(v);
            }
        }
    }
    components
}

/// Every bridge, as sorted `(min, max)` pairs.
pub fn bridges(graph: &Graph) -> Vec<(VertexId, VertexId)> {
    low_link(graph).bridges
}

/// Every articulation vertex, ascending.
pub fn articulation_points(graph: &Graph) -> Vec<VertexId> {
    collect_cut(&low_link(graph).cut)
}

fn collect_cut(cut: &[bool]) -> Vec<VertexId> {
    cut.iter()
        .enumerate()
        .filter(|(_, &c)| c)
        .map(|(i, _)| i as VertexId)
        .collect()
}

pub fn connected_components(graph: &Graph) -> usize {
    count_components(graph, &FxHashSet::default())
}

/// Full bridge report for one snapshot.
pub fn analyze_bridges(graph: &Graph) -> BridgeAnalysis {
    let started = Instant::now();
    let LowLink {
        bridges,
        cut,
        components,
    } = low_link(graph);

    let skip: FxHashSet<u64> = bridges.iter().map(|&(a, b)| pack_edge_key(a, b)).collect();
    let components_after_removal = count_components(graph, &skip);
    let edge_count = graph.edge_count();
    let criticality_score = if edge_count == 0 {
        0.0
    } else {
        bridges.len() as f64 / edge_count as f64
    };

    let analysis = BridgeAnalysis {
        bridge_count: bridges.len(),
        bridges,
        components_after_removal,
        criticality_score,
        articulation_points: collect_cut(&cut),
        component_count: components,
    };
    debug!(
        vertices = graph.vertex_count(),
        edges = edge_count,
        bridges = analysis.bridge_count,
        articulation_points = analysis.articulation_points.len(),
        components = analysis.component_count,
        duration_ms = started.elapsed().as_millis() as u64,
        "graph.bridges.completed"
    );
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chain(n: usize) -> Graph {
        let mut g = Graph::new();
        let ids = g.add_vertices_batch((0..n).map(|i| format!("n{i}")));
        for w in ids.windows(2) {
            g.add_edge(w[0], w[1], &format!("{}x0x0", w[0]), None).unwrap();
        }
        g
    }

    fn make_cycle(n: usize) -> Graph {
        let mut g = make_chain(n);
        g.add_edge(n as VertexId - 1, 0, "close", None).unwrap();
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

    /// Two triangles joined by the single edge 2 - 3.
    fn make_barbell() -> Graph {
        let mut g = Graph::new();
        g.add_vertices_batch((0..6).map(|i| format!("n{i}")));
        for (a, b) in [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)] {
            g.add_edge(a, b, &format!("{a}x{b}x0"), None).unwrap();
        }
        g
    }

    #[test]
    fn test_chain_every_edge_is_bridge() {
        let g = make_chain(10);
        let analysis = analyze_bridges(&g);
        assert_eq!(analysis.bridge_count, 9);
        assert_eq!(analysis.criticality_score, 1.0);
        assert_eq!(analysis.components_after_removal, 10);
        assert_eq!(analysis.articulation_points, (1..9).collect::<Vec<_>>());
        assert_eq!(analysis.bridges[0], (0, 1));
    }

    #[test]
    fn test_cycle_has_no_bridges() {
        let g = make_cycle(7);
        let analysis = analyze_bridges(&g);
        assert_eq!(analysis.bridge_count, 0);
        assert_eq!(analysis.criticality_score, 0.0);
        assert_eq!(analysis.components_after_removal, 1);
        assert!(analysis.articulation_points.is_empty());
    }

    #[test]
    fn test_barbell_single_bridge() {
        let g = make_barbell();
        let analysis = analyze_bridges(&g);
        assert_eq!(analysis.bridges, vec![(2, 3)]);
        assert_eq!(analysis.components_after_removal, 2);
        assert_eq!(analysis.articulation_points, vec![2, 3]);
        assert!((analysis.criticality_score - 1.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_star_hub_is_cut_vertex() {
        let g = make_star(5);
        assert_eq!(articulation_points(&g), vec![0]);
        assert_eq!(bridges(&g).len(), 5);
    }

    #[test]
    fn test_empty_and_isolated() {
        let g = Graph::new();
        assert_eq!(analyze_bridges(&g), BridgeAnalysis::default());

        let mut g = Graph::new();
        g.add_vertices_batch(["a", "b", "c"]);
        let analysis = analyze_bridges(&g);
        assert_eq!(analysis.bridge_count, 0);
        assert_eq!(analysis.component_count, 3);
        assert_eq!(analysis.components_after_removal, 3);
        assert_eq!(analysis.criticality_score, 0.0);
    }

    #[test]
    fn test_disconnected_pieces() {
        let mut g = make_cycle(4);
        let a = g.add_vertex("x");
        let b = g.add_vertex("y");
        g.add_edge(a, b, "9x9x0", None).unwrap();
        let analysis = analyze_bridges(&g);
        assert_eq!(analysis.component_count, 2);
        assert_eq!(analysis.bridges, vec![(a, b)]);
        assert_eq!(analysis.components_after_removal, 3);
        assert_eq!(connected_components(&g), 2);
    }

    #[test]
    fn test_long_chain_no_stack_overflow() {
        let g = make_chain(200_000);
        assert_eq!(bridges(&g).len(), 199_999);
    }

    #[test]
    fn test_bridges_after_vertex_reuse() {
        let mut g = make_cycle(5);
        g.remove_vertex(2);
        // cycle broken into the path 3 - 4 - 0 - 1
        let analysis = analyze_bridges(&g);
        assert_eq!(analysis.bridge_count, 3);
        assert_eq!(analysis.bridges, vec![(0, 1), (0, 4), (3, 4)]);
    }
}
