use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::{EdgeData, Graph, VertexId};

/// Two path costs within this tolerance are treated as equal.
pub const EPSILON: f64 = 1e-10;

const NO_PRED: VertexId = VertexId::MAX;

/// How an edge is priced during shortest-path search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// Every edge costs 1. Searches run as plain BFS.
    #[default]
    Hops,
    /// The edge's stored cost; edges without one cost 1.
    Stored,
    /// Fee to forward `payment_size_sat`; edges without a fee policy fall
    /// back to their stored cost, then to 1.
    Fee { payment_size_sat: u64 },
}

impl CostModel {
    pub fn is_unit(&self) -> bool {
        matches!(self, CostModel::Hops)
    }

    fn price(&self, edge: Option<&EdgeData>) -> f64 {
        match (self, edge) {
            (CostModel::Hops, _) | (_, None) => 1.0,
            (CostModel::Stored, Some(e)) => e.cost.unwrap_or(1.0),
            (CostModel::Fee { payment_size_sat }, Some(e)) => match e.fee {
                Some(fee) => fee.cost(*payment_size_sat),
                None => e.cost.unwrap_or(1.0),
            },
        }
    }

    /// Cost of traversing the edge between `a` and `b` under this model.
    pub fn edge_weight(&self, graph: &Graph, a: VertexId, b: VertexId) -> f64 {
        if self.is_unit() {
            return 1.0;
        }
        self.price(graph.edge(a, b))
    }
}

/// Min-heap entry: lowest cost first, lowest handle on equal cost.
#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    cost: f64,
    vertex: VertexId,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single shortest path, both endpoints included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    pub vertices: Vec<VertexId>,
    pub cost: f64,
}

impl Path {
    pub fn hops(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    /// Vertices strictly between the endpoints.
    pub fn intermediates(&self) -> &[VertexId] {
        match self.vertices.len() {
            0..=2 => &[],
            n => &self.vertices[1..n - 1],
        }
    }
}

/// Single-source result: a distance for every slot (`f64::INFINITY` when
/// unreached) and one predecessor per reached vertex.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    pub source: VertexId,
    pub dist: Vec<f64>,
    pred: Vec<VertexId>,
}

impl ShortestPaths {
    pub fn distance(&self, target: VertexId) -> f64 {
        self.dist
            .get(target as usize)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    pub fn predecessor(&self, target: VertexId) -> Option<VertexId> {
        match self.pred.get(target as usize) {
            Some(&p) if p != NO_PRED => Some(p),
            _ => None,
        }
    }

    /// Walk predecessors back from `target`. None when unreached.
    pub fn path_to(&self, target: VertexId) -> Option<Path> {
        let cost = self.distance(target);
        if !cost.is_finite() {
            return None;
        }
        Some(Path {
            vertices: walk_back(&self.pred, self.source, target),
            cost,
        })
    }
}

fn walk_back(pred: &[VertexId], source: VertexId, target: VertexId) -> Vec<VertexId> {
    let mut vertices = vec![target];
    let mut current = target;
    while current != source {
        current = pred[current as usize];
        vertices.push(current);
    }
    vertices.reverse();
    vertices
}

/// Reusable search state for repeated shortest-path queries on one graph.
///
/// Buffers are sized once to the graph's slot count; only the entries touched
/// by a query are reset before the next one, so many short queries (Monte
/// Carlo sampling, all-sources sweeps) avoid reallocating per query.
pub struct PathSearch<'g> {
    graph: &'g Graph,
    model: CostModel,
    dist: Vec<f64>,
    pred: Vec<VertexId>,
    settled: Vec<bool>,
    touched: Vec<VertexId>,
    heap: BinaryHeap<State>,
    queue: VecDeque<VertexId>,
}

impl<'g> PathSearch<'g> {
    pub fn new(graph: &'g Graph, model: CostModel) -> Self {
        let slots = graph.slot_count();
        Self {
            graph,
            model,
            dist: vec![f64::INFINITY; slots],
            pred: vec![NO_PRED; slots],
            settled: vec![false; slots],
            touched: Vec::new(),
            heap: BinaryHeap::new(),
            queue: VecDeque::new(),
        }
    }

    fn reset(&mut self) {
        for &v in &self.touched {
            let i = v as usize;
            self.dist[i] = f64::INFINITY;
            self.pred[i] = NO_PRED;
            self.settled[i] = false;
        }
        self.touched.clear();
        self.heap.clear();
        self.queue.clear();
    }

    fn discover(&mut self, v: VertexId, dist: f64, pred: VertexId) {
        let i = v as usize;
        if self.dist[i] == f64::INFINITY {
            self.touched.push(v);
        }
        self.dist[i] = dist;
        self.pred[i] = pred;
    }

    fn run(&mut self, source: VertexId, target: Option<VertexId>) -> Result<()> {
        if !self.graph.vertex_exists(source) {
            return Err(GraphError::InvalidReference(source));
        }
        if let Some(t) = target {
            if !self.graph.vertex_exists(t) {
                return Err(GraphError::InvalidReference(t));
            }
        }
        self.reset();
        self.discover(source, 0.0, NO_PRED);
        if self.model.is_unit() {
            self.bfs(source, target);
        } else {
            self.dijkstra(source, target);
        }
        Ok(())
    }

    fn bfs(&mut self, source: VertexId, target: Option<VertexId>) {
        let graph = self.graph;
        self.queue.push_back(source);
        // Level order: every vertex one hop closer is dequeued before target,
        // so its predecessor is final when it is popped.
        while let Some(u) = self.queue.pop_front() {
            if Some(u) == target {
                break;
            }
            let next = self.dist[u as usize] + 1.0;
            for &v in graph.neighbor_slice(u) {
                let i = v as usize;
                if self.dist[i] == f64::INFINITY {
                    self.discover(v, next, u);
                    self.queue.push_back(v);
                } else if self.dist[i] == next && u < self.pred[i] {
                    self.pred[i] = u;
                }
            }
        }
    }

    fn dijkstra(&mut self, source: VertexId, target: Option<VertexId>) {
        let graph = self.graph;
        self.heap.push(State {
            cost: 0.0,
            vertex: source,
        });
        while let Some(State { vertex: u, .. }) = self.heap.pop() {
            if self.settled[u as usize] {
                continue;
            }
            self.settled[u as usize] = true;
            if Some(u) == target {
                break;
            }
            let base = self.dist[u as usize];
            for &v in graph.neighbor_slice(u) {
                let i = v as usize;
                if self.settled[i] {
                    continue;
                }
                let cost = base + self.model.edge_weight(graph, u, v);
                if cost < self.dist[i] - EPSILON {
                    self.discover(v, cost, u);
                    self.heap.push(State { cost, vertex: v });
                } else if (cost - self.dist[i]).abs() <= EPSILON && u < self.pred[i] {
                    self.pred[i] = u;
                }
            }
        }
    }

    /// Cheapest path from `source` to `target`, stopping as soon as the
    /// target is settled. `Ok(None)` when the target is unreachable.
    pub fn path(&mut self, source: VertexId, target: VertexId) -> Result<Option<Path>> {
        self.run(source, Some(target))?;
        let cost = self.dist[target as usize];
        if !cost.is_finite() {
            return Ok(None);
        }
        Ok(Some(Path {
            vertices: walk_back(&self.pred, source, target),
            cost,
        }))
    }

    /// Full single-source sweep. Read the results with [`PathSearch::reached`].
    pub fn sweep(&mut self, source: VertexId) -> Result<()> {
        self.run(source, None)
    }

    /// Every vertex reached by the last sweep with its distance, source included.
    pub fn reached(&self) -> impl Iterator<Item = (VertexId, f64)> + '_ {
        self.touched.iter().map(|&v| (v, self.dist[v as usize]))
    }

    /// Copy the last sweep out as an owned result.
    fn snapshot(&self, source: VertexId) -> ShortestPaths {
        ShortestPaths {
            source,
            dist: self.dist.clone(),
            pred: self.pred.clone(),
        }
    }
}

/// Single-source shortest paths from `source` to every vertex.
pub fn single_source(graph: &Graph, source: VertexId, model: CostModel) -> Result<ShortestPaths> {
    let mut search = PathSearch::new(graph, model);
    search.sweep(source)?;
    Ok(search.snapshot(source))
}

/// Cheapest path between two vertices. `Ok(None)` when disconnected.
pub fn shortest_path(
    graph: &Graph,
    source: VertexId,
    target: VertexId,
    model: CostModel,
) -> Result<Option<Path>> {
    PathSearch::new(graph, model).path(source, target)
}

/// Every co-optimal predecessor of every reached vertex, the number of
/// shortest paths from the source (`sigma`), and the order in which vertices
/// were settled (non-decreasing distance).
#[derive(Debug, Clone)]
pub struct AllShortestPaths {
    pub source: VertexId,
    pub dist: Vec<f64>,
    pub sigma: Vec<f64>,
    pub preds: Vec<Vec<VertexId>>,
    pub order: Vec<VertexId>,
}

/// Shortest-path DAG from `source`, as needed for dependency accumulation.
///
/// A vertex gains a predecessor only while it is unsettled, so a zero-cost
/// edge between two equally distant vertices never creates a cycle in the DAG.
pub fn all_shortest_paths(
    graph: &Graph,
    source: VertexId,
    model: CostModel,
) -> Result<AllShortestPaths> {
    if !graph.vertex_exists(source) {
        return Err(GraphError::InvalidReference(source));
    }

    let slots = graph.slot_count();
    let mut out = AllShortestPaths {
        source,
        dist: vec![f64::INFINITY; slots],
        sigma: vec![0.0; slots],
        preds: vec![Vec::new(); slots],
        order: Vec::new(),
    };
    out.dist[source as usize] = 0.0;
    out.sigma[source as usize] = 1.0;

    if model.is_unit() {
        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(u) = queue.pop_front() {
            out.order.push(u);
            let next = out.dist[u as usize] + 1.0;
            for &v in graph.neighbor_slice(u) {
                let i = v as usize;
                if out.dist[i] == f64::INFINITY {
                    out.dist[i] = next;
                    queue.push_back(v);
                }
                if out.dist[i] == next {
                    out.sigma[i] += out.sigma[u as usize];
                    out.preds[i].push(u);
                }
            }
        }
        return Ok(out);
    }

    let mut settled = vec![false; slots];
    let mut heap = BinaryHeap::new();
    heap.push(State {
        cost: 0.0,
        vertex: source,
    });
    while let Some(State { vertex: u, .. }) = heap.pop() {
        if settled[u as usize] {
            continue;
        }
        settled[u as usize] = true;
        out.order.push(u);

        let base = out.dist[u as usize];
        for &v in graph.neighbor_slice(u) {
            let i = v as usize;
            if settled[i] {
                continue;
            }
            let cost = base + model.edge_weight(graph, u, v);
            if cost < out.dist[i] - EPSILON {
                out.dist[i] = cost;
                out.sigma[i] = out.sigma[u as usize];
                out.preds[i].clear();
                out.preds[i].push(u);
                heap.push(State { cost, vertex: v });
            } else if (cost - out.dist[i]).abs() <= EPSILON {
                out.sigma[i] += out.sigma[u as usize];
                out.preds[i].push(u);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FeeWeight;

    fn make_chain(n: usize) -> Graph {
        let mut g = Graph::new();
        let ids = g.add_vertices_batch((0..n).map(|i| format!("n{i}")));
        for w in ids.windows(2) {
            g.add_edge(w[0], w[1], &format!("{}x0x0", w[0]), Some(1.0))
                .unwrap();
        }
        g
    }

    fn make_cycle(n: usize) -> Graph {
        let mut g = make_chain(n);
        g.add_edge(n as VertexId - 1, 0, "close", Some(1.0)).unwrap();
        g
    }

    /// 0 - 1 - 3 and 0 - 2 - 3, with `cost` on every edge.
    fn make_diamond(cost: f64) -> Graph {
        let mut g = Graph::new();
        g.add_vertices_batch(["a", "b", "c", "d"]);
        // insert the 2-branch first so adjacency order disagrees with handle order
        for (x, y) in [(0, 2), (2, 3), (0, 1), (1, 3)] {
            g.add_edge(x, y, &format!("{x}x{y}x0"), Some(cost)).unwrap();
        }
        g
    }

    #[test]
    fn test_path_chain() {
        let g = make_chain(6);
        let path = shortest_path(&g, 0, 5, CostModel::Hops).unwrap().unwrap();
        assert_eq!(path.vertices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(path.hops(), 5);
        assert_eq!(path.cost, 5.0);
        assert_eq!(path.intermediates(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_path_self() {
        let g = make_chain(3);
        let path = shortest_path(&g, 1, 1, CostModel::Stored).unwrap().unwrap();
        assert_eq!(path.vertices, vec![1]);
        assert_eq!(path.cost, 0.0);
        assert!(path.intermediates().is_empty());
    }

    #[test]
    fn test_path_cycle_takes_short_way() {
        let g = make_cycle(6);
        let path = shortest_path(&g, 0, 4, CostModel::Hops).unwrap().unwrap();
        assert_eq!(path.vertices, vec![0, 5, 4]);
    }

    #[test]
    fn test_path_unreachable() {
        let mut g = Graph::new();
        let a = g.add_vertex("a");
        let b = g.add_vertex("b");
        assert_eq!(shortest_path(&g, a, b, CostModel::Hops).unwrap(), None);
        assert_eq!(shortest_path(&g, a, b, CostModel::Stored).unwrap(), None);
        let sp = single_source(&g, a, CostModel::Stored).unwrap();
        assert_eq!(sp.distance(b), f64::INFINITY);
        assert!(sp.path_to(b).is_none());
    }

    #[test]
    fn test_unknown_source_is_invalid_reference() {
        let g = make_chain(3);
        assert_eq!(
            single_source(&g, 99, CostModel::Hops).unwrap_err(),
            GraphError::InvalidReference(99)
        );
        assert!(shortest_path(&g, 0, 99, CostModel::Hops).is_err());
        assert!(all_shortest_paths(&g, 99, CostModel::Stored).is_err());
    }

    #[test]
    fn test_tie_break_lowest_handle() {
        for model in [CostModel::Hops, CostModel::Stored] {
            let g = make_diamond(1.0);
            let path = shortest_path(&g, 0, 3, model).unwrap().unwrap();
            assert_eq!(path.vertices, vec![0, 1, 3], "model {model:?}");
            let sp = single_source(&g, 0, model).unwrap();
            assert_eq!(sp.predecessor(3), Some(1));
        }
    }

    #[test]
    fn test_weighted_prefers_cheaper_longer_route() {
        let mut g = make_chain(4);
        // direct 0-3 channel that is more expensive than walking the chain
        g.add_edge(0, 3, "shortcut", Some(10.0)).unwrap();
        let stored = shortest_path(&g, 0, 3, CostModel::Stored).unwrap().unwrap();
        assert_eq!(stored.vertices, vec![0, 1, 2, 3]);
        assert_eq!(stored.cost, 3.0);
        let hops = shortest_path(&g, 0, 3, CostModel::Hops).unwrap().unwrap();
        assert_eq!(hops.vertices, vec![0, 3]);
    }

    #[test]
    fn test_fee_model_pricing_and_fallbacks() {
        let mut g = Graph::new();
        g.add_vertices_batch(["a", "b", "c", "d"]);
        g.add_channel(0, 1, "1x1x0", FeeWeight::new(1000, 1), None)
            .unwrap();
        g.add_edge(1, 2, "2x2x0", Some(5.0)).unwrap();
        g.add_edge(2, 3, "3x3x0", None).unwrap();

        let model = CostModel::Fee {
            payment_size_sat: 10_000,
        };
        assert!((model.edge_weight(&g, 0, 1) - 1.01).abs() < 1e-12);
        assert_eq!(model.edge_weight(&g, 1, 2), 5.0);
        assert_eq!(model.edge_weight(&g, 2, 3), 1.0);
        assert_eq!(CostModel::Stored.edge_weight(&g, 0, 1), 1.0);

        let sp = single_source(&g, 0, model).unwrap();
        assert!((sp.distance(3) - 7.01).abs() < 1e-9);
    }

    #[test]
    fn test_path_search_reuse_resets_state() {
        let g = make_cycle(8);
        let mut search = PathSearch::new(&g, CostModel::Stored);
        let first = search.path(0, 4).unwrap().unwrap();
        assert_eq!(first.cost, 4.0);
        let second = search.path(6, 7).unwrap().unwrap();
        assert_eq!(second.vertices, vec![6, 7]);
        search.sweep(3).unwrap();
        let mut reached: Vec<_> = search.reached().collect();
        reached.sort_by_key(|&(v, _)| v);
        assert_eq!(reached.len(), 8);
        assert_eq!(reached[3], (3, 0.0));
        assert_eq!(reached[7], (7, 4.0));
    }

    #[test]
    fn test_all_shortest_paths_diamond() {
        for model in [CostModel::Hops, CostModel::Stored] {
            let g = make_diamond(2.0);
            let asp = all_shortest_paths(&g, 0, model).unwrap();
            assert_eq!(asp.sigma[3], 2.0);
            let mut preds = asp.preds[3].clone();
            preds.sort();
            assert_eq!(preds, vec![1, 2]);
            assert_eq!(asp.order.first(), Some(&0));
            assert_eq!(asp.order.last(), Some(&3));
            assert_eq!(asp.order.len(), 4);
        }
    }

    #[test]
    fn test_all_shortest_paths_epsilon_ties() {
        let mut g = Graph::new();
        g.add_vertices_batch(["s", "x", "y", "t"]);
        g.add_edge(0, 1, "a", Some(0.1)).unwrap();
        g.add_edge(1, 3, "b", Some(0.2)).unwrap();
        g.add_edge(0, 2, "c", Some(0.3)).unwrap();
        g.add_edge(2, 3, "d", Some(0.0)).unwrap();
        // 0.1 + 0.2 and 0.3 + 0.0 differ only by rounding
        let asp = all_shortest_paths(&g, 0, CostModel::Stored).unwrap();
        assert_eq!(asp.sigma[3], 2.0);
    }

    #[test]
    fn test_zero_cost_edges_do_not_loop() {
        let mut g = Graph::new();
        g.add_vertices_batch(["a", "b", "c"]);
        g.add_edge(0, 1, "a", Some(0.0)).unwrap();
        g.add_edge(1, 2, "b", Some(0.0)).unwrap();
        g.add_edge(0, 2, "c", Some(0.0)).unwrap();
        let asp = all_shortest_paths(&g, 0, CostModel::Stored).unwrap();
        assert_eq!(asp.order.len(), 3);
        assert!(asp.preds[0].is_empty());
        let path = shortest_path(&g, 0, 2, CostModel::Stored).unwrap().unwrap();
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn test_removed_vertex_not_traversed() {
        let mut g = make_chain(5);
        g.remove_vertex(2);
        assert_eq!(shortest_path(&g, 0, 4, CostModel::Hops).unwrap(), None);
        assert!(shortest_path(&g, 0, 2, CostModel::Hops).is_err());
    }
}
