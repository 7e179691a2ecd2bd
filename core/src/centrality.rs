//! Betweenness centrality, exact and sampled.
//!
//! Exact scores follow Brandes: one shortest-path DAG per source, with
//! dependencies back-propagated in reverse settle order. Sources are spread
//! across the rayon pool; each worker folds into its own score vector and the
//! partial vectors are summed at the end, so no locking happens per source.
//!
//! Sampled (Monte Carlo) scores pick random ordered pairs and credit every
//! intermediate vertex on one cheapest path. Runs are cut into fixed-size
//! chunks, each driven by its own `ChaCha8Rng` stream derived from the seed,
//! so a seeded estimate does not depend on how rayon schedules the chunks.

use std::collections::BTreeMap;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::graph::{Graph, VertexId};
use crate::traversal::{all_shortest_paths, CostModel, PathSearch};

pub const DEFAULT_MONTE_CARLO_RUNS: usize = 1000;

/// Sampled runs per RNG stream.
const RUNS_PER_CHUNK: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CentralityMetrics {
    /// Score per live vertex handle.
    pub betweenness: BTreeMap<VertexId, f64>,
    pub average: f64,
    /// Highest score, lowest handle on ties. None for an empty graph.
    pub most_central: Option<VertexId>,
    /// Ordered pairs examined: `N(N-1)` for exact, successful samples otherwise.
    pub runs: u64,
}

impl CentralityMetrics {
    fn from_scores(graph: &Graph, scores: &[f64], runs: u64) -> Self {
        let betweenness: BTreeMap<VertexId, f64> = graph
            .vertices()
            .map(|v| (v, scores.get(v as usize).copied().unwrap_or(0.0)))
            .collect();

        let mut most_central: Option<(VertexId, f64)> = None;
        for (&v, &score) in &betweenness {
            match most_central {
                Some((_, best)) if score <= best => {}
                _ => most_central = Some((v, score)),
            }
        }

        let average = if betweenness.is_empty() {
            0.0
        } else {
            betweenness.values().sum::<f64>() / betweenness.len() as f64
        };

        Self {
            betweenness,
            average,
            most_central: most_central.map(|(v, _)| v),
            runs,
        }
    }

    pub fn score(&self, vertex: VertexId) -> f64 {
        self.betweenness.get(&vertex).copied().unwrap_or(0.0)
    }

    /// Scores in ascending handle order.
    pub fn values(&self) -> Vec<f64> {
        self.betweenness.values().copied().collect()
    }
}

/// Add one source's pair dependencies into `scores`.
fn accumulate_source(graph: &Graph, source: VertexId, model: CostModel, scores: &mut [f64]) {
    let Ok(dag) = all_shortest_paths(graph, source, model) else {
        return;
    };
    let mut delta = vec![0.0f64; graph.slot_count()];
    for &w in dag.order.iter().rev() {
        let wi = w as usize;
        let coeff = (1.0 + delta[wi]) / dag.sigma[wi];
        for &v in &dag.preds[wi] {
            delta[v as usize] += dag.sigma[v as usize] * coeff;
        }
        if w != source {
            scores[wi] += delta[wi];
        }
    }
}

/// Exact betweenness over all ordered pairs, normalised by `(N-1)(N-2)`.
pub fn exact_betweenness(graph: &Graph, model: CostModel) -> CentralityMetrics {
    let started = Instant::now();
    let n = graph.vertex_count();
    let slots = graph.slot_count();
    let runs = (n as u64) * (n as u64).saturating_sub(1);

    if n <= 2 {
        return CentralityMetrics::from_scores(graph, &[], runs);
    }

    let sources: Vec<VertexId> = graph.vertices().collect();
    let mut scores = sources
        .par_iter()
        .fold(
            || vec![0.0f64; slots],
            |mut partial, &s| {
                accumulate_source(graph, s, model, &mut partial);
                partial
            },
        )
        .reduce(
            || vec![0.0f64; slots],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
    for s in scores.iter_mut() {
        *s *= scale;
    }

    let metrics = CentralityMetrics::from_scores(graph, &scores, runs);
    debug!(
        vertices = n,
        edges = graph.edge_count(),
        runs,
        average = metrics.average,
        duration_ms = started.elapsed().as_millis() as u64,
        "graph.centrality.exact.completed"
    );
    metrics
}

/// One chunk of sampled runs: per-vertex hit counts and successful run count.
fn sample_chunk(
    graph: &Graph,
    sources: &[VertexId],
    model: CostModel,
    base_seed: u64,
    chunk: usize,
    runs: usize,
) -> (Vec<f64>, u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    rng.set_stream(chunk as u64);

    let mut hits = vec![0.0f64; graph.slot_count()];
    let mut successes = 0u64;
    let mut search = PathSearch::new(graph, model);
    let n = sources.len();

    for _ in 0..runs {
        let s = sources[rng.gen_range(0..n)];
        let t = sources[rng.gen_range(0..n)];
        if s == t {
            continue;
        }
        let Ok(Some(path)) = search.path(s, t) else {
            continue;
        };
        for &v in path.intermediates() {
            hits[v as usize] += 1.0;
        }
        successes += 1;
    }
    (hits, successes)
}

/// Monte Carlo betweenness estimate over `runs` sampled ordered pairs.
///
/// Pairs with `source == target` and unreachable pairs are skipped and not
/// counted; each vertex's hit count is divided by the number of successful
/// runs. With `seed` set the result is reproducible.
pub fn empirical_betweenness(
    graph: &Graph,
    runs: usize,
    seed: Option<u64>,
    model: CostModel,
) -> CentralityMetrics {
    let started = Instant::now();
    let sources: Vec<VertexId> = graph.vertices().collect();
    if sources.len() < 2 || runs == 0 {
        return CentralityMetrics::from_scores(graph, &[], 0);
    }

    let base_seed = seed.unwrap_or_else(rand::random);
    let slots = graph.slot_count();
    let chunks = runs.div_ceil(RUNS_PER_CHUNK);

    let (mut scores, successes) = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let len = RUNS_PER_CHUNK.min(runs - chunk * RUNS_PER_CHUNK);
            sample_chunk(graph, &sources, model, base_seed, chunk, len)
        })
        .reduce(
            || (vec![0.0f64; slots], 0u64),
            |(mut a, na), (b, nb)| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                (a, na + nb)
            },
        );

    if successes > 0 {
        let scale = 1.0 / successes as f64;
        for s in scores.iter_mut() {
            *s *= scale;
        }
    }

    let metrics = CentralityMetrics::from_scores(graph, &scores, successes);
    debug!(
        vertices = sources.len(),
        requested_runs = runs,
        successful_runs = successes,
        seeded = seed.is_some(),
        duration_ms = started.elapsed().as_millis() as u64,
        "graph.centrality.empirical.completed"
    );
    metrics
}

/// Pearson correlation coefficient. 0 when the inputs differ in length, hold
/// fewer than two points, or either side has zero variance.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralityComparison {
    pub exact: CentralityMetrics,
    pub empirical: CentralityMetrics,
    pub correlation: f64,
}

/// Run both estimators and correlate their per-vertex scores.
pub fn compare_methods(
    graph: &Graph,
    runs: usize,
    seed: Option<u64>,
    model: CostModel,
) -> CentralityComparison {
    let exact = exact_betweenness(graph, model);
    let empirical = empirical_betweenness(graph, runs, seed, model);
    let correlation = pearson_correlation(&exact.values(), &empirical.values());
    CentralityComparison {
        exact,
        empirical,
        correlation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn make_star(leaves: usize) -> Graph {
        let mut g = Graph::new();
        let hub = g.add_vertex("hub");
        for i in 0..leaves {
            let leaf = g.add_vertex(&format!("leaf{i}"));
            g.add_edge(hub, leaf, &format!("{i}x1x0"), Some(1.0)).unwrap();
        }
        g
    }

    #[test]
    fn test_exact_line_of_three() {
        let g = make_chain(3);
        let m = exact_betweenness(&g, CostModel::Hops);
        assert_eq!(m.score(1), 1.0);
        assert_eq!(m.score(0), 0.0);
        assert_eq!(m.score(2), 0.0);
        assert_eq!(m.most_central, Some(1));
        assert_eq!(m.runs, 6);
        assert!((m.average - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_chain_matches_closed_form() {
        let n = 7;
        let g = make_chain(n);
        for model in [CostModel::Hops, CostModel::Stored] {
            let m = exact_betweenness(&g, model);
            for i in 0..n {
                let expected = (2 * i * (n - 1 - i)) as f64 / ((n - 1) * (n - 2)) as f64;
                assert!(
                    (m.score(i as VertexId) - expected).abs() < 1e-9,
                    "vertex {i}: {} vs {expected}",
                    m.score(i as VertexId)
                );
            }
            assert_eq!(m.most_central, Some(3));
        }
    }

    #[test]
    fn test_exact_star_hub_is_one() {
        let g = make_star(6);
        let m = exact_betweenness(&g, CostModel::Hops);
        assert!((m.score(0) - 1.0).abs() < 1e-12);
        assert!((1..=6).all(|leaf| m.score(leaf) == 0.0));
    }

    #[test]
    fn test_exact_cycle_uniform_and_tie_break() {
        let g = make_cycle(6);
        let m = exact_betweenness(&g, CostModel::Hops);
        let first = m.score(0);
        assert!(first > 0.0);
        assert!(m.values().iter().all(|s| (s - first).abs() < 1e-12));
        assert_eq!(m.most_central, Some(0));
    }

    #[test]
    fn test_exact_splits_credit_between_equal_paths() {
        // square 0 - {1, 2} - 3
        let mut g = Graph::new();
        g.add_vertices_batch(["a", "b", "c", "d"]);
        for (x, y) in [(0, 1), (0, 2), (1, 3), (2, 3)] {
            g.add_edge(x, y, &format!("{x}x{y}x0"), Some(1.0)).unwrap();
        }
        let m = exact_betweenness(&g, CostModel::Stored);
        // every vertex sits on half of one opposite pair's paths, both directions:
        // 2 ordered pairs * 0.5 / (3 * 2)
        for v in 0..4 {
            assert!((m.score(v) - 1.0 / 6.0).abs() < 1e-12);
        }
        assert_eq!(m.most_central, Some(0));
    }

    #[test]
    fn test_small_graphs_are_zero() {
        let empty = Graph::new();
        let m = exact_betweenness(&empty, CostModel::Hops);
        assert!(m.betweenness.is_empty());
        assert_eq!(m.most_central, None);
        assert_eq!(m.average, 0.0);

        let g = make_chain(2);
        let m = exact_betweenness(&g, CostModel::Hops);
        assert_eq!(m.values(), vec![0.0, 0.0]);
        assert_eq!(m.most_central, Some(0));

        let m = empirical_betweenness(&empty, 100, Some(1), CostModel::Hops);
        assert_eq!(m.runs, 0);
        assert_eq!(m.most_central, None);
    }

    #[test]
    fn test_empirical_seeded_is_reproducible() {
        let g = make_cycle(12);
        let a = empirical_betweenness(&g, 2000, Some(42), CostModel::Stored);
        let b = empirical_betweenness(&g, 2000, Some(42), CostModel::Stored);
        assert_eq!(a, b);
        assert!(a.runs > 0 && a.runs <= 2000);
    }

    #[test]
    fn test_empirical_skips_unreachable_pairs() {
        let mut g = make_chain(3);
        g.add_vertex("island");
        let m = empirical_betweenness(&g, 6000, Some(7), CostModel::Hops);
        // only pairs inside the chain succeed; 2 of those 6 pass through the middle
        assert!(m.runs < 6000);
        assert!((m.score(1) - 1.0 / 3.0).abs() < 0.05);
        assert_eq!(m.score(3), 0.0);
    }

    #[test]
    fn test_pearson() {
        assert!((pearson_correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson_correlation(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson_correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(pearson_correlation(&[1.0], &[1.0]), 0.0);
        assert_eq!(pearson_correlation(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_compare_methods_star() {
        let g = make_star(8);
        let cmp = compare_methods(&g, 2000, Some(3), CostModel::Hops);
        assert!((cmp.correlation - 1.0).abs() < 1e-9);
        assert_eq!(cmp.exact.most_central, Some(0));
        assert_eq!(cmp.empirical.most_central, Some(0));
    }
}
