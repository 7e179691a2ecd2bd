use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use lngraph_core::{
    analyze_bridges, compare_methods, diameter, empirical_betweenness, exact_betweenness,
    network_metrics, shortest_path, CostModel, EdgeInput, FeeWeight, Graph, GraphError,
    SharedGraph, VertexId, DEFAULT_TOP_K,
};

fn channel(from: &str, to: &str, scid: &str, base: u64, prop: u64) -> EdgeInput {
    EdgeInput {
        from: from.to_string(),
        to: to.to_string(),
        scid: scid.to_string(),
        fee: Some(FeeWeight::new(base, prop)),
        cost: None,
    }
}

/// A - B - C with the fee policies gossiped for "1x1x0" and "2x2x0".
fn three_node_line() -> Graph {
    let mut g = Graph::new();
    g.add_vertices_batch(["A", "B", "C"]);
    g.add_edges_batch(&[
        channel("A", "B", "1x1x0", 1000, 1),
        channel("B", "C", "2x2x0", 2000, 2),
    ])
    .unwrap();
    g
}

#[test]
fn three_node_line_metrics() {
    let g = three_node_line();
    let m = network_metrics(&g, CostModel::Hops, DEFAULT_TOP_K);
    assert_eq!(m.diameter, 2.0);
    // 2E / (N(N-1)) with E = 2, N = 3
    assert!((m.density - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(m.top_by_degree[0], "B");
    assert_eq!(m.global_clustering, 0.0);
}

#[test]
fn three_node_line_bridges_and_centrality() {
    let g = three_node_line();
    let b = g.handle_of("B").unwrap();

    let bridges = analyze_bridges(&g);
    assert_eq!(bridges.bridge_count, 2);
    assert_eq!(bridges.criticality_score, 1.0);
    assert_eq!(bridges.articulation_points, vec![b]);

    let exact = exact_betweenness(&g, CostModel::Hops);
    assert_eq!(exact.score(b), 1.0);
    assert_eq!(exact.most_central, Some(b));
}

#[test]
fn three_node_line_fee_routing() {
    let g = three_node_line();
    let (a, c) = (g.handle_of("A").unwrap(), g.handle_of("C").unwrap());
    let model = CostModel::Fee {
        payment_size_sat: 10_000,
    };
    let path = shortest_path(&g, a, c, model).unwrap().unwrap();
    assert_eq!(path.hops(), 2);
    // (1000/1000 + 0.01 * 1) + (2000/1000 + 0.01 * 2)
    assert!((path.cost - 3.03).abs() < 1e-9);
}

#[test]
fn edge_batch_with_unknown_endpoint_is_rejected() {
    let mut g = three_node_line();
    let err = g
        .add_edges_batch(&[
            channel("A", "C", "3x3x0", 1, 1),
            channel("C", "Z", "4x4x0", 1, 1),
        ])
        .unwrap_err();
    assert_eq!(err, GraphError::UnknownKey("Z".into()));
    assert_eq!(g.edge_count(), 2);
}

#[test]
fn path_graph_bridges_and_diameter() {
    for n in [2usize, 5, 40] {
        let mut g = Graph::new();
        let ids = g.add_vertices_batch((0..n).map(|i| format!("v{i}")));
        for w in ids.windows(2) {
            g.add_edge(w[0], w[1], &format!("{}x0x0", w[0]), None).unwrap();
        }
        assert_eq!(analyze_bridges(&g).bridge_count, n - 1);
        assert_eq!(diameter(&g, CostModel::Hops), (n - 1) as f64);
    }
}

#[test]
fn cycle_has_no_bridges() {
    for n in [3usize, 4, 25] {
        let mut g = Graph::new();
        g.add_vertices_batch((0..n).map(|i| format!("v{i}")));
        for i in 0..n as VertexId {
            g.add_edge(i, (i + 1) % n as VertexId, &format!("{i}x0x0"), None)
                .unwrap();
        }
        assert_eq!(analyze_bridges(&g).bridge_count, 0);
    }
}

/// Connected random graph: a random spanning tree plus extra chords, every
/// edge with a random stored cost so shortest paths are almost always unique.
fn random_connected(n: usize, extra: usize, seed: u64) -> Graph {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut g = Graph::with_capacity(n, n + extra);
    g.add_vertices_batch((0..n).map(|i| format!("03{i:04x}")));
    for v in 1..n as VertexId {
        let parent = rng.gen_range(0..v);
        g.add_edge(parent, v, &format!("{v}x{parent}x0"), Some(rng.gen_range(1.0..10.0)))
            .unwrap();
    }
    let mut added = 0;
    while added < extra {
        let a = rng.gen_range(0..n as VertexId);
        let b = rng.gen_range(0..n as VertexId);
        if a == b || g.has_edge(a, b) {
            continue;
        }
        g.add_edge(a, b, &format!("{a}x{b}x1"), Some(rng.gen_range(1.0..10.0)))
            .unwrap();
        added += 1;
    }
    g
}

#[test]
fn sampled_centrality_tracks_exact() {
    let g = random_connected(50, 40, 0x5eed);
    let cmp = compare_methods(&g, 20_000, Some(11), CostModel::Stored);
    assert!(
        cmp.correlation >= 0.9,
        "pearson correlation {} below 0.9",
        cmp.correlation
    );
    // connected graph: only the source == target draws (about 1 in 50) are skipped
    assert!(cmp.empirical.runs > 19_000 && cmp.empirical.runs < 20_000);
    assert_eq!(cmp.exact.runs, 50 * 49);
}

#[test]
fn seeded_sampling_is_reproducible() {
    let g = random_connected(40, 20, 9);
    let a = empirical_betweenness(&g, 5_000, Some(77), CostModel::Stored);
    let b = empirical_betweenness(&g, 5_000, Some(77), CostModel::Stored);
    assert_eq!(a, b);
}

#[test]
fn shared_graph_snapshot_analysis() {
    let shared = SharedGraph::new(random_connected(30, 10, 3));
    let before = shared.with_snapshot(|g| analyze_bridges(g));
    let frozen = shared.freeze();

    // mutate after freezing; the frozen copy answers as before
    shared.update(|g| {
        let extra = g.add_vertex("late");
        g.add_edge(0, extra, "late", Some(1.0)).unwrap();
    });
    assert_eq!(analyze_bridges(&frozen), before);
    assert_eq!(shared.with_snapshot(|g| analyze_bridges(g)).bridge_count, before.bridge_count + 1);
}
