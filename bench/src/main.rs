use std::collections::VecDeque;
use std::time::Instant;

use anyhow::{ensure, Context};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::{Parser, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use lngraph_core::{
    analyze_bridges, deserialize_topology, empirical_betweenness, exact_betweenness,
    network_metrics, serialize_topology, CostModel, Graph,
};
use lngraph_snapshot::{
    construct_window, ChannelRecord, NodeRecord, SnapshotConfig, StaticSource,
};

/// Exact betweenness is cubic in practice; skip it above this size.
const EXACT_CENTRALITY_LIMIT: u64 = 5_000;
/// All-pairs path metrics run one search per vertex.
const PATH_METRICS_LIMIT: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Run every generator
    All,
    /// Fractal branching tree (deep paths)
    Lsystem,
    /// Preferential attachment via edge sampling (hub-and-spoke)
    Scalefree,
    /// Watts-Strogatz ring lattice plus shortcuts
    Smallworld,
    /// Erdos-Renyi uniform random channels
    Random,
    /// Two dense clusters joined by a thin chain
    Barbell,
    /// Diffusion-limited aggregation (organic branching)
    Dla,
}

/// Time construction and analyses on synthetic Lightning-like topologies.
#[derive(Debug, Parser)]
#[command(name = "lngraph-bench", version)]
struct Args {
    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,
    /// Number of nodes to generate
    #[arg(long, default_value_t = 2_000)]
    nodes: u64,
    /// Seed for topology, fees and Monte Carlo sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Monte Carlo centrality runs
    #[arg(long, default_value_t = lngraph_core::DEFAULT_MONTE_CARLO_RUNS)]
    runs: usize,
    /// Payment size used to price fees into costs
    #[arg(long, default_value_t = lngraph_snapshot::DEFAULT_PAYMENT_SIZE_SAT)]
    payment_size_sat: u64,
}

type Generator = fn(&mut Gossip, u64);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    ensure!(args.nodes >= 16, "--nodes must be at least 16");

    let generators: Vec<(&str, Generator)> = match args.mode {
        Mode::Lsystem => vec![("L-system tree", gen_lsystem)],
        Mode::Scalefree => vec![("Scale-free (edge sampling)", gen_scale_free)],
        Mode::Smallworld => vec![("Small-world (Watts-Strogatz)", gen_small_world)],
        Mode::Random => vec![("Erdos-Renyi random", gen_random)],
        Mode::Barbell => vec![("Barbell (cluster-chain-cluster)", gen_barbell)],
        Mode::Dla => vec![("DLA (organic branching)", gen_dla)],
        Mode::All => vec![
            ("L-system tree", gen_lsystem as Generator),
            ("Scale-free (edge sampling)", gen_scale_free),
            ("Small-world (Watts-Strogatz)", gen_small_world),
            ("Erdos-Renyi random", gen_random),
            ("Barbell (cluster-chain-cluster)", gen_barbell),
            ("DLA (organic branching)", gen_dla),
        ],
    };

    println!("lngraph-bench");
    println!("=============");
    println!();

    for (name, generator) in generators {
        run_benchmark(name, generator, &args)
            .with_context(|| format!("benchmark '{name}' failed"))?;
    }
    Ok(())
}

fn ms(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1000.0
}

fn run_benchmark(name: &str, generator: Generator, args: &Args) -> anyhow::Result<()> {
    println!("--- {name} ---");
    println!("Target: {} nodes", args.nodes);

    let mut gossip = Gossip::new(args.seed);
    generator(&mut gossip, args.nodes);
    let channel_records = gossip.channels.len();
    let source = gossip.into_source();

    let config = SnapshotConfig {
        payment_size_sat: args.payment_size_sat,
        max_memory_mb: 131_072,
        initial_capacity: args.nodes as usize,
        ..Default::default()
    };
    let t = Instant::now();
    let (graph, report) = construct_window(&source, gossip_time(), &config)?;
    println!(
        "Constructed in {:.1}ms: {} nodes, {} channels from {} records, ~{:.1}MB",
        ms(t),
        graph.vertex_count(),
        graph.edge_count(),
        channel_records,
        report.memory_bytes as f64 / 1_048_576.0
    );

    let model = CostModel::Fee {
        payment_size_sat: args.payment_size_sat,
    };

    let t = Instant::now();
    let bridges = analyze_bridges(&graph);
    println!(
        "Bridges: {} ({} cut vertices, {} components, criticality {:.3}) in {:.1}ms",
        bridges.bridge_count,
        bridges.articulation_points.len(),
        bridges.component_count,
        bridges.criticality_score,
        ms(t)
    );

    if args.nodes <= PATH_METRICS_LIMIT {
        let t = Instant::now();
        let m = network_metrics(&graph, CostModel::Hops, 5);
        println!(
            "Metrics: diameter {} hops, avg path {:.2}, avg degree {:.2}, \
             clustering {:.4}/{:.4}, density {:.6} in {:.1}ms",
            m.diameter,
            m.average_path_length,
            m.average_degree,
            m.average_local_clustering,
            m.global_clustering,
            m.density,
            ms(t)
        );
    } else {
        println!("Metrics: skipped above {PATH_METRICS_LIMIT} nodes");
    }

    let t = Instant::now();
    let sampled = empirical_betweenness(&graph, args.runs, Some(args.seed), model);
    println!(
        "Monte Carlo centrality: {} runs, avg {:.5}, top {} in {:.1}ms",
        sampled.runs,
        sampled.average,
        key_label(&graph, sampled.most_central),
        ms(t)
    );

    if args.nodes <= EXACT_CENTRALITY_LIMIT {
        let t = Instant::now();
        let exact = exact_betweenness(&graph, model);
        println!(
            "Exact centrality: avg {:.5}, top {} in {:.1}ms",
            exact.average,
            key_label(&graph, exact.most_central),
            ms(t)
        );
    } else {
        println!("Exact centrality: skipped above {EXACT_CENTRALITY_LIMIT} nodes");
    }

    let t = Instant::now();
    let bytes = serialize_topology(&graph, "bench", gossip_time().timestamp_millis())?;
    let encode_ms = ms(t);
    let t = Instant::now();
    let (restored, _) = deserialize_topology(&bytes)?;
    ensure!(
        restored.edge_count() == graph.edge_count(),
        "round trip lost channels: {} != {}",
        restored.edge_count(),
        graph.edge_count()
    );
    println!(
        "Codec: {:.1}KB, encode {:.1}ms, decode {:.1}ms",
        bytes.len() as f64 / 1024.0,
        encode_ms,
        ms(t)
    );
    println!();
    Ok(())
}

fn key_label(graph: &Graph, vertex: Option<u32>) -> String {
    match vertex.and_then(|v| graph.key_of(v)) {
        Some(key) => format!("{}..", &key[..key.len().min(12)]),
        None => "-".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Generators: deterministic per seed, emitting gossip records
// ---------------------------------------------------------------------------

fn gossip_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Synthetic gossip: one announcement per node, one update per channel,
/// fee policies drawn from a skewed distribution like mainnet's.
struct Gossip {
    rng: ChaCha8Rng,
    nodes: Vec<NodeRecord>,
    channels: Vec<ChannelRecord>,
}

impl Gossip {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            nodes: Vec::new(),
            channels: Vec::new(),
        }
    }

    fn node(&mut self, i: u64) {
        let age = self.rng.gen_range(0..3 * 24 * 3600);
        self.nodes.push(NodeRecord {
            node_id: node_key(i),
            features: String::new(),
            timestamp: gossip_time() - Duration::seconds(age),
            rgb_color: format!("#{:06x}", self.rng.gen_range(0..0x100_0000)),
            addresses: String::new(),
        });
    }

    fn channel(&mut self, a: u64, b: u64) {
        if a == b {
            return;
        }
        let block = 750_000 + self.channels.len() as u64 / 2_000;
        let tx = self.channels.len() % 2_000;
        // most nodes charge the default 1 sat base, a few charge nothing or a lot
        let base = match self.rng.gen_range(0..10) {
            0 => 0,
            1 => self.rng.gen_range(1_000..10_000),
            _ => 1_000,
        };
        let age = self.rng.gen_range(0..3 * 24 * 3600);
        self.channels.push(ChannelRecord {
            scid: format!("{block}x{tx}x0"),
            node_id_1: node_key(a),
            node_id_2: node_key(b),
            timestamp: gossip_time() - Duration::seconds(age),
            features: String::new(),
            message_flags: 1,
            channel_flags: self.rng.gen_range(0..2),
            cltv_expiry_delta: [40, 80, 144][self.rng.gen_range(0..3)],
            htlc_min_msat: 1_000,
            htlc_max_msat: self.rng.gen_range(1..100) * 10_000_000,
            fee_base_msat: base,
            fee_proportional_millionths: self.rng.gen_range(1..2_500),
            chain_hash: String::new(),
        });
    }

    fn below(&mut self, max: u64) -> u64 {
        self.rng.gen_range(0..max)
    }

    fn into_source(self) -> StaticSource {
        StaticSource::new(self.nodes, self.channels)
    }
}

fn node_key(i: u64) -> String {
    format!("02{i:064x}")
}

/// L-system fractal tree: every node spawns three children.
fn gen_lsystem(g: &mut Gossip, node_count: u64) {
    let branching = 3u64;
    g.node(0);
    let mut next_id = 1u64;
    let mut frontier = vec![0u64];
    while next_id < node_count && !frontier.is_empty() {
        let mut next_frontier = Vec::with_capacity(frontier.len() * branching as usize);
        for &parent in &frontier {
            for _ in 0..branching {
                if next_id >= node_count {
                    break;
                }
                g.node(next_id);
                g.channel(parent, next_id);
                next_frontier.push(next_id);
                next_id += 1;
            }
        }
        frontier = next_frontier;
    }
}

/// Preferential attachment by sampling an endpoint of a random existing channel.
fn gen_scale_free(g: &mut Gossip, node_count: u64) {
    let per_node = 3u64;
    let seed = 5u64;
    let mut endpoints: Vec<u64> = Vec::with_capacity((node_count * per_node * 2) as usize);
    for i in 0..seed {
        g.node(i);
    }
    for i in 0..seed {
        for j in (i + 1)..seed {
            g.channel(i, j);
            endpoints.extend([i, j]);
        }
    }
    for new_node in seed..node_count {
        g.node(new_node);
        for _ in 0..per_node.min(new_node) {
            let target = endpoints[g.below(endpoints.len() as u64) as usize];
            if target != new_node {
                g.channel(new_node, target);
                endpoints.extend([new_node, target]);
            }
        }
    }
}

/// Watts-Strogatz: ring lattice with K neighbors per side, rewired with probability p.
fn gen_small_world(g: &mut Gossip, node_count: u64) {
    let k = 4u64;
    let p = 0.05f64;
    for i in 0..node_count {
        g.node(i);
    }
    for i in 0..node_count {
        for j in 1..=k {
            let neighbor = (i + j) % node_count;
            if g.rng.gen_bool(p) {
                let rewired = g.below(node_count);
                g.channel(i, if rewired != i { rewired } else { neighbor });
            } else {
                g.channel(i, neighbor);
            }
        }
    }
}

/// Erdos-Renyi: about five channels per node between uniform endpoints.
fn gen_random(g: &mut Gossip, node_count: u64) {
    for i in 0..node_count {
        g.node(i);
    }
    for _ in 0..node_count * 5 {
        let from = g.below(node_count);
        let to = g.below(node_count);
        g.channel(from, to);
    }
}

/// Two dense clusters joined by a chain of ten nodes; every chain link is a bridge.
fn gen_barbell(g: &mut Gossip, node_count: u64) {
    let chain_len = 10u64;
    let cluster = (node_count - chain_len) / 2;
    let per_node = 8u64.min(cluster - 1);

    for i in 0..cluster {
        g.node(i);
    }
    for i in 0..cluster {
        for _ in 0..per_node {
            let target = g.below(cluster);
            g.channel(i, target);
        }
    }

    for i in 0..chain_len {
        let id = cluster + i;
        g.node(id);
        g.channel(id - 1, id);
    }

    let b_start = cluster + chain_len;
    for i in 0..cluster {
        g.node(b_start + i);
    }
    g.channel(b_start - 1, b_start);
    for i in 0..cluster {
        for _ in 0..per_node {
            let target = g.below(cluster);
            g.channel(b_start + i, b_start + target);
        }
    }
}

/// Diffusion-limited aggregation: attach to a recent surface node, with
/// occasional long-range second channels.
fn gen_dla(g: &mut Gossip, node_count: u64) {
    let surface_max = 10_000usize;
    let mut surface: VecDeque<u64> = VecDeque::with_capacity(surface_max + 1);
    g.node(0);
    surface.push_back(0);

    for new_node in 1..node_count {
        g.node(new_node);
        let attach_to = surface[g.below(surface.len() as u64) as usize];
        g.channel(new_node, attach_to);

        if g.below(10) == 0 && new_node > 1 {
            let other = g.below(new_node);
            if other != attach_to {
                g.channel(new_node, other);
            }
        }

        surface.push_back(new_node);
        if surface.len() > surface_max {
            surface.pop_front();
        }
    }
}
