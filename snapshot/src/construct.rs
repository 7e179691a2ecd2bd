use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use lngraph_core::{EdgeInput, Graph};
use tracing::{debug, info};

use crate::config::SnapshotConfig;
use crate::error::{Result, ServiceError};
use crate::source::GossipSource;

/// Counters from one window construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructionReport {
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub node_records: usize,
    pub channel_records: usize,
    /// Channels with an endpoint not announced inside the window.
    pub dropped_unannounced: usize,
    pub dropped_self_loops: usize,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub memory_bytes: usize,
    pub duration_ms: f64,
}

/// Build the topology seen by gossip in `[end - timespan_days, end]`.
///
/// Nodes go in first; channels whose endpoints were both announced in the
/// window follow in timestamp order, so the latest update for a node pair
/// sets its fee policy. Channel costs are priced at `payment_size_sat`.
pub fn construct_window<S>(
    source: &S,
    end: DateTime<Utc>,
    config: &SnapshotConfig,
) -> Result<(Graph, ConstructionReport)>
where
    S: GossipSource + ?Sized,
{
    let started = Instant::now();
    let start = end - Duration::days(config.timespan_days as i64);
    info!(%start, %end, "snapshot.construct.started");

    let nodes = source.nodes_in_window(start, end)?;
    let mut channels = source.channels_in_window(start, end)?;

    let mut report = ConstructionReport {
        window_start: Some(start),
        window_end: Some(end),
        node_records: nodes.len(),
        channel_records: channels.len(),
        ..Default::default()
    };

    let mut graph = Graph::with_capacity(config.initial_capacity.max(nodes.len()), channels.len());
    graph.add_vertices_batch(nodes.iter().map(|n| n.node_id.as_str()));

    channels.sort_by_key(|c| c.timestamp);
    let mut edges: Vec<EdgeInput> = Vec::with_capacity(channels.len());
    for channel in &channels {
        if channel.is_self_loop() {
            report.dropped_self_loops += 1;
            continue;
        }
        if graph.handle_of(&channel.node_id_1).is_none()
            || graph.handle_of(&channel.node_id_2).is_none()
        {
            report.dropped_unannounced += 1;
            continue;
        }
        edges.push(channel.to_edge_input(config.payment_size_sat));
    }
    if report.dropped_unannounced > 0 || report.dropped_self_loops > 0 {
        debug!(
            unannounced = report.dropped_unannounced,
            self_loops = report.dropped_self_loops,
            "snapshot.construct.channels_dropped"
        );
    }
    graph.add_edges_batch(&edges)?;

    let memory_bytes = graph.memory_usage();
    let used_mb = memory_bytes / (1024 * 1024);
    if used_mb > config.max_memory_mb {
        return Err(ServiceError::MemoryLimit {
            used_mb,
            max_mb: config.max_memory_mb,
        });
    }

    report.vertex_count = graph.vertex_count();
    report.edge_count = graph.edge_count();
    report.memory_bytes = memory_bytes;
    report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(
        vertices = report.vertex_count,
        edges = report.edge_count,
        dropped = report.dropped_unannounced + report.dropped_self_loops,
        memory_bytes,
        duration_ms = report.duration_ms,
        "snapshot.construct.completed"
    );
    Ok((graph, report))
}
