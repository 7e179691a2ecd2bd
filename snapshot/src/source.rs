use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::records::{parse_channels_json, parse_nodes_json, ChannelRecord, NodeRecord};

/// Read access to historical gossip, bounded by a time window.
///
/// Both bounds are inclusive. Implementations may return the same node or
/// channel more than once when several announcements fall inside the window.
pub trait GossipSource: Send + Sync {
    fn nodes_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NodeRecord>, SourceError>;

    fn channels_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ChannelRecord>, SourceError>;
}

/// Fixed in-memory record set.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    nodes: Vec<NodeRecord>,
    channels: Vec<ChannelRecord>,
}

impl StaticSource {
    pub fn new(nodes: Vec<NodeRecord>, channels: Vec<ChannelRecord>) -> Self {
        Self { nodes, channels }
    }

    /// Build from two JSON arrays of records.
    pub fn from_json(nodes: &str, channels: &str) -> Result<Self, SourceError> {
        Ok(Self::new(parse_nodes_json(nodes)?, parse_channels_json(channels)?))
    }

    pub fn push_node(&mut self, node: NodeRecord) {
        self.nodes.push(node);
    }

    pub fn push_channel(&mut self, channel: ChannelRecord) {
        self.channels.push(channel);
    }
}

fn in_window(ts: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= ts && ts <= end
}

impl GossipSource for StaticSource {
    fn nodes_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NodeRecord>, SourceError> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| in_window(n.timestamp, start, end))
            .cloned()
            .collect())
    }

    fn channels_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ChannelRecord>, SourceError> {
        Ok(self
            .channels
            .iter()
            .filter(|c| in_window(c.timestamp, start, end))
            .cloned()
            .collect())
    }
}
