//! Gossip records as served by the historical data stores.

use chrono::{DateTime, Utc};
use lngraph_core::{EdgeInput, FeeWeight};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A `node_announcement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Hex-encoded 33-byte public key.
    pub node_id: String,
    #[serde(default)]
    pub features: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub rgb_color: String,
    #[serde(default)]
    pub addresses: String,
}

/// A `channel_announcement` joined with its latest `channel_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub scid: String,
    pub node_id_1: String,
    pub node_id_2: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub message_flags: u8,
    #[serde(default)]
    pub channel_flags: u8,
    #[serde(default)]
    pub cltv_expiry_delta: u16,
    #[serde(default)]
    pub htlc_min_msat: u64,
    #[serde(default)]
    pub htlc_max_msat: u64,
    pub fee_base_msat: u64,
    pub fee_proportional_millionths: u64,
    #[serde(default)]
    pub chain_hash: String,
}

impl ChannelRecord {
    pub fn fee(&self) -> FeeWeight {
        FeeWeight::new(self.fee_base_msat, self.fee_proportional_millionths)
    }

    pub fn is_self_loop(&self) -> bool {
        self.node_id_1 == self.node_id_2
    }

    /// Edge input for the engine, with its cost priced at `payment_size_sat`.
    pub fn to_edge_input(&self, payment_size_sat: u64) -> EdgeInput {
        let fee = self.fee();
        EdgeInput {
            from: self.node_id_1.clone(),
            to: self.node_id_2.clone(),
            scid: self.scid.clone(),
            fee: Some(fee),
            cost: Some(fee.cost(payment_size_sat)),
        }
    }
}

pub fn parse_nodes_json(text: &str) -> Result<Vec<NodeRecord>, SourceError> {
    Ok(serde_json::from_str(text)?)
}

pub fn parse_channels_json(text: &str) -> Result<Vec<ChannelRecord>, SourceError> {
    Ok(serde_json::from_str(text)?)
}
