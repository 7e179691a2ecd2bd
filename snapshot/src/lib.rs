//! lngraph-snapshot: point-in-time Lightning Network snapshots.
//!
//! Builds a topology from the gossip seen in a time window, caches it as a
//! serialized object, and answers analyses against the loaded snapshot.
//! Snapshots are resolved memo first, then object store, then construction.

mod cache;
mod config;
mod construct;
mod error;
mod records;
mod service;
mod source;
mod state;
mod status;

pub use cache::{object_name, MemoryObjectStore, ObjectStore};
pub use config::{SnapshotConfig, DEFAULT_PAYMENT_SIZE_SAT, DEFAULT_TIMESPAN_DAYS};
pub use construct::{construct_window, ConstructionReport};
pub use error::{CacheError, ConfigError, Result, ServiceError, SourceError};
pub use records::{parse_channels_json, parse_nodes_json, ChannelRecord, NodeRecord};
pub use service::SnapshotService;
pub use source::{GossipSource, StaticSource};
pub use state::{SnapshotOrigin, SnapshotRegistry, SnapshotState};
pub use status::{collect_status, SnapshotStatus};
