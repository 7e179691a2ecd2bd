use std::path::PathBuf;

use lngraph_core::GraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("gossip source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed gossip record: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("object store failure on {bucket}/{object}: {reason}")]
    Backend {
        bucket: String,
        object: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("snapshot uses {used_mb}MB, exceeds max_memory_mb={max_mb}MB")]
    MemoryLimit { used_mb: usize, max_mb: usize },
}

impl ServiceError {
    /// A stored snapshot that failed to decode. The service rebuilds on this.
    pub fn is_corrupt_snapshot(&self) -> bool {
        matches!(self, Self::Graph(GraphError::Deserialization(_)))
    }
}
