use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for building, caching and analysing snapshots.
///
/// Every field has a default; a TOML file only needs to name what it changes.
/// Integer settings carry an allowed range checked by [`SnapshotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Prefix of every cached object name.
    pub graph_name: String,
    /// Object-store bucket holding serialized snapshots.
    pub bucket: String,
    /// Width of the gossip window ending at the requested timestamp.
    pub timespan_days: u32,
    /// Payment size used to price channel fees into edge costs.
    pub payment_size_sat: u64,
    /// Length of the degree ranking in network metrics.
    pub top_k: usize,
    pub monte_carlo_runs: usize,
    /// Fixed seed for sampled centrality. Unset draws from OS entropy.
    pub monte_carlo_seed: Option<u64>,
    /// Per-snapshot memory cap; construction fails above it.
    pub max_memory_mb: usize,
    /// Vertex slots reserved up front when constructing a snapshot.
    pub initial_capacity: usize,
}

pub const DEFAULT_TIMESPAN_DAYS: u32 = 14;
pub const DEFAULT_PAYMENT_SIZE_SAT: u64 = 10_000;

const TIMESPAN_DAYS_RANGE: (u64, u64) = (1, 365);
const MONTE_CARLO_RUNS_RANGE: (u64, u64) = (1, 10_000_000);
// 128 GB ceiling
const MAX_MEMORY_MB_RANGE: (u64, u64) = (64, 131_072);

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            graph_name: "ln".to_string(),
            bucket: "lightning-fast-graphs".to_string(),
            timespan_days: DEFAULT_TIMESPAN_DAYS,
            payment_size_sat: DEFAULT_PAYMENT_SIZE_SAT,
            top_k: lngraph_core::DEFAULT_TOP_K,
            monte_carlo_runs: lngraph_core::DEFAULT_MONTE_CARLO_RUNS,
            monte_carlo_seed: None,
            max_memory_mb: 4096,
            initial_capacity: 16_384,
        }
    }
}

impl SnapshotConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph_name.is_empty() {
            return Err(ConfigError::Empty("graph_name"));
        }
        if self.bucket.is_empty() {
            return Err(ConfigError::Empty("bucket"));
        }
        check_range("timespan_days", self.timespan_days as u64, TIMESPAN_DAYS_RANGE)?;
        check_range(
            "monte_carlo_runs",
            self.monte_carlo_runs as u64,
            MONTE_CARLO_RUNS_RANGE,
        )?;
        check_range("max_memory_mb", self.max_memory_mb as u64, MAX_MEMORY_MB_RANGE)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
