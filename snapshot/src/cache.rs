use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use crate::error::CacheError;

/// Blob storage for serialized snapshots, addressed by bucket and object name.
pub trait ObjectStore: Send + Sync {
    fn exists(&self, bucket: &str, object: &str) -> Result<bool, CacheError>;

    /// `Ok(None)` when the object is absent.
    fn get(&self, bucket: &str, object: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn put(&self, bucket: &str, object: &str, bytes: Vec<u8>) -> Result<(), CacheError>;
}

/// Object name for the snapshot of `graph_name` at `timestamp`.
///
/// `ln` at 2024-01-01T00:00:00Z becomes `ln-2024-01-01T00-00-00_000000Z.bin`.
pub fn object_name(graph_name: &str, timestamp: DateTime<Utc>) -> String {
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Micros, true)
        .replace(':', "-")
        .replace('.', "_");
    format!("{graph_name}-{stamp}.bin")
}

/// Process-local object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    pub fn remove(&self, bucket: &str, object: &str) -> bool {
        self.objects
            .lock()
            .remove(&(bucket.to_string(), object.to_string()))
            .is_some()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn exists(&self, bucket: &str, object: &str) -> Result<bool, CacheError> {
        Ok(self
            .objects
            .lock()
            .contains_key(&(bucket.to_string(), object.to_string())))
    }

    fn get(&self, bucket: &str, object: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self
            .objects
            .lock()
            .get(&(bucket.to_string(), object.to_string()))
            .cloned())
    }

    fn put(&self, bucket: &str, object: &str, bytes: Vec<u8>) -> Result<(), CacheError> {
        self.objects
            .lock()
            .insert((bucket.to_string(), object.to_string()), bytes);
        Ok(())
    }
}
