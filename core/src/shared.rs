use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::graph::{EdgeInput, FeeWeight, Graph, VertexId};

/// A [`Graph`] behind a reader-writer lock, shareable across threads.
///
/// Every mutation takes the exclusive lock; every query takes the shared one.
/// Shared acquisition is recursive, so a thread already holding a read guard
/// (for example inside [`SharedGraph::with_snapshot`]) may query again
/// without deadlocking behind a queued writer.
///
/// Analyses should not hop between lock acquisitions: run them inside
/// `with_snapshot`, or on the immutable copy returned by `freeze`.
#[derive(Debug, Default)]
pub struct SharedGraph {
    inner: RwLock<Graph>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: RwLock::new(graph),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.inner.read_recursive()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Graph> {
        self.inner.write()
    }

    /// Run `f` against one consistent view; no mutation can interleave.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        let guard = self.read();
        f(&guard)
    }

    /// Run a batch of mutations under a single exclusive guard.
    pub fn update<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        let mut guard = self.write();
        f(&mut guard)
    }

    /// Immutable copy of the current state, detached from the lock.
    pub fn freeze(&self) -> Arc<Graph> {
        Arc::new(self.read().clone())
    }

    pub fn into_inner(self) -> Graph {
        self.inner.into_inner()
    }

    pub fn add_vertex(&self, key: &str) -> VertexId {
        self.write().add_vertex(key)
    }

    pub fn remove_vertex(&self, id: VertexId) -> bool {
        self.write().remove_vertex(id)
    }

    pub fn add_edge(
        &self,
        from: VertexId,
        to: VertexId,
        scid: &str,
        cost: Option<f64>,
    ) -> Result<()> {
        self.write().add_edge(from, to, scid, cost)
    }

    pub fn add_channel(
        &self,
        from: VertexId,
        to: VertexId,
        scid: &str,
        fee: FeeWeight,
        cost: Option<f64>,
    ) -> Result<()> {
        self.write().add_channel(from, to, scid, fee, cost)
    }

    pub fn remove_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.write().remove_edge(from, to)
    }

    pub fn add_vertices_batch<I, S>(&self, keys: I) -> Vec<VertexId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.write().add_vertices_batch(keys)
    }

    pub fn add_edges_batch(&self, edges: &[EdgeInput]) -> Result<usize> {
        self.write().add_edges_batch(edges)
    }

    pub fn vertex_exists(&self, id: VertexId) -> bool {
        self.read().vertex_exists(id)
    }

    /// Neighbors copied out, since the borrow cannot outlive the guard.
    pub fn neighbors(&self, id: VertexId) -> Vec<VertexId> {
        self.read().neighbors(id).collect()
    }

    pub fn edge_cost(&self, a: VertexId, b: VertexId) -> Option<f64> {
        self.read().edge_cost(a, b)
    }

    pub fn handle_of(&self, key: &str) -> Option<VertexId> {
        self.read().handle_of(key)
    }

    pub fn vertex_count(&self) -> usize {
        self.read().vertex_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }
}

impl From<Graph> for SharedGraph {
    fn from(graph: Graph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_freeze_is_detached() {
        let shared = SharedGraph::default();
        let ids = shared.add_vertices_batch(["a", "b"]);
        shared.add_edge(ids[0], ids[1], "1x1x0", None).unwrap();

        let frozen = shared.freeze();
        shared.remove_edge(ids[0], ids[1]);
        assert_eq!(frozen.edge_count(), 1);
        assert_eq!(shared.edge_count(), 0);
    }

    #[test]
    fn test_recursive_read_inside_snapshot() {
        let shared = SharedGraph::new(Graph::new());
        shared.add_vertex("a");
        let count = shared.with_snapshot(|g| g.vertex_count() + shared.vertex_count());
        assert_eq!(count, 2);
    }

    #[test]
    fn test_concurrent_writers_keep_symmetry() {
        let shared = Arc::new(SharedGraph::default());
        let hub = shared.add_vertex("hub");
        let workers: Vec<_> = (0..4)
            .map(|t| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("w{t}-{i}");
                        let v = shared.add_vertex(&key);
                        shared.add_edge(hub, v, &key, Some(1.0)).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        shared.with_snapshot(|g| {
            assert_eq!(g.vertex_count(), 201);
            assert_eq!(g.degree(hub), 200);
            for v in g.neighbors(hub) {
                assert_eq!(g.neighbors(v).collect::<Vec<_>>(), vec![hub]);
            }
        });
    }

    #[test]
    fn test_update_runs_batch_under_one_guard() {
        let shared = SharedGraph::default();
        let added = shared.update(|g| {
            let ids = g.add_vertices_batch(["x", "y", "z"]);
            g.add_edge(ids[0], ids[1], "a", None).unwrap();
            g.add_edge(ids[1], ids[2], "b", None).unwrap();
            g.edge_count()
        });
        assert_eq!(added, 2);
        assert_eq!(shared.neighbors(1), vec![0, 2]);
    }
}
