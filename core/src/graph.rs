use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::pool::{NeighborPool, INITIAL_NEIGHBOR_CAPACITY};

/// Dense internal vertex handle. Recycled through the free-list on removal.
pub type VertexId = u32;

/// Interned short channel id (avoids storing duplicate scid strings per edge).
pub type ScidId = u32;

/// Channel fee policy as announced in gossip `channel_update` messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeWeight {
    pub base_msat: u64,
    pub proportional_millionths: u64,
}

impl FeeWeight {
    pub fn new(base_msat: u64, proportional_millionths: u64) -> Self {
        Self {
            base_msat,
            proportional_millionths,
        }
    }

    /// Routing cost in satoshis for forwarding `payment_size_sat` over this channel.
    pub fn cost(&self, payment_size_sat: u64) -> f64 {
        self.base_msat as f64 / 1000.0
            + (payment_size_sat as f64 / 1_000_000.0) * self.proportional_millionths as f64
    }
}

/// Payload stored once per unordered vertex pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeData {
    pub scid: ScidId,
    pub cost: Option<f64>,
    pub fee: Option<FeeWeight>,
}

/// One edge of a key-addressed batch insert.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeInput {
    pub from: String,
    pub to: String,
    pub scid: String,
    pub fee: Option<FeeWeight>,
    pub cost: Option<f64>,
}

/// Pack an unordered pair into one key: min handle in the high half, max in the low half.
#[inline]
pub fn pack_edge_key(a: VertexId, b: VertexId) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

#[inline]
pub fn unpack_edge_key(key: u64) -> (VertexId, VertexId) {
    ((key >> 32) as VertexId, (key & 0xFFFF_FFFF) as VertexId)
}

/// Lazy, finite, restartable (`Clone`) sequence of a vertex's neighbors.
#[derive(Debug, Clone)]
pub struct Neighbors<'a> {
    inner: std::iter::Copied<std::slice::Iter<'a, VertexId>>,
}

impl Iterator for Neighbors<'_> {
    type Item = VertexId;

    fn next(&mut self) -> Option<VertexId> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Neighbors<'_> {}

/// Arena-indexed undirected graph of Lightning nodes and channels.
///
/// Vertices live in dense slots addressed by `VertexId`; a slot holds the
/// vertex's pooled neighbor buffer while the vertex is live and `None` after
/// removal, when the handle sits on the free-list. Each channel is stored in
/// both neighbor buffers and once in the edge table under its packed pair key.
///
/// All mutation takes `&mut self`; see [`crate::SharedGraph`] for the locked,
/// shareable wrapper.
#[derive(Debug)]
pub struct Graph {
    adjacency: Vec<Option<Vec<VertexId>>>,
    keys: Vec<Option<Arc<str>>>,
    handles: FxHashMap<Arc<str>, VertexId>,
    edges: FxHashMap<u64, EdgeData>,
    free_list: Vec<VertexId>,
    pool: NeighborPool,
    scids: Vec<Arc<str>>,
    scid_index: FxHashMap<Arc<str>, ScidId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Pre-allocate for a known graph size. Table sizes round up to powers of two.
    pub fn with_capacity(vertex_count: usize, edge_count: usize) -> Self {
        let vcap = if vertex_count == 0 {
            0
        } else {
            vertex_count.next_power_of_two()
        };
        let ecap = if edge_count == 0 {
            0
        } else {
            edge_count.next_power_of_two()
        };
        Self {
            adjacency: Vec::with_capacity(vcap),
            keys: Vec::with_capacity(vcap),
            handles: FxHashMap::with_capacity_and_hasher(vcap, Default::default()),
            edges: FxHashMap::with_capacity_and_hasher(ecap, Default::default()),
            free_list: Vec::new(),
            pool: NeighborPool::new(),
            scids: Vec::new(),
            scid_index: FxHashMap::default(),
        }
    }

    /// Grow the slot tables to hold at least `required` handles, doubling in
    /// power-of-two steps.
    fn ensure_capacity(&mut self, required: usize) {
        if required > self.adjacency.capacity() {
            let target = required.next_power_of_two();
            self.adjacency.reserve_exact(target - self.adjacency.len());
            self.keys.reserve_exact(target - self.keys.len());
        }
    }

    fn ensure_edge_capacity(&mut self, additional: usize) {
        let required = self.edges.len() + additional;
        if required > self.edges.capacity() {
            self.edges
                .reserve(required.next_power_of_two() - self.edges.len());
        }
    }

    /// Intern a short channel id string, returning its compact ID.
    pub fn intern_scid(&mut self, scid: &str) -> ScidId {
        if let Some(&id) = self.scid_index.get(scid) {
            return id;
        }
        let id = self.scids.len() as ScidId;
        let name: Arc<str> = Arc::from(scid);
        self.scids.push(name.clone());
        self.scid_index.insert(name, id);
        id
    }

    /// Resolve a ScidId back to its string, or None if out of range.
    pub fn scid_name(&self, id: ScidId) -> Option<&str> {
        self.scids.get(id as usize).map(|s| s.as_ref())
    }

    // -----------------------------------------------------------------------
    // Vertices
    // -----------------------------------------------------------------------

    /// Insert a vertex for `key`, or return the existing handle unchanged.
    pub fn add_vertex(&mut self, key: &str) -> VertexId {
        if let Some(&existing) = self.handles.get(key) {
            return existing;
        }

        let buf = self.pool.rent(INITIAL_NEIGHBOR_CAPACITY);
        let key: Arc<str> = Arc::from(key);
        let id = match self.free_list.pop() {
            Some(id) => {
                self.adjacency[id as usize] = Some(buf);
                self.keys[id as usize] = Some(key.clone());
                id
            }
            None => {
                let id = self.adjacency.len() as VertexId;
                self.ensure_capacity(self.adjacency.len() + 1);
                self.adjacency.push(Some(buf));
                self.keys.push(Some(key.clone()));
                id
            }
        };
        self.handles.insert(key, id);
        id
    }

    /// Insert many vertices, sizing the tables once up front.
    pub fn add_vertices_batch<I, S>(&mut self, keys: I) -> Vec<VertexId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys.into_iter();
        let (lower, _) = keys.size_hint();
        self.ensure_capacity(self.adjacency.len() + lower.saturating_sub(self.free_list.len()));
        self.handles.reserve(lower);

        keys.map(|k| self.add_vertex(k.as_ref())).collect()
    }

    /// Remove a vertex and every incident edge. The neighbor buffer goes back
    /// to the pool and the handle to the free-list. Returns false if the handle
    /// is not live.
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        let Some(buf) = self.adjacency.get_mut(id as usize).and_then(Option::take) else {
            return false;
        };

        for &neighbor in &buf {
            if let Some(nbuf) = self.adjacency[neighbor as usize].as_mut() {
                swap_remove_value(nbuf, id);
            }
            self.edges.remove(&pack_edge_key(id, neighbor));
        }
        self.pool.give_back(buf);

        if let Some(key) = self.keys[id as usize].take() {
            self.handles.remove(&key);
        }
        self.free_list.push(id);
        true
    }

    pub fn vertex_exists(&self, id: VertexId) -> bool {
        matches!(self.adjacency.get(id as usize), Some(Some(_)))
    }

    fn check_vertex(&self, id: VertexId) -> Result<()> {
        if self.vertex_exists(id) {
            Ok(())
        } else {
            Err(GraphError::InvalidReference(id))
        }
    }

    /// Look up a vertex handle by its node public key.
    pub fn handle_of(&self, key: &str) -> Option<VertexId> {
        self.handles.get(key).copied()
    }

    /// Node public key of a live vertex.
    pub fn key_of(&self, id: VertexId) -> Option<&str> {
        self.keys.get(id as usize)?.as_deref()
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Add (or replace the payload of) the channel between `from` and `to`.
    pub fn add_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        scid: &str,
        cost: Option<f64>,
    ) -> Result<()> {
        self.insert_edge(from, to, scid, None, cost).map(|_| ())
    }

    /// Like [`Graph::add_edge`], also recording the channel's fee policy.
    pub fn add_channel(
        &mut self,
        from: VertexId,
        to: VertexId,
        scid: &str,
        fee: FeeWeight,
        cost: Option<f64>,
    ) -> Result<()> {
        self.insert_edge(from, to, scid, Some(fee), cost).map(|_| ())
    }

    fn validate_edge(&self, from: VertexId, to: VertexId, cost: Option<f64>) -> Result<()> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }
        if let Some(c) = cost {
            if !c.is_finite() || c < 0.0 {
                return Err(GraphError::InvalidCost(c));
            }
        }
        Ok(())
    }

    /// Returns true when a new vertex pair was connected, false when an
    /// existing pair's payload was replaced.
    fn insert_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        scid: &str,
        fee: Option<FeeWeight>,
        cost: Option<f64>,
    ) -> Result<bool> {
        self.validate_edge(from, to, cost)?;

        let scid = self.intern_scid(scid);
        let key = pack_edge_key(from, to);
        let is_new = self
            .edges
            .insert(key, EdgeData { scid, cost, fee })
            .is_none();
        if is_new {
            self.push_neighbor(from, to);
            self.push_neighbor(to, from);
        }
        Ok(is_new)
    }

    fn push_neighbor(&mut self, id: VertexId, neighbor: VertexId) {
        let Some(buf) = self.adjacency[id as usize].as_mut() else {
            return;
        };
        if buf.len() == buf.capacity() {
            self.pool.grow(buf);
        }
        buf.push(neighbor);
    }

    /// Insert channels addressed by node key. Every endpoint is resolved before
    /// anything is written: one dangling endpoint rejects the whole batch and
    /// leaves the graph untouched. Returns the number of newly connected pairs.
    pub fn add_edges_batch(&mut self, edges: &[EdgeInput]) -> Result<usize> {
        let mut resolved = Vec::with_capacity(edges.len());
        for e in edges {
            let from = self
                .handle_of(&e.from)
                .ok_or_else(|| GraphError::UnknownKey(e.from.clone()))?;
            let to = self
                .handle_of(&e.to)
                .ok_or_else(|| GraphError::UnknownKey(e.to.clone()))?;
            self.validate_edge(from, to, e.cost)?;
            resolved.push((from, to));
        }

        self.ensure_edge_capacity(edges.len());
        let mut added = 0;
        for (e, &(from, to)) in edges.iter().zip(&resolved) {
            if self.insert_edge(from, to, &e.scid, e.fee, e.cost)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Remove the channel between `from` and `to`. Returns false if absent.
    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        if !self.vertex_exists(from) || !self.vertex_exists(to) {
            return false;
        }
        if self.edges.remove(&pack_edge_key(from, to)).is_none() {
            return false;
        }
        for (a, b) in [(from, to), (to, from)] {
            if let Some(buf) = self.adjacency[a as usize].as_mut() {
                swap_remove_value(buf, b);
            }
        }
        true
    }

    pub fn has_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.edges.contains_key(&pack_edge_key(a, b))
    }

    /// Full payload of the channel between two vertices.
    pub fn edge(&self, a: VertexId, b: VertexId) -> Option<&EdgeData> {
        self.edges.get(&pack_edge_key(a, b))
    }

    /// Stored routing cost of the channel, if one was supplied.
    pub fn edge_cost(&self, a: VertexId, b: VertexId) -> Option<f64> {
        self.edge(a, b).and_then(|e| e.cost)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Neighbors of a vertex. Empty for a dead handle.
    pub fn neighbors(&self, id: VertexId) -> Neighbors<'_> {
        Neighbors {
            inner: self.neighbor_slice(id).iter().copied(),
        }
    }

    pub(crate) fn neighbor_slice(&self, id: VertexId) -> &[VertexId] {
        match self.adjacency.get(id as usize) {
            Some(Some(buf)) => buf.as_slice(),
            _ => &[],
        }
    }

    pub fn degree(&self, id: VertexId) -> usize {
        self.neighbor_slice(id).len()
    }

    /// Live vertex handles in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i as VertexId)
    }

    /// Every channel once, as `(min, max, payload)`. Unordered.
    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId, &EdgeData)> + '_ {
        self.edges.iter().map(|(&k, e)| {
            let (a, b) = unpack_edge_key(k);
            (a, b, e)
        })
    }

    /// Exclusive upper bound on live handles; size for dense per-vertex arrays.
    pub fn slot_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.handles.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn scid_count(&self) -> usize {
        self.scids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let slots = self.adjacency.capacity()
            * (size_of::<Option<Vec<VertexId>>>() + size_of::<Option<Arc<str>>>());
        let neighbor_bufs: usize = self
            .adjacency
            .iter()
            .flatten()
            .map(|b| b.capacity() * size_of::<VertexId>())
            .sum();
        let key_bytes: usize = self.handles.keys().map(|k| k.len() + 16).sum();
        let index_mem = self.handles.capacity() * (size_of::<Arc<str>>() + size_of::<VertexId>());
        let edge_mem = self.edges.capacity() * (size_of::<u64>() + size_of::<EdgeData>());
        let scid_mem: usize = self.scids.iter().map(|s| s.len() + 40).sum();

        slots + neighbor_bufs + key_bytes + index_mem + edge_mem + scid_mem + self.pool.idle_bytes()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Neighbor buffers are copied at their own capacity so the clone keeps
/// power-of-two classes and can hand them back to its pool.
impl Clone for Graph {
    fn clone(&self) -> Self {
        let adjacency = self
            .adjacency
            .iter()
            .map(|slot| {
                slot.as_ref().map(|buf| {
                    let mut copy = Vec::with_capacity(buf.capacity());
                    copy.extend_from_slice(buf);
                    copy
                })
            })
            .collect();
        Self {
            adjacency,
            keys: self.keys.clone(),
            handles: self.handles.clone(),
            edges: self.edges.clone(),
            free_list: self.free_list.clone(),
            pool: self.pool.clone(),
            scids: self.scids.clone(),
            scid_index: self.scid_index.clone(),
        }
    }
}

fn swap_remove_value(buf: &mut Vec<VertexId>, value: VertexId) {
    if let Some(pos) = buf.iter().position(|&v| v == value) {
        buf.swap_remove(pos);
    }
}
