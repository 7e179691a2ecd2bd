//! Pool of reusable neighbor buffers shared by every vertex of a graph.
//!
//! Buffers are bucketed by power-of-two capacity. A vertex rents the smallest
//! class that fits, and hands its buffer back when it grows into the next class
//! or is removed. Returned buffers are cleared; a recycled buffer never leaks
//! neighbors from its previous owner.

use crate::graph::VertexId;

/// Capacity of a freshly added vertex's neighbor buffer.
pub const INITIAL_NEIGHBOR_CAPACITY: usize = 4;

/// Per-class retention cap so a burst of removals cannot pin unbounded memory.
const MAX_BUFFERS_PER_CLASS: usize = 1024;

#[derive(Debug, Default)]
pub struct NeighborPool {
    /// `classes[i]` holds idle buffers with capacity exactly `1 << i`.
    classes: Vec<Vec<Vec<VertexId>>>,
    rented: usize,
    reused: usize,
}

/// Idle buffers are re-allocated at their class capacity; a derived clone
/// would hand out zero-capacity buffers.
impl Clone for NeighborPool {
    fn clone(&self) -> Self {
        let classes = self
            .classes
            .iter()
            .enumerate()
            .map(|(class, bucket)| {
                bucket
                    .iter()
                    .map(|_| Vec::with_capacity(1 << class))
                    .collect()
            })
            .collect();
        Self {
            classes,
            rented: self.rented,
            reused: self.reused,
        }
    }
}

impl NeighborPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn class_of(capacity: usize) -> usize {
        capacity.max(1).next_power_of_two().trailing_zeros() as usize
    }

    /// Rent an empty buffer with capacity of at least `min_capacity`,
    /// rounded up to a power of two.
    pub fn rent(&mut self, min_capacity: usize) -> Vec<VertexId> {
        let class = Self::class_of(min_capacity);
        self.rented += 1;
        if let Some(buf) = self.classes.get_mut(class).and_then(|c| c.pop()) {
            self.reused += 1;
            return buf;
        }
        Vec::with_capacity(1 << class)
    }

    /// Return a buffer to the pool. Buffers whose capacity is not an exact
    /// power of two (never handed out by `rent`) are dropped.
    pub fn give_back(&mut self, mut buf: Vec<VertexId>) {
        let cap = buf.capacity();
        if cap == 0 || !cap.is_power_of_two() {
            return;
        }
        buf.clear();
        let class = Self::class_of(cap);
        if self.classes.len() <= class {
            self.classes.resize_with(class + 1, Vec::new);
        }
        let bucket = &mut self.classes[class];
        if bucket.len() < MAX_BUFFERS_PER_CLASS {
            bucket.push(buf);
        }
    }

    /// Replace `buf` with a pooled buffer of twice its capacity holding the
    /// same contents. The old buffer goes back to the pool.
    pub fn grow(&mut self, buf: &mut Vec<VertexId>) {
        let mut bigger = self.rent((buf.capacity() * 2).max(INITIAL_NEIGHBOR_CAPACITY));
        bigger.extend_from_slice(buf);
        let old = std::mem::replace(buf, bigger);
        self.give_back(old);
    }

    /// Number of idle buffers currently held.
    pub fn idle_buffers(&self) -> usize {
        self.classes.iter().map(Vec::len).sum()
    }

    /// Bytes held by idle buffers.
    pub fn idle_bytes(&self) -> usize {
        self.classes
            .iter()
            .flatten()
            .map(|b| b.capacity() * std::mem::size_of::<VertexId>())
            .sum()
    }

    /// (total rents, rents served from the pool).
    pub fn stats(&self) -> (usize, usize) {
        (self.rented, self.reused)
    }
}
