//! Binary snapshot format for a constructed graph.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic "LNGT" | version u16
//! graph name (u32 len + utf8) | created_at unix millis i64 | vertex count u32 | edge count u32
//! per vertex, in ascending handle order:
//!     key (u32 len + utf8) | edge count u32
//!     per edge: scid (u32 len + utf8) | target index u32 | flags u8
//!               [fee base_msat u64 | fee proportional_millionths u64]   if flags & 1
//!               [stored cost f64]                                       if flags & 2
//! crc32 of every preceding byte
//! ```
//!
//! Each undirected channel is written once, under its lower-index endpoint.
//! Vertex indices are positions in the file, so decoding compacts handles.

use crate::error::{GraphError, Result};
use crate::graph::{FeeWeight, Graph, VertexId};

pub const TOPOLOGY_MAGIC: [u8; 4] = *b"LNGT";
pub const TOPOLOGY_VERSION: u16 = 1;

const FLAG_FEE: u8 = 0x01;
const FLAG_COST: u8 = 0x02;

/// Smallest possible encoded vertex: empty key plus edge count.
const MIN_VERTEX_BYTES: usize = 8;

/// Smallest possible encoded edge: empty scid, target index and flags.
const MIN_EDGE_BYTES: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyMetadata {
    pub graph_name: String,
    pub created_at_ms: i64,
    pub vertex_count: u32,
    pub edge_count: u32,
}

fn to_u32(len: usize, what: &str) -> Result<u32> {
    len.try_into()
        .map_err(|_| GraphError::Serialization(format!("{what} exceeds u32::MAX")))
}

fn write_string(buf: &mut Vec<u8>, value: &str, what: &str) -> Result<()> {
    let bytes = value.as_bytes();
    buf.extend_from_slice(&to_u32(bytes.len(), what)?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Encode `graph` with its metadata header and trailing checksum.
pub fn serialize_topology(graph: &Graph, graph_name: &str, created_at_ms: i64) -> Result<Vec<u8>> {
    let vertices: Vec<VertexId> = graph.vertices().collect();
    let mut index_of = vec![u32::MAX; graph.slot_count()];
    for (i, &v) in vertices.iter().enumerate() {
        index_of[v as usize] = to_u32(i, "vertex index")?;
    }

    let mut buf = Vec::with_capacity(64 + vertices.len() * 80 + graph.edge_count() * 48);
    buf.extend_from_slice(&TOPOLOGY_MAGIC);
    buf.extend_from_slice(&TOPOLOGY_VERSION.to_le_bytes());
    write_string(&mut buf, graph_name, "graph name length")?;
    buf.extend_from_slice(&created_at_ms.to_le_bytes());
    buf.extend_from_slice(&to_u32(vertices.len(), "vertex count")?.to_le_bytes());
    buf.extend_from_slice(&to_u32(graph.edge_count(), "edge count")?.to_le_bytes());

    let mut outgoing: Vec<(u32, VertexId)> = Vec::new();
    for (i, &v) in vertices.iter().enumerate() {
        write_string(&mut buf, graph.key_of(v).unwrap_or_default(), "vertex key length")?;

        outgoing.clear();
        outgoing.extend(
            graph
                .neighbors(v)
                .map(|n| (index_of[n as usize], n))
                .filter(|&(idx, _)| idx as usize > i),
        );
        outgoing.sort_unstable();
        buf.extend_from_slice(&to_u32(outgoing.len(), "edge count")?.to_le_bytes());

        for &(target, n) in &outgoing {
            let Some(edge) = graph.edge(v, n) else {
                return Err(GraphError::Serialization(format!(
                    "adjacency lists {v} - {n} without an edge payload"
                )));
            };
            write_string(&mut buf, graph.scid_name(edge.scid).unwrap_or_default(), "scid length")?;
            buf.extend_from_slice(&target.to_le_bytes());

            let mut flags = 0u8;
            if edge.fee.is_some() {
                flags |= FLAG_FEE;
            }
            if edge.cost.is_some() {
                flags |= FLAG_COST;
            }
            buf.push(flags);
            if let Some(fee) = edge.fee {
                buf.extend_from_slice(&fee.base_msat.to_le_bytes());
                buf.extend_from_slice(&fee.proportional_millionths.to_le_bytes());
            }
            if let Some(cost) = edge.cost {
                buf.extend_from_slice(&cost.to_le_bytes());
            }
        }
    }

    let checksum = crc32fast::hash(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

/// Split off and verify the checksum, returning the covered body.
fn verified_body(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < TOPOLOGY_MAGIC.len() + 2 + 4 {
        return Err(GraphError::Deserialization("payload too short".into()));
    }
    let (body, tail) = bytes.split_at(bytes.len() - 4);
    let mut stored = [0u8; 4];
    stored.copy_from_slice(tail);
    let stored = u32::from_le_bytes(stored);
    let actual = crc32fast::hash(body);
    if stored != actual {
        return Err(GraphError::Deserialization(format!(
            "checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
        )));
    }
    Ok(body)
}

fn read_header(cursor: &mut Cursor<'_>) -> Result<TopologyMetadata> {
    let magic: [u8; 4] = cursor.read_array()?;
    if magic != TOPOLOGY_MAGIC {
        return Err(GraphError::Deserialization(
            "not a topology snapshot (bad magic)".into(),
        ));
    }
    let version = u16::from_le_bytes(cursor.read_array()?);
    if version != TOPOLOGY_VERSION {
        return Err(GraphError::Deserialization(format!(
            "unsupported schema version {version}, expected {TOPOLOGY_VERSION}"
        )));
    }
    Ok(TopologyMetadata {
        graph_name: cursor.read_string()?,
        created_at_ms: i64::from_le_bytes(cursor.read_array()?),
        vertex_count: cursor.read_u32()?,
        edge_count: cursor.read_u32()?,
    })
}

/// Decode only the metadata header (checksum still verified).
pub fn read_metadata(bytes: &[u8]) -> Result<TopologyMetadata> {
    let body = verified_body(bytes)?;
    read_header(&mut Cursor::new(body))
}

/// Rebuild a graph from its encoded form.
pub fn deserialize_topology(bytes: &[u8]) -> Result<(Graph, TopologyMetadata)> {
    let body = verified_body(bytes)?;
    let mut cursor = Cursor::new(body);
    let meta = read_header(&mut cursor)?;

    let vertex_count = meta.vertex_count as usize;
    if vertex_count > cursor.remaining() / MIN_VERTEX_BYTES {
        return Err(GraphError::Deserialization(format!(
            "vertex count {vertex_count} does not fit in {} remaining bytes",
            cursor.remaining()
        )));
    }
    let edge_count = meta.edge_count as usize;
    if edge_count > cursor.remaining() / MIN_EDGE_BYTES {
        return Err(GraphError::Deserialization(format!(
            "edge count {edge_count} does not fit in {} remaining bytes",
            cursor.remaining()
        )));
    }

    // Keys come first in each vertex record but edges may point forward, so
    // the edge list is staged until every vertex exists.
    let mut graph = Graph::with_capacity(vertex_count, edge_count);
    let mut handles: Vec<VertexId> = Vec::with_capacity(vertex_count);
    let mut staged: Vec<(u32, String, u32, Option<FeeWeight>, Option<f64>)> = Vec::new();

    for index in 0..meta.vertex_count {
        let key = cursor.read_string()?;
        if graph.handle_of(&key).is_some() {
            return Err(GraphError::Deserialization(format!(
                "duplicate vertex key '{key}'"
            )));
        }
        handles.push(graph.add_vertex(&key));

        let edges = cursor.read_u32()?;
        for _ in 0..edges {
            let scid = cursor.read_string()?;
            let target = cursor.read_u32()?;
            let flags = cursor.read_array::<1>()?[0];
            if flags & !(FLAG_FEE | FLAG_COST) != 0 {
                return Err(GraphError::Deserialization(format!(
                    "unknown edge flags {flags:#04x}"
                )));
            }
            let fee = if flags & FLAG_FEE != 0 {
                Some(FeeWeight::new(cursor.read_u64()?, cursor.read_u64()?))
            } else {
                None
            };
            let cost = if flags & FLAG_COST != 0 {
                Some(f64::from_le_bytes(cursor.read_array()?))
            } else {
                None
            };
            staged.push((index, scid, target, fee, cost));
        }
    }
    cursor.ensure_consumed()?;

    if staged.len() != meta.edge_count as usize {
        return Err(GraphError::Deserialization(format!(
            "header declares {} edges, payload holds {}",
            meta.edge_count,
            staged.len()
        )));
    }

    for (from, scid, to, fee, cost) in staged {
        let (Some(&a), Some(&b)) = (handles.get(from as usize), handles.get(to as usize)) else {
            return Err(GraphError::Deserialization(format!(
                "edge {scid} targets vertex index {to} of {}",
                handles.len()
            )));
        };
        if graph.has_edge(a, b) {
            return Err(GraphError::Deserialization(format!(
                "duplicate edge {scid} between vertex indices {from} and {to}"
            )));
        }
        let inserted = match fee {
            Some(fee) => graph.add_channel(a, b, &scid, fee, cost),
            None => graph.add_edge(a, b, &scid, cost),
        };
        inserted.map_err(|e| GraphError::Deserialization(format!("edge {scid}: {e}")))?;
    }

    Ok((graph, meta))
}

struct Cursor<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(GraphError::Deserialization(
                "unexpected end of payload".into(),
            ));
        }
        let start = self.index;
        self.index += len;
        Ok(&self.data[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GraphError::Deserialization("invalid UTF-8 string".into()))
    }

    fn ensure_consumed(&self) -> Result<()> {
        if self.index != self.data.len() {
            return Err(GraphError::Deserialization(
                "unexpected trailing bytes in payload".into(),
            ));
        }
        Ok(())
    }
}
