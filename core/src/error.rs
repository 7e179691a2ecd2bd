use thiserror::Error;

use crate::graph::VertexId;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("invalid reference: vertex {0} does not exist")]
    InvalidReference(VertexId),
    #[error("invalid reference: no vertex with key '{0}'")]
    UnknownKey(String),
    #[error("self-loop on vertex {0} is not a channel")]
    SelfLoop(VertexId),
    #[error("invalid edge cost {0}: costs must be finite and non-negative")]
    InvalidCost(f64),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// True for both flavours of dangling endpoint (by handle or by key).
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Self::InvalidReference(_) | Self::UnknownKey(_))
    }
}
