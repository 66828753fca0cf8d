//! Errors reported to callers of the text API.
//!
//! Only caller misuse is reported here. A broken internal invariant means a
//! prior bug left the structure inconsistent, and the core panics instead.

use thiserror::Error;

use crate::crdt::primitives::NodeId;
use crate::crdt::primitives::TimeTicket;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RgaError {
    #[error("no run was created with id {0}")]
    UnknownNode(NodeId),
    #[error("invalid range: from {from} is greater than to {to}")]
    InvalidRange { from: usize, to: usize },
    #[error("index {index} is out of range for text of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("edit at {0} is not signed by its actor")]
    InvalidSignature(TimeTicket),
}

pub type Result<T> = std::result::Result<T, RgaError>;
