//! Identifier types for runs and positions.
//!
//! # Identifier Hierarchy
//!
//! - `NodeId`: identifies a run as `(created_at, offset)`, where `offset` is
//!   where the run starts inside the text originally inserted at `created_at`
//! - `NodePos`: a position `relative_offset` characters past the start of the
//!   run a `NodeId` named when the position was taken
//!
//! Splitting a run never changes the id of its left half, and the right half
//! gets `offset + k`. A position therefore stays meaningful after later edits
//! split its run: `NodePos::absolute_id` names the exact character, and the
//! ID index resolves it to whichever run holds that character now.

use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::ticket::TimeTicket;

/// A run identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// The ticket of the edit that inserted the original text.
    pub created_at: TimeTicket,
    /// Offset of this run within the original text, in characters.
    pub offset: usize,
}

impl NodeId {
    pub fn new(created_at: TimeTicket, offset: usize) -> NodeId {
        return NodeId { created_at, offset };
    }

    /// The id of the right half when this run is split `offset` characters in.
    pub fn split(&self, offset: usize) -> NodeId {
        return NodeId::new(self.created_at, self.offset + offset);
    }

    /// True for runs descended from the same original insert.
    pub fn has_same_created_at(&self, other: &NodeId) -> bool {
        return self.created_at == other.created_at;
    }

    pub fn to_test_string(&self) -> String {
        return format!("{}:{}", self.created_at.to_test_string(), self.offset);
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare by ticket, then by offset
        match self.created_at.cmp(&other.created_at) {
            Ordering::Equal => self.offset.cmp(&other.offset),
            other => other,
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "NodeId({})", self.to_test_string());
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.to_test_string());
    }
}

/// A position inside the text, anchored to a run id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePos {
    pub id: NodeId,
    pub relative_offset: usize,
}

impl NodePos {
    pub fn new(id: NodeId, relative_offset: usize) -> NodePos {
        return NodePos { id, relative_offset };
    }

    /// The id of the character this position points at, with the relative
    /// offset folded in.
    pub fn absolute_id(&self) -> NodeId {
        return self.id.split(self.relative_offset);
    }
}
