//! Index-based text API over `RgaTreeSplit`.
//!
//! Editor bindings think in flat character indexes, the core thinks in
//! positions. `Text` converts between the two and rejects caller mistakes
//! with an `RgaError` before they reach the core, which would panic.

use std::fmt;

use tracing::debug;

use super::primitives::NodePos;
use super::primitives::TimeTicket;
use super::rga_split::ContentChange;
use super::rga_split::LatestCreatedAtMap;
use super::rga_split::RgaTreeSplit;
use crate::error::Result;
use crate::error::RgaError;
use crate::key::Hash;

/// Result of `Text::edit`: the deleted-creation map, the flat changes and
/// the caret as a collapsed range.
pub type EditResult = (LatestCreatedAtMap, Vec<ContentChange>, (NodePos, NodePos));

#[derive(Clone)]
pub struct Text {
    created_at: TimeTicket,
    rga: RgaTreeSplit,
}

impl Text {
    /// Create an empty text element created at `created_at`.
    pub fn new(created_at: TimeTicket) -> Text {
        return Text {
            created_at,
            rga: RgaTreeSplit::new(),
        };
    }

    pub fn created_at(&self) -> TimeTicket {
        return self.created_at;
    }

    pub fn rga(&self) -> &RgaTreeSplit {
        return &self.rga;
    }

    pub fn len(&self) -> usize {
        return self.rga.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.rga.is_empty();
    }

    /// Positions for the flat range `from..to`.
    pub fn create_range(&mut self, from: usize, to: usize) -> Result<(NodePos, NodePos)> {
        if from > to {
            debug!(from, to, "rejected inverted range");
            return Err(RgaError::InvalidRange { from, to });
        }
        let len = self.len();
        if to > len {
            debug!(to, len, "rejected range past the end");
            return Err(RgaError::IndexOutOfRange { index: to, len });
        }

        let from_pos = self.rga.find_node_pos(from)?;
        if from == to {
            return Ok((from_pos, from_pos));
        }
        let to_pos = self.rga.find_node_pos(to)?;
        return Ok((from_pos, to_pos));
    }

    /// Replace `range` with `content` at `edited_at`.
    ///
    /// Local edits pass `None` for the map. Replays of a remote edit pass the
    /// map its author got back, which limits what the replay may delete.
    /// A range whose start resolves past its end is rejected.
    pub fn edit(
        &mut self,
        range: (NodePos, NodePos),
        content: &str,
        edited_at: TimeTicket,
        latest_created_at_map: Option<&LatestCreatedAtMap>,
    ) -> Result<EditResult> {
        for pos in [&range.0, &range.1] {
            if !self.rga.contains_pos(pos) {
                debug!(id = %pos.id, offset = pos.relative_offset, "rejected unknown position");
                return Err(RgaError::UnknownNode(pos.id));
            }
        }
        if range.0 != range.1 {
            let from = self.rga.find_idx_from_node_pos(&range.0, true)?;
            let to = self.rga.find_idx_from_node_pos(&range.1, true)?;
            if from > to {
                debug!(from, to, "rejected inverted positions");
                return Err(RgaError::InvalidRange { from, to });
            }
        }

        let (caret, deleted_map, changes) =
            self.rga.edit(range, edited_at, Some(content), latest_created_at_map);
        return Ok((deleted_map, changes, (caret, caret)));
    }

    /// Replace the flat range `from..to` with `content`, as a local edit.
    pub fn edit_by_index(
        &mut self,
        from: usize,
        to: usize,
        content: &str,
        edited_at: TimeTicket,
    ) -> Result<EditResult> {
        let range = self.create_range(from, to)?;
        return self.edit(range, content, edited_at, None);
    }

    pub fn pos_range_to_index_range(&self, range: &(NodePos, NodePos)) -> Result<(usize, usize)> {
        return self.rga.find_indexes_from_range(range);
    }

    pub fn index_range_to_pos_range(&mut self, from: usize, to: usize) -> Result<(NodePos, NodePos)> {
        return self.create_range(from, to);
    }

    /// The visible text as a JSON string literal.
    pub fn to_json(&self) -> String {
        return self.rga.to_json();
    }

    pub fn removed_nodes_len(&self) -> usize {
        return self.rga.removed_nodes_len();
    }

    /// Purge tombstones removed at or before `ticket`. Returns the count.
    pub fn purge_removed_nodes_before(&mut self, ticket: &TimeTicket) -> usize {
        return self.rga.purge_nodes_with_garbage(ticket);
    }

    pub fn deepcopy(&self) -> Text {
        return Text {
            created_at: self.created_at,
            rga: self.rga.deepcopy(),
        };
    }

    pub fn check_weight(&self) -> bool {
        return self.rga.check_weight();
    }

    /// Digest of the visible content. Replicas that converged agree on it.
    pub fn hash(&self) -> Hash {
        return crate::key::hash(self.to_string().as_bytes());
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return fmt::Display::fmt(&self.rga, f);
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("Text")
            .field("created_at", &self.created_at)
            .field("rga", &self.rga)
            .finish();
    }
}
