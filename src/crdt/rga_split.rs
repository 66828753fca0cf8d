//! Split-node Replicated Growable Array.
//!
//! The text is a chain of runs. A run is a contiguous piece of one insert
//! that has not been split apart, and it is never merged back. Key design
//! decisions:
//!
//! 1. **Two indexes over one arena**: runs live in the arena owned by the
//!    position splay tree, weighted by visible length, so character offsets
//!    resolve in O(log n). An LLRB tree maps each run's `NodeId` to its arena
//!    slot, so a position taken on another replica resolves by floor lookup.
//!
//! 2. **Two linked lists**: `prev`/`next` is document order, tombstones
//!    included. `ins_prev`/`ins_next` is lineage: the run a node was split off
//!    from. Lineage lets a position that sits exactly on a split boundary
//!    resolve to the end of the left half instead of the start of the right.
//!
//! 3. **Tombstones**: a deleted run keeps its slot with zero weight until
//!    `purge_nodes_with_garbage` unlinks it. A tombstone only ever moves to a
//!    later removal ticket.
//!
//! 4. **Concurrent inserts**: an edit anchored after run `L` skips every run
//!    right of `L` created later than the edit. Newer concurrent inserts
//!    therefore stay closer to the anchor, on every replica.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;
use smallvec::smallvec;
use tracing::debug;
use tracing::trace;

use super::primitives::LlrbTree;
use super::primitives::NodeId;
use super::primitives::NodeIdx;
use super::primitives::NodePos;
use super::primitives::SplayTree;
use super::primitives::TimeTicket;
use super::primitives::Weighted;
use crate::error::Result;
use crate::error::RgaError;
use crate::key::ActorId;

/// Per-actor bound on the creation tickets an edit may delete, or per-actor
/// newest creation ticket an edit did delete.
pub type LatestCreatedAtMap = FxHashMap<ActorId, TimeTicket>;

/// One run of text.
#[derive(Clone, Debug)]
pub struct RunNode {
    id: NodeId,
    value: String,
    /// Length of `value` in characters.
    chars: usize,
    removed_at: Option<TimeTicket>,

    // Document order
    prev: Option<NodeIdx>,
    next: Option<NodeIdx>,

    // Lineage
    ins_prev: Option<NodeIdx>,
    ins_next: Option<NodeIdx>,
}

impl RunNode {
    pub fn new(id: NodeId, value: &str) -> RunNode {
        return RunNode {
            id,
            value: value.to_string(),
            chars: str_indices::chars::count(value),
            removed_at: None,
            prev: None,
            next: None,
            ins_prev: None,
            ins_next: None,
        };
    }

    pub fn id(&self) -> NodeId {
        return self.id;
    }

    pub fn created_at(&self) -> TimeTicket {
        return self.id.created_at;
    }

    pub fn value(&self) -> &str {
        return &self.value;
    }

    pub fn removed_at(&self) -> Option<TimeTicket> {
        return self.removed_at;
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        return self.removed_at.is_some();
    }

    /// Length of the stored text, tombstoned or not.
    #[inline]
    pub fn content_length(&self) -> usize {
        return self.chars;
    }

    /// Visible length: zero for tombstones.
    #[inline]
    pub fn length(&self) -> usize {
        if self.is_removed() {
            return 0;
        }
        return self.chars;
    }

    pub fn has_ins_prev(&self) -> bool {
        return self.ins_prev.is_some();
    }

    /// Whether an edit at `edited_at`, which knew this run's actor up to
    /// `latest_created_at`, may tombstone this run.
    ///
    /// The run must have existed for the editor, and an existing tombstone is
    /// only replaced by a strictly later one.
    pub fn can_delete(&self, edited_at: &TimeTicket, latest_created_at: &TimeTicket) -> bool {
        if self.created_at().after(latest_created_at) {
            return false;
        }
        return match self.removed_at {
            None => true,
            Some(removed_at) => edited_at.after(&removed_at),
        };
    }

    fn remove(&mut self, edited_at: TimeTicket) {
        self.removed_at = Some(edited_at);
    }

    /// Split off everything from character `offset` on into a new run.
    ///
    /// This run keeps its id and the prefix; the new run gets
    /// `id.split(offset)`, the suffix and the same tombstone. Links are left
    /// for the tree to wire.
    pub fn split(&mut self, offset: usize) -> RunNode {
        assert!(
            offset > 0 && offset < self.chars,
            "split offset {offset} outside run of length {}",
            self.chars
        );
        let byte = str_indices::chars::to_byte_idx(&self.value, offset);
        let suffix = self.value.split_off(byte);
        let mut right = RunNode::new(self.id.split(offset), &suffix);
        right.removed_at = self.removed_at;
        self.chars = offset;
        return right;
    }

    /// Copy of the value and tombstone without any links.
    fn detached(&self) -> RunNode {
        let mut copy = RunNode::new(self.id, &self.value);
        copy.removed_at = self.removed_at;
        return copy;
    }
}

impl Weighted for RunNode {
    #[inline]
    fn length(&self) -> usize {
        return RunNode::length(self);
    }
}

/// A change to the flat text, reported to observers such as editor views.
///
/// `from..to` are indexes before the edit. A pure insert has `from == to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub actor: ActorId,
    pub from: usize,
    pub to: usize,
    pub value: Option<String>,
}

/// The replicated text structure.
pub struct RgaTreeSplit {
    head: NodeIdx,
    /// Runs by position; also owns the run arena.
    index: SplayTree<RunNode>,
    /// Runs by id.
    ids: LlrbTree<NodeId, NodeIdx>,
    /// Tombstoned runs awaiting purge.
    removed: FxHashMap<NodeId, NodeIdx>,
}

impl Default for RgaTreeSplit {
    fn default() -> Self {
        return Self::new();
    }
}

impl RgaTreeSplit {
    /// Create an empty text holding only the head sentinel.
    pub fn new() -> RgaTreeSplit {
        let mut index = SplayTree::new();
        let head_id = NodeId::new(TimeTicket::INITIAL, 0);
        let head = index.alloc(RunNode::new(head_id, ""));
        index.insert_after(None, head);
        let mut ids = LlrbTree::new();
        ids.put(head_id, head);
        return RgaTreeSplit {
            head,
            index,
            ids,
            removed: FxHashMap::default(),
        };
    }

    #[inline]
    fn node(&self, idx: NodeIdx) -> &RunNode {
        return self.index.get(idx);
    }

    #[inline]
    fn node_mut(&mut self, idx: NodeIdx) -> &mut RunNode {
        return self.index.get_mut(idx);
    }

    /// Visible length in characters.
    pub fn len(&self) -> usize {
        return self.index.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Runs in document order, tombstones included, head excluded.
    pub fn iter(&self) -> Iter<'_> {
        return Iter {
            rga: self,
            current: self.node(self.head).next,
        };
    }

    /// Edit the range `from..to`: delete what lies between, then insert
    /// `value` at `from`.
    ///
    /// `latest_created_at_map` is `None` for local edits, which may delete
    /// everything in range. Remote edits pass the map their author's edit
    /// returned, so runs the author had not seen survive.
    ///
    /// Returns the caret after the edit, the newest creation ticket deleted
    /// per actor, and the flat-index changes.
    pub fn edit(
        &mut self,
        range: (NodePos, NodePos),
        edited_at: TimeTicket,
        value: Option<&str>,
        latest_created_at_map: Option<&LatestCreatedAtMap>,
    ) -> (NodePos, LatestCreatedAtMap, Vec<ContentChange>) {
        // 01. Split the boundaries, right first so the left stays valid.
        let (to_left, to_right) = self.find_node_with_split(&range.1, &edited_at);
        let (from_left, from_right) = self.find_node_with_split(&range.0, &edited_at);

        // 02. Delete what lies between them.
        let candidates = self.find_between(from_right, to_right);
        let (mut changes, deleted_map) =
            self.delete_nodes(&candidates, &edited_at, latest_created_at_map);

        let caret_id = self.node(to_right.unwrap_or(to_left)).id;
        let mut caret = NodePos::new(caret_id, 0);

        // 03. Insert the new run.
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            let idx = self.index.index_of(from_left) + self.node(from_left).length();
            let inserted = self.insert_after(from_left, RunNode::new(NodeId::new(edited_at, 0), value));

            match changes.last_mut() {
                Some(last) if last.from == idx => last.value = Some(value.to_string()),
                _ => changes.push(ContentChange {
                    actor: edited_at.actor,
                    from: idx,
                    to: idx,
                    value: Some(value.to_string()),
                }),
            }

            let node = self.node(inserted);
            caret = NodePos::new(node.id, node.content_length());
        }

        trace!(
            edited_at = %edited_at.to_test_string(),
            candidates = candidates.len(),
            deleted_actors = deleted_map.len(),
            changes = changes.len(),
            "edit applied"
        );
        return (caret, deleted_map, changes);
    }

    /// Resolve `pos`, splitting the run it lands in, and skip runs inserted
    /// concurrently after `edited_at`.
    fn find_node_with_split(&mut self, pos: &NodePos, edited_at: &TimeTicket) -> (NodeIdx, Option<NodeIdx>) {
        let absolute_id = pos.absolute_id();
        let Some(mut node) = self.find_floor_node_prefer_to_left(&absolute_id) else {
            panic!("no run contains {absolute_id}");
        };
        let relative_offset = absolute_id.offset - self.node(node).id.offset;
        self.split_node(node, relative_offset);

        while let Some(next) = self.node(node).next {
            if !self.node(next).created_at().after(edited_at) {
                break;
            }
            node = next;
        }
        return (node, self.node(node).next);
    }

    /// The run holding `id`: greatest id <= `id` from the same insert.
    fn find_floor_node(&self, id: &NodeId) -> Option<NodeIdx> {
        let (key, &node) = self.ids.floor_entry(id)?;
        if key != id && !key.has_same_created_at(id) {
            return None;
        }
        return Some(node);
    }

    /// Like `find_floor_node`, but an id that starts a split-off right half
    /// resolves to the end of its left half.
    fn find_floor_node_prefer_to_left(&self, id: &NodeId) -> Option<NodeIdx> {
        let node = self.find_floor_node(id)?;
        let run = self.node(node);
        if id.offset > 0 && run.id.offset == id.offset {
            // Lineage may be gone after a purge; the floor is then exact.
            return Some(run.ins_prev.unwrap_or(node));
        }
        return Some(node);
    }

    /// Split `node` at `offset`. Returns the run that now starts at
    /// `offset`, if any.
    fn split_node(&mut self, node: NodeIdx, offset: usize) -> Option<NodeIdx> {
        let length = self.node(node).content_length();
        assert!(offset <= length, "split offset {offset} exceeds run length {length}");
        if offset == 0 {
            return Some(node);
        }
        if offset == length {
            return self.node(node).next;
        }

        let right = self.node_mut(node).split(offset);
        let removed = right.is_removed();
        self.index.update_weight(node);
        let right = self.insert_after(node, right);
        if removed {
            let id = self.node(right).id;
            self.removed.insert(id, right);
        }

        if let Some(ins_next) = self.node(node).ins_next {
            self.set_ins_prev(ins_next, Some(right));
        }
        self.set_ins_prev(right, Some(node));
        return Some(right);
    }

    /// Link `prev` as the document-order predecessor of `node`.
    fn set_prev(&mut self, node: NodeIdx, prev: Option<NodeIdx>) {
        self.node_mut(node).prev = prev;
        if let Some(prev) = prev {
            self.node_mut(prev).next = Some(node);
        }
    }

    fn set_next(&mut self, node: NodeIdx, next: Option<NodeIdx>) {
        self.node_mut(node).next = next;
        if let Some(next) = next {
            self.node_mut(next).prev = Some(node);
        }
    }

    /// Link `prev` as the lineage predecessor of `node`.
    fn set_ins_prev(&mut self, node: NodeIdx, prev: Option<NodeIdx>) {
        self.node_mut(node).ins_prev = prev;
        if let Some(prev) = prev {
            self.node_mut(prev).ins_next = Some(node);
        }
    }

    /// Splice a new run after `prev` in document order and both indexes.
    fn insert_after(&mut self, prev: NodeIdx, run: RunNode) -> NodeIdx {
        let id = run.id;
        let node = self.index.alloc(run);
        let next = self.node(prev).next;

        self.set_prev(node, Some(prev));
        if let Some(next) = next {
            self.set_prev(next, Some(node));
        }

        self.ids.put(id, node);
        self.index.insert_after(Some(prev), node);
        return node;
    }

    /// Runs from `from` up to, not including, `to`.
    fn find_between(&self, from: Option<NodeIdx>, to: Option<NodeIdx>) -> Vec<NodeIdx> {
        let mut nodes = Vec::new();
        let mut current = from;
        while let Some(node) = current {
            if Some(node) == to {
                break;
            }
            nodes.push(node);
            current = self.node(node).next;
        }
        return nodes;
    }

    fn delete_nodes(
        &mut self,
        candidates: &[NodeIdx],
        edited_at: &TimeTicket,
        latest_created_at_map: Option<&LatestCreatedAtMap>,
    ) -> (Vec<ContentChange>, LatestCreatedAtMap) {
        let mut deleted_map = LatestCreatedAtMap::default();
        let (Some(&first), Some(&last)) = (candidates.first(), candidates.last()) else {
            return (Vec::new(), deleted_map);
        };

        let Some(left_edge) = self.node(first).prev else {
            panic!("the head precedes every run");
        };
        let right_edge = self.node(last).next;

        // Runs that survive split the deleted stretch into gaps.
        let mut boundaries: SmallVec<[Option<NodeIdx>; 4]> = smallvec![Some(left_edge)];
        let mut to_delete: SmallVec<[NodeIdx; 8]> = SmallVec::new();
        for &node in candidates {
            let run = self.node(node);
            let latest_created_at = match latest_created_at_map {
                Some(map) => map
                    .get(&run.created_at().actor)
                    .copied()
                    .unwrap_or(TimeTicket::INITIAL),
                None => TimeTicket::MAX,
            };
            if run.can_delete(edited_at, &latest_created_at) {
                to_delete.push(node);
            } else {
                boundaries.push(Some(node));
            }
        }
        boundaries.push(right_edge);

        let changes = self.make_changes(&boundaries, edited_at);

        for &node in &to_delete {
            let run = self.node_mut(node);
            let created_at = run.created_at();
            let id = run.id;
            run.remove(*edited_at);
            deleted_map
                .entry(created_at.actor)
                .and_modify(|latest| {
                    if created_at.after(latest) {
                        *latest = created_at;
                    }
                })
                .or_insert(created_at);
            self.removed.insert(id, node);
        }

        self.refresh_gap_weights(&boundaries);
        return (changes, deleted_map);
    }

    /// One change per gap between surviving runs. Indexes are taken before
    /// the gap is tombstoned; the list runs right to left.
    fn make_changes(&self, boundaries: &[Option<NodeIdx>], edited_at: &TimeTicket) -> Vec<ContentChange> {
        let mut changes = Vec::new();
        for pair in boundaries.windows(2) {
            let (Some(left), right) = (pair[0], pair[1]) else {
                continue;
            };
            if self.node(left).next == right {
                continue;
            }

            let from = self.index.index_of(left) + self.node(left).length();
            let to = match right {
                Some(right) => self.index.index_of(right),
                None => self.index.len(),
            };
            if from < to {
                changes.push(ContentChange {
                    actor: edited_at.actor,
                    from,
                    to,
                    value: None,
                });
            }
        }
        changes.reverse();
        return changes;
    }

    fn refresh_gap_weights(&mut self, boundaries: &[Option<NodeIdx>]) {
        for pair in boundaries.windows(2) {
            let (Some(left), right) = (pair[0], pair[1]) else {
                continue;
            };
            if self.node(left).next != right {
                self.index.cut_off_range(left, right);
            }
        }
    }

    /// The position of flat index `idx`. A boundary resolves to the end of
    /// the run on its left.
    pub fn find_node_pos(&mut self, idx: usize) -> Result<NodePos> {
        let len = self.len();
        let Some((node, offset)) = self.index.find(idx) else {
            return Err(RgaError::IndexOutOfRange { index: idx, len });
        };
        return Ok(NodePos::new(self.node(node).id, offset));
    }

    /// The flat index of `pos`. With `prefer_to_left`, a position on a split
    /// boundary counts as the end of the left half.
    pub fn find_idx_from_node_pos(&self, pos: &NodePos, prefer_to_left: bool) -> Result<usize> {
        let absolute_id = pos.absolute_id();
        let node = match prefer_to_left {
            true => self.find_floor_node_prefer_to_left(&absolute_id),
            false => self.find_floor_node(&absolute_id),
        };
        let Some(node) = node else {
            return Err(RgaError::UnknownNode(pos.id));
        };
        let run = self.node(node);
        let index = self.index.index_of(node);
        let offset = match run.is_removed() {
            true => 0,
            false => absolute_id.offset - run.id.offset,
        };
        return Ok(index + offset);
    }

    /// Flat indexes of a position range.
    pub fn find_indexes_from_range(&self, range: &(NodePos, NodePos)) -> Result<(usize, usize)> {
        let from = self.find_idx_from_node_pos(&range.0, false)?;
        let to = self.find_idx_from_node_pos(&range.1, true)?;
        return Ok((from, to));
    }

    /// The run holding `id`.
    pub fn find_node(&self, id: &NodeId) -> Result<&RunNode> {
        return self
            .find_floor_node(id)
            .map(|node| self.node(node))
            .ok_or(RgaError::UnknownNode(*id));
    }

    /// Whether `pos` resolves to a run of this text, within its stored length.
    pub fn contains_pos(&self, pos: &NodePos) -> bool {
        let absolute_id = pos.absolute_id();
        return self
            .find_floor_node(&absolute_id)
            .is_some_and(|node| {
                let run = self.node(node);
                absolute_id.offset - run.id.offset <= run.content_length()
            });
    }

    /// Number of tombstones awaiting purge.
    pub fn removed_nodes_len(&self) -> usize {
        return self.removed.len();
    }

    /// Physically remove every tombstone at or before `ticket`, which every
    /// replica must already have observed. Returns how many were purged.
    pub fn purge_nodes_with_garbage(&mut self, ticket: &TimeTicket) -> usize {
        let purgeable: Vec<(NodeId, NodeIdx)> = self
            .removed
            .iter()
            .filter(|&(_, &node)| {
                self.node(node)
                    .removed_at
                    .is_some_and(|removed_at| !removed_at.after(ticket))
            })
            .map(|(&id, &node)| (id, node))
            .collect();

        for &(id, node) in &purgeable {
            self.unlink(node);
            self.ids.remove(&id);
            self.removed.remove(&id);
            self.index.delete(node);
        }

        debug!(
            purged = purgeable.len(),
            remaining = self.removed.len(),
            boundary = %ticket.to_test_string(),
            "purged tombstones"
        );
        return purgeable.len();
    }

    /// Drop `node` out of document order and lineage.
    fn unlink(&mut self, node: NodeIdx) {
        let run = self.node(node);
        let (prev, next) = (run.prev, run.next);
        let (ins_prev, ins_next) = (run.ins_prev, run.ins_next);

        match prev {
            Some(prev) => self.set_next(prev, next),
            None => {
                if let Some(next) = next {
                    self.node_mut(next).prev = None;
                }
            }
        }
        // Lineage is not bridged: the pieces on either side are no longer
        // adjacent in the original insert.
        if let Some(ins_prev) = ins_prev {
            self.node_mut(ins_prev).ins_next = None;
        }
        if let Some(ins_next) = ins_next {
            self.node_mut(ins_next).ins_prev = None;
        }

        let run = self.node_mut(node);
        run.prev = None;
        run.next = None;
        run.ins_prev = None;
        run.ins_next = None;
    }

    /// An independent copy with freshly built indexes.
    ///
    /// Runs are re-inserted in document order, then lineage is re-linked by
    /// looking each `ins_prev` up by id in the copy, where it already exists.
    pub fn deepcopy(&self) -> RgaTreeSplit {
        let mut clone = RgaTreeSplit::new();
        let mut prev = clone.head;
        let mut current = self.node(self.head).next;

        while let Some(node) = current {
            let run = self.node(node);
            let copied = clone.insert_after(prev, run.detached());
            if let Some(ins_prev) = run.ins_prev {
                let ins_prev_id = self.node(ins_prev).id;
                let Some(&target) = clone.ids.get(&ins_prev_id) else {
                    panic!("lineage of {} points past it", run.id);
                };
                clone.set_ins_prev(copied, Some(target));
            }
            if run.is_removed() {
                clone.removed.insert(run.id, copied);
            }
            prev = copied;
            current = run.next;
        }
        return clone;
    }

    /// The visible text as a JSON string literal.
    pub fn to_json(&self) -> String {
        return serde_json::Value::String(self.to_string()).to_string();
    }

    /// Structure dump: `[id]value` per run, tombstones as `[id]{value}`.
    pub fn to_test_string(&self) -> String {
        let mut out = String::new();
        for run in self.iter() {
            let id = run.id.to_test_string();
            if run.is_removed() {
                out.push_str(&format!("[{id}]{{{}}}", run.value));
            } else {
                out.push_str(&format!("[{id}]{}", run.value));
            }
        }
        return out;
    }

    /// Verify the cached weights of the position index.
    pub fn check_weight(&self) -> bool {
        return self.index.check_weight();
    }

    /// Verify that document order, position order and the ID index agree.
    pub fn check_structure(&self) -> bool {
        let mut order = vec![self.head];
        let mut current = self.node(self.head).next;
        while let Some(node) = current {
            if self.node(node).prev != order.last().copied() {
                return false;
            }
            order.push(node);
            current = self.node(node).next;
        }
        if order != self.index.in_order() || order.len() != self.ids.len() {
            return false;
        }
        return order
            .iter()
            .all(|&node| self.ids.get(&self.node(node).id) == Some(&node));
    }
}

impl Clone for RgaTreeSplit {
    fn clone(&self) -> Self {
        return self.deepcopy();
    }
}

impl fmt::Display for RgaTreeSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in self.iter().filter(|run| !run.is_removed()) {
            f.write_str(&run.value)?;
        }
        return Ok(());
    }
}

impl fmt::Debug for RgaTreeSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "RgaTreeSplit({})", self.to_test_string());
    }
}

/// Iterator over runs in document order.
pub struct Iter<'a> {
    rga: &'a RgaTreeSplit,
    current: Option<NodeIdx>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RunNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        let run = self.rga.node(node);
        self.current = run.next;
        return Some(run);
    }
}
