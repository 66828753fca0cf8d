//! Replayable, signed edit records.
//!
//! An `EditOp` carries everything another replica needs to repeat an edit:
//! the position range, the content, the ticket, and the deleted-creation map
//! the author's edit returned. The author signs these fields with the key
//! behind `edited_at.actor`, and replicas check the signature before replay.
//! Ordering and delivery are up to the caller; ops from one actor must be
//! applied in the order they were made.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::primitives::NodePos;
use super::primitives::TimeTicket;
use super::rga_split::LatestCreatedAtMap;
use super::text::EditResult;
use super::text::Text;
use crate::error::Result;
use crate::error::RgaError;
use crate::key::ActorId;
use crate::key::KeyPair;
use crate::key::Signature;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    pub from: NodePos,
    pub to: NodePos,
    pub content: Option<String>,
    pub edited_at: TimeTicket,
    pub latest_created_at_map: Option<LatestCreatedAtMap>,
    pub signature: Signature,
}

/// The signed part of an op, with the map in actor order so every replica
/// encodes it to the same bytes.
#[derive(Serialize)]
struct SignedFields<'a> {
    from: &'a NodePos,
    to: &'a NodePos,
    content: Option<&'a str>,
    edited_at: &'a TimeTicket,
    latest_created_at_map: Option<Vec<(ActorId, TimeTicket)>>,
}

fn signed_bytes(
    from: &NodePos,
    to: &NodePos,
    content: Option<&str>,
    edited_at: &TimeTicket,
    map: Option<&LatestCreatedAtMap>,
) -> Vec<u8> {
    let map = map.map(|map| {
        let mut entries: Vec<_> = map.iter().map(|(&actor, &ticket)| (actor, ticket)).collect();
        entries.sort_unstable_by_key(|&(actor, _)| actor);
        entries
    });
    let fields = SignedFields {
        from,
        to,
        content,
        edited_at,
        latest_created_at_map: map,
    };
    return serde_json::to_vec(&fields).expect("tickets and positions always encode");
}

impl EditOp {
    /// Record a local edit after it ran on the author's replica, signed by
    /// `author`, whose actor must be `edited_at.actor`.
    ///
    /// `deleted_map` is the map the edit returned. Replaying with it deletes
    /// only runs the author could see.
    pub fn local(
        author: &KeyPair,
        range: (NodePos, NodePos),
        content: &str,
        edited_at: TimeTicket,
        deleted_map: LatestCreatedAtMap,
    ) -> EditOp {
        let content = (!content.is_empty()).then(|| content.to_string());
        let bytes = signed_bytes(&range.0, &range.1, content.as_deref(), &edited_at, Some(&deleted_map));
        return EditOp {
            from: range.0,
            to: range.1,
            content,
            edited_at,
            latest_created_at_map: Some(deleted_map),
            signature: author.sign(&bytes),
        };
    }

    /// Whether the signature matches the fields and `edited_at.actor`.
    pub fn verify(&self) -> bool {
        let bytes = signed_bytes(
            &self.from,
            &self.to,
            self.content.as_deref(),
            &self.edited_at,
            self.latest_created_at_map.as_ref(),
        );
        return self.edited_at.actor.verify(&bytes, &self.signature);
    }

    /// Verify, then replay on `text`.
    pub fn execute(&self, text: &mut Text) -> Result<EditResult> {
        if !self.verify() {
            debug!(edited_at = %self.edited_at.to_test_string(), "rejected unsigned edit");
            return Err(RgaError::InvalidSignature(self.edited_at));
        }
        return text.edit(
            (self.from, self.to),
            self.content.as_deref().unwrap_or(""),
            self.edited_at,
            self.latest_created_at_map.as_ref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::primitives::LamportClock;

    struct Author {
        pair: KeyPair,
        clock: LamportClock,
        text: Text,
    }

    impl Author {
        fn new(seed: u64) -> Author {
            let pair = KeyPair::from_seed(seed);
            let clock = LamportClock::new(pair.actor);
            return Author {
                pair,
                clock,
                text: Text::new(TimeTicket::INITIAL),
            };
        }

        /// Edit locally and return the op that replays it.
        fn record(&mut self, from: usize, to: usize, content: &str) -> EditOp {
            let at = self.clock.tick();
            let range = self.text.create_range(from, to).unwrap();
            let (deleted, _, _) = self.text.edit(range, content, at, None).unwrap();
            return EditOp::local(&self.pair, range, content, at, deleted);
        }
    }

    #[test]
    fn replay_reproduces_edit() {
        let mut author = Author::new(1);
        let mut replica = Text::new(TimeTicket::INITIAL);

        let ops = vec![
            author.record(0, 0, "hello world"),
            author.record(0, 5, "howdy"),
            author.record(5, 11, ""),
        ];
        for op in &ops {
            assert!(op.verify());
            op.execute(&mut replica).unwrap();
        }
        assert_eq!(author.text.to_string(), "howdy");
        assert_eq!(replica.to_string(), author.text.to_string());
    }

    #[test]
    fn serde_round_trip() {
        let mut author = Author::new(7);
        author.record(0, 0, "abc");
        let op = author.record(1, 2, "é");

        let json = serde_json::to_string(&op).unwrap();
        let back: EditOp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
        assert!(back.verify());
        assert_eq!(back.latest_created_at_map.as_ref().map(|map| map.len()), Some(1));
    }

    #[test]
    fn empty_content_is_none() {
        let mut author = Author::new(1);
        author.record(0, 0, "abc");
        let op = author.record(0, 1, "");
        assert_eq!(op.content, None);
        assert!(op.verify());
    }

    #[test]
    fn tampered_content_is_rejected() {
        let mut author = Author::new(1);
        let mut op = author.record(0, 0, "abc");
        op.content = Some("abd".to_string());

        let mut replica = Text::new(TimeTicket::INITIAL);
        let err = op.execute(&mut replica).unwrap_err();
        assert_eq!(err, RgaError::InvalidSignature(op.edited_at));
        assert!(replica.is_empty());
    }

    #[test]
    fn signature_must_come_from_ticket_actor() {
        let mut author = Author::new(1);
        let impostor = KeyPair::from_seed(2);
        let at = author.clock.tick();
        let range = author.text.create_range(0, 0).unwrap();
        let (deleted, _, _) = author.text.edit(range, "x", at, None).unwrap();

        let op = EditOp::local(&impostor, range, "x", at, deleted);
        assert!(!op.verify());
    }
}
