//! End-to-end tests of the text API: editing through `Text`, shipping edits
//! as serialized `EditOp`s, and collecting garbage once every replica has
//! caught up.

use concord::crdt::EditOp;
use concord::crdt::Text;
use concord::crdt::primitives::LamportClock;
use concord::crdt::primitives::TimeTicket;
use concord::error::RgaError;
use concord::key::KeyPair;

struct User {
    pair: KeyPair,
    text: Text,
    clock: LamportClock,
}

impl User {
    fn new(seed: u64) -> User {
        let pair = KeyPair::from_seed(seed);
        return User {
            text: Text::new(TimeTicket::INITIAL),
            clock: LamportClock::new(pair.actor),
            pair,
        };
    }

    fn edit(&mut self, from: usize, to: usize, content: &str) -> EditOp {
        let edited_at = self.clock.tick();
        let range = self.text.create_range(from, to).unwrap();
        let (deleted, _, _) = self.text.edit(range, content, edited_at, None).unwrap();
        return EditOp::local(&self.pair, range, content, edited_at, deleted);
    }

    fn apply(&mut self, op: &EditOp) {
        self.clock.observe(&op.edited_at);
        op.execute(&mut self.text).unwrap();
    }
}

/// Ship an op over the wire as JSON.
fn wire(op: &EditOp) -> EditOp {
    let json = serde_json::to_string(op).unwrap();
    return serde_json::from_str(&json).unwrap();
}

#[test]
fn concurrent_edits_converge_in_both_orders() {
    let mut alice = User::new(1);
    let mut bob = User::new(2);

    let base = alice.edit(0, 0, "The fox jumps");
    bob.apply(&wire(&base));

    let a = alice.edit(4, 7, "cat");
    let b = bob.edit(0, 13, "A dog sleeps");

    alice.apply(&wire(&b));
    bob.apply(&wire(&a));

    assert_eq!(alice.text.to_string(), bob.text.to_string());
    // Bob's delete did not know about "cat", so it survives
    assert_eq!(alice.text.to_string(), "A dog sleepscat");
    assert_eq!(alice.text.hash(), bob.text.hash());
}

#[test]
fn concurrent_inserts_at_same_index() {
    let mut alice = User::new(1);
    let mut bob = User::new(2);
    let base = alice.edit(0, 0, "ac");
    bob.apply(&base);

    let a = alice.edit(1, 1, "A");
    let b = bob.edit(1, 1, "B");
    alice.apply(&b);
    bob.apply(&a);

    let merged = alice.text.to_string();
    assert_eq!(merged, bob.text.to_string());
    assert!(merged == "aABc" || merged == "aBAc");
}

#[test]
fn overlapping_deletes_converge() {
    let mut alice = User::new(1);
    let mut bob = User::new(2);
    let base = alice.edit(0, 0, "0123456789");
    bob.apply(&base);

    let a = alice.edit(2, 6, "");
    let b = bob.edit(4, 8, "x");
    alice.apply(&b);
    bob.apply(&a);

    assert_eq!(alice.text.to_string(), "01x89");
    assert_eq!(bob.text.to_string(), "01x89");
    assert!(alice.text.check_weight());
    assert!(bob.text.check_weight());
}

#[test]
fn purge_after_every_replica_caught_up() {
    let mut alice = User::new(1);
    let mut bob = User::new(2);
    let ops = vec![alice.edit(0, 0, "hello world"), alice.edit(5, 11, "")];
    for op in &ops {
        bob.apply(op);
    }
    assert_eq!(bob.text.removed_nodes_len(), 1);

    let safe = ops[1].edited_at;
    assert_eq!(alice.text.purge_removed_nodes_before(&safe), 1);
    assert_eq!(bob.text.purge_removed_nodes_before(&safe), 1);

    let next = alice.edit(5, 5, "!");
    bob.apply(&next);
    assert_eq!(alice.text.to_string(), "hello!");
    assert_eq!(bob.text.to_string(), "hello!");
}

#[test]
fn deepcopy_serves_as_snapshot() {
    let mut alice = User::new(1);
    alice.edit(0, 0, "draft");
    let snapshot = alice.text.deepcopy();

    alice.edit(0, 5, "final");
    assert_eq!(alice.text.to_string(), "final");
    assert_eq!(snapshot.to_string(), "draft");
    assert_eq!(snapshot.created_at(), alice.text.created_at());
    assert!(snapshot.check_weight());
}

#[test]
fn replay_with_unknown_positions_is_rejected() {
    let mut alice = User::new(1);
    let mut bob = User::new(2);
    alice.edit(0, 0, "abc");
    let op = alice.edit(1, 2, "X");

    // Bob never saw the insert the op is anchored to
    let err = op.execute(&mut bob.text).unwrap_err();
    assert!(matches!(err, RgaError::UnknownNode(_)));
    assert!(bob.text.is_empty());
}

#[test]
fn replay_with_inverted_positions_is_rejected() {
    let mut alice = User::new(1);
    alice.edit(0, 0, "abcdef");
    let end = alice.text.create_range(5, 5).unwrap().0;
    let start = alice.text.create_range(1, 1).unwrap().0;

    let edited_at = alice.clock.tick();
    let op = EditOp::local(&alice.pair, (end, start), "", edited_at, Default::default());
    assert!(op.verify());
    let err = op.execute(&mut alice.text).unwrap_err();
    assert_eq!(err, RgaError::InvalidRange { from: 5, to: 1 });
    assert_eq!(alice.text.to_string(), "abcdef");
}

#[test]
fn index_errors_are_reported() {
    let mut alice = User::new(1);
    alice.edit(0, 0, "abc");
    assert!(matches!(
        alice.text.create_range(3, 2),
        Err(RgaError::InvalidRange { from: 3, to: 2 })
    ));
    assert!(matches!(
        alice.text.index_range_to_pos_range(0, 9),
        Err(RgaError::IndexOutOfRange { index: 9, len: 3 })
    ));
}

#[test]
fn changes_serialize_for_observers() {
    let mut alice = User::new(1);
    alice.edit(0, 0, "abc");
    let range = alice.text.create_range(1, 2).unwrap();
    let (_, changes, _) = alice.text.edit(range, "Z", alice.clock.tick(), None).unwrap();

    let json = serde_json::to_value(&changes).unwrap();
    assert_eq!(json[0]["from"], 1);
    assert_eq!(json[0]["to"], 2);
    assert_eq!(json[0]["value"], "Z");
    assert_eq!(alice.text.to_json(), "\"aZc\"");
}
