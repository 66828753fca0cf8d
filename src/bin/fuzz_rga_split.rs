//! AFL fuzz harness for the split-node RGA.
//!
//! Each user owns a replica, edits it locally, and records every edit as an
//! `EditOp`. A broadcast replays the ops the receiver has not seen, in the
//! order the sender applied them, which keeps delivery causal. After a full
//! sync every replica must hold the same text.

use afl::fuzz;
use rustc_hash::FxHashSet;

use concord::crdt::EditOp;
use concord::crdt::Text;
use concord::crdt::primitives::LamportClock;
use concord::crdt::primitives::TimeTicket;
use concord::key::KeyPair;

const NUM_USERS: usize = 3;

/// Operation types the fuzzer can generate
#[derive(Debug, Clone, Copy)]
enum FuzzOp {
    /// User inserts text at a position in their replica
    Insert { user: u8, pos_frac: u8, len: u8 },
    /// User deletes text from their replica
    Delete { user: u8, pos_frac: u8, len: u8 },
    /// User replaces a range in their replica
    Replace { user: u8, pos_frac: u8, len: u8 },
    /// User B's ops reach user A
    Broadcast { from: u8, to: u8 },
    /// All users sync (full mesh broadcast)
    FullSync,
}

impl FuzzOp {
    fn from_bytes(bytes: &[u8]) -> Option<(FuzzOp, &[u8])> {
        let (&op_type, rest) = bytes.split_first()?;
        match op_type % 5 {
            kind @ 0..=2 if rest.len() >= 3 => {
                let user = rest[0] % NUM_USERS as u8;
                let pos_frac = rest[1];
                let op = match kind {
                    0 => FuzzOp::Insert { user, pos_frac, len: (rest[2] % 32).saturating_add(1) },
                    1 => FuzzOp::Delete { user, pos_frac, len: (rest[2] % 16).saturating_add(1) },
                    _ => FuzzOp::Replace { user, pos_frac, len: (rest[2] % 8).saturating_add(1) },
                };
                return Some((op, &rest[3..]));
            }
            3 if rest.len() >= 2 => {
                let op = FuzzOp::Broadcast {
                    from: rest[0] % NUM_USERS as u8,
                    to: rest[1] % NUM_USERS as u8,
                };
                return Some((op, &rest[2..]));
            }
            4 => return Some((FuzzOp::FullSync, rest)),
            _ => return None,
        }
    }
}

struct Replica {
    pair: KeyPair,
    text: Text,
    clock: LamportClock,
    /// Every op applied here, in application order.
    log: Vec<EditOp>,
    seen: FxHashSet<TimeTicket>,
}

impl Replica {
    fn new(pair: &KeyPair) -> Replica {
        return Replica {
            pair: pair.clone(),
            text: Text::new(TimeTicket::INITIAL),
            clock: LamportClock::new(pair.actor),
            log: Vec::new(),
            seen: FxHashSet::default(),
        };
    }

    fn local_edit(&mut self, from: usize, to: usize, content: &str) {
        let edited_at = self.clock.tick();
        let range = self.text.create_range(from, to).expect("range within text");
        let (deleted, _, _) = self.text.edit(range, content, edited_at, None).expect("local edit");
        self.seen.insert(edited_at);
        self.log.push(EditOp::local(&self.pair, range, content, edited_at, deleted));
    }

    fn receive(&mut self, source: &[EditOp]) {
        for op in source {
            if !self.seen.insert(op.edited_at) {
                continue;
            }
            self.clock.observe(&op.edited_at);
            op.execute(&mut self.text).expect("causally delivered op");
            self.log.push(op.clone());
        }
    }
}

fn broadcast(replicas: &mut [Replica], from: usize, to: usize) {
    if from == to {
        return;
    }
    let source = replicas[from].log.clone();
    replicas[to].receive(&source);
}

fn full_sync(replicas: &mut [Replica]) {
    // Full mesh - everyone broadcasts to everyone
    for i in 0..NUM_USERS {
        for j in 0..NUM_USERS {
            broadcast(replicas, j, i);
        }
    }

    // CRITICAL INVARIANT: All replicas must converge!
    let first = replicas[0].text.to_string();
    for (i, r) in replicas.iter().enumerate().skip(1) {
        assert_eq!(r.text.to_string(), first, "Convergence failure! User {i} != User 0 after full sync");
    }
}

fn position(pos_frac: u8, len: usize) -> usize {
    return (pos_frac as usize * len / 256).min(len);
}

fn main() {
    // Use deterministic keys for reproducible crashes
    let users: Vec<KeyPair> = (0..NUM_USERS).map(|i| KeyPair::from_seed(i as u64)).collect();

    fuzz!(|data: &[u8]| {
        let mut replicas: Vec<Replica> = users.iter().map(Replica::new).collect();
        let mut remaining = data;

        while let Some((op, rest)) = FuzzOp::from_bytes(remaining) {
            remaining = rest;

            match op {
                FuzzOp::Insert { user, pos_frac, len } => {
                    let r = &mut replicas[user as usize];
                    let pos = position(pos_frac, r.text.len());
                    let content: String = (0..len).map(|i| (b'A' + user.wrapping_add(i) % 26) as char).collect();
                    r.local_edit(pos, pos, &content);
                }

                FuzzOp::Delete { user, pos_frac, len } => {
                    let r = &mut replicas[user as usize];
                    let doc_len = r.text.len();
                    if doc_len > 0 {
                        let pos = position(pos_frac, doc_len).min(doc_len - 1);
                        let end = (pos + len as usize).min(doc_len);
                        r.local_edit(pos, end, "");
                    }
                }

                FuzzOp::Replace { user, pos_frac, len } => {
                    let r = &mut replicas[user as usize];
                    let doc_len = r.text.len();
                    let pos = position(pos_frac, doc_len);
                    let end = (pos + len as usize).min(doc_len);
                    let content: String = (0..len).map(|i| (b'a' + user.wrapping_add(i) % 26) as char).collect();
                    r.local_edit(pos, end, &content);
                }

                FuzzOp::Broadcast { from, to } => broadcast(&mut replicas, from as usize, to as usize),

                FuzzOp::FullSync => full_sync(&mut replicas),
            }
        }

        full_sync(&mut replicas);

        // Verify internal consistency
        for r in &replicas {
            assert!(r.text.check_weight(), "Weight mismatch");
            assert_eq!(r.text.to_string().chars().count(), r.text.len(), "Length mismatch");
        }
    });
}
