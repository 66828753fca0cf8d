//! Lamport timestamps issued per operation.
//!
//! A ticket is `(lamport, actor, delimiter)`. The Lamport counter advances
//! once per change, the delimiter once per operation inside a change, and the
//! actor breaks ties between replicas that reached the same Lamport time.
//! Comparison order is lamport, then actor, then delimiter, which gives every
//! replica the same total order regardless of arrival order.

use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::key::ActorId;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeTicket {
    pub lamport: u64,
    pub delimiter: u32,
    pub actor: ActorId,
}

impl TimeTicket {
    /// The ticket of the head sentinel; precedes every issued ticket.
    pub const INITIAL: TimeTicket = TimeTicket {
        lamport: 0,
        delimiter: 0,
        actor: ActorId::INITIAL,
    };

    /// Follows every issued ticket. Used as the deletion bound of local edits.
    pub const MAX: TimeTicket = TimeTicket {
        lamport: u64::MAX,
        delimiter: u32::MAX,
        actor: ActorId::MAX,
    };

    pub fn new(lamport: u64, delimiter: u32, actor: ActorId) -> TimeTicket {
        return TimeTicket { lamport, delimiter, actor };
    }

    /// Strictly later than `other`.
    #[inline]
    pub fn after(&self, other: &TimeTicket) -> bool {
        return self.cmp(other) == Ordering::Greater;
    }

    /// Compact form used in structure dumps: `lamport:actor:delimiter`, with
    /// the actor shortened to its last byte.
    pub fn to_test_string(&self) -> String {
        return format!("{}:{:02x}:{}", self.lamport, self.actor.0[31], self.delimiter);
    }
}

impl PartialOrd for TimeTicket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for TimeTicket {
    fn cmp(&self, other: &Self) -> Ordering {
        return self
            .lamport
            .cmp(&other.lamport)
            .then_with(|| self.actor.cmp(&other.actor))
            .then_with(|| self.delimiter.cmp(&other.delimiter));
    }
}

impl fmt::Debug for TimeTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "TimeTicket({})", self.to_test_string());
    }
}

impl fmt::Display for TimeTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}:{}:{}", self.lamport, self.actor, self.delimiter);
    }
}
