//! A Lamport clock that issues `TimeTicket`s.
//!
//! The text core consumes tickets but never creates them. This clock plays
//! the part of the change layer that does: one `begin_change` per change,
//! one `issue` per operation inside it.
//!
//! Complexity:
//! - begin_change: O(1)
//! - issue: O(1)
//! - observe: O(1)

use super::ticket::TimeTicket;
use crate::key::ActorId;

/// Issues tickets for a single actor.
///
/// The clock:
/// - Increments the Lamport time on each new change
/// - Increments the delimiter on each operation within a change
/// - Updates to max(local, remote) when a remote change is observed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LamportClock {
    actor: ActorId,
    lamport: u64,
    delimiter: u32,
}

impl LamportClock {
    /// Create a clock for `actor` starting at Lamport time 0.
    pub fn new(actor: ActorId) -> LamportClock {
        return LamportClock { actor, lamport: 0, delimiter: 0 };
    }

    pub fn actor(&self) -> ActorId {
        return self.actor;
    }

    /// Get the current Lamport time.
    #[inline]
    pub fn time(&self) -> u64 {
        return self.lamport;
    }

    /// Start a new change. Returns the new Lamport time.
    #[inline]
    pub fn begin_change(&mut self) -> u64 {
        self.lamport += 1;
        self.delimiter = 0;
        return self.lamport;
    }

    /// Issue the next ticket of the current change.
    #[inline]
    pub fn issue(&mut self) -> TimeTicket {
        self.delimiter += 1;
        return TimeTicket::new(self.lamport, self.delimiter, self.actor);
    }

    /// Start a change and issue its first ticket.
    pub fn tick(&mut self) -> TimeTicket {
        self.begin_change();
        return self.issue();
    }

    /// Merge the Lamport time of a ticket received from another replica.
    #[inline]
    pub fn observe(&mut self, remote: &TimeTicket) {
        self.lamport = self.lamport.max(remote.lamport);
    }
}
