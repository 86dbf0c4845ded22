//! Actor identity, lamport timestamps, and the change/document checkpoint.
//!
//! Every CRDT node and every operation carries the [`TimeTicket`] of the
//! change that created it; concurrency is resolved entirely by comparing
//! tickets (§3, §4.1).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque actor identifier assigned by the server on activation.
///
/// Two actor IDs compare lexicographically; this is the final tiebreaker in
/// [`TimeTicket`] ordering when lamport and delimiter are equal (which never
/// happens for two distinct actors, but the `Ord` impl still needs a rule).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// The fixed all-zero actor used by [`TimeTicket::initial`].
    pub const INITIAL: &'static str = "000000000000000000000000";
    /// The fixed all-`f` actor used by [`TimeTicket::max`].
    pub const MAX: &'static str = "ffffffffffffffffffffffff";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn initial() -> Self {
        Self(Self::INITIAL.to_string())
    }

    pub fn max() -> Self {
        Self(Self::MAX.to_string())
    }
}

impl PartialOrd for ActorId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(lamport, delimiter, actorID)`, totally ordered in that field priority.
///
/// `delimiter` breaks ties between multiple tickets minted by the same
/// actor at the same lamport (e.g. several characters inserted by one
/// local edit).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TimeTicket {
    pub lamport: u64,
    pub delimiter: u32,
    pub actor_id: ActorId,
}

impl TimeTicket {
    pub fn new(lamport: u64, delimiter: u32, actor_id: ActorId) -> Self {
        Self {
            lamport,
            delimiter,
            actor_id,
        }
    }

    /// The smallest possible ticket: lower bound of the ticket space.
    pub fn initial() -> Self {
        Self::new(0, 0, ActorId::initial())
    }

    /// The largest possible ticket: upper bound of the ticket space.
    pub fn max() -> Self {
        Self::new(u64::MAX, u32::MAX, ActorId::max())
    }

    /// `self` was created strictly after `other`.
    pub fn after(&self, other: &TimeTicket) -> bool {
        self > other
    }
}

impl PartialOrd for TimeTicket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeTicket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lamport
            .cmp(&other.lamport)
            .then_with(|| self.delimiter.cmp(&other.delimiter))
            .then_with(|| self.actor_id.cmp(&other.actor_id))
    }
}

impl fmt::Display for TimeTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.lamport, self.delimiter, self.actor_id)
    }
}

/// `(serverSeq, clientSeq)` handshake state, per document per client (§3).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub server_seq: u64,
    pub client_seq: u32,
}

impl Checkpoint {
    pub fn initial() -> Self {
        Self::default()
    }

    /// Advance `client_seq` by one, used when a local change is created.
    #[must_use]
    pub fn next_client_seq(&self) -> Self {
        Self {
            server_seq: self.server_seq,
            client_seq: self.client_seq + 1,
        }
    }

    /// Fold in a server-acknowledged state. `server_seq` never decreases.
    #[must_use]
    pub fn forward(&self, server_seq: u64, client_seq: u32) -> Self {
        Self {
            server_seq: self.server_seq.max(server_seq),
            client_seq: self.client_seq.max(client_seq),
        }
    }
}

/// Hands out increasing [`TimeTicket`]s for one document on one actor.
///
/// The lamport clock advances by one for every locally produced operation,
/// and jumps to `max(local, remote) + 1` whenever a remote change is
/// applied (§4.4 step 2), which is how convergent causal ordering is kept
/// without a shared clock.
#[derive(Debug)]
pub struct LamportClock {
    actor_id: ActorId,
    lamport: u64,
    delimiter: u32,
}

impl LamportClock {
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            lamport: 0,
            delimiter: 0,
        }
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    /// The current lamport value, without minting a ticket.
    pub fn peek_lamport(&self) -> u64 {
        self.lamport
    }

    /// Mint a new ticket for a locally produced operation.
    pub fn next(&mut self) -> TimeTicket {
        self.delimiter += 1;
        TimeTicket::new(self.lamport, self.delimiter, self.actor_id.clone())
    }

    /// Begin a new local change: advance lamport and reset the delimiter.
    pub fn tick(&mut self) {
        self.lamport += 1;
        self.delimiter = 0;
    }

    /// Observe a ticket from a remote change and advance past it.
    /// Unconditional: every applied change, local or remote, strictly
    /// increases the lamport value.
    pub fn observe(&mut self, remote_lamport: u64) {
        self.lamport = self.lamport.max(remote_lamport) + 1;
        self.delimiter = 0;
    }
}
