//! Document-level events fanned out to subscribers (§4.3 "Path dispatch",
//! §4.6 "Watch & Presence").

use crate::crdt::OpInfo;
use crate::time::ActorId;
use serde_json::Value as Json;
use std::collections::HashMap;

/// Emitted once per applied `update`/`applyChangePack`, carrying every
/// operation produced by that change (in operation order, per §5
/// "event handlers... observe operations in the order the operations
/// appear in the changes").
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub operations: Vec<OpInfo>,
}

/// The kind of peer-membership or presence transition a [`PeersChanged`]
/// event describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PeersChangedKind {
    Initialized,
    Watched,
    Unwatched,
    PresenceChanged,
}

/// A peer watch/presence transition (§4.6). `presence` carries the full
/// merged map for `PresenceChanged`/`Initialized`, and is `None` for
/// `Watched`/`Unwatched` (the peer table entry, not its content, changed).
#[derive(Clone, Debug)]
pub struct PeersChanged {
    pub kind: PeersChangedKind,
    pub actor_id: ActorId,
    pub presence: Option<HashMap<String, Json>>,
}

/// Every event kind a document subscriber can receive.
#[derive(Clone, Debug)]
pub enum DocEvent {
    Change(ChangeEvent),
    Peers(PeersChanged),
}
