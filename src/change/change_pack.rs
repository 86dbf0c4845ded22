//! The batch exchanged during a push/pull sync round (§4.2, §6).
//!
//! Wire encoding of a [`ChangePack`] is out of scope here — the
//! [`crate::coordinator::Coordinator`] trait is the transport boundary, and
//! whatever sits on the other side of it owns serialization. What this
//! module owns is the in-memory shape of the pack and the snapshot
//! threshold decision.

use super::Change;
use crate::root::Root;
use crate::time::{Checkpoint, TimeTicket};

/// A full copy of the document tree at a given checkpoint, installed in
/// place of a long list of individual changes once the pending backlog
/// crosses [`SNAPSHOT_THRESHOLD`] (§4.2 "snapshot threshold").
#[derive(Clone)]
pub struct Snapshot {
    pub root: Root,
    pub checkpoint: Checkpoint,
}

/// Number of changes a `push_pull` response may carry before the server is
/// expected to collapse them into a [`Snapshot`] instead (§4.2).
pub const SNAPSHOT_THRESHOLD: usize = 500;

/// The unit exchanged with the coordinator on every sync round: the
/// client's pending local changes on the way out, the server's changes
/// (or a snapshot) plus the advanced checkpoint on the way back.
#[derive(Clone)]
pub struct ChangePack {
    pub document_key: String,
    pub checkpoint: Checkpoint,
    pub is_removed: bool,
    pub changes: Vec<Change>,
    pub snapshot: Option<Snapshot>,
    /// The server's watermark below which every watching client has
    /// synced; tombstones dominated by this ticket are eligible for GC
    /// (§3 invariant 5, §4.2).
    pub min_synced_ticket: Option<TimeTicket>,
}

impl ChangePack {
    pub fn new(document_key: impl Into<String>, checkpoint: Checkpoint) -> Self {
        Self {
            document_key: document_key.into(),
            checkpoint,
            is_removed: false,
            changes: Vec::new(),
            snapshot: None,
            min_synced_ticket: None,
        }
    }

    pub fn with_changes(mut self, changes: Vec<Change>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pack_carries_no_snapshot() {
        let pack = ChangePack::new("doc-1", Checkpoint::initial());
        assert!(!pack.is_snapshot());
        assert!(pack.changes.is_empty());
    }
}
