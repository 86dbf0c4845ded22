//! Change/checkpoint engine (§4.2/§4.3): the unit of replication and the
//! pack that carries a batch of them across the sync boundary.

pub mod change_pack;
pub mod operation;

pub use change_pack::{ChangePack, Snapshot};
pub use operation::{NewValue, Operation};

use crate::crdt::OpInfo;
use crate::error::Result;
use crate::root::Root;
use crate::time::{ActorId, TimeTicket};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;

/// Identifies a change: the actor that authored it plus its position in
/// that actor's local sequence. Two changes are the same change iff
/// `(actor_id, client_seq)` match — `lamport`/`server_seq` are informative,
/// not part of identity, since the server only assigns `server_seq` after
/// the change has already been created locally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeId {
    pub client_seq: u32,
    pub lamport: u64,
    pub actor_id: ActorId,
    pub server_seq: Option<u64>,
}

impl ChangeId {
    pub fn new(client_seq: u32, lamport: u64, actor_id: ActorId) -> Self {
        Self {
            client_seq,
            lamport,
            actor_id,
            server_seq: None,
        }
    }

    pub fn with_server_seq(mut self, server_seq: u64) -> Self {
        self.server_seq = Some(server_seq);
        self
    }
}

impl PartialEq for ChangeId {
    fn eq(&self, other: &Self) -> bool {
        self.actor_id == other.actor_id && self.client_seq == other.client_seq
    }
}
impl Eq for ChangeId {}

impl std::hash::Hash for ChangeId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.actor_id.hash(state);
        self.client_seq.hash(state);
    }
}

/// A presence update bundled with a change (§9 "Watch & Presence").
/// `Clear` models a peer going offline; `Put` shallow-merges the given
/// keys into the actor's presence map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PresenceChange {
    Put(HashMap<String, Json>),
    Clear,
}

/// One replicated unit: a batch of operations created together, plus an
/// optional presence update, addressed by [`ChangeId`] (§4.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub message: Option<String>,
    pub operations: Vec<Operation>,
    pub presence_change: Option<PresenceChange>,
}

impl Change {
    pub fn new(id: ChangeId, operations: Vec<Operation>) -> Self {
        Self {
            id,
            message: None,
            operations,
            presence_change: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_presence_change(mut self, change: PresenceChange) -> Self {
        self.presence_change = Some(change);
        self
    }

    /// Apply every operation in order against `root`, collecting the
    /// emitted [`OpInfo`] records. Stops at the first operation that
    /// fails to locate its target (§4.2 invariant: operations within a
    /// change are a single atomic unit from the caller's perspective).
    pub fn apply(&self, root: &mut Root) -> Result<Vec<OpInfo>> {
        let mut infos = Vec::new();
        for op in &self.operations {
            infos.extend(op.apply(root)?);
        }
        Ok(infos)
    }

    /// The highest ticket minted by this change, used to advance the
    /// lamport clock of a replica receiving it remotely.
    pub fn max_ticket(&self) -> Option<TimeTicket> {
        self.operations
            .iter()
            .map(operation_ticket)
            .max()
    }
}

fn operation_ticket(op: &Operation) -> TimeTicket {
    match op {
        Operation::SetObject { ticket, .. }
        | Operation::RemoveObject { ticket, .. }
        | Operation::InsertArray { ticket, .. }
        | Operation::RemoveArray { ticket, .. }
        | Operation::MoveArray { ticket, .. }
        | Operation::EditText { ticket, .. }
        | Operation::StyleText { ticket, .. }
        | Operation::RemoveStyleText { ticket, .. }
        | Operation::IncreaseCounter { ticket, .. }
        | Operation::InsertTreeNode { ticket, .. }
        | Operation::RemoveTreeNode { ticket, .. }
        | Operation::MoveTreeNode { ticket, .. } => ticket.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::PrimitiveValue;

    fn actor(s: &str) -> ActorId {
        ActorId::new(s)
    }

    fn ticket(l: u64, a: &str) -> TimeTicket {
        TimeTicket::new(l, 0, actor(a))
    }

    #[test]
    fn change_id_identity_ignores_lamport_and_server_seq() {
        let a = ChangeId::new(3, 10, actor("x"));
        let b = ChangeId::new(3, 99, actor("x")).with_server_seq(7);
        assert_eq!(a, b);
    }

    #[test]
    fn apply_runs_every_operation_in_order() {
        let mut root = Root::new(ticket(0, "a"));
        let root_ticket = root.object().created_at().unwrap().clone();
        let change = Change::new(
            ChangeId::new(1, 1, actor("a")),
            vec![
                Operation::SetObject {
                    parent: root_ticket.clone(),
                    key: "x".to_string(),
                    value: NewValue::Primitive(PrimitiveValue::Integer(1)),
                    ticket: ticket(1, "a"),
                },
                Operation::RemoveObject {
                    parent: root_ticket,
                    key: "x".to_string(),
                    ticket: ticket(2, "a"),
                },
            ],
        );
        change.apply(&mut root).unwrap();
        assert!(root.object().get("x").is_none());
    }

    #[test]
    fn max_ticket_picks_the_highest_minted_ticket() {
        let change = Change::new(
            ChangeId::new(1, 1, actor("a")),
            vec![
                Operation::IncreaseCounter {
                    parent: ticket(0, "a"),
                    delta: crate::crdt::CounterValue::I32(1),
                    ticket: ticket(3, "a"),
                },
                Operation::IncreaseCounter {
                    parent: ticket(0, "a"),
                    delta: crate::crdt::CounterValue::I32(1),
                    ticket: ticket(7, "a"),
                },
            ],
        );
        assert_eq!(change.max_ticket(), Some(ticket(7, "a")));
    }
}
