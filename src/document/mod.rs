//! Public document API (§4.3): optimistic local mutation, remote change
//! application, path-scoped subscriptions, and size accounting.

pub mod event;

pub use event::{ChangeEvent, DocEvent, PeersChanged, PeersChangedKind};

use crate::change::operation::{locate_array, locate_tree};
use crate::change::{Change, ChangeId, ChangePack, NewValue, Operation, PresenceChange};
use crate::crdt::{CounterValue, DataSize, JsonObject, OpInfo};
use crate::error::{Result, YorkieError};
use crate::root::Root;
use crate::time::{ActorId, Checkpoint, LamportClock, TimeTicket};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};

/// `{detached, attached, removed}` (§4.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DocumentStatus {
    Detached,
    Attached,
    Removed,
}

/// `getDocSize()` result: user payload vs ticket/link overhead, split
/// between live and tombstoned content (§4.3).
#[derive(Clone, Copy, Debug, Default)]
pub struct DocSize {
    pub live: DataSize,
    pub garbage: DataSize,
}

impl DocSize {
    pub fn total(&self) -> u64 {
        self.live.data + self.live.meta + self.garbage.data + self.garbage.meta
    }
}

pub type Handler = Box<dyn Fn(&DocEvent) + Send + Sync>;

/// The builder/proxy a caller's mutator closure receives inside
/// `Document::update` (§9 design note: typed handles plus a dynamic
/// `NewValue` fallback in place of the source's reflective proxy).
///
/// Every method mints a ticket, applies the corresponding [`Operation`] to
/// the in-progress draft immediately (so later calls in the same mutator
/// observe earlier ones), and records both the operation (for the eventual
/// `Change`) and the `OpInfo` it produced (for event fan-out — re-deriving
/// `OpInfo` by replaying is not safe in general since `Text`/`Tree` edits
/// are not idempotent under a second application of the same ticket).
pub struct ChangeContext<'a> {
    draft: &'a mut Root,
    clock: &'a mut LamportClock,
    operations: Vec<Operation>,
    op_infos: Vec<OpInfo>,
    presence_put: HashMap<String, Json>,
}

impl<'a> ChangeContext<'a> {
    pub fn root(&self) -> &JsonObject {
        self.draft.object()
    }

    pub fn root_ticket(&self) -> TimeTicket {
        self.draft
            .object()
            .created_at()
            .cloned()
            .expect("root object always has a creation ticket")
    }

    fn record(&mut self, op: Operation) -> Result<()> {
        let infos = op.apply(self.draft)?;
        self.op_infos.extend(infos);
        self.operations.push(op);
        Ok(())
    }

    pub fn set(&mut self, parent: &TimeTicket, key: impl Into<String>, value: NewValue) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::SetObject {
            parent: parent.clone(),
            key: key.into(),
            value,
            ticket,
        })
    }

    pub fn remove_key(&mut self, parent: &TimeTicket, key: impl Into<String>) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::RemoveObject {
            parent: parent.clone(),
            key: key.into(),
            ticket,
        })
    }

    /// Append to the array addressed by `parent`, returning the new
    /// element's ticket (so callers can target it with later operations,
    /// e.g. to build nested containers).
    pub fn array_append(&mut self, parent: &TimeTicket, value: NewValue) -> Result<TimeTicket> {
        let left = locate_array(self.draft, parent)?.last_live_ticket();
        self.array_insert_after(parent, left, value)
    }

    pub fn array_insert_after(
        &mut self,
        parent: &TimeTicket,
        left: Option<TimeTicket>,
        value: NewValue,
    ) -> Result<TimeTicket> {
        let ticket = self.clock.next();
        self.record(Operation::InsertArray {
            parent: parent.clone(),
            left,
            value,
            ticket: ticket.clone(),
        })?;
        Ok(ticket)
    }

    pub fn array_remove(&mut self, parent: &TimeTicket, target: &TimeTicket) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::RemoveArray {
            parent: parent.clone(),
            target: target.clone(),
            ticket,
        })
    }

    pub fn array_move_after(
        &mut self,
        parent: &TimeTicket,
        target: &TimeTicket,
        left: Option<TimeTicket>,
    ) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::MoveArray {
            parent: parent.clone(),
            target: target.clone(),
            left,
            ticket,
        })
    }

    pub fn increase_counter(&mut self, parent: &TimeTicket, delta: CounterValue) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::IncreaseCounter {
            parent: parent.clone(),
            delta,
            ticket,
        })
    }

    pub fn edit_text(
        &mut self,
        parent: &TimeTicket,
        from: usize,
        to: usize,
        content: &str,
        attrs: Option<HashMap<String, Json>>,
    ) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::EditText {
            parent: parent.clone(),
            from,
            to,
            content: content.to_string(),
            attrs,
            ticket,
        })
    }

    pub fn style_text(
        &mut self,
        parent: &TimeTicket,
        from: usize,
        to: usize,
        attrs: HashMap<String, Json>,
    ) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::StyleText {
            parent: parent.clone(),
            from,
            to,
            attrs,
            ticket,
        })
    }

    pub fn remove_style_text(
        &mut self,
        parent: &TimeTicket,
        from: usize,
        to: usize,
        keys: Vec<String>,
    ) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::RemoveStyleText {
            parent: parent.clone(),
            from,
            to,
            keys,
            ticket,
        })
    }

    pub fn tree_insert(
        &mut self,
        tree: &TimeTicket,
        node_parent: &TimeTicket,
        left_sibling: Option<TimeTicket>,
        kind: NewValue,
    ) -> Result<TimeTicket> {
        let ticket = self.clock.next();
        self.record(Operation::InsertTreeNode {
            tree: tree.clone(),
            node_parent: node_parent.clone(),
            left_sibling,
            kind,
            ticket: ticket.clone(),
        })?;
        Ok(ticket)
    }

    pub fn tree_remove(&mut self, tree: &TimeTicket, target: &TimeTicket) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::RemoveTreeNode {
            tree: tree.clone(),
            target: target.clone(),
            ticket,
        })
    }

    pub fn tree_move(
        &mut self,
        tree: &TimeTicket,
        target: &TimeTicket,
        new_parent: &TimeTicket,
        new_left_sibling: Option<TimeTicket>,
    ) -> Result<()> {
        let ticket = self.clock.next();
        self.record(Operation::MoveTreeNode {
            tree: tree.clone(),
            target: target.clone(),
            new_parent: new_parent.clone(),
            new_left_sibling,
            ticket,
        })
    }

    pub fn tree_to_xml(&self, tree: &TimeTicket) -> Result<String> {
        Ok(locate_tree(self.draft, tree)?.to_xml())
    }

    /// Shallow-merge `updates` into this update's pending presence map.
    /// Multiple calls inside one `update` collapse to a single
    /// `PresenceChanged` event carrying the final merged map (§4.6,
    /// §8 property 6).
    pub fn presence_set(&mut self, updates: HashMap<String, Json>) {
        self.presence_put.extend(updates);
    }
}

/// A replicated JSON document (§4.2 "CrdtDocument", §4.3).
pub struct Document {
    key: String,
    root: Root,
    checkpoint: Checkpoint,
    clock: LamportClock,
    local_changes: Vec<Change>,
    status: DocumentStatus,
    min_synced_ticket: TimeTicket,
    max_size_per_document: Option<u64>,
    handlers: HashMap<String, Vec<(u64, Handler)>>,
    next_handler_id: u64,
    peer_presence: HashMap<ActorId, HashMap<String, Json>>,
}

impl Document {
    pub fn new(key: impl Into<String>, actor_id: ActorId) -> Self {
        Self {
            key: key.into(),
            root: Root::new(TimeTicket::initial()),
            checkpoint: Checkpoint::initial(),
            clock: LamportClock::new(actor_id),
            local_changes: Vec::new(),
            status: DocumentStatus::Detached,
            min_synced_ticket: TimeTicket::initial(),
            max_size_per_document: None,
            handlers: HashMap::new(),
            next_handler_id: 0,
            peer_presence: HashMap::new(),
        }
    }

    pub fn with_max_size(mut self, max_size_per_document: u64) -> Self {
        self.max_size_per_document = Some(max_size_per_document);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: DocumentStatus) {
        self.status = status;
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn has_local_changes(&self) -> bool {
        !self.local_changes.is_empty()
    }

    pub fn peer_presence(&self, actor_id: &ActorId) -> Option<&HashMap<String, Json>> {
        self.peer_presence.get(actor_id)
    }

    /// Run `mutator` inside a clone-run-commit-or-rollback critical
    /// section (§4.2). Produces at most one [`Change`]; a mutator that
    /// records nothing (no operations, no presence update) commits no
    /// change at all.
    pub fn update(&mut self, mutator: impl FnOnce(&mut ChangeContext) -> Result<()>) -> Result<()> {
        if self.status == DocumentStatus::Removed {
            return Err(YorkieError::DocumentRemoved);
        }
        let mut draft = self.root.clone();
        self.clock.tick();
        let mut ctx = ChangeContext {
            draft: &mut draft,
            clock: &mut self.clock,
            operations: Vec::new(),
            op_infos: Vec::new(),
            presence_put: HashMap::new(),
        };
        mutator(&mut ctx)?;
        let ChangeContext {
            operations,
            op_infos,
            presence_put,
            ..
        } = ctx;

        if let Some(limit) = self.max_size_per_document {
            let (live, garbage) = draft.doc_size();
            let total = live.data + live.meta + garbage.data + garbage.meta;
            if total > limit {
                return Err(YorkieError::SizeLimitExceeded { used: total, limit });
            }
        }

        if operations.is_empty() && presence_put.is_empty() {
            return Ok(());
        }
        self.root = draft;
        self.checkpoint = self.checkpoint.next_client_seq();

        let id = ChangeId::new(
            self.checkpoint.client_seq,
            self.clock.peek_lamport(),
            self.clock.actor_id().clone(),
        );
        let presence_change = if presence_put.is_empty() {
            None
        } else {
            self.peer_presence
                .entry(self.clock.actor_id().clone())
                .or_default()
                .extend(presence_put.clone());
            Some(PresenceChange::Put(presence_put))
        };
        let change = Change {
            id,
            message: None,
            operations,
            presence_change,
        };

        if !op_infos.is_empty() {
            self.emit(DocEvent::Change(ChangeEvent { operations: op_infos }));
        }
        if let Some(PresenceChange::Put(map)) = &change.presence_change {
            self.emit(DocEvent::Peers(PeersChanged {
                kind: PeersChangedKind::PresenceChanged,
                actor_id: change.id.actor_id.clone(),
                presence: Some(map.clone()),
            }));
        }
        self.local_changes.push(change);
        Ok(())
    }

    /// Fold a server response into local state (§4.4 steps 1-4).
    pub fn apply_change_pack(&mut self, pack: ChangePack) -> Result<()> {
        self.apply_change_pack_with(pack, true)
    }

    /// Fold a server response into local state, optionally skipping the
    /// application of `pack.changes` to the root. `PushOnly` sync ignores
    /// remote changes in the response, but still needs the checkpoint to
    /// advance and acknowledged local changes pruned, or every later sync
    /// (push-only or not) would resend them forever (§4.4 steps 1-4, §4.5).
    pub fn apply_change_pack_with(&mut self, pack: ChangePack, apply_remote_changes: bool) -> Result<()> {
        if let Some(snapshot) = pack.snapshot {
            let committed_seq = pack.checkpoint.client_seq;
            self.local_changes.retain(|c| c.id.client_seq > committed_seq);
            self.root = snapshot.root;
            self.checkpoint = snapshot.checkpoint;
        } else {
            if apply_remote_changes {
                let mut seen: HashSet<ChangeId> = HashSet::new();
                for change in &pack.changes {
                    if !seen.insert(change.id.clone()) {
                        continue; // idempotent apply: dedup by ChangeId (§8 property 3)
                    }
                    let infos = change
                        .apply(&mut self.root)
                        .map_err(|e| YorkieError::SyncFailed(e.to_string()))?;
                    self.clock.observe(change.id.lamport);
                    if !infos.is_empty() {
                        self.emit(DocEvent::Change(ChangeEvent { operations: infos }));
                    }
                    if let Some(PresenceChange::Put(map)) = &change.presence_change {
                        self.peer_presence
                            .entry(change.id.actor_id.clone())
                            .or_default()
                            .extend(map.clone());
                        self.emit(DocEvent::Peers(PeersChanged {
                            kind: PeersChangedKind::PresenceChanged,
                            actor_id: change.id.actor_id.clone(),
                            presence: Some(map.clone()),
                        }));
                    }
                }
            }
            self.checkpoint = self
                .checkpoint
                .forward(pack.checkpoint.server_seq, pack.checkpoint.client_seq);
            let acked = self.checkpoint.client_seq;
            self.local_changes.retain(|c| c.id.client_seq > acked);
        }
        if let Some(min_synced) = pack.min_synced_ticket {
            if min_synced > self.min_synced_ticket {
                self.min_synced_ticket = min_synced;
            }
            self.root.collect_garbage(&self.min_synced_ticket);
        }
        if pack.is_removed {
            self.status = DocumentStatus::Removed;
        }
        Ok(())
    }

    /// Build the outgoing pack for the next sync round (§4.4
    /// `createChangePack`).
    pub fn create_change_pack(&self) -> ChangePack {
        ChangePack::new(self.key.clone(), self.checkpoint).with_changes(self.local_changes.clone())
    }

    pub fn subscribe(&mut self, path: Option<&str>, handler: Handler) -> u64 {
        let id = self.next_handler_id;
        self.next_handler_id += 1;
        let prefix = path.unwrap_or("$").to_string();
        self.handlers.entry(prefix).or_default().push((id, handler));
        id
    }

    /// Remove handlers at `path` (or, with `None`, every root-level
    /// handler registered under `$` — §4.3).
    pub fn unsubscribe(&mut self, path: Option<&str>) {
        self.handlers.remove(path.unwrap_or("$"));
    }

    fn emit(&self, event: DocEvent) {
        match &event {
            DocEvent::Change(change_event) => {
                for (prefix, subs) in &self.handlers {
                    let matched: Vec<OpInfo> = change_event
                        .operations
                        .iter()
                        .filter(|op| path_matches(prefix, &op.path))
                        .cloned()
                        .collect();
                    if matched.is_empty() {
                        continue;
                    }
                    let filtered = DocEvent::Change(ChangeEvent { operations: matched });
                    for (_, handler) in subs {
                        handler(&filtered);
                    }
                }
            }
            DocEvent::Peers(_) => {
                for subs in self.handlers.values() {
                    for (_, handler) in subs {
                        handler(&event);
                    }
                }
            }
        }
    }

    pub fn to_sorted_json(&self) -> Json {
        self.root.object().to_json()
    }

    pub fn get_doc_size(&self) -> DocSize {
        let (live, garbage) = self.root.doc_size();
        DocSize { live, garbage }
    }

    pub fn min_synced_ticket(&self) -> &TimeTicket {
        &self.min_synced_ticket
    }

    /// A peer subscribed to this document's watch stream (§4.6).
    pub fn notify_peer_watched(&mut self, actor_id: ActorId) {
        self.peer_presence.entry(actor_id.clone()).or_default();
        self.emit(DocEvent::Peers(PeersChanged {
            kind: PeersChangedKind::Watched,
            actor_id,
            presence: None,
        }));
    }

    /// A peer's watch stream closed; its presence entry is dropped.
    pub fn notify_peer_unwatched(&mut self, actor_id: ActorId) {
        self.peer_presence.remove(&actor_id);
        self.emit(DocEvent::Peers(PeersChanged {
            kind: PeersChangedKind::Unwatched,
            actor_id,
            presence: None,
        }));
    }
}

fn path_matches(prefix: &str, path: &str) -> bool {
    if prefix == "$" {
        return true;
    }
    path == prefix || path.starts_with(&format!("{prefix}."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::PrimitiveValue;

    fn doc(actor: &str) -> Document {
        Document::new("doc-1", ActorId::new(actor))
    }

    #[test]
    fn update_sets_a_top_level_key() {
        let mut d = doc("a");
        d.update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(&root, "x", NewValue::Primitive(PrimitiveValue::Integer(1)))
        })
        .unwrap();
        assert_eq!(d.to_sorted_json(), Json::from(serde_json::json!({"x": 1})));
        assert!(d.has_local_changes());
    }

    #[test]
    fn update_rolls_back_on_mutator_error() {
        let mut d = doc("a");
        let result = d.update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(&root, "x", NewValue::Primitive(PrimitiveValue::Integer(1)))?;
            Err(YorkieError::InvalidArgument("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(d.to_sorted_json(), Json::from(serde_json::json!({})));
        assert!(!d.has_local_changes());
    }

    #[test]
    fn size_limit_rejects_update_and_rolls_back() {
        let mut d = doc("a").with_max_size(8);
        let result = d.update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(
                &root,
                "x",
                NewValue::Primitive(PrimitiveValue::String("a long string value".into())),
            )
        });
        assert!(matches!(result, Err(YorkieError::SizeLimitExceeded { .. })));
        assert_eq!(d.to_sorted_json(), Json::from(serde_json::json!({})));
    }

    #[test]
    fn multiple_presence_sets_in_one_update_coalesce_to_final_value() {
        use std::cell::RefCell;
        let mut d = doc("a");
        let events: RefCell<Vec<HashMap<String, Json>>> = RefCell::new(Vec::new());
        d.subscribe(
            None,
            Box::new(move |event| {
                if let DocEvent::Peers(p) = event {
                    if let Some(presence) = &p.presence {
                        events.borrow_mut().push(presence.clone());
                    }
                }
            }),
        );
        d.update(|ctx| {
            let mut a = HashMap::new();
            a.insert("cursor".to_string(), Json::from(1));
            ctx.presence_set(a);
            let mut b = HashMap::new();
            b.insert("cursor".to_string(), Json::from(2));
            ctx.presence_set(b);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            d.peer_presence(&ActorId::new("a")).unwrap().get("cursor"),
            Some(&Json::from(2))
        );
    }

    #[test]
    fn apply_change_pack_is_idempotent() {
        let mut d = doc("a");
        let remote_actor = ActorId::new("b");
        let root_ticket = d.root.object().created_at().unwrap().clone();
        let change = Change::new(
            ChangeId::new(1, 1, remote_actor.clone()),
            vec![Operation::SetObject {
                parent: root_ticket,
                key: "y".to_string(),
                value: NewValue::Primitive(PrimitiveValue::Integer(5)),
                ticket: TimeTicket::new(1, 1, remote_actor),
            }],
        );
        let pack = ChangePack::new("doc-1", Checkpoint { server_seq: 1, client_seq: 0 })
            .with_changes(vec![change.clone(), change]);
        d.apply_change_pack(pack).unwrap();
        assert_eq!(d.to_sorted_json(), Json::from(serde_json::json!({"y": 5})));
    }
}
