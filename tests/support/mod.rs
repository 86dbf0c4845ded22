//! An in-process fake server used by the scenario tests: a single-process
//! stand-in for the `Coordinator` boundary that stores `Change`s per
//! document and fans out `push_pull_changes`/`watch_document` the way a
//! real Yorkie server would, simplified to what convergence tests need.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use yorkie_client::{ActorId, Change, ChangePack, Checkpoint, Coordinator, Result, WatchEvent};

struct ServerDocument {
    next_server_seq: u64,
    log: Vec<(u64, Change)>,
    watchers: Vec<async_channel::Sender<WatchEvent>>,
    removed: bool,
}

impl ServerDocument {
    fn new() -> Self {
        Self {
            next_server_seq: 0,
            log: Vec::new(),
            watchers: Vec::new(),
            removed: false,
        }
    }

    fn notify(&self, event: WatchEvent) {
        for watcher in &self.watchers {
            let _ = watcher.try_send(event.clone());
        }
    }
}

/// Single-process stand-in for a Yorkie server, shared across every client
/// in a scenario test via `Arc`.
pub struct FakeServer {
    documents: Mutex<HashMap<String, ServerDocument>>,
    next_actor: AtomicU32,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            documents: Mutex::new(HashMap::new()),
            next_actor: AtomicU32::new(1),
        })
    }

    /// Total number of changes ever logged for `key`, for tests that need
    /// to confirm a client didn't resend an already-acknowledged change.
    pub fn change_count(&self, key: &str) -> usize {
        self.documents.lock().get(key).map_or(0, |doc| doc.log.len())
    }
}

#[async_trait]
impl Coordinator for FakeServer {
    async fn activate_client(&self, _client_key: &str) -> Result<ActorId> {
        let n = self.next_actor.fetch_add(1, Ordering::SeqCst);
        Ok(ActorId::new(format!("{n:024x}")))
    }

    async fn deactivate_client(&self, _actor_id: &ActorId) -> Result<()> {
        Ok(())
    }

    async fn attach_document(&self, actor_id: &ActorId, pack: ChangePack) -> Result<ChangePack> {
        self.push_pull_changes(actor_id, pack).await
    }

    async fn detach_document(&self, actor_id: &ActorId, pack: ChangePack) -> Result<ChangePack> {
        self.push_pull_changes(actor_id, pack).await
    }

    async fn remove_document(&self, actor_id: &ActorId, pack: ChangePack) -> Result<ChangePack> {
        let mut response = self.push_pull_changes(actor_id, pack).await?;
        let mut docs = self.documents.lock();
        if let Some(doc) = docs.get_mut(&response.document_key) {
            doc.removed = true;
            doc.notify(WatchEvent::DocumentChanged);
        }
        response.is_removed = true;
        Ok(response)
    }

    async fn push_pull_changes(&self, actor_id: &ActorId, pack: ChangePack) -> Result<ChangePack> {
        let mut docs = self.documents.lock();
        let doc = docs
            .entry(pack.document_key.clone())
            .or_insert_with(ServerDocument::new);

        for change in pack.changes {
            doc.next_server_seq += 1;
            doc.log.push((doc.next_server_seq, change));
        }

        let to_return: Vec<Change> = doc
            .log
            .iter()
            .filter(|(seq, change)| *seq > pack.checkpoint.server_seq && &change.id.actor_id != actor_id)
            .map(|(_, change)| change.clone())
            .collect();

        let mut response = ChangePack::new(
            pack.document_key.clone(),
            Checkpoint {
                server_seq: doc.next_server_seq,
                client_seq: pack.checkpoint.client_seq,
            },
        )
        .with_changes(to_return);
        response.is_removed = doc.removed;

        if !response.changes.is_empty() {
            doc.notify(WatchEvent::DocumentChanged);
        }
        Ok(response)
    }

    async fn watch_document(
        &self,
        _actor_id: &ActorId,
        document_key: &str,
    ) -> Result<async_channel::Receiver<WatchEvent>> {
        let (tx, rx) = async_channel::unbounded();
        let mut docs = self.documents.lock();
        docs.entry(document_key.to_string())
            .or_insert_with(ServerDocument::new)
            .watchers
            .push(tx);
        Ok(rx)
    }

    async fn broadcast(
        &self,
        _actor_id: &ActorId,
        _document_key: &str,
        _topic: &str,
        _payload: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}
