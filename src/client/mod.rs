//! The client state machine (§4.5): `Deactivated ⟷ Activated`, and per
//! attached document `Detached → Attached → {Removed | Detached}`.
//!
//! Grounded on `braid-http::client::retry` for the transport-retry shape
//! used by [`sync_document`]'s retryable-error path (see [`retry`]), and on
//! `braid-core::core::traits::{BraidRuntime, BraidNetwork}` for the
//! injectable runtime/network seam, realized here as the
//! [`crate::coordinator::Coordinator`] trait.

pub mod options;
pub mod retry;
pub mod sync_mode;

pub use options::{AuthTokenInjector, ClientOptions, DocumentOptions};
pub use sync_mode::{AttachmentMode, SyncMode};

use crate::change::ChangePack;
use crate::coordinator::{Coordinator, WatchEvent};
use crate::document::{ChangeContext, Document, DocumentStatus, Handler};
use crate::error::{Result, YorkieError};
use crate::time::ActorId;
use retry::{RetryConfig, RetryDecision, RetryState};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// `Deactivated ⟷ Activated` (§4.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientStatus {
    Deactivated,
    Activated,
}

struct DocumentEntry {
    document: AsyncMutex<Document>,
    sync_mode: AsyncMutex<SyncMode>,
    attachment_mode: AttachmentMode,
    watch_task: AsyncMutex<Option<JoinHandle<()>>>,
    coordinator: Arc<dyn Coordinator>,
    actor_id: ActorId,
    sync_loop_duration: Duration,
    reconnect_stream_delay: Duration,
    /// Debounces `Realtime` opportunistic sync: at most one pending sync
    /// task per document, coalescing bursts of local updates.
    sync_scheduled: AtomicBool,
}

/// A cheap, cloneable reference to one attached document, returned by
/// [`Client::attach`]. Mutation and subscription both go through the
/// document's own async mutex, shared with the background watch/sync task.
#[derive(Clone)]
pub struct DocumentHandle {
    key: String,
    entry: Arc<DocumentEntry>,
}

impl DocumentHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn status(&self) -> DocumentStatus {
        self.entry.document.lock().await.status()
    }

    /// Apply a local mutation. In [`AttachmentMode::Realtime`], a
    /// successful mutation also schedules an opportunistic sync after
    /// `sync_loop_duration` (§4.5, §4.6): the other half of realtime sync,
    /// alongside the watch-stream-triggered sync in [`run_watch_loop`].
    pub async fn update(&self, mutator: impl FnOnce(&mut ChangeContext) -> Result<()>) -> Result<()> {
        self.entry.document.lock().await.update(mutator)?;
        if self.entry.attachment_mode == AttachmentMode::Realtime {
            schedule_realtime_sync(self.entry.clone());
        }
        Ok(())
    }

    pub async fn subscribe(&self, path: Option<&str>, handler: Handler) -> u64 {
        self.entry.document.lock().await.subscribe(path, handler)
    }

    pub async fn unsubscribe(&self, path: Option<&str>) {
        self.entry.document.lock().await.unsubscribe(path);
    }

    pub async fn to_sorted_json(&self) -> Json {
        self.entry.document.lock().await.to_sorted_json()
    }

    pub async fn set_sync_mode(&self, mode: SyncMode) {
        *self.entry.sync_mode.lock().await = mode;
    }
}

/// A yorkie client: one actor identity shared across every document it
/// attaches (§4.5, §6).
pub struct Client {
    options: ClientOptions,
    coordinator: Arc<dyn Coordinator>,
    status: AsyncMutex<ClientStatus>,
    actor_id: AsyncMutex<Option<ActorId>>,
    documents: AsyncMutex<HashMap<String, Arc<DocumentEntry>>>,
}

impl Client {
    pub fn new(coordinator: Arc<dyn Coordinator>, options: ClientOptions) -> Self {
        Self {
            options,
            coordinator,
            status: AsyncMutex::new(ClientStatus::Deactivated),
            actor_id: AsyncMutex::new(None),
            documents: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn status(&self) -> ClientStatus {
        *self.status.lock().await
    }

    pub async fn actor_id(&self) -> Option<ActorId> {
        self.actor_id.lock().await.clone()
    }

    /// Register the client with the server, assigning it an [`ActorId`]
    /// (§4.5). Activating an already-activated client is an error.
    pub async fn activate(&self) -> Result<()> {
        let mut status = self.status.lock().await;
        if *status == ClientStatus::Activated {
            return Err(YorkieError::ClientNotActivated);
        }
        let client_key = self
            .options
            .key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let actor_id = self.coordinator.activate_client(&client_key).await?;
        debug!(actor_id = %actor_id, "client activated");
        *self.actor_id.lock().await = Some(actor_id);
        *status = ClientStatus::Activated;
        Ok(())
    }

    /// Deregister the client, tearing down every attached document's watch
    /// task (§4.5). A no-op on an already-deactivated client.
    pub async fn deactivate(&self) -> Result<()> {
        let mut status = self.status.lock().await;
        if *status == ClientStatus::Deactivated {
            return Ok(());
        }
        let actor_id = self
            .actor_id
            .lock()
            .await
            .clone()
            .ok_or(YorkieError::ClientNotActive)?;
        self.coordinator.deactivate_client(&actor_id).await?;

        let mut docs = self.documents.lock().await;
        for entry in docs.values() {
            if let Some(handle) = entry.watch_task.lock().await.take() {
                handle.abort();
            }
        }
        docs.clear();
        drop(docs);

        *self.actor_id.lock().await = None;
        *status = ClientStatus::Deactivated;
        Ok(())
    }

    async fn require_actor_id(&self) -> Result<ActorId> {
        self.actor_id
            .lock()
            .await
            .clone()
            .ok_or(YorkieError::ClientNotActive)
    }

    async fn entry(&self, key: &str) -> Result<Arc<DocumentEntry>> {
        self.documents
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or(YorkieError::DocumentNotAttached)
    }

    /// Attach a new document by key: builds it locally under this client's
    /// actor identity, pushes its (possibly empty) initial state and
    /// presence to the server, installs the server's response, and starts
    /// the background watch stream (§4.5, §4.6).
    pub async fn attach(
        &self,
        key: impl Into<String>,
        initial_presence: HashMap<String, Json>,
        sync_mode: SyncMode,
        attachment_mode: AttachmentMode,
        document_options: DocumentOptions,
    ) -> Result<DocumentHandle> {
        let actor_id = self.require_actor_id().await?;
        let key = key.into();
        if self.documents.lock().await.contains_key(&key) {
            return Err(YorkieError::DocumentNotDetached);
        }

        let mut document = Document::new(key.clone(), actor_id.clone());
        if let Some(limit) = document_options.max_size_per_document {
            document = document.with_max_size(limit);
        }
        if !initial_presence.is_empty() {
            document.update(|ctx| {
                ctx.presence_set(initial_presence.clone());
                Ok(())
            })?;
        }

        let outgoing = document.create_change_pack();
        let response = self.coordinator.attach_document(&actor_id, outgoing).await?;
        document.apply_change_pack(response)?;
        document.set_status(DocumentStatus::Attached);

        let entry = Arc::new(DocumentEntry {
            document: AsyncMutex::new(document),
            sync_mode: AsyncMutex::new(sync_mode),
            attachment_mode,
            watch_task: AsyncMutex::new(None),
            coordinator: self.coordinator.clone(),
            actor_id: actor_id.clone(),
            sync_loop_duration: self.options.sync_loop_duration,
            reconnect_stream_delay: self.options.reconnect_stream_delay,
            sync_scheduled: AtomicBool::new(false),
        });
        self.documents.lock().await.insert(key.clone(), entry.clone());

        let events = self.coordinator.watch_document(&actor_id, &key).await?;
        let watch_coordinator = self.coordinator.clone();
        let watch_actor_id = actor_id;
        let watch_entry = entry.clone();
        let watch_document_key = key.clone();
        let handle = tokio::spawn(async move {
            run_watch_loop(watch_coordinator, watch_actor_id, watch_document_key, watch_entry, events).await;
        });
        *entry.watch_task.lock().await = Some(handle);

        Ok(DocumentHandle { key, entry })
    }

    /// Detach a document: one final sync, then hand the watch stream back
    /// and drop it from this client's table (§4.5).
    pub async fn detach(&self, key: &str) -> Result<()> {
        let actor_id = self.require_actor_id().await?;
        let entry = self.entry(key).await?;
        {
            let doc = entry.document.lock().await;
            if doc.status() != DocumentStatus::Attached {
                return Err(YorkieError::DocumentNotAttached);
            }
        }
        let outgoing = entry.document.lock().await.create_change_pack();
        let response = self.coordinator.detach_document(&actor_id, outgoing).await?;
        {
            let mut doc = entry.document.lock().await;
            doc.apply_change_pack(response)?;
            doc.set_status(DocumentStatus::Detached);
        }
        if let Some(handle) = entry.watch_task.lock().await.take() {
            handle.abort();
        }
        self.documents.lock().await.remove(key);
        Ok(())
    }

    /// Ask the server to mark a document removed and tombstone it locally
    /// (§4.5, §4.7).
    pub async fn remove(&self, key: &str) -> Result<()> {
        let actor_id = self.require_actor_id().await?;
        let entry = self.entry(key).await?;
        let outgoing = entry.document.lock().await.create_change_pack();
        let response = self.coordinator.remove_document(&actor_id, outgoing).await?;
        {
            let mut doc = entry.document.lock().await;
            doc.apply_change_pack(response)?;
            doc.set_status(DocumentStatus::Removed);
        }
        if let Some(handle) = entry.watch_task.lock().await.take() {
            handle.abort();
        }
        self.documents.lock().await.remove(key);
        Ok(())
    }

    /// Run one sync round for a single attached document, overriding its
    /// configured [`SyncMode`] if `mode` is given (§4.5).
    pub async fn sync(&self, key: &str, mode: Option<SyncMode>) -> Result<()> {
        let actor_id = self.require_actor_id().await?;
        let entry = self.entry(key).await?;
        let effective_mode = match mode {
            Some(mode) => mode,
            None => *entry.sync_mode.lock().await,
        };
        sync_document(&self.coordinator, &actor_id, &entry.document, effective_mode).await
    }

    /// Sync every attached document using each document's own configured
    /// mode.
    pub async fn sync_all(&self) -> Result<()> {
        let actor_id = self.require_actor_id().await?;
        let entries: Vec<Arc<DocumentEntry>> = self.documents.lock().await.values().cloned().collect();
        for entry in entries {
            let mode = *entry.sync_mode.lock().await;
            sync_document(&self.coordinator, &actor_id, &entry.document, mode).await?;
        }
        Ok(())
    }
}

/// One push-pull round against the coordinator, retrying transport errors
/// with backoff (§4.5, §7).
async fn sync_document(
    coordinator: &Arc<dyn Coordinator>,
    actor_id: &ActorId,
    document: &AsyncMutex<Document>,
    mode: SyncMode,
) -> Result<()> {
    let outgoing: ChangePack = {
        let doc = document.lock().await;
        match mode {
            SyncMode::PullOnly => ChangePack::new(doc.key().to_string(), doc.checkpoint()),
            SyncMode::PushPull | SyncMode::PushOnly => doc.create_change_pack(),
        }
    };

    let mut retry = RetryState::new(RetryConfig::default());
    loop {
        match coordinator.push_pull_changes(actor_id, outgoing.clone()).await {
            Ok(response) => {
                document
                    .lock()
                    .await
                    .apply_change_pack_with(response, mode != SyncMode::PushOnly)?;
                return Ok(());
            }
            Err(err) if err.is_retryable() => match retry.decide() {
                RetryDecision::Retry(wait) => {
                    tokio::time::sleep(wait).await;
                    continue;
                }
                RetryDecision::DontRetry => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

/// Schedule an opportunistic sync after `sync_loop_duration`, coalescing
/// any updates that land while one is already pending into the same round
/// (§4.5: the local-change half of `Realtime` sync scheduling).
fn schedule_realtime_sync(entry: Arc<DocumentEntry>) {
    if entry.sync_scheduled.swap(true, Ordering::SeqCst) {
        return;
    }
    tokio::spawn(async move {
        tokio::time::sleep(entry.sync_loop_duration).await;
        entry.sync_scheduled.store(false, Ordering::SeqCst);
        let mode = *entry.sync_mode.lock().await;
        if let Err(err) = sync_document(&entry.coordinator, &entry.actor_id, &entry.document, mode).await {
            warn!(%err, "realtime sync failed");
        }
    });
}

/// Drains one document's watch stream: updates the peer table on
/// watch/unwatch notifications, and schedules an opportunistic sync on
/// `DocumentChanged` when the document was attached in realtime mode
/// (§4.5, §4.6). If the stream closes, reconnects with exponential
/// backoff starting at `reconnect_stream_delay`, capped at 30s (spec
/// errors-inside-a-watch-stream policy), until the document is detached
/// (at which point the task itself is aborted from outside).
async fn run_watch_loop(
    coordinator: Arc<dyn Coordinator>,
    actor_id: ActorId,
    document_key: String,
    entry: Arc<DocumentEntry>,
    mut events: async_channel::Receiver<WatchEvent>,
) {
    loop {
        while let Ok(event) = events.recv().await {
            match event {
                WatchEvent::PeerWatched { actor_id: peer } => {
                    entry.document.lock().await.notify_peer_watched(peer);
                }
                WatchEvent::PeerUnwatched { actor_id: peer } => {
                    entry.document.lock().await.notify_peer_unwatched(peer);
                }
                WatchEvent::DocumentChanged => {
                    if entry.attachment_mode == AttachmentMode::Realtime {
                        let mode = *entry.sync_mode.lock().await;
                        if let Err(err) = sync_document(&coordinator, &actor_id, &entry.document, mode).await {
                            warn!(%err, "realtime sync failed");
                        }
                    }
                }
            }
        }

        let mut retry = RetryState::new(RetryConfig {
            max_retries: None,
            initial_backoff: entry.reconnect_stream_delay,
            max_backoff: Duration::from_secs(30),
        });
        loop {
            let RetryDecision::Retry(wait) = retry.decide() else {
                return; // RetryConfig above never gives up (max_retries: None)
            };
            tokio::time::sleep(wait).await;
            match coordinator.watch_document(&actor_id, &document_key).await {
                Ok(reconnected) => {
                    events = reconnected;
                    break;
                }
                Err(err) => {
                    warn!(%err, "watch stream reconnect failed, retrying");
                }
            }
        }
    }
}
