//! The transport seam (§10, spec.md §6). Wire encoding, auth-token
//! injection, and the RPC framework itself are explicitly out of scope —
//! callers supply a [`Coordinator`] implementation (a real gRPC/HTTP
//! client, or an in-memory fake for tests) and the rest of this crate only
//! ever calls through this trait.
//!
//! Generalizes `braid-core::core::traits::BraidNetwork`'s `fetch`/
//! `subscribe` pair into the full yorkie RPC surface.

use crate::change::ChangePack;
use crate::error::Result;
use crate::time::ActorId;
use async_trait::async_trait;
use serde_json::Value as Json;

/// One server-streaming watch event for an attached document (§4.6).
#[derive(Clone, Debug)]
pub enum WatchEvent {
    PeerWatched { actor_id: ActorId },
    PeerUnwatched { actor_id: ActorId },
    DocumentChanged,
}

/// The eight RPCs the client depends on (spec.md §6), restated as an
/// `async_trait` rather than a generated gRPC stub.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn activate_client(&self, client_key: &str) -> Result<ActorId>;

    async fn deactivate_client(&self, actor_id: &ActorId) -> Result<()>;

    async fn attach_document(
        &self,
        actor_id: &ActorId,
        pack: ChangePack,
    ) -> Result<ChangePack>;

    async fn detach_document(
        &self,
        actor_id: &ActorId,
        pack: ChangePack,
    ) -> Result<ChangePack>;

    async fn remove_document(
        &self,
        actor_id: &ActorId,
        pack: ChangePack,
    ) -> Result<ChangePack>;

    async fn push_pull_changes(
        &self,
        actor_id: &ActorId,
        pack: ChangePack,
    ) -> Result<ChangePack>;

    /// Server-streaming subscription; receivers observe `WatchEvent`s until
    /// the client unsubscribes or the channel is dropped.
    async fn watch_document(
        &self,
        actor_id: &ActorId,
        document_key: &str,
    ) -> Result<async_channel::Receiver<WatchEvent>>;

    async fn broadcast(
        &self,
        actor_id: &ActorId,
        document_key: &str,
        topic: &str,
        payload: Json,
    ) -> Result<()>;
}
