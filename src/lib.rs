//! Client-side CRDT document runtime.
//!
//! Replicated JSON documents with text/tree/counter/array/object
//! primitives, a change/checkpoint sync protocol, a client state machine
//! with pluggable sync modes, and presence over a transport-agnostic
//! [`coordinator::Coordinator`] seam. Wire encoding, auth, and the actual
//! RPC framework are left to whatever implements that trait.

pub mod change;
pub mod client;
pub mod coordinator;
pub mod crdt;
pub mod document;
pub mod error;
pub mod root;
pub mod time;

pub use change::{Change, ChangeId, ChangePack, NewValue, Operation, Snapshot};
pub use client::{
    AttachmentMode, Client, ClientOptions, ClientStatus, DocumentHandle, DocumentOptions, SyncMode,
};
pub use coordinator::{Coordinator, WatchEvent};
pub use document::{ChangeContext, DocEvent, Document, DocumentStatus, DocSize};
pub use error::{Result, YorkieError};
pub use root::Root;
pub use time::{ActorId, Checkpoint, TimeTicket};
