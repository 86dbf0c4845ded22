//! CRDT primitives (§4.1): register, counter, text, tree, array, object.
//!
//! Every primitive is reached through the [`Element`] tagged union rather
//! than a trait object — the design note in spec.md §9 calls for a typed
//! tagged union over the CRDT primitives in place of the dynamically typed
//! proxy the source language uses for its mutator API.

pub mod array;
pub mod counter;
pub mod object;
pub mod primitive;
pub mod text;
pub mod tree;

pub use array::JsonArray;
pub use counter::{Counter, CounterValue};
pub use object::JsonObject;
pub use primitive::{Primitive, PrimitiveValue};
pub use text::Text;
pub use tree::Tree;

use crate::time::TimeTicket;
use serde_json::Value as Json;

/// Metadata every CRDT node carries: creation ticket, and the tombstone
/// ticket once removed. Container elements (array/object/tree nodes) also
/// carry a `moved_at` ticket used to resolve concurrent moves (§4.1).
#[derive(Clone, Debug, Default)]
pub struct ElementMeta {
    pub created_at: Option<TimeTicket>,
    pub moved_at: Option<TimeTicket>,
    pub removed_at: Option<TimeTicket>,
}

impl ElementMeta {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            created_at: Some(created_at),
            moved_at: None,
            removed_at: None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Mark removed by `ticket`, unless an existing tombstone already wins
    /// (higher ticket). Returns whether the remove was applied.
    pub fn remove(&mut self, ticket: &TimeTicket) -> bool {
        match &self.removed_at {
            Some(existing) if existing >= ticket => false,
            _ => {
                self.removed_at = Some(ticket.clone());
                true
            }
        }
    }

    /// Mark moved by `ticket` if it's newer than any prior move (§4.1:
    /// concurrent moves resolve by higher ticket).
    pub fn move_to(&mut self, ticket: &TimeTicket) -> bool {
        match &self.moved_at {
            Some(existing) if existing >= ticket => false,
            _ => {
                self.moved_at = Some(ticket.clone());
                true
            }
        }
    }
}

/// Path-tagged record of a single primitive mutation, emitted so the
/// document can fan it out to path-scoped subscribers (§4.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpInfo {
    pub path: String,
    pub kind: OpKind,
    pub value: Json,
}

use serde::{Deserialize, Serialize};

/// The kind of mutation an [`OpInfo`] describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpKind {
    Set,
    Remove,
    Insert,
    Move,
    Edit,
    Style,
    Increase,
}

/// A tagged union over every CRDT node kind a document tree can contain.
///
/// This is the Rust analogue of the dynamically-typed JSON value the
/// source mutator proxy hands out (spec.md §9).
#[derive(Clone, Debug)]
pub enum Element {
    Primitive(Primitive),
    Counter(Counter),
    Text(Text),
    Tree(Tree),
    Array(JsonArray),
    Object(JsonObject),
}

impl Element {
    pub fn created_at(&self) -> Option<&TimeTicket> {
        self.meta().created_at.as_ref()
    }

    pub fn removed_at(&self) -> Option<&TimeTicket> {
        self.meta().removed_at.as_ref()
    }

    pub fn is_removed(&self) -> bool {
        self.meta().is_removed()
    }

    pub fn meta(&self) -> &ElementMeta {
        match self {
            Element::Primitive(p) => &p.meta,
            Element::Counter(c) => &c.meta,
            Element::Text(t) => &t.meta,
            Element::Tree(t) => &t.meta,
            Element::Array(a) => &a.meta,
            Element::Object(o) => &o.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ElementMeta {
        match self {
            Element::Primitive(p) => &mut p.meta,
            Element::Counter(c) => &mut c.meta,
            Element::Text(t) => &mut t.meta,
            Element::Tree(t) => &mut t.meta,
            Element::Array(a) => &mut a.meta,
            Element::Object(o) => &mut o.meta,
        }
    }

    pub fn deepcopy(&self) -> Element {
        self.clone()
    }

    /// Canonical sorted-key JSON representation (§4.3 `toSortedJSON`).
    pub fn to_json(&self) -> Json {
        match self {
            Element::Primitive(p) => p.to_json(),
            Element::Counter(c) => c.to_json(),
            Element::Text(t) => t.to_json(),
            Element::Tree(t) => t.to_json(),
            Element::Array(a) => a.to_json(),
            Element::Object(o) => o.to_json(),
        }
    }

    /// Approximate byte size split into user payload vs ticket/link
    /// overhead, used by `Document::get_doc_size` (§4.3, §4.7/S6).
    pub fn data_size(&self) -> DataSize {
        match self {
            Element::Primitive(p) => p.data_size(),
            Element::Counter(c) => c.data_size(),
            Element::Text(t) => t.data_size(),
            Element::Tree(t) => t.data_size(),
            Element::Array(a) => a.data_size(),
            Element::Object(o) => o.data_size(),
        }
    }
}

/// `{data, meta}` byte accounting used by [`crate::document::DocSize`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataSize {
    pub data: u64,
    pub meta: u64,
}

impl std::ops::Add for DataSize {
    type Output = DataSize;
    fn add(self, rhs: DataSize) -> DataSize {
        DataSize {
            data: self.data + rhs.data,
            meta: self.meta + rhs.meta,
        }
    }
}

impl std::ops::AddAssign for DataSize {
    fn add_assign(&mut self, rhs: DataSize) {
        *self = *self + rhs;
    }
}

/// Size in bytes of the fixed ticket triple, used as the per-node
/// metadata overhead baseline.
pub const TICKET_META_SIZE: u64 = 8 /* lamport */ + 4 /* delimiter */ + 24 /* actor id */;
