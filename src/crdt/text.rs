//! Rich text: an RGA-ordered sequence of UTF-16-indexed characters with
//! per-range attribute maps (§3 "Text", §4.1 "Text edit"/"Text style").
//!
//! Node identity and ordering follow the simplified RGA scheme: each
//! inserted run carries the ticket of the change that created it plus the
//! identity of the node immediately to its left at insertion time
//! (`left_origin`). Concurrent inserts at the same position are ordered by
//! descending ticket, which is deterministic regardless of the order the
//! two edits are applied in. Splitting a run for a later edit preserves
//! the original creation ticket plus a `split_offset` rather than minting
//! a new identity (§3: "Split nodes preserve original ticket plus an
//! offset").
//!
//! Index positions in the public API are character offsets into the live
//! (non-tombstoned) content; `data_size` reports lengths in UTF-16 code
//! units via `str_indices`, matching how the wire format measures text.

use super::{DataSize, ElementMeta, OpInfo, OpKind, TICKET_META_SIZE};
use crate::time::TimeTicket;
use jumprope::JumpRope;
use serde_json::Value as Json;
use std::collections::HashMap;

type NodeKey = (TimeTicket, usize);

/// An attribute value with LWW semantics, keyed by the ticket that last set
/// it. A `removed` entry is an explicit "clear" (distinct from simply
/// absent, which means "inherited" — §4.1 `setStyle`/`removeStyle`).
#[derive(Clone, Debug)]
struct StyleEntry {
    value: Json,
    ticket: TimeTicket,
    removed: bool,
}

#[derive(Clone, Debug)]
struct TextNode {
    origin: TimeTicket,
    split_offset: usize,
    left_origin: Option<NodeKey>,
    content: String,
    removed_at: Option<TimeTicket>,
    attributes: HashMap<String, StyleEntry>,
}

impl TextNode {
    fn key(&self) -> NodeKey {
        (self.origin.clone(), self.split_offset)
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Clone, Debug)]
pub struct Text {
    pub meta: ElementMeta,
    nodes: Vec<TextNode>,
}

impl Text {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            nodes: Vec::new(),
        }
    }

    pub fn with_content(content: &str, created_at: TimeTicket) -> Self {
        let mut text = Self::new(created_at.clone());
        if !content.is_empty() {
            text.nodes.push(TextNode {
                origin: created_at,
                split_offset: 0,
                left_origin: None,
                content: content.to_string(),
                removed_at: None,
                attributes: HashMap::new(),
            });
        }
        text
    }

    /// Live character count (approximates the UTF-16 length; see module
    /// docs for the simplification).
    pub fn len(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.removed_at.is_none())
            .map(TextNode::char_len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assemble the live content into a single string via a scratch rope,
    /// walking live fragments in order and skipping tombstones.
    pub fn to_string_content(&self) -> String {
        let mut rope = JumpRope::new();
        let mut pos = 0usize;
        for n in &self.nodes {
            if n.removed_at.is_none() {
                rope.insert(pos, &n.content);
                pos += n.char_len();
            }
        }
        rope.to_string()
    }

    fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.nodes.iter().position(|n| &n.key() == key)
    }

    /// (node index, offset within node) for the boundary at live position
    /// `pos`, scanning live nodes only.
    fn locate(&self, pos: usize) -> (usize, usize) {
        let mut consumed = 0;
        for (i, n) in self.nodes.iter().enumerate() {
            if n.removed_at.is_some() {
                continue;
            }
            let len = n.char_len();
            if consumed + len >= pos {
                return (i, pos - consumed);
            }
            consumed += len;
        }
        (self.nodes.len(), 0)
    }

    /// Split `nodes[idx]` at `offset` characters in, if `offset` falls
    /// strictly inside it. Both halves keep the original creation ticket.
    fn split_at(&mut self, idx: usize, offset: usize) {
        if idx >= self.nodes.len() {
            return;
        }
        let len = self.nodes[idx].char_len();
        if offset == 0 || offset >= len {
            return;
        }
        let node = self.nodes[idx].clone();
        let chars: Vec<char> = node.content.chars().collect();
        let left: String = chars[..offset].iter().collect();
        let right: String = chars[offset..].iter().collect();

        let left_piece = TextNode {
            content: left,
            ..node.clone()
        };
        let right_piece = TextNode {
            origin: node.origin.clone(),
            split_offset: node.split_offset + offset,
            left_origin: Some(left_piece.key()),
            content: right,
            removed_at: node.removed_at.clone(),
            attributes: node.attributes.clone(),
        };
        self.nodes[idx] = left_piece;
        self.nodes.insert(idx + 1, right_piece);
    }

    /// Vec index of the node beginning exactly at live position `pos`
    /// (callers must have already split at that boundary).
    fn vec_index_at(&self, pos: usize) -> usize {
        let mut consumed = 0;
        for (i, n) in self.nodes.iter().enumerate() {
            if consumed == pos {
                return i;
            }
            if n.removed_at.is_none() {
                consumed += n.char_len();
            }
        }
        self.nodes.len()
    }

    /// RGA integrate: insert `node` at the position implied by its
    /// `left_origin`, scanning past concurrently-inserted siblings with a
    /// higher ticket so that all replicas converge on the same order.
    fn integrate(&mut self, node: TextNode) {
        let mut idx = match &node.left_origin {
            Some(origin) => self.index_of(origin).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };
        let new_origin_idx = node
            .left_origin
            .as_ref()
            .and_then(|o| self.index_of(o));
        while idx < self.nodes.len() {
            let right = &self.nodes[idx];
            let right_origin_idx = right
                .left_origin
                .as_ref()
                .and_then(|o| self.index_of(o));
            if right_origin_idx != new_origin_idx {
                break;
            }
            if right.origin > node.origin {
                idx += 1;
                continue;
            }
            break;
        }
        self.nodes.insert(idx, node);
    }

    /// `(from, to, content, attrs)`: translate the range to a left-sibling
    /// anchor, insert new characters right of it, tombstone `[from, to)`.
    pub fn edit(
        &mut self,
        from: usize,
        to: usize,
        content: &str,
        ticket: TimeTicket,
        attrs: Option<HashMap<String, Json>>,
    ) -> Vec<OpInfo> {
        debug_assert!(from <= to);
        let (to_idx, to_off) = self.locate(to);
        self.split_at(to_idx, to_off);
        let (from_idx, from_off) = self.locate(from);
        self.split_at(from_idx, from_off);

        let from_vec_idx = self.vec_index_at(from);
        let to_vec_idx = self.vec_index_at(to);
        for n in &mut self.nodes[from_vec_idx..to_vec_idx] {
            if n.removed_at.is_none() {
                n.removed_at = Some(ticket.clone());
            }
        }

        if !content.is_empty() {
            let left_origin = if from_vec_idx == 0 {
                None
            } else {
                Some(self.nodes[from_vec_idx - 1].key())
            };
            let mut attributes = HashMap::new();
            if let Some(attrs) = attrs {
                for (k, v) in attrs {
                    attributes.insert(
                        k,
                        StyleEntry {
                            value: v,
                            ticket: ticket.clone(),
                            removed: false,
                        },
                    );
                }
            }
            let new_node = TextNode {
                origin: ticket.clone(),
                split_offset: 0,
                left_origin,
                content: content.to_string(),
                removed_at: None,
                attributes,
            };
            self.integrate(new_node);
        }

        vec![OpInfo {
            path: String::new(),
            kind: OpKind::Edit,
            value: Json::String(content.to_string()),
        }]
    }

    /// Install an LWW attribute entry for every character in `[from, to)`.
    pub fn set_style(
        &mut self,
        from: usize,
        to: usize,
        attrs: HashMap<String, Json>,
        ticket: TimeTicket,
    ) -> Vec<OpInfo> {
        self.apply_style(from, to, attrs, ticket, false)
    }

    /// Install a tombstone attribute entry ("explicitly cleared") for each
    /// key in `[from, to)` — distinct from never having set it at all.
    pub fn remove_style(
        &mut self,
        from: usize,
        to: usize,
        keys: Vec<String>,
        ticket: TimeTicket,
    ) -> Vec<OpInfo> {
        let attrs = keys.into_iter().map(|k| (k, Json::Null)).collect();
        self.apply_style(from, to, attrs, ticket, true)
    }

    fn apply_style(
        &mut self,
        from: usize,
        to: usize,
        attrs: HashMap<String, Json>,
        ticket: TimeTicket,
        removed: bool,
    ) -> Vec<OpInfo> {
        let (to_idx, to_off) = self.locate(to);
        self.split_at(to_idx, to_off);
        let (from_idx, from_off) = self.locate(from);
        self.split_at(from_idx, from_off);

        let from_vec_idx = self.vec_index_at(from);
        let to_vec_idx = self.vec_index_at(to);
        for n in &mut self.nodes[from_vec_idx..to_vec_idx] {
            for (k, v) in &attrs {
                let install = match n.attributes.get(k) {
                    Some(existing) => ticket > existing.ticket,
                    None => true,
                };
                if install {
                    n.attributes.insert(
                        k.clone(),
                        StyleEntry {
                            value: v.clone(),
                            ticket: ticket.clone(),
                            removed,
                        },
                    );
                }
            }
        }

        vec![OpInfo {
            path: String::new(),
            kind: OpKind::Style,
            value: Json::Object(attrs.into_iter().collect()),
        }]
    }

    pub fn to_json(&self) -> Json {
        Json::String(self.to_string_content())
    }

    pub fn data_size(&self) -> DataSize {
        let mut data = 0u64;
        for n in &self.nodes {
            data += str_indices::utf16::count(&n.content) as u64;
            for entry in n.attributes.values() {
                data += entry.value.to_string().len() as u64;
            }
        }
        DataSize {
            data,
            meta: TICKET_META_SIZE * self.nodes.len().max(1) as u64,
        }
    }
}
