//! Ordered list of child elements; insert-after-left-sibling, move by
//! ticket tiebreak (§3 "Array", §4.1 "Array").

use super::{DataSize, Element, ElementMeta, OpInfo, OpKind, TICKET_META_SIZE};
use crate::error::{Result, YorkieError};
use crate::time::TimeTicket;
use serde_json::Value as Json;

struct Item {
    left_origin: Option<TimeTicket>,
    value: Element,
}

impl Item {
    fn id(&self) -> &TimeTicket {
        self.value
            .created_at()
            .expect("array items always carry a creation ticket")
    }
}

/// An ordered list of CRDT elements. Position is addressed by the
/// creation ticket of the left sibling at insert time, the same
/// insert-after scheme [`crate::crdt::text::Text`] uses for characters.
pub struct JsonArray {
    pub meta: ElementMeta,
    items: Vec<Item>,
}

impl Clone for JsonArray {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            items: self
                .items
                .iter()
                .map(|i| Item {
                    left_origin: i.left_origin.clone(),
                    value: i.value.clone(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for JsonArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonArray")
            .field("len", &self.items.len())
            .finish()
    }
}

impl JsonArray {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            items: Vec::new(),
        }
    }

    fn index_of(&self, id: &TimeTicket) -> Option<usize> {
        self.items.iter().position(|i| i.id() == id)
    }

    fn integrate(&mut self, item: Item) {
        let mut idx = match &item.left_origin {
            Some(origin) => self.index_of(origin).map(|i| i + 1).unwrap_or(0),
            None => 0,
        };
        let new_origin_idx = item.left_origin.as_ref().and_then(|o| self.index_of(o));
        while idx < self.items.len() {
            let right = &self.items[idx];
            let right_origin_idx = right.left_origin.as_ref().and_then(|o| self.index_of(o));
            if right_origin_idx != new_origin_idx {
                break;
            }
            if right.id() > item.id() {
                idx += 1;
                continue;
            }
            break;
        }
        self.items.insert(idx, item);
    }

    /// Insert `value` immediately after the element whose creation ticket
    /// is `left`, or at the front if `left` is `None` (append: pass the
    /// current last live element's ticket).
    pub fn insert_after(&mut self, left: Option<TimeTicket>, value: Element) -> Vec<OpInfo> {
        let id = value.created_at().cloned();
        self.integrate(Item {
            left_origin: left,
            value,
        });
        vec![OpInfo {
            path: String::new(),
            kind: OpKind::Insert,
            value: id.map(|t| Json::String(t.to_string())).unwrap_or(Json::Null),
        }]
    }

    /// Append `value` after the current last live element.
    pub fn append(&mut self, value: Element) -> Vec<OpInfo> {
        let left = self.items.last().map(|i| i.id().clone());
        self.insert_after(left, value)
    }

    /// Tombstone the element identified by `target` as of `ticket`.
    pub fn remove(&mut self, target: &TimeTicket, ticket: &TimeTicket) -> Vec<OpInfo> {
        if let Some(item) = self.items.iter_mut().find(|i| i.id() == target) {
            if item.value.meta_mut().remove(ticket) {
                return vec![OpInfo {
                    path: String::new(),
                    kind: OpKind::Remove,
                    value: Json::String(target.to_string()),
                }];
            }
        }
        Vec::new()
    }

    /// Move the element identified by `target` to just after `left`
    /// (or the front, if `None`). Concurrent moves of the same element
    /// resolve by the higher `ticket` (§4.1); a move concurrent with a
    /// remove keeps the tombstone (the element stays removed either way).
    pub fn move_after(
        &mut self,
        target: &TimeTicket,
        left: Option<TimeTicket>,
        ticket: &TimeTicket,
    ) -> Result<Vec<OpInfo>> {
        let idx = self
            .index_of(target)
            .ok_or_else(|| YorkieError::InvalidArgument(format!("no such array element: {target}")))?;
        if !self.items[idx].value.meta_mut().move_to(ticket) {
            return Ok(Vec::new());
        }
        let mut item = self.items.remove(idx);
        item.left_origin = left;
        self.integrate(item);
        Ok(vec![OpInfo {
            path: String::new(),
            kind: OpKind::Move,
            value: Json::String(target.to_string()),
        }])
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|i| !i.value.is_removed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.items.iter().filter(|i| !i.value.is_removed()).map(|i| &i.value)
    }

    /// Every element including tombstones, for recursive locate/GC walks.
    pub fn iter_all_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.items.iter_mut().map(|i| &mut i.value)
    }

    /// Immutable counterpart of [`JsonArray::iter_all_mut`].
    pub fn iter_all(&self) -> impl Iterator<Item = &Element> {
        self.items.iter().map(|i| &i.value)
    }

    /// Physically drop the tombstoned item identified by `id`, for GC.
    pub fn remove_physically(&mut self, id: &TimeTicket) -> bool {
        match self.index_of(id) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn last_live_ticket(&self) -> Option<TimeTicket> {
        self.items
            .iter()
            .rev()
            .find(|i| !i.value.is_removed())
            .map(|i| i.id().clone())
    }

    pub fn to_json(&self) -> Json {
        Json::Array(self.iter().map(Element::to_json).collect())
    }

    pub fn data_size(&self) -> DataSize {
        let mut size = DataSize {
            data: 0,
            meta: TICKET_META_SIZE,
        };
        for item in &self.items {
            size += item.value.data_size();
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::{Primitive, PrimitiveValue};
    use crate::time::ActorId;

    fn ticket(l: u64) -> TimeTicket {
        TimeTicket::new(l, 0, ActorId::new("a"))
    }

    fn prim(v: i32, t: TimeTicket) -> Element {
        Element::Primitive(Primitive::new(PrimitiveValue::Integer(v), t))
    }

    #[test]
    fn append_preserves_order() {
        let mut arr = JsonArray::new(ticket(0));
        arr.append(prim(1, ticket(1)));
        arr.append(prim(2, ticket(2)));
        arr.append(prim(3, ticket(3)));
        assert_eq!(arr.to_json(), Json::from(vec![1, 2, 3]));
    }

    #[test]
    fn remove_tombstones_without_shifting_other_indices() {
        let mut arr = JsonArray::new(ticket(0));
        arr.append(prim(1, ticket(1)));
        arr.append(prim(2, ticket(2)));
        let target = ticket(1);
        arr.remove(&target, &ticket(3));
        assert_eq!(arr.to_json(), Json::from(vec![2]));
    }

    #[test]
    fn move_after_reorders() {
        let mut arr = JsonArray::new(ticket(0));
        arr.append(prim(1, ticket(1)));
        arr.append(prim(2, ticket(2)));
        arr.append(prim(3, ticket(3)));
        // Move element "1" to after element "3".
        arr.move_after(&ticket(1), Some(ticket(3)), &ticket(4)).unwrap();
        assert_eq!(arr.to_json(), Json::from(vec![2, 3, 1]));
    }

    #[test]
    fn concurrent_move_resolves_by_higher_ticket() {
        let mut arr = JsonArray::new(ticket(0));
        arr.append(prim(1, ticket(1)));
        arr.append(prim(2, ticket(2)));
        arr.move_after(&ticket(1), Some(ticket(2)), &ticket(10)).unwrap();
        // A lower-ticket concurrent move is rejected.
        let moved = arr.move_after(&ticket(1), None, &ticket(5)).unwrap();
        assert!(moved.is_empty());
        assert_eq!(arr.to_json(), Json::from(vec![2, 1]));
    }
}
