//! Mapping from string key to child element; LWW on set, tombstone on
//! delete (§3 "Object").

use super::{DataSize, Element, ElementMeta, OpInfo, OpKind, TICKET_META_SIZE};
use crate::time::TimeTicket;
use serde_json::{Map as JsonMap, Value as Json};
use std::collections::BTreeMap;

/// A string-keyed LWW map of child CRDT elements. Keys are kept in a
/// `BTreeMap` so `toSortedJSON` falls out of normal iteration order
/// instead of needing a separate sort pass (§4.3).
#[derive(Clone, Debug)]
pub struct JsonObject {
    pub meta: ElementMeta,
    entries: BTreeMap<String, Element>,
}

impl JsonObject {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Element> {
        self.entries.get(key).filter(|e| !e.is_removed())
    }

    /// Set `key` to `value`, created at `ticket`. Concurrent sets of the
    /// same key resolve by the higher ticket (LWW); a set always wins over
    /// a tombstone for the key since it introduces a brand new node.
    pub fn set(&mut self, key: impl Into<String>, value: Element, ticket: &TimeTicket) -> bool {
        let key = key.into();
        let wins = match self.entries.get(&key) {
            Some(existing) => existing.created_at().map_or(true, |c| ticket > c),
            None => true,
        };
        if wins {
            self.entries.insert(key.clone(), value);
        }
        wins
    }

    /// Tombstone the element at `key` as of `ticket`, if it wins over any
    /// existing tombstone or mutation on that element (§4.1 LWW tiebreak).
    pub fn remove(&mut self, key: &str, ticket: &TimeTicket) -> Vec<OpInfo> {
        if let Some(el) = self.entries.get_mut(key) {
            if el.meta_mut().remove(ticket) {
                return vec![OpInfo {
                    path: format!("$.{key}"),
                    kind: OpKind::Remove,
                    value: Json::Null,
                }];
            }
        }
        Vec::new()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_removed())
            .map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Element)> {
        self.entries.iter().filter(|(_, e)| !e.is_removed())
    }

    pub fn entries_including_tombstones(&self) -> &BTreeMap<String, Element> {
        &self.entries
    }

    pub fn entries_including_tombstones_mut(&mut self) -> &mut BTreeMap<String, Element> {
        &mut self.entries
    }

    pub fn to_json(&self) -> Json {
        let mut map = JsonMap::new();
        for (k, v) in self.iter() {
            map.insert(k.clone(), v.to_json());
        }
        Json::Object(map)
    }

    pub fn data_size(&self) -> DataSize {
        let mut size = DataSize {
            data: 0,
            meta: TICKET_META_SIZE,
        };
        for (k, v) in &self.entries {
            size.meta += k.len() as u64;
            size += v.data_size();
        }
        size
    }
}
