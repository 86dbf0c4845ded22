//! Operations: the recorded effect of one primitive mutation, replayable
//! against a [`Root`] either locally (just-performed) or remotely
//! (received in a [`super::Change`]).
//!
//! `parent` addresses the container the operation applies to by its
//! creation ticket. Locating that container walks the tree from the
//! document root rather than through a separately maintained index (see
//! the module docs on [`crate::root`]).

use crate::crdt::{
    Counter, CounterValue, Element, JsonArray, JsonObject, OpInfo, Primitive, PrimitiveValue,
    Text, Tree, TreeNodeKind,
};
use crate::error::{Result, YorkieError};
use crate::root::Root;
use crate::time::TimeTicket;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;

/// The value a newly-created element carries. Generalizes the "cast to
/// typed handle" design note in spec.md §9 into a tagged union a
/// constructor operation can serialize and replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NewValue {
    Primitive(PrimitiveValue),
    Counter(CounterValue),
    Text(String),
    Object,
    Array,
    TreeElement(String),
    TreeText(String),
}

impl NewValue {
    fn into_element(self, ticket: TimeTicket) -> Element {
        match self {
            NewValue::Primitive(v) => Element::Primitive(Primitive::new(v, ticket)),
            NewValue::Counter(v) => Element::Counter(Counter::new(v, ticket)),
            NewValue::Text(content) => Element::Text(Text::with_content(&content, ticket)),
            NewValue::Object => Element::Object(JsonObject::new(ticket)),
            NewValue::Array => Element::Array(JsonArray::new(ticket)),
            NewValue::TreeElement(_) | NewValue::TreeText(_) => {
                unreachable!("tree nodes are constructed via TreeOp, not NewValue::into_element")
            }
        }
    }
}

/// One recorded CRDT mutation. Each variant mirrors an operation listed in
/// spec.md §4.1/§6's public CRDT API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Operation {
    SetObject {
        parent: TimeTicket,
        key: String,
        value: NewValue,
        ticket: TimeTicket,
    },
    RemoveObject {
        parent: TimeTicket,
        key: String,
        ticket: TimeTicket,
    },
    InsertArray {
        parent: TimeTicket,
        left: Option<TimeTicket>,
        value: NewValue,
        ticket: TimeTicket,
    },
    RemoveArray {
        parent: TimeTicket,
        target: TimeTicket,
        ticket: TimeTicket,
    },
    MoveArray {
        parent: TimeTicket,
        target: TimeTicket,
        left: Option<TimeTicket>,
        ticket: TimeTicket,
    },
    EditText {
        parent: TimeTicket,
        from: usize,
        to: usize,
        content: String,
        attrs: Option<HashMap<String, Json>>,
        ticket: TimeTicket,
    },
    StyleText {
        parent: TimeTicket,
        from: usize,
        to: usize,
        attrs: HashMap<String, Json>,
        ticket: TimeTicket,
    },
    RemoveStyleText {
        parent: TimeTicket,
        from: usize,
        to: usize,
        keys: Vec<String>,
        ticket: TimeTicket,
    },
    IncreaseCounter {
        parent: TimeTicket,
        delta: CounterValue,
        ticket: TimeTicket,
    },
    InsertTreeNode {
        tree: TimeTicket,
        node_parent: TimeTicket,
        left_sibling: Option<TimeTicket>,
        kind: NewValue,
        ticket: TimeTicket,
    },
    RemoveTreeNode {
        tree: TimeTicket,
        target: TimeTicket,
        ticket: TimeTicket,
    },
    MoveTreeNode {
        tree: TimeTicket,
        target: TimeTicket,
        new_parent: TimeTicket,
        new_left_sibling: Option<TimeTicket>,
        ticket: TimeTicket,
    },
}

impl Operation {
    /// Apply this operation against `root`, returning the emitted
    /// [`OpInfo`] records for event fan-out (§4.3).
    pub fn apply(&self, root: &mut Root) -> Result<Vec<OpInfo>> {
        match self {
            Operation::SetObject {
                parent,
                key,
                value,
                ticket,
            } => {
                let obj = locate_object_mut(root, parent)?;
                let element = value.clone().into_element(ticket.clone());
                let won = obj.set(key.clone(), element, ticket);
                if !won {
                    return Ok(Vec::new());
                }
                Ok(vec![OpInfo {
                    path: format!("$.{key}"),
                    kind: crate::crdt::OpKind::Set,
                    value: Json::Null,
                }])
            }
            Operation::RemoveObject { parent, key, ticket } => {
                let obj = locate_object_mut(root, parent)?;
                Ok(obj.remove(key, ticket))
            }
            Operation::InsertArray {
                parent,
                left,
                value,
                ticket,
            } => {
                let arr = locate_array_mut(root, parent)?;
                let element = value.clone().into_element(ticket.clone());
                Ok(arr.insert_after(left.clone(), element))
            }
            Operation::RemoveArray {
                parent,
                target,
                ticket,
            } => {
                let arr = locate_array_mut(root, parent)?;
                Ok(arr.remove(target, ticket))
            }
            Operation::MoveArray {
                parent,
                target,
                left,
                ticket,
            } => {
                let arr = locate_array_mut(root, parent)?;
                arr.move_after(target, left.clone(), ticket)
            }
            Operation::EditText {
                parent,
                from,
                to,
                content,
                attrs,
                ticket,
            } => {
                let text = locate_text_mut(root, parent)?;
                Ok(text.edit(*from, *to, content, ticket.clone(), attrs.clone()))
            }
            Operation::StyleText {
                parent,
                from,
                to,
                attrs,
                ticket,
            } => {
                let text = locate_text_mut(root, parent)?;
                Ok(text.set_style(*from, *to, attrs.clone(), ticket.clone()))
            }
            Operation::RemoveStyleText {
                parent,
                from,
                to,
                keys,
                ticket,
            } => {
                let text = locate_text_mut(root, parent)?;
                Ok(text.remove_style(*from, *to, keys.clone(), ticket.clone()))
            }
            Operation::IncreaseCounter {
                parent,
                delta,
                ticket: _,
            } => {
                let counter = locate_counter_mut(root, parent)?;
                counter.increase(*delta)?;
                Ok(vec![OpInfo {
                    path: String::new(),
                    kind: crate::crdt::OpKind::Increase,
                    value: counter.to_json(),
                }])
            }
            Operation::InsertTreeNode {
                tree,
                node_parent,
                left_sibling,
                kind,
                ticket,
            } => {
                let t = locate_tree_mut(root, tree)?;
                let node_kind = match kind {
                    NewValue::TreeElement(tag) => TreeNodeKind::Element { tag: tag.clone() },
                    NewValue::TreeText(content) => TreeNodeKind::Text {
                        content: content.clone(),
                    },
                    _ => {
                        return Err(YorkieError::InvalidArgument(
                            "tree insert requires a tree node kind".into(),
                        ))
                    }
                };
                t.insert(node_parent.clone(), left_sibling.clone(), node_kind, ticket.clone())
            }
            Operation::RemoveTreeNode { tree, target, ticket } => {
                let t = locate_tree_mut(root, tree)?;
                t.remove(target, ticket)
            }
            Operation::MoveTreeNode {
                tree,
                target,
                new_parent,
                new_left_sibling,
                ticket,
            } => {
                let t = locate_tree_mut(root, tree)?;
                t.move_node(target, new_parent.clone(), new_left_sibling.clone(), ticket)
            }
        }
    }
}

fn locate_element_mut<'a>(root: &'a mut Root, target: &TimeTicket) -> Option<&'a mut Element> {
    if root.object().created_at() == Some(target) {
        return None; // the root object itself is addressed via locate_object_mut
    }
    find_in_object_mut(root.object_mut(), target)
}

fn find_in_object_mut<'a>(obj: &'a mut JsonObject, target: &TimeTicket) -> Option<&'a mut Element> {
    for (_, el) in obj.entries_including_tombstones_mut().iter_mut() {
        if el.created_at() == Some(target) {
            return Some(el);
        }
        match el {
            Element::Object(inner) => {
                if let Some(found) = find_in_object_mut(inner, target) {
                    return Some(found);
                }
            }
            Element::Array(inner) => {
                if let Some(found) = find_in_array_mut(inner, target) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_in_array_mut<'a>(arr: &'a mut JsonArray, target: &TimeTicket) -> Option<&'a mut Element> {
    for el in arr.iter_all_mut() {
        if el.created_at() == Some(target) {
            return Some(el);
        }
        match el {
            Element::Object(inner) => {
                if let Some(found) = find_in_object_mut(inner, target) {
                    return Some(found);
                }
            }
            Element::Array(inner) => {
                if let Some(found) = find_in_array_mut(inner, target) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn locate_object_mut<'a>(root: &'a mut Root, parent: &TimeTicket) -> Result<&'a mut JsonObject> {
    if root.object().created_at() == Some(parent) {
        return Ok(root.object_mut());
    }
    match locate_element_mut(root, parent) {
        Some(Element::Object(obj)) => Ok(obj),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such object container: {parent}"
        ))),
    }
}

fn locate_array_mut<'a>(root: &'a mut Root, parent: &TimeTicket) -> Result<&'a mut JsonArray> {
    match locate_element_mut(root, parent) {
        Some(Element::Array(arr)) => Ok(arr),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such array container: {parent}"
        ))),
    }
}

fn locate_text_mut<'a>(root: &'a mut Root, parent: &TimeTicket) -> Result<&'a mut Text> {
    match locate_element_mut(root, parent) {
        Some(Element::Text(t)) => Ok(t),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such text container: {parent}"
        ))),
    }
}

fn locate_counter_mut<'a>(root: &'a mut Root, parent: &TimeTicket) -> Result<&'a mut Counter> {
    match locate_element_mut(root, parent) {
        Some(Element::Counter(c)) => Ok(c),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such counter: {parent}"
        ))),
    }
}

fn locate_tree_mut<'a>(root: &'a mut Root, parent: &TimeTicket) -> Result<&'a mut Tree> {
    match locate_element_mut(root, parent) {
        Some(Element::Tree(t)) => Ok(t),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such tree: {parent}"
        ))),
    }
}

// Immutable counterparts, used by the mutator API (`document::ChangeContext`)
// to peek at a container (e.g. an array's last element) before recording the
// operation that will mutate it.

fn locate_element<'a>(root: &'a Root, target: &TimeTicket) -> Option<&'a Element> {
    if root.object().created_at() == Some(target) {
        return None;
    }
    find_in_object(root.object(), target)
}

fn find_in_object<'a>(obj: &'a JsonObject, target: &TimeTicket) -> Option<&'a Element> {
    for (_, el) in obj.entries_including_tombstones() {
        if el.created_at() == Some(target) {
            return Some(el);
        }
        match el {
            Element::Object(inner) => {
                if let Some(found) = find_in_object(inner, target) {
                    return Some(found);
                }
            }
            Element::Array(inner) => {
                if let Some(found) = find_in_array(inner, target) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_in_array<'a>(arr: &'a JsonArray, target: &TimeTicket) -> Option<&'a Element> {
    for el in arr.iter_all() {
        if el.created_at() == Some(target) {
            return Some(el);
        }
        match el {
            Element::Object(inner) => {
                if let Some(found) = find_in_object(inner, target) {
                    return Some(found);
                }
            }
            Element::Array(inner) => {
                if let Some(found) = find_in_array(inner, target) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn locate_object<'a>(root: &'a Root, parent: &TimeTicket) -> Result<&'a JsonObject> {
    if root.object().created_at() == Some(parent) {
        return Ok(root.object());
    }
    match locate_element(root, parent) {
        Some(Element::Object(obj)) => Ok(obj),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such object container: {parent}"
        ))),
    }
}

pub(crate) fn locate_array<'a>(root: &'a Root, parent: &TimeTicket) -> Result<&'a JsonArray> {
    match locate_element(root, parent) {
        Some(Element::Array(arr)) => Ok(arr),
        _ => Err(YorkieError::InvalidArgument(format!(
            "no such array container: {parent}"
        ))),
    }
}

pub(crate) fn locate_tree<'a>(root: &'a Root, parent: &TimeTicket) -> Result<&'a Tree> {
    match locate_element(root, parent) {
        Some(Element::Tree(t)) => Ok(t),
        _ => Err(YorkieError::InvalidArgument(format!("no such tree: {parent}"))),
    }
}
