//! Last-writer-wins scalar register (§4.1, §3 "Primitive register").

use super::{DataSize, ElementMeta, TICKET_META_SIZE};
use crate::time::TimeTicket;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The typed value a [`Primitive`] register holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum PrimitiveValue {
    Null,
    Bool(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl PrimitiveValue {
    pub fn to_json(&self) -> Json {
        match self {
            PrimitiveValue::Null => Json::Null,
            PrimitiveValue::Bool(b) => Json::Bool(*b),
            PrimitiveValue::Integer(i) => Json::from(*i),
            PrimitiveValue::Long(i) => Json::from(*i),
            PrimitiveValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            PrimitiveValue::String(s) => Json::String(s.clone()),
            PrimitiveValue::Bytes(b) => Json::String(humansize::format_size(
                b.len() as u64,
                humansize::BINARY,
            )),
        }
    }

    fn byte_len(&self) -> u64 {
        match self {
            PrimitiveValue::Null => 0,
            PrimitiveValue::Bool(_) => 1,
            PrimitiveValue::Integer(_) => 4,
            PrimitiveValue::Long(_) => 8,
            PrimitiveValue::Double(_) => 8,
            PrimitiveValue::String(s) => s.len() as u64,
            PrimitiveValue::Bytes(b) => b.len() as u64,
        }
    }
}

/// A last-writer-wins register: a typed scalar plus the [`TimeTicket`] that
/// last set it. Concurrent sets resolve by the higher ticket (§4.1 LWW
/// tiebreak — ties are impossible since actor IDs differ).
#[derive(Clone, Debug)]
pub struct Primitive {
    pub meta: ElementMeta,
    value: PrimitiveValue,
}

impl Primitive {
    pub fn new(value: PrimitiveValue, created_at: TimeTicket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            value,
        }
    }

    pub fn value(&self) -> &PrimitiveValue {
        &self.value
    }

    /// Attempt to overwrite the register's value as of `ticket`. No-op if a
    /// higher ticket already won (LWW).
    pub fn set(&mut self, value: PrimitiveValue, ticket: &TimeTicket) -> bool {
        let incumbent = self.meta.created_at.clone();
        let wins = match &incumbent {
            Some(existing) => ticket > existing,
            None => true,
        };
        if wins {
            self.value = value;
            self.meta.created_at = Some(ticket.clone());
        }
        wins
    }

    pub fn to_json(&self) -> Json {
        self.value.to_json()
    }

    pub fn data_size(&self) -> DataSize {
        DataSize {
            data: self.value.byte_len(),
            meta: TICKET_META_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ActorId;

    fn ticket(l: u64) -> TimeTicket {
        TimeTicket::new(l, 0, ActorId::new("a"))
    }

    #[test]
    fn higher_ticket_wins_lww() {
        let mut p = Primitive::new(PrimitiveValue::Integer(1), ticket(1));
        assert!(p.set(PrimitiveValue::Integer(2), &ticket(2)));
        assert_eq!(p.value(), &PrimitiveValue::Integer(2));
    }

    #[test]
    fn lower_ticket_is_rejected() {
        let mut p = Primitive::new(PrimitiveValue::Integer(1), ticket(5));
        assert!(!p.set(PrimitiveValue::Integer(2), &ticket(2)));
        assert_eq!(p.value(), &PrimitiveValue::Integer(1));
    }
}
