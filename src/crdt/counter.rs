//! Numeric counter with commutative `increase` (§4.1).

use super::{DataSize, ElementMeta, TICKET_META_SIZE};
use crate::error::{Result, YorkieError};
use crate::time::TimeTicket;
use serde_json::Value as Json;

/// The numeric domain is fixed at creation; an `increase` of another width
/// is rejected with [`YorkieError::InvalidArgument`] (§4.1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CounterValue {
    I32(i32),
    I64(i64),
    F64(f64),
}

impl CounterValue {
    fn width_name(&self) -> &'static str {
        match self {
            CounterValue::I32(_) => "int32",
            CounterValue::I64(_) => "int64",
            CounterValue::F64(_) => "double",
        }
    }

    fn same_width(&self, other: &CounterValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A CRDT counter: merges commutatively by summing concurrent deltas.
/// Integer widths wrap on overflow (two's complement), which is documented
/// behavior rather than a bug (§4.1).
#[derive(Clone, Debug)]
pub struct Counter {
    pub meta: ElementMeta,
    value: CounterValue,
}

impl Counter {
    pub fn new(value: CounterValue, created_at: TimeTicket) -> Self {
        Self {
            meta: ElementMeta::new(created_at),
            value,
        }
    }

    pub fn value(&self) -> CounterValue {
        self.value
    }

    /// Apply `delta` to the counter. Commutative: the result does not
    /// depend on the order concurrent increases are applied in.
    pub fn increase(&mut self, delta: CounterValue) -> Result<()> {
        if !self.value.same_width(&delta) {
            return Err(YorkieError::InvalidArgument(format!(
                "counter is {} but increase delta is {}",
                self.value.width_name(),
                delta.width_name()
            )));
        }
        self.value = match (self.value, delta) {
            (CounterValue::I32(a), CounterValue::I32(b)) => CounterValue::I32(a.wrapping_add(b)),
            (CounterValue::I64(a), CounterValue::I64(b)) => CounterValue::I64(a.wrapping_add(b)),
            (CounterValue::F64(a), CounterValue::F64(b)) => CounterValue::F64(a + b),
            _ => unreachable!("width checked above"),
        };
        Ok(())
    }

    pub fn to_json(&self) -> Json {
        match self.value {
            CounterValue::I32(i) => Json::from(i),
            CounterValue::I64(i) => Json::from(i),
            CounterValue::F64(d) => serde_json::Number::from_f64(d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
        }
    }

    pub fn data_size(&self) -> DataSize {
        let data = match self.value {
            CounterValue::I32(_) => 4,
            CounterValue::I64(_) => 8,
            CounterValue::F64(_) => 8,
        };
        DataSize {
            data,
            meta: TICKET_META_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ActorId;

    fn ticket() -> TimeTicket {
        TimeTicket::new(1, 0, ActorId::new("a"))
    }

    #[test]
    fn increase_is_commutative() {
        let mut a = Counter::new(CounterValue::I32(0), ticket());
        a.increase(CounterValue::I32(3)).unwrap();
        a.increase(CounterValue::I32(4)).unwrap();

        let mut b = Counter::new(CounterValue::I32(0), ticket());
        b.increase(CounterValue::I32(4)).unwrap();
        b.increase(CounterValue::I32(3)).unwrap();

        assert_eq!(a.value(), b.value());
        assert_eq!(a.value(), CounterValue::I32(7));
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let mut c = Counter::new(CounterValue::I32(0), ticket());
        let err = c.increase(CounterValue::I64(1)).unwrap_err();
        assert!(matches!(err, YorkieError::InvalidArgument(_)));
    }

    #[test]
    fn integer_overflow_wraps() {
        let mut c = Counter::new(CounterValue::I32(i32::MAX), ticket());
        c.increase(CounterValue::I32(1)).unwrap();
        assert_eq!(c.value(), CounterValue::I32(i32::MIN));
    }
}
