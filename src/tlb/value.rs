//! Dynamic values produced and consumed by [`Schema`](crate::tlb::Schema)

use crate::tlb::Coins;
use crate::tvm::{Address, Cell, MsgAddress};
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(BigUint),
    Int(BigInt),
    Bool(bool),
    Bytes(Vec<u8>),
    Coins(Coins),
    Address(MsgAddress),
    Cell(Arc<Cell>),
    String(String),
    Record(Record),
    Maybe(Option<Box<Value>>),
    /// A union branch: the variant name and its decoded fields
    Variant { name: String, fields: Record },
}

impl Value {
    /// Short name of the value kind, used in mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Coins(_) => "coins",
            Value::Address(_) => "address",
            Value::Cell(_) => "cell",
            Value::String(_) => "string",
            Value::Record(_) => "record",
            Value::Maybe(_) => "maybe",
            Value::Variant { .. } => "variant",
        }
    }

    pub fn some(value: impl Into<Value>) -> Self {
        Value::Maybe(Some(Box::new(value.into())))
    }

    pub fn none() -> Self {
        Value::Maybe(None)
    }

    pub fn variant(name: impl Into<String>, fields: Record) -> Self {
        Value::Variant {
            name: name.into(),
            fields,
        }
    }

    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            Value::Uint(v) => Some(v),
            _ => None,
        }
    }

    /// The unsigned value if it fits in a `u64`
    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().and_then(ToPrimitive::to_u64)
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_coins(&self) -> Option<&Coins> {
        match self {
            Value::Coins(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&MsgAddress> {
        match self {
            Value::Address(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&Arc<Cell>> {
        match self {
            Value::Cell(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    /// `Some(None)` for an absent optional, `None` if this is not optional at all
    pub fn as_maybe(&self) -> Option<Option<&Value>> {
        match self {
            Value::Maybe(v) => Some(v.as_deref()),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(BigUint::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(BigUint::from(v))
    }
}

impl From<BigUint> for Value {
    fn from(v: BigUint) -> Self {
        Value::Uint(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(BigInt::from(v))
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Coins> for Value {
    fn from(v: Coins) -> Self {
        Value::Coins(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Value::Address(MsgAddress::Std(v))
    }
}

impl From<MsgAddress> for Value {
    fn from(v: MsgAddress) -> Self {
        Value::Address(v)
    }
}

impl From<Arc<Cell>> for Value {
    fn from(v: Arc<Cell>) -> Self {
        Value::Cell(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

/// Named field values in schema order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing an existing one with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_insert_replaces() {
        let mut record = Record::new().with("a", 1u64).with("b", true);
        record.insert("a", 2u64);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("a").and_then(Value::as_u64), Some(2));
        assert_eq!(record.get("b").and_then(Value::as_bool), Some(true));
        assert!(record.get("c").is_none());
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_accessors_reject_other_kinds() {
        let value = Value::from("text");
        assert_eq!(value.as_str(), Some("text"));
        assert_eq!(value.as_u64(), None);
        assert_eq!(value.kind(), "string");

        assert_eq!(Value::none().as_maybe(), Some(None));
        assert_eq!(
            Value::some(5u64).as_maybe().flatten().and_then(Value::as_u64),
            Some(5)
        );
        assert_eq!(Value::from(-3i64).as_int(), Some(&BigInt::from(-3)));
    }
}
