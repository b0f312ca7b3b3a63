//! Declarative TL-B layouts
//!
//! A [`Schema`] is an optional constant tag followed by named fields. Each
//! field carries a [`Directive`] that maps one [`Value`] onto builder and
//! slice operations, so the same description drives both encoding and
//! decoding.
//!
//! ```
//! use toncells_rs::tlb::{Directive, Record, Schema, Value};
//! use toncells_rs::tvm::Address;
//!
//! let schema = Schema::tagged("#00000003")
//!     .unwrap()
//!     .field("query_id", Directive::Uint(64))
//!     .field("new_owner", Directive::Address);
//!
//! let record = Record::new()
//!     .with("query_id", 7u64)
//!     .with("new_owner", Address::new(0, [0xAA; 32]));
//! let cell = schema.to_cell(&record).unwrap();
//! assert_eq!(cell.bit_len(), 32 + 64 + 267);
//! assert_eq!(schema.from_cell(&cell).unwrap().get("query_id"), Some(&Value::from(7u64)));
//! ```

use crate::tlb::{Coins, Record, Tlb, Value};
use crate::tvm::{Builder, Cell, CellError, Result, Slice};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Constant bit prefix identifying a constructor, e.g. `#00000001` or `$10`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Magic {
    value: u64,
    bits: usize,
}

impl Magic {
    pub fn new(value: u64, bits: usize) -> Result<Self> {
        if bits == 0 || bits > 64 {
            return Err(CellError::InvalidArgument(format!(
                "tag width {bits} is outside 1..=64"
            )));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange(format!(
                "tag {value:#x} does not fit in {bits} bits"
            )));
        }
        Ok(Self { value, bits })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    fn store(&self, builder: &mut Builder) -> Result<()> {
        builder.store_uint(self.value, self.bits)?;
        Ok(())
    }

    /// Whether the slice starts with this tag, without consuming it
    fn is_next(&self, slice: &Slice) -> bool {
        slice.remaining_bits() >= self.bits
            && slice.preload_uint(self.bits).is_ok_and(|v| v == self.value)
    }
}

impl FromStr for Magic {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CellError::InvalidArgument(format!("invalid tag notation {s:?}"));
        if let Some(hex) = s.strip_prefix('#') {
            if hex.is_empty() || hex.len() > 16 {
                return Err(invalid());
            }
            let value = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
            Self::new(value, hex.len() * 4)
        } else if let Some(bin) = s.strip_prefix('$') {
            if bin.is_empty() || bin.len() > 64 {
                return Err(invalid());
            }
            let value = u64::from_str_radix(bin, 2).map_err(|_| invalid())?;
            Self::new(value, bin.len())
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits % 4 == 0 {
            write!(f, "#{:0width$x}", self.value, width = self.bits / 4)
        } else {
            write!(f, "${:0width$b}", self.value, width = self.bits)
        }
    }
}

/// How a single field is laid out in the cell
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `## n`: unsigned integer of `n` bits
    Uint(usize),
    /// `int n`: two's complement integer of `n` bits
    Int(usize),
    Bool,
    /// `bits (n*8)`: exactly `n` raw bytes
    Bytes(usize),
    /// VarUInteger 16 amount
    Coins,
    /// `MsgAddress`
    Address,
    /// `^Cell`: arbitrary child cell
    Cell,
    /// Snake-encoded UTF-8 string in a child cell
    String,
    /// Nested record written inline
    ///
    /// Never spills into a child cell: a record that does not fit fails with
    /// `CapacityExceeded`. Use [`Directive::EitherRef`] for that.
    Embedded(Schema),
    /// Nested record in a child cell
    Ref(Schema),
    /// `Either X ^X`: inline when it fits, otherwise in a child cell
    EitherRef(Schema),
    /// `Maybe X`: one presence bit, then the value
    Maybe(Box<Directive>),
    /// Constructors told apart by their tag
    Union(Vec<Variant>),
}

impl Directive {
    pub fn maybe(inner: Directive) -> Self {
        Directive::Maybe(Box::new(inner))
    }
}

/// One constructor of a [`Directive::Union`]
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub magic: Magic,
    pub schema: Schema,
}

impl Variant {
    pub fn new(name: impl Into<String>, magic: Magic, schema: Schema) -> Self {
        Self {
            name: name.into(),
            magic,
            schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub directive: Directive,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    magic: Option<Magic>,
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema whose encoding starts with the given constant tag
    pub fn with_magic(magic: Magic) -> Self {
        Self {
            magic: Some(magic),
            fields: Vec::new(),
        }
    }

    /// Same as [`Schema::with_magic`], parsing the tag from `#hex` / `$bin` notation
    pub fn tagged(tag: &str) -> Result<Self> {
        Ok(Self::with_magic(tag.parse()?))
    }

    /// Appends a field
    pub fn field(mut self, name: impl Into<String>, directive: Directive) -> Self {
        self.fields.push(Field {
            name: name.into(),
            directive,
        });
        self
    }

    pub fn magic(&self) -> Option<Magic> {
        self.magic
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Writes the tag and every field of `record` in schema order; on failure
    /// the builder is left as it was
    pub fn encode(&self, record: &Record, builder: &mut Builder) -> Result<()> {
        let start = builder.clone();
        self.encode_fields(record, builder).inspect_err(|_| *builder = start)
    }

    fn encode_fields(&self, record: &Record, builder: &mut Builder) -> Result<()> {
        if let Some(magic) = &self.magic {
            magic.store(builder)?;
        }
        for field in &self.fields {
            let value = record.get(&field.name).ok_or_else(|| {
                CellError::SchemaMismatch(format!("missing field `{}`", field.name))
            })?;
            encode_value(&field.directive, value, builder)
                .map_err(|e| in_field(&field.name, e))?;
        }
        Ok(())
    }

    pub fn to_cell(&self, record: &Record) -> Result<Arc<Cell>> {
        let mut builder = Builder::new();
        self.encode(record, &mut builder)?;
        builder.build()
    }

    /// Reads a record; on failure the slice is left where it was
    pub fn decode(&self, slice: &mut Slice) -> Result<Record> {
        let start = slice.clone();
        self.decode_fields(slice).inspect_err(|_| *slice = start)
    }

    /// Decodes a whole cell, rejecting unread bits or references
    pub fn from_cell(&self, cell: &Arc<Cell>) -> Result<Record> {
        let mut slice = Slice::new(cell.clone());
        let record = self.decode(&mut slice)?;
        slice.ensure_empty()?;
        Ok(record)
    }

    fn decode_fields(&self, slice: &mut Slice) -> Result<Record> {
        if let Some(magic) = &self.magic {
            let found = slice
                .preload_uint(magic.bits)
                .map_err(|e| out_of_data("tag", e))?;
            if found != magic.value {
                return Err(CellError::SchemaMismatch(format!(
                    "expected tag {magic}, found {found:#x}"
                )));
            }
            slice.skip_bits(magic.bits)?;
        }

        let mut record = Record::new();
        for field in &self.fields {
            let value = decode_value(&field.directive, slice)
                .map_err(|e| out_of_data(&field.name, e))?;
            record.insert(field.name.clone(), value);
        }
        Ok(record)
    }
}

fn mismatch(directive: &Directive, value: &Value) -> CellError {
    CellError::SchemaMismatch(format!(
        "{directive_name} field cannot hold a {} value",
        value.kind(),
        directive_name = directive_name(directive)
    ))
}

fn directive_name(directive: &Directive) -> &'static str {
    match directive {
        Directive::Uint(_) => "uint",
        Directive::Int(_) => "int",
        Directive::Bool => "bool",
        Directive::Bytes(_) => "bytes",
        Directive::Coins => "coins",
        Directive::Address => "address",
        Directive::Cell => "cell",
        Directive::String => "string",
        Directive::Embedded(_) => "embedded",
        Directive::Ref(_) => "ref",
        Directive::EitherRef(_) => "either-ref",
        Directive::Maybe(_) => "maybe",
        Directive::Union(_) => "union",
    }
}

fn in_field(name: &str, err: CellError) -> CellError {
    match err {
        CellError::SchemaMismatch(msg) => CellError::SchemaMismatch(format!("`{name}`: {msg}")),
        other => other,
    }
}

/// Running out of bits or refs while decoding is reported as a truncated message
fn out_of_data(name: &str, err: CellError) -> CellError {
    match err {
        CellError::Underflow {
            requested,
            available,
        } => CellError::UnexpectedEnd(format!(
            "`{name}` needs {requested} bits, {available} left"
        )),
        CellError::OutOfRefs => CellError::UnexpectedEnd(format!("`{name}` needs a reference")),
        other => other,
    }
}

fn encode_value(directive: &Directive, value: &Value, builder: &mut Builder) -> Result<()> {
    match (directive, value) {
        (Directive::Uint(bits), Value::Uint(v)) => {
            builder.store_big_uint(v, *bits)?;
        }
        (Directive::Int(bits), Value::Int(v)) => {
            builder.store_big_int(v, *bits)?;
        }
        (Directive::Bool, Value::Bool(v)) => {
            builder.store_bool(*v)?;
        }
        (Directive::Bytes(len), Value::Bytes(bytes)) => {
            if bytes.len() != *len {
                return Err(CellError::SchemaMismatch(format!(
                    "expected {len} bytes, got {}",
                    bytes.len()
                )));
            }
            builder.store_bytes(bytes)?;
        }
        (Directive::Coins, Value::Coins(coins)) => coins.store(builder)?,
        (Directive::Address, Value::Address(addr)) => {
            builder.store_msg_address(addr)?;
        }
        (Directive::Cell, Value::Cell(cell)) => {
            builder.store_ref(cell.clone())?;
        }
        (Directive::String, Value::String(s)) => {
            let mut child = Builder::new();
            child.store_snake_string(s, false)?;
            builder.store_ref(child.build()?)?;
        }
        (Directive::Embedded(schema), Value::Record(record)) => schema.encode(record, builder)?,
        (Directive::Ref(schema), Value::Record(record)) => {
            builder.store_ref(schema.to_cell(record)?)?;
        }
        (Directive::EitherRef(schema), Value::Record(record)) => {
            let mut child = Builder::new();
            schema.encode(record, &mut child)?;
            let fits_inline = child.bit_len() < builder.available_bits()
                && child.ref_count() <= builder.available_refs();
            let cell = child.build()?;
            if fits_inline {
                builder.store_bit(false)?;
                builder.store_cell(&cell)?;
            } else {
                if builder.available_refs() == 0 {
                    return Err(CellError::CapacityExceeded(
                        "no room to inline or reference the record".to_string(),
                    ));
                }
                builder.store_bit(true)?;
                builder.store_ref(cell)?;
            }
        }
        (Directive::Maybe(_), Value::Maybe(None)) => {
            builder.store_bit(false)?;
        }
        (Directive::Maybe(inner), Value::Maybe(Some(value))) => {
            builder.store_bit(true)?;
            encode_value(inner, value, builder)?;
        }
        (Directive::Union(variants), Value::Variant { name, fields }) => {
            let variant = variants.iter().find(|v| v.name == *name).ok_or_else(|| {
                CellError::SchemaMismatch(format!("unknown union variant `{name}`"))
            })?;
            variant.magic.store(builder)?;
            variant.schema.encode(fields, builder)?;
        }
        (directive, value) => return Err(mismatch(directive, value)),
    }
    Ok(())
}

fn decode_value(directive: &Directive, slice: &mut Slice) -> Result<Value> {
    let value = match directive {
        Directive::Uint(bits) => Value::Uint(slice.load_big_uint(*bits)?),
        Directive::Int(bits) => Value::Int(slice.load_big_int(*bits)?),
        Directive::Bool => Value::Bool(slice.load_bool()?),
        Directive::Bytes(len) => Value::Bytes(slice.load_bytes(*len)?),
        Directive::Coins => Value::Coins(Coins::load(slice)?),
        Directive::Address => Value::Address(slice.load_msg_address()?),
        Directive::Cell => Value::Cell(slice.load_ref_cell()?),
        Directive::String => Value::String(slice.load_ref()?.load_snake_string()?),
        Directive::Embedded(schema) => Value::Record(schema.decode(slice)?),
        Directive::Ref(schema) => Value::Record(schema.from_cell(&slice.load_ref_cell()?)?),
        Directive::EitherRef(schema) => {
            if slice.load_bit()? {
                Value::Record(schema.from_cell(&slice.load_ref_cell()?)?)
            } else {
                Value::Record(schema.decode(slice)?)
            }
        }
        Directive::Maybe(inner) => {
            if slice.load_bit()? {
                Value::Maybe(Some(Box::new(decode_value(inner, slice)?)))
            } else {
                Value::Maybe(None)
            }
        }
        Directive::Union(variants) => {
            let Some(variant) = variants.iter().find(|v| v.magic.is_next(slice)) else {
                let remaining = slice.remaining_bits();
                if variants.iter().all(|v| v.magic.bits > remaining) {
                    return Err(CellError::UnexpectedEnd(format!(
                        "union tag needs more than {remaining} bits"
                    )));
                }
                return Err(CellError::SchemaMismatch(
                    "no union variant matches the tag".to_string(),
                ));
            };
            slice.skip_bits(variant.magic.bits)?;
            Value::Variant {
                name: variant.name.clone(),
                fields: variant.schema.decode(slice)?,
            }
        }
    };
    Ok(value)
}
