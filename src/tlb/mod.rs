//! TL-B (de)serialization on top of cells
//!
//! Two ways to map structured data onto cells:
//! - [`Tlb`]: hand-written typed combinators
//! - [`Schema`]: declarative field directives driving a dynamic [`Value`] tree

pub mod coins;
pub mod schema;
pub mod value;

pub use coins::{Coins, ZERO_COINS};
pub use schema::{Directive, Field, Magic, Schema, Variant};
pub use value::{Record, Value};

use crate::tvm::{Address, Builder, Cell, CellError, MsgAddress, Result, Slice};
use std::sync::Arc;

/// A type with a fixed TL-B layout
pub trait Tlb: Sized {
    /// Appends the serialized form to `builder`
    fn store(&self, builder: &mut Builder) -> Result<()>;

    /// Reads a value from the current position of `slice`
    fn load(slice: &mut Slice) -> Result<Self>;

    /// Serializes the value into a cell of its own
    fn to_cell(&self) -> Result<Arc<Cell>> {
        let mut builder = Builder::new();
        self.store(&mut builder)?;
        builder.build()
    }

    /// Deserializes a whole cell, rejecting unread bits or references
    fn from_cell(cell: &Arc<Cell>) -> Result<Self> {
        let mut slice = Slice::new(cell.clone());
        let value = Self::load(&mut slice)?;
        slice.ensure_empty()?;
        Ok(value)
    }
}

impl Tlb for MsgAddress {
    fn store(&self, builder: &mut Builder) -> Result<()> {
        builder.store_msg_address(self)?;
        Ok(())
    }

    fn load(slice: &mut Slice) -> Result<Self> {
        slice.load_msg_address()
    }
}

/// `addr_std` only, as used by message fields that must name a contract
impl Tlb for Address {
    fn store(&self, builder: &mut Builder) -> Result<()> {
        builder.store_address(Some(self))?;
        Ok(())
    }

    fn load(slice: &mut Slice) -> Result<Self> {
        let position = slice.clone();
        match slice.load_msg_address()? {
            MsgAddress::Std(addr) => Ok(addr),
            other => {
                *slice = position;
                Err(CellError::InvalidAddress(format!(
                    "expected addr_std, got {other}"
                )))
            }
        }
    }
}
