//! TVM (TON Virtual Machine) cell data structures
//!
//! This module provides implementations of fundamental TON blockchain data structures:
//! - Cell: immutable node holding up to 1023 bits and up to 4 references
//! - Builder: accumulates bits and references, then seals them into a cell
//! - Slice: a reader for sequentially accessing cell data
//! - BoC: Bag of Cells serialization format for encoding cell graphs into byte arrays
//! - Address: TON message addresses and their user-friendly forms

pub mod address;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod error;
pub mod slice;
#[cfg(test)]
mod tests;

pub use address::{Address, ExternalAddress, MsgAddress};
pub use boc::{
    BocOptions, base64_to_boc, boc_to_base64, boc_to_hex, deserialize_boc, deserialize_boc_roots,
    hex_to_boc, serialize_boc, serialize_boc_with,
};
pub use builder::Builder;
pub use cell::{
    Cell, CellType, HASH_BYTES, LevelMask, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_LEVEL,
    MAX_CELL_REFS,
};
pub use error::{CellError, Must, Result};
pub use slice::Slice;
