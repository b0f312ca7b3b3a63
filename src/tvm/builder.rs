//! Builder for constructing cells
//!
//! `Builder` accumulates bits and references and enforces the cell capacity
//! limits on every store. Sealing it with [`Builder::build`] consumes the
//! builder and produces an immutable, shareable [`Cell`].
//!
//! # Examples
//!
//! ```rust
//! use toncells_rs::tvm::{Address, Builder};
//!
//! let mut builder = Builder::new();
//!
//! // Store an address
//! let addr = Address::new(0, [0u8; 32]);
//! builder.store_address(Some(&addr)).unwrap();
//!
//! // Store coins (1 TON)
//! builder.store_coins(1_000_000_000).unwrap();
//!
//! // Store a string
//! builder.store_string("Hello, TON!").unwrap();
//!
//! let cell = builder.build().unwrap();
//! assert_eq!(cell.reference_count(), 0);
//! ```

use crate::tvm::address::{Address, ExternalAddress, MsgAddress};
use crate::tvm::cell::{Cell, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::Slice;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use std::sync::Arc;

/// Width of the byte-length prefix of a coins amount
pub const COINS_LENGTH_BITS: usize = 4;

/// Mutable accumulator of bits and references for one cell
#[derive(Debug, Clone, Default)]
pub struct Builder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    exotic: bool,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bits used
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the number of available bits
    pub fn available_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    /// Returns the number of available bytes
    pub fn available_bytes(&self) -> usize {
        self.available_bits() / 8
    }

    /// Returns the number of references
    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    /// Returns the number of available references
    pub fn available_refs(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Marks the cell being built as exotic; its first byte selects the kind
    pub fn set_exotic(&mut self, exotic: bool) -> &mut Self {
        self.exotic = exotic;
        self
    }

    fn ensure_bits(&self, bit_len: usize) -> Result<()> {
        if bit_len > self.available_bits() {
            return Err(CellError::CapacityExceeded(format!(
                "cannot store {bit_len} bits, only {} available",
                self.available_bits()
            )));
        }
        Ok(())
    }

    /// Stores the first `bit_len` bits of `bits`, most significant bit first
    pub fn store_bits(&mut self, bits: &[u8], bit_len: usize) -> Result<&mut Self> {
        if bits.len() < bit_len.div_ceil(8) {
            return Err(CellError::InvalidArgument(format!(
                "insufficient data for {bit_len} bits"
            )));
        }
        self.ensure_bits(bit_len)?;

        let shift = self.bit_len % 8;
        if shift == 0 {
            self.data.extend_from_slice(&bits[..bit_len.div_ceil(8)]);
        } else {
            for i in 0..bit_len.div_ceil(8) {
                let byte = bits[i];
                let last = self.data.len() - 1;
                self.data[last] |= byte >> shift;
                self.data.push(byte << (8 - shift));
            }
        }
        self.bit_len += bit_len;

        // Drop bytes and bits beyond the new length so later stores OR into zeros
        self.data.truncate(self.bit_len.div_ceil(8));
        if self.bit_len % 8 != 0 {
            let last = self.data.len() - 1;
            self.data[last] &= 0xFF << (8 - self.bit_len % 8);
        }
        Ok(self)
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.store_bits(&[if bit { 0x80 } else { 0x00 }], 1)
    }

    /// Stores a boolean value as a single bit
    pub fn store_bool(&mut self, value: bool) -> Result<&mut Self> {
        self.store_bit(value)
    }

    /// Stores a byte
    pub fn store_byte(&mut self, byte: u8) -> Result<&mut Self> {
        self.store_bits(&[byte], 8)
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.store_bits(bytes, bytes.len() * 8)
    }

    pub fn store_u8(&mut self, value: u8) -> Result<&mut Self> {
        self.store_byte(value)
    }

    pub fn store_u16(&mut self, value: u16) -> Result<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 16)
    }

    /// Stores a u32 value
    pub fn store_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 32)
    }

    /// Stores a u64 value
    pub fn store_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 64)
    }

    /// Stores the value as an unsigned integer of exactly `bits` bits
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        if bits > 64 {
            return Err(CellError::InvalidArgument(format!(
                "cannot store {bits} bits from u64, use store_big_uint"
            )));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange(format!(
                "{value} does not fit in {bits} unsigned bits"
            )));
        }
        if bits == 0 {
            return Ok(self);
        }
        let aligned = value << (64 - bits);
        self.store_bits(&aligned.to_be_bytes(), bits)
    }

    /// Stores the value as a two's complement integer of exactly `bits` bits
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        if bits > 64 {
            return Err(CellError::InvalidArgument(format!(
                "cannot store {bits} bits from i64, use store_big_int"
            )));
        }
        let fits = match bits {
            0 => value == 0,
            64 => true,
            _ => {
                let bound = 1i64 << (bits - 1);
                (-bound..bound).contains(&value)
            }
        };
        if !fits {
            return Err(CellError::ValueOutOfRange(format!(
                "{value} does not fit in {bits} signed bits"
            )));
        }
        let unsigned = if bits == 64 {
            value as u64
        } else {
            (value as u64) & ((1u64 << bits) - 1)
        };
        self.store_uint(unsigned, bits)
    }

    /// Stores an arbitrary-precision unsigned integer of exactly `bits` bits
    pub fn store_big_uint(&mut self, value: &BigUint, bits: usize) -> Result<&mut Self> {
        if value.bits() > bits as u64 {
            return Err(CellError::ValueOutOfRange(format!(
                "{value} does not fit in {bits} unsigned bits"
            )));
        }
        self.ensure_bits(bits)?;
        if bits == 0 {
            return Ok(self);
        }

        let byte_len = bits.div_ceil(8);
        let aligned = value << (byte_len * 8 - bits);
        let raw = aligned.to_bytes_be();
        let mut buf = vec![0u8; byte_len];
        if !aligned.is_zero() {
            buf[byte_len - raw.len()..].copy_from_slice(&raw);
        }
        self.store_bits(&buf, bits)
    }

    /// Stores an arbitrary-precision two's complement integer of exactly `bits` bits
    pub fn store_big_int(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        let out_of_range = || {
            CellError::ValueOutOfRange(format!("{value} does not fit in {bits} signed bits"))
        };
        if bits == 0 {
            return if value.is_zero() {
                Ok(self)
            } else {
                Err(out_of_range())
            };
        }

        let bound = BigInt::one() << (bits - 1);
        if *value >= bound || *value < -&bound {
            return Err(out_of_range());
        }
        let unsigned = match value.sign() {
            Sign::Minus => (BigInt::one() << bits) + value,
            _ => value.clone(),
        };
        let magnitude = unsigned.to_biguint().ok_or_else(out_of_range)?;
        self.store_big_uint(&magnitude, bits)
    }

    /// Stores a reference to another cell
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::CapacityExceeded(format!(
                "cannot add reference: maximum {MAX_CELL_REFS} references allowed"
            )));
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Stores an optional reference (Maybe ^Cell)
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> Result<&mut Self> {
        match cell {
            Some(c) => {
                if self.available_refs() == 0 {
                    return Err(CellError::CapacityExceeded(
                        "no room for maybe reference".to_string(),
                    ));
                }
                self.store_bit(true)?;
                self.store_ref(c)?;
            }
            None => {
                self.store_bit(false)?;
            }
        }
        Ok(self)
    }

    /// Appends the bits and references of another cell to this one
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self> {
        if self.ref_count() + cell.reference_count() > MAX_CELL_REFS {
            return Err(CellError::CapacityExceeded("builder refs overflow".to_string()));
        }
        self.store_bits(cell.data(), cell.bit_len())?;
        for reference in cell.references() {
            self.store_ref(reference.clone())?;
        }
        Ok(self)
    }

    /// Appends the unread remainder of a slice
    pub fn store_slice(&mut self, slice: &Slice) -> Result<&mut Self> {
        let mut rest = slice.clone();
        if self.ref_count() + rest.remaining_refs() > MAX_CELL_REFS {
            return Err(CellError::CapacityExceeded("builder refs overflow".to_string()));
        }
        let bits = rest.remaining_bits();
        self.ensure_bits(bits)?;
        let data = rest.load_bits(bits)?;
        self.store_bits(&data, bits)?;
        for reference in rest.load_remaining_refs()? {
            self.store_ref(reference)?;
        }
        Ok(self)
    }

    /// Stores a variable-length unsigned integer (VarUInteger)
    ///
    /// The first `length_bits` bits hold the byte length, followed by the
    /// value in big-endian order. Zero is stored as a zero length.
    pub fn store_var_uint(&mut self, value: &BigUint, length_bits: usize) -> Result<&mut Self> {
        if length_bits == 0 || length_bits > 32 {
            return Err(CellError::InvalidArgument(format!(
                "VarUInteger length prefix of {length_bits} bits"
            )));
        }
        let byte_len = (value.bits() as usize).div_ceil(8);
        let max_len = (1u64 << length_bits) - 1;
        if byte_len as u64 > max_len {
            return Err(CellError::ValueOutOfRange(format!(
                "{value} needs {byte_len} bytes, length prefix allows {max_len}"
            )));
        }
        self.ensure_bits(length_bits + byte_len * 8)?;
        self.store_uint(byte_len as u64, length_bits)?;
        self.store_big_uint(value, byte_len * 8)
    }

    /// Stores coins (VarUInteger 16)
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self> {
        self.store_big_coins(&BigUint::from(amount))
    }

    /// Stores an arbitrary-precision coins amount (VarUInteger 16)
    pub fn store_big_coins(&mut self, amount: &BigUint) -> Result<&mut Self> {
        self.store_var_uint(amount, COINS_LENGTH_BITS)
    }

    /// Stores a string inline, it must fit in the current cell
    pub fn store_string(&mut self, s: &str) -> Result<&mut Self> {
        self.store_bytes(s.as_bytes())
    }

    /// Stores a string using snake encoding
    ///
    /// With `with_prefix` the string is preceded by the zero byte used by
    /// off-chain content and text comments.
    pub fn store_snake_string(&mut self, s: &str, with_prefix: bool) -> Result<&mut Self> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        if with_prefix {
            bytes.push(0x00);
        }
        bytes.extend_from_slice(s.as_bytes());
        self.store_snake_bytes(&bytes)
    }

    /// Stores bytes using snake encoding (splits across chained cells if needed)
    pub fn store_snake_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let available = self.available_bytes();
        if bytes.len() <= available {
            return self.store_bytes(bytes);
        }
        if self.available_refs() == 0 {
            return Err(CellError::CapacityExceeded(
                "no reference left to continue snake data".to_string(),
            ));
        }

        // Build the tail first so a failure leaves this builder untouched.
        // Chunks are chained from the last one backwards.
        let (head, rest) = bytes.split_at(available);
        let mut tail: Option<Arc<Cell>> = None;
        for chunk in rest.chunks(MAX_CELL_BITS / 8).rev() {
            let mut next = Builder::new();
            next.store_bytes(chunk)?;
            if let Some(cell) = tail.take() {
                next.store_ref(cell)?;
            }
            tail = Some(next.build()?);
        }
        let tail = tail.ok_or_else(|| {
            CellError::InvalidArgument("snake tail is empty".to_string())
        })?;

        self.store_bytes(head)?;
        self.store_ref(tail)
    }

    /// Stores a standard address, `None` is stored as `addr_none`
    pub fn store_address(&mut self, address: Option<&Address>) -> Result<&mut Self> {
        match address {
            None => {
                // addr_none$00
                self.store_uint(0b00, 2)?;
            }
            Some(addr) => {
                // addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
                self.ensure_bits(MsgAddress::STD_BITS)?;
                self.store_uint(0b10, 2)?;
                self.store_bit(false)?;
                self.store_int(addr.workchain as i64, 8)?;
                self.store_bytes(&addr.hash_part)?;
            }
        }
        Ok(self)
    }

    /// Stores an external address
    pub fn store_external_address(&mut self, address: &ExternalAddress) -> Result<&mut Self> {
        // addr_extern$01 len:(## 9) external_address:(bits len)
        self.ensure_bits(2 + 9 + address.bit_len())?;
        self.store_uint(0b01, 2)?;
        self.store_uint(address.bit_len() as u64, 9)?;
        self.store_bits(address.data(), address.bit_len())
    }

    /// Stores any message address
    pub fn store_msg_address(&mut self, address: &MsgAddress) -> Result<&mut Self> {
        match address {
            MsgAddress::None => self.store_address(None),
            MsgAddress::Std(addr) => self.store_address(Some(addr)),
            MsgAddress::External(ext) => self.store_external_address(ext),
        }
    }

    /// Builds the cell
    pub fn build(self) -> Result<Arc<Cell>> {
        Ok(Arc::new(Cell::with_references(
            self.data,
            self.bit_len,
            self.references,
            self.exotic,
        )?))
    }

    /// Converts to a cell (alias for build)
    pub fn end_cell(self) -> Result<Arc<Cell>> {
        self.build()
    }

    /// Converts to a slice
    pub fn to_slice(self) -> Result<Slice> {
        Ok(Slice::new(self.build()?))
    }
}
