//! Slice implementation for reading data from cells
//!
//! A Slice provides a way to read data from a Cell sequentially,
//! tracking the current position in both bits and references. A failed load
//! never moves the position, so callers can peek with a `preload_*` method
//! and retry with a different interpretation.

use crate::tvm::address::{Address, ExternalAddress, MsgAddress};
use crate::tvm::builder::COINS_LENGTH_BITS;
use crate::tvm::cell::Cell;
use crate::tvm::error::{CellError, Result};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};
use std::sync::Arc;

/// A slice for reading data from a cell
#[derive(Debug, Clone)]
pub struct Slice {
    /// The cell being read
    cell: Arc<Cell>,
    /// Current bit position in the cell
    bit_pos: usize,
    /// Current reference position
    ref_pos: usize,
}

impl Slice {
    /// Creates a new slice from a cell
    pub fn new(cell: Arc<Cell>) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// Returns the number of remaining bits
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    /// Returns the number of remaining references
    pub fn remaining_refs(&self) -> usize {
        self.cell.reference_count() - self.ref_pos
    }

    /// Checks that both bits and references are exhausted
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    /// Fails with `TrailingData` unless everything has been consumed
    pub fn ensure_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        Err(CellError::TrailingData {
            bits: self.remaining_bits(),
            refs: self.remaining_refs(),
        })
    }

    /// Gets the underlying cell
    pub fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }

    /// Gets the current bit position
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Gets the current reference position
    pub fn ref_position(&self) -> usize {
        self.ref_pos
    }

    /// Resets the slice to the beginning
    pub fn reset(&mut self) {
        self.bit_pos = 0;
        self.ref_pos = 0;
    }

    fn ensure_bits(&self, n: usize) -> Result<()> {
        if n > self.remaining_bits() {
            return Err(CellError::Underflow {
                requested: n,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    /// Runs a composite load, restoring the position if any step fails
    fn atomically<T>(&mut self, load: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let (bit_pos, ref_pos) = (self.bit_pos, self.ref_pos);
        let result = load(self);
        if result.is_err() {
            self.bit_pos = bit_pos;
            self.ref_pos = ref_pos;
        }
        result
    }

    fn bit_at(&self, pos: usize) -> bool {
        (self.cell.data()[pos / 8] >> (7 - pos % 8)) & 1 == 1
    }

    /// Loads a single bit
    pub fn load_bit(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        let bit = self.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Loads a boolean stored as one bit
    pub fn load_bool(&mut self) -> Result<bool> {
        self.load_bit()
    }

    /// Loads `n` bits into a byte vector, left-aligned
    pub fn load_bits(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure_bits(n)?;

        let data = self.cell.data();
        let shift = self.bit_pos % 8;
        let start = self.bit_pos / 8;
        let mut result = vec![0u8; n.div_ceil(8)];
        for (i, byte) in result.iter_mut().enumerate() {
            let hi = data[start + i] << shift;
            let lo = if shift > 0 {
                data.get(start + i + 1).map_or(0, |b| b >> (8 - shift))
            } else {
                0
            };
            *byte = hi | lo;
        }
        if n % 8 != 0 {
            let last = result.len() - 1;
            result[last] &= 0xFF << (8 - n % 8);
        }

        self.bit_pos += n;
        Ok(result)
    }

    /// Loads a byte (8 bits)
    pub fn load_byte(&mut self) -> Result<u8> {
        Ok(self.load_bits(8)?[0])
    }

    /// Loads multiple bytes
    pub fn load_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.load_bits(n * 8)
    }

    pub fn load_u8(&mut self) -> Result<u8> {
        self.load_byte()
    }

    /// Loads a u16 value (16 bits, big-endian)
    pub fn load_u16(&mut self) -> Result<u16> {
        Ok(self.load_uint(16)? as u16)
    }

    /// Loads a u32 value (32 bits, big-endian)
    pub fn load_u32(&mut self) -> Result<u32> {
        Ok(self.load_uint(32)? as u32)
    }

    /// Loads a u64 value (64 bits, big-endian)
    pub fn load_u64(&mut self) -> Result<u64> {
        self.load_uint(64)
    }

    /// Loads a uint with a specific number of bits
    pub fn load_uint(&mut self, bits: usize) -> Result<u64> {
        if bits > 64 {
            return Err(CellError::InvalidArgument(format!(
                "cannot load {bits} bits into u64, use load_big_uint"
            )));
        }
        self.ensure_bits(bits)?;

        let mut result = 0u64;
        for i in 0..bits {
            result = (result << 1) | u64::from(self.bit_at(self.bit_pos + i));
        }
        self.bit_pos += bits;
        Ok(result)
    }

    /// Loads a signed integer with a specific number of bits
    pub fn load_int(&mut self, bits: usize) -> Result<i64> {
        if bits > 64 {
            return Err(CellError::InvalidArgument(format!(
                "cannot load {bits} bits into i64, use load_big_int"
            )));
        }
        if bits == 0 {
            return Ok(0);
        }

        let unsigned = self.load_uint(bits)?;
        if bits == 64 {
            return Ok(unsigned as i64);
        }
        let sign_bit = 1u64 << (bits - 1);
        if unsigned & sign_bit != 0 {
            Ok((unsigned | (!0u64 << bits)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Loads an arbitrary-precision unsigned integer of `bits` bits
    pub fn load_big_uint(&mut self, bits: usize) -> Result<BigUint> {
        let raw = self.load_bits(bits)?;
        let padding = raw.len() * 8 - bits;
        Ok(BigUint::from_bytes_be(&raw) >> padding)
    }

    /// Loads an arbitrary-precision two's complement integer of `bits` bits
    pub fn load_big_int(&mut self, bits: usize) -> Result<BigInt> {
        if bits == 0 {
            return Ok(BigInt::default());
        }
        let unsigned = BigInt::from(self.load_big_uint(bits)?);
        let sign_bit = BigInt::one() << (bits - 1);
        if unsigned >= sign_bit {
            Ok(unsigned - (BigInt::one() << bits))
        } else {
            Ok(unsigned)
        }
    }

    /// Loads a reference and returns a slice over the child cell
    pub fn load_ref(&mut self) -> Result<Slice> {
        Ok(Slice::new(self.load_ref_cell()?))
    }

    /// Loads a reference to another cell
    pub fn load_ref_cell(&mut self) -> Result<Arc<Cell>> {
        let reference = self
            .cell
            .reference(self.ref_pos)
            .ok_or(CellError::OutOfRefs)?
            .clone();
        self.ref_pos += 1;
        Ok(reference)
    }

    /// Loads an optional reference (Maybe ^Cell)
    pub fn load_maybe_ref(&mut self) -> Result<Option<Arc<Cell>>> {
        self.atomically(|s| {
            if s.load_bit()? {
                Ok(Some(s.load_ref_cell()?))
            } else {
                Ok(None)
            }
        })
    }

    /// Loads a variable-length integer (VarUInteger)
    /// First length_bits encode the byte length, then that many bytes of data
    pub fn load_var_uint(&mut self, length_bits: usize) -> Result<BigUint> {
        if length_bits == 0 || length_bits > 32 {
            return Err(CellError::InvalidArgument(format!(
                "VarUInteger length prefix of {length_bits} bits"
            )));
        }
        self.atomically(|s| {
            let byte_len = s.load_uint(length_bits)? as usize;
            s.load_big_uint(byte_len * 8)
        })
    }

    /// Loads coins (VarUInteger 16)
    pub fn load_big_coins(&mut self) -> Result<BigUint> {
        self.load_var_uint(COINS_LENGTH_BITS)
    }

    /// Loads coins (VarUInteger 16) as a native integer
    pub fn load_coins(&mut self) -> Result<u128> {
        let value = self.load_big_coins()?;
        // 15 bytes at most, always fits
        value
            .to_u128()
            .ok_or_else(|| CellError::ValueOutOfRange(format!("{value} exceeds u128")))
    }

    /// Loads any message address
    pub fn load_msg_address(&mut self) -> Result<MsgAddress> {
        self.atomically(|s| match s.load_uint(2)? {
            0b00 => Ok(MsgAddress::None),
            0b01 => {
                let bit_len = s.load_uint(9)? as usize;
                let data = s.load_bits(bit_len)?;
                Ok(MsgAddress::External(ExternalAddress::new(data, bit_len)?))
            }
            0b10 => {
                if s.load_bit()? {
                    return Err(CellError::InvalidAddress(
                        "anycast addresses are not supported".to_string(),
                    ));
                }
                let workchain = s.load_int(8)? as i8;
                let mut hash_part = [0u8; 32];
                hash_part.copy_from_slice(&s.load_bytes(32)?);
                Ok(MsgAddress::Std(Address::new(workchain, hash_part)))
            }
            _ => Err(CellError::InvalidAddress(
                "addr_var is not supported".to_string(),
            )),
        })
    }

    /// Loads a standard address or `addr_none`
    pub fn load_address(&mut self) -> Result<Option<Address>> {
        self.atomically(|s| match s.load_msg_address()? {
            MsgAddress::None => Ok(None),
            MsgAddress::Std(addr) => Ok(Some(addr)),
            MsgAddress::External(_) => Err(CellError::InvalidAddress(
                "expected internal address, got external".to_string(),
            )),
        })
    }

    /// Loads snake-encoded bytes: the rest of this cell, then the chain in the first ref
    pub fn load_snake_bytes(&mut self) -> Result<Vec<u8>> {
        self.atomically(|s| {
            let (mut out, mut next) = s.load_snake_chunk()?;
            while let Some(mut chunk) = next {
                let (bytes, following) = chunk.load_snake_chunk()?;
                out.extend(bytes);
                next = following;
            }
            Ok(out)
        })
    }

    /// One link of a snake chain: the remaining bytes and the continuation, if any
    fn load_snake_chunk(&mut self) -> Result<(Vec<u8>, Option<Slice>)> {
        if self.remaining_bits() % 8 != 0 {
            return Err(CellError::InvalidArgument(format!(
                "snake data of {} bits is not byte aligned",
                self.remaining_bits()
            )));
        }
        let bytes = self.load_bytes(self.remaining_bits() / 8)?;
        let next = if self.remaining_refs() > 0 {
            Some(self.load_ref()?)
        } else {
            None
        };
        Ok((bytes, next))
    }

    /// Loads a snake-encoded UTF-8 string
    pub fn load_snake_string(&mut self) -> Result<String> {
        self.atomically(|s| {
            let bytes = s.load_snake_bytes()?;
            String::from_utf8(bytes)
                .map_err(|e| CellError::InvalidArgument(format!("snake string is not UTF-8: {e}")))
        })
    }

    /// Skips a number of bits
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        self.ensure_bits(n)?;
        self.bit_pos += n;
        Ok(())
    }

    /// Skips a number of references
    pub fn skip_refs(&mut self, n: usize) -> Result<()> {
        if n > self.remaining_refs() {
            return Err(CellError::OutOfRefs);
        }
        self.ref_pos += n;
        Ok(())
    }

    /// Loads all remaining bits
    pub fn load_remaining_bits(&mut self) -> Result<Vec<u8>> {
        self.load_bits(self.remaining_bits())
    }

    /// Loads all remaining references
    pub fn load_remaining_refs(&mut self) -> Result<Vec<Arc<Cell>>> {
        let mut refs = Vec::with_capacity(self.remaining_refs());
        while self.remaining_refs() > 0 {
            refs.push(self.load_ref_cell()?);
        }
        Ok(refs)
    }

    pub fn preload_bit(&self) -> Result<bool> {
        self.clone().load_bit()
    }

    pub fn preload_bits(&self, n: usize) -> Result<Vec<u8>> {
        self.clone().load_bits(n)
    }

    pub fn preload_uint(&self, bits: usize) -> Result<u64> {
        self.clone().load_uint(bits)
    }

    pub fn preload_big_uint(&self, bits: usize) -> Result<BigUint> {
        self.clone().load_big_uint(bits)
    }

    pub fn preload_big_coins(&self) -> Result<BigUint> {
        self.clone().load_big_coins()
    }

    pub fn preload_coins(&self) -> Result<u128> {
        self.clone().load_coins()
    }

    pub fn preload_msg_address(&self) -> Result<MsgAddress> {
        self.clone().load_msg_address()
    }

    pub fn preload_address(&self) -> Result<Option<Address>> {
        self.clone().load_address()
    }

    /// Preloads a reference without advancing the position
    pub fn preload_ref(&self) -> Result<Slice> {
        self.clone().load_ref()
    }
}

impl From<Arc<Cell>> for Slice {
    fn from(cell: Arc<Cell>) -> Self {
        Self::new(cell)
    }
}
