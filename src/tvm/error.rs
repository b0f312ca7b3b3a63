//! Error type shared by the cell, slice, BoC and schema layers

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("cell capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("value does not fit: {0}")]
    ValueOutOfRange(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not enough bits: requested {requested}, available {available}")]
    Underflow { requested: usize, available: usize },
    #[error("no more references to read")]
    OutOfRefs,
    #[error("corrupt BoC: {0}")]
    CorruptBoc(String),
    #[error("BoC checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("unexpected end of data: {0}")]
    UnexpectedEnd(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("trailing data after decode: {bits} bits, {refs} refs")]
    TrailingData { bits: usize, refs: usize },
}

pub type Result<T> = std::result::Result<T, CellError>;

/// Abort-on-error conversion for statically known-valid construction.
///
/// Only for cells built from constants the programmer controls. Never call
/// this on anything derived from network input; use the `Result` instead.
pub trait Must<T> {
    fn must(self) -> T;
}

impl<T> Must<T> for Result<T> {
    #[track_caller]
    fn must(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("infallible cell construction failed: {err}"),
        }
    }
}
