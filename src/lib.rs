//! Cell engine for the TON blockchain: cells, bag-of-cells serialization and
//! a schema layer for structured message (de)serialization.

pub mod crc;
pub mod tlb;
pub mod tvm;
pub mod utils;
