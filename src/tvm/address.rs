//! TON Address implementation
//!
//! Supports standard internal addresses (workchain + hash), external addresses
//! and the `addr_none` placeholder, plus the raw and user-friendly string forms.

use crate::crc::CRC16;
use crate::tvm::error::{CellError, Result};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Represents a TON blockchain address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain ID (-1 for masterchain, 0 for basechain)
    pub workchain: i8,
    /// 32-byte hash part of the address
    pub hash_part: [u8; 32],
    /// Whether the address is bounceable
    pub is_bounceable: bool,
    /// Whether this is a test-only address
    pub is_test_only: bool,
}

impl Address {
    /// Creates a new address from workchain and hash part
    pub fn new(workchain: i8, hash_part: [u8; 32]) -> Self {
        Self {
            workchain,
            hash_part,
            is_bounceable: true,
            is_test_only: false,
        }
    }

    /// Parses address from raw format: "workchain:hash"
    pub fn from_hex(address: &str) -> Result<Self> {
        let (workchain, hash_hex) = address
            .split_once(':')
            .ok_or_else(|| CellError::InvalidAddress(format!("{address} is not workchain:hash")))?;

        let workchain = workchain
            .parse::<i8>()
            .map_err(|e| CellError::InvalidAddress(format!("bad workchain {workchain}: {e}")))?;
        if hash_hex.len() != 64 {
            return Err(CellError::InvalidAddress(
                "hash part must be 64 hex characters".to_string(),
            ));
        }

        let mut hash_part = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash_part)
            .map_err(|e| CellError::InvalidAddress(format!("bad hash part: {e}")))?;

        Ok(Self::new(workchain, hash_part))
    }

    /// Parses address from base64 user-friendly format
    pub fn from_base64(address: &str) -> Result<Self> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(address)
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(address))
            .map_err(|e| CellError::InvalidAddress(format!("bad base64: {e}")))?;

        if decoded.len() != 36 {
            return Err(CellError::InvalidAddress(format!(
                "user-friendly address must be 36 bytes, got {}",
                decoded.len()
            )));
        }

        let expected_crc = u16::from_be_bytes([decoded[34], decoded[35]]);
        let actual_crc = CRC16.checksum(&decoded[..34]);
        if expected_crc != actual_crc {
            return Err(CellError::InvalidAddress("checksum mismatch".to_string()));
        }

        let mut tag = decoded[0];
        let is_test_only = tag & TAG_TEST_ONLY != 0;
        tag &= !TAG_TEST_ONLY;

        let is_bounceable = match tag {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => {
                return Err(CellError::InvalidAddress(format!(
                    "unknown address tag 0x{other:02x}"
                )));
            }
        };

        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&decoded[2..34]);

        Ok(Self {
            workchain: decoded[1] as i8,
            hash_part,
            is_bounceable,
            is_test_only,
        })
    }

    /// Converts to user-friendly form with explicit flags
    pub fn to_friendly(&self, url_safe: bool, bounceable: bool, test_only: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut data = Vec::with_capacity(36);
        data.push(tag);
        data.push(self.workchain as u8);
        data.extend_from_slice(&self.hash_part);
        data.extend_from_slice(&CRC16.checksum(&data).to_be_bytes());

        if url_safe {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&data)
        } else {
            base64::engine::general_purpose::STANDARD.encode(&data)
        }
    }

    /// Converts to raw format (workchain:hash)
    pub fn to_hex(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    /// Converts to user-friendly base64 format using the address flags
    pub fn to_base64(&self) -> String {
        self.to_friendly(true, self.is_bounceable, self.is_test_only)
    }

    /// Sets the bounceable flag
    pub fn set_bounceable(&mut self, bounceable: bool) {
        self.is_bounceable = bounceable;
    }

    /// Sets the test-only flag
    pub fn set_test_only(&mut self, test_only: bool) {
        self.is_test_only = test_only;
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl FromStr for Address {
    type Err = CellError;

    /// Parses an address from string (supports both raw and base64 formats)
    fn from_str(s: &str) -> Result<Self> {
        if s.contains(':') {
            Self::from_hex(s)
        } else {
            Self::from_base64(s)
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Represents an external address (`addr_extern`), up to 511 bits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalAddress {
    data: Vec<u8>,
    bit_len: usize,
}

impl ExternalAddress {
    pub const MAX_BITS: usize = 511;

    /// Creates an external address from the first `bit_len` bits of `data`
    pub fn new(mut data: Vec<u8>, bit_len: usize) -> Result<Self> {
        if bit_len > Self::MAX_BITS {
            return Err(CellError::InvalidAddress(format!(
                "external address of {bit_len} bits exceeds {}",
                Self::MAX_BITS
            )));
        }
        if data.len() < bit_len.div_ceil(8) {
            return Err(CellError::InvalidArgument(format!(
                "insufficient data for {bit_len} bits"
            )));
        }
        data.truncate(bit_len.div_ceil(8));
        if bit_len % 8 != 0 {
            let last = data.len() - 1;
            data[last] &= 0xFF << (8 - bit_len % 8);
        }
        Ok(Self { data, bit_len })
    }

    /// Creates an external address from whole bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.to_vec(), bytes.len() * 8)
    }

    /// Creates an external address from hex string
    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes =
            hex::decode(hex).map_err(|e| CellError::InvalidAddress(format!("bad hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }
}

impl fmt::Display for ExternalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bit_len == 0 {
            write!(f, "EXT:<empty>")
        } else {
            write!(f, "EXT:{}:{}", self.bit_len, hex::encode(&self.data))
        }
    }
}

/// Any address that can appear in a message (`MsgAddress` in TL-B)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MsgAddress {
    #[default]
    None,
    Std(Address),
    External(ExternalAddress),
}

impl MsgAddress {
    /// Serialized size of `addr_std` without anycast
    pub const STD_BITS: usize = 2 + 1 + 8 + 256;

    pub fn as_std(&self) -> Option<&Address> {
        match self {
            MsgAddress::Std(addr) => Some(addr),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, MsgAddress::None)
    }
}

impl From<Address> for MsgAddress {
    fn from(addr: Address) -> Self {
        MsgAddress::Std(addr)
    }
}

impl From<Option<Address>> for MsgAddress {
    fn from(addr: Option<Address>) -> Self {
        addr.map_or(MsgAddress::None, MsgAddress::Std)
    }
}

impl fmt::Display for MsgAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgAddress::None => write!(f, "NONE"),
            MsgAddress::Std(addr) => addr.fmt(f),
            MsgAddress::External(ext) => ext.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex() {
        let addr =
            Address::from_hex("0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8")
                .unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(
            addr.to_hex(),
            "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8"
        );
    }

    #[test]
    fn test_address_base64() {
        let addr: Address = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N".parse().unwrap();
        assert_eq!(addr.workchain, 0);
        assert!(addr.is_bounceable);
        assert_eq!(
            addr.to_hex(),
            "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8"
        );
        assert_eq!(addr.to_base64(), "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N");
    }

    #[test]
    fn test_bad_checksum() {
        let result = Address::from_base64("EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2O");
        assert!(matches!(result, Err(CellError::InvalidAddress(_))));
    }

    #[test]
    fn test_zero_address_formats() {
        let zero_addr = Address::new(0, [0u8; 32]);
        assert_eq!(
            zero_addr.to_hex(),
            "0:0000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(
            zero_addr.to_friendly(true, true, false),
            "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c"
        );
        assert_eq!(
            zero_addr.to_friendly(true, false, false),
            "UQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAJKZ"
        );
    }

    #[test]
    fn test_flags_round_trip() {
        let mut addr = Address::new(-1, [0x12; 32]);
        addr.set_bounceable(false);
        addr.set_test_only(true);
        let parsed = Address::from_base64(&addr.to_base64()).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_external_address() {
        let ext = ExternalAddress::new(vec![0x12, 0x3F], 12).unwrap();
        assert_eq!(ext.data(), &[0x12, 0x30]);
        assert_eq!(ext.bit_len(), 12);
        assert!(ExternalAddress::new(vec![0; 64], 512).is_err());
    }

    #[test]
    fn test_address_serde() {
        let addr = Address::new(0, [0u8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
