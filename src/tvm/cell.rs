//! Cell implementation for TON blockchain
//!
//! A cell is a fundamental data structure in TON that can store up to 1023 bits
//! of data and maintain up to 4 references to other cells. Cells are immutable
//! and identified by their representation hash, which is computed lazily and
//! cached for the lifetime of the cell. Depths are known as soon as a cell is
//! built, and no cell may be deeper than [`MAX_CELL_DEPTH`].

use crate::tvm::error::{CellError, Result};
use derivative::Derivative;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::ops::BitOr;
use std::sync::{Arc, OnceLock};

/// Maximum number of bits a cell can store
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have
pub const MAX_CELL_REFS: usize = 4;

/// Cell level range (0-3)
pub const MAX_CELL_LEVEL: u8 = 3;

/// Maximum depth of a cell tree
pub const MAX_CELL_DEPTH: u16 = 1024;

/// Size of a representation hash in bytes
pub const HASH_BYTES: usize = 32;

const DEPTH_BYTES: usize = 2;

/// Kind of a cell, as encoded by the first data byte of exotic cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Ordinary,
    PrunedBranch,
    Library,
    MerkleProof,
    MerkleUpdate,
}

impl CellType {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(CellType::PrunedBranch),
            2 => Ok(CellType::Library),
            3 => Ok(CellType::MerkleProof),
            4 => Ok(CellType::MerkleUpdate),
            other => Err(CellError::InvalidArgument(format!(
                "unknown exotic cell type {other}"
            ))),
        }
    }

    /// Returns the type byte for exotic cells
    pub fn tag(self) -> Option<u8> {
        match self {
            CellType::Ordinary => None,
            CellType::PrunedBranch => Some(1),
            CellType::Library => Some(2),
            CellType::MerkleProof => Some(3),
            CellType::MerkleUpdate => Some(4),
        }
    }

    pub fn is_exotic(self) -> bool {
        self != CellType::Ordinary
    }

    fn is_merkle(self) -> bool {
        matches!(self, CellType::MerkleProof | CellType::MerkleUpdate)
    }
}

/// Three-bit mask of the Merkle levels a cell carries hashes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LevelMask(u8);

impl LevelMask {
    pub fn new(mask: u8) -> Self {
        Self(mask & 0b111)
    }

    pub fn mask(self) -> u8 {
        self.0
    }

    /// Highest level present in the mask
    pub fn level(self) -> u8 {
        8 - self.0.leading_zeros() as u8
    }

    pub fn hash_index(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn hash_count(self) -> usize {
        self.hash_index() + 1
    }

    /// Restricts the mask to levels below `level`
    pub fn apply(self, level: u8) -> Self {
        Self(self.0 & ((1u8 << level.min(MAX_CELL_LEVEL)) - 1))
    }

    pub fn is_significant(self, level: u8) -> bool {
        level == 0 || (self.0 >> (level - 1)) & 1 != 0
    }

    fn shift_right(self) -> Self {
        Self(self.0 >> 1)
    }
}

impl BitOr for LevelMask {
    type Output = LevelMask;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Represents a cell in the TON blockchain
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Cell {
    /// Cell data as bytes, bits past `bit_len` are always zero
    data: Vec<u8>,
    /// Number of bits in the cell (not necessarily a multiple of 8)
    bit_len: usize,
    /// References to other cells
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
    level_mask: LevelMask,
    /// Depth per significant level (a single entry for pruned branches)
    depths: Vec<u16>,
    /// Hashes per significant level, filled on first access
    #[derivative(Debug = "ignore")]
    hashes: OnceLock<Vec<[u8; HASH_BYTES]>>,
}

impl Cell {
    /// Creates a new empty cell
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            bit_len: 0,
            references: Vec::new(),
            cell_type: CellType::Ordinary,
            level_mask: LevelMask::default(),
            depths: vec![0],
            hashes: OnceLock::new(),
        }
    }

    /// Creates an ordinary cell with the given data and bit length
    pub fn with_data(data: Vec<u8>, bit_len: usize) -> Result<Self> {
        Self::with_references(data, bit_len, Vec::new(), false)
    }

    /// Creates a cell from raw parts, validating capacity and exotic layout
    pub fn with_references(
        mut data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
        exotic: bool,
    ) -> Result<Self> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::CapacityExceeded(format!(
                "cell bit length {bit_len} exceeds maximum {MAX_CELL_BITS}"
            )));
        }
        if references.len() > MAX_CELL_REFS {
            return Err(CellError::CapacityExceeded(format!(
                "cell has {} references, maximum is {MAX_CELL_REFS}",
                references.len()
            )));
        }

        let required_bytes = bit_len.div_ceil(8);
        if data.len() < required_bytes {
            return Err(CellError::InvalidArgument(format!(
                "data length {} is insufficient for {bit_len} bits",
                data.len()
            )));
        }
        data.truncate(required_bytes);
        if bit_len % 8 != 0 {
            data[required_bytes - 1] &= 0xFF << (8 - bit_len % 8);
        }

        let cell_type = if exotic {
            if bit_len < 8 {
                return Err(CellError::InvalidArgument(
                    "exotic cell must hold at least a type byte".to_string(),
                ));
            }
            CellType::from_tag(data[0])?
        } else {
            CellType::Ordinary
        };
        let level_mask = resolve_level_mask(cell_type, &data, bit_len, &references)?;
        let depths = compute_depths(cell_type, level_mask, &references);
        let depth = depths.iter().copied().max().unwrap_or(0);
        if depth > MAX_CELL_DEPTH {
            return Err(CellError::CapacityExceeded(format!(
                "cell depth {depth} exceeds maximum {MAX_CELL_DEPTH}"
            )));
        }

        Ok(Self {
            data,
            bit_len,
            references,
            cell_type,
            level_mask,
            depths,
            hashes: OnceLock::new(),
        })
    }

    /// Builds a pruned branch standing in for `cell` at the given Merkle depth
    pub fn pruned_branch(cell: &Cell, merkle_depth: u8) -> Result<Arc<Cell>> {
        if merkle_depth == 0 || merkle_depth > MAX_CELL_LEVEL {
            return Err(CellError::InvalidArgument(format!(
                "merkle depth {merkle_depth} is outside 1..=3"
            )));
        }
        let mask = LevelMask::new(cell.level_mask.mask() | (1 << (merkle_depth - 1)));
        let levels: Vec<u8> = (0..mask.level())
            .filter(|&level| mask.is_significant(level))
            .collect();

        let mut data = vec![1, mask.mask()];
        for &level in &levels {
            data.extend_from_slice(&cell.hash_at(level));
        }
        for &level in &levels {
            data.extend_from_slice(&cell.depth_at(level).to_be_bytes());
        }

        let bit_len = data.len() * 8;
        Ok(Arc::new(Cell::with_references(data, bit_len, Vec::new(), true)?))
    }

    /// Wraps `child` into a Merkle proof committing to its level-0 hash
    pub fn merkle_proof(child: Arc<Cell>) -> Result<Arc<Cell>> {
        let mut data = Vec::with_capacity(1 + HASH_BYTES + DEPTH_BYTES);
        data.push(3);
        data.extend_from_slice(&child.hash_at(0));
        data.extend_from_slice(&child.depth_at(0).to_be_bytes());

        let bit_len = data.len() * 8;
        Ok(Arc::new(Cell::with_references(data, bit_len, vec![child], true)?))
    }

    /// Creates a library cell referring to the code with the given hash
    pub fn library(hash: [u8; HASH_BYTES]) -> Result<Arc<Cell>> {
        let mut data = Vec::with_capacity(1 + HASH_BYTES);
        data.push(2);
        data.extend_from_slice(&hash);

        let bit_len = data.len() * 8;
        Ok(Arc::new(Cell::with_references(data, bit_len, Vec::new(), true)?))
    }

    /// Returns the cell's data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of bits in the cell
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the cell's references
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Returns the number of references
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Gets a reference by index
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.references.get(index)
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Returns whether this is an exotic cell
    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    pub fn level_mask(&self) -> LevelMask {
        self.level_mask
    }

    /// Returns the cell's level
    pub fn level(&self) -> u8 {
        self.level_mask.level()
    }

    /// Computes the cell's descriptors (2 bytes) as stored in a BoC
    pub fn descriptors(&self) -> [u8; 2] {
        self.descriptors_with(self.level_mask)
    }

    fn descriptors_with(&self, level_mask: LevelMask) -> [u8; 2] {
        // r + 8*s + 32*l
        let refs_descriptor = self.references.len() as u8
            + if self.is_exotic() { 8 } else { 0 }
            + level_mask.mask() * 32;
        // floor(b/8) + ceil(b/8)
        let bits_descriptor = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;

        [refs_descriptor, bits_descriptor]
    }

    /// Serializes the cell data with the completion tag if needed
    pub fn serialize_data(&self) -> Vec<u8> {
        let mut result = self.data.clone();
        if self.bit_len % 8 != 0 {
            result[self.bit_len / 8] |= 1 << (7 - self.bit_len % 8);
        }
        result
    }

    /// Representation hash: the hash at the highest level
    pub fn repr_hash(&self) -> [u8; HASH_BYTES] {
        self.hash_at(MAX_CELL_LEVEL)
    }

    /// Depth of the cell at the highest level
    pub fn depth(&self) -> u16 {
        self.depth_at(MAX_CELL_LEVEL)
    }

    /// Hash of the cell as seen at the given Merkle level
    pub fn hash_at(&self, level: u8) -> [u8; HASH_BYTES] {
        let hash_index = self.level_mask.apply(level).hash_index();
        if self.cell_type == CellType::PrunedBranch {
            let own_index = self.level_mask.hash_index();
            if hash_index != own_index {
                let offset = 2 + hash_index * HASH_BYTES;
                let mut hash = [0u8; HASH_BYTES];
                hash.copy_from_slice(&self.data[offset..offset + HASH_BYTES]);
                return hash;
            }
            return self.hashes()[0];
        }
        self.hashes()[hash_index]
    }

    /// Depth of the cell as seen at the given Merkle level
    pub fn depth_at(&self, level: u8) -> u16 {
        let hash_index = self.level_mask.apply(level).hash_index();
        if self.cell_type == CellType::PrunedBranch {
            let own_index = self.level_mask.hash_index();
            if hash_index != own_index {
                let offset = 2 + own_index * HASH_BYTES + hash_index * DEPTH_BYTES;
                return u16::from_be_bytes([self.data[offset], self.data[offset + 1]]);
            }
            return self.depths[0];
        }
        self.depths[hash_index]
    }

    fn hashes(&self) -> &[[u8; HASH_BYTES]] {
        self.hashes.get_or_init(|| self.compute_hashes())
    }

    fn compute_hashes(&self) -> Vec<[u8; HASH_BYTES]> {
        let total_hash_count = self.level_mask.hash_count();
        let hash_count = if self.cell_type == CellType::PrunedBranch {
            1
        } else {
            total_hash_count
        };
        let hash_offset = total_hash_count - hash_count;
        let child_shift = u8::from(self.cell_type.is_merkle());

        let mut hashes: Vec<[u8; HASH_BYTES]> = Vec::with_capacity(hash_count);
        let mut hash_i = 0;

        for level in 0..=self.level_mask.level() {
            if !self.level_mask.is_significant(level) {
                continue;
            }
            if hash_i < hash_offset {
                hash_i += 1;
                continue;
            }

            let mut hasher = Sha256::new();
            hasher.update(self.descriptors_with(self.level_mask.apply(level)));
            if hash_i == hash_offset {
                hasher.update(self.serialize_data());
            } else {
                hasher.update(hashes[hash_i - hash_offset - 1]);
            }

            let child_level = (level + child_shift).min(MAX_CELL_LEVEL);
            for reference in &self.references {
                hasher.update(reference.depth_at(child_level).to_be_bytes());
            }
            for reference in &self.references {
                hasher.update(reference.hash_at(child_level));
            }

            hashes.push(hasher.finalize().into());
            hash_i += 1;
        }

        hashes
    }

    /// Renders the cell tree for debugging
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        let _ = write!(out, "{pad}{}[{}] -> {{", self.bit_len, hex::encode(&self.data));
        if !self.references.is_empty() {
            for reference in &self.references {
                out.push('\n');
                reference.dump_into(out, indent + 1);
                out.push(',');
            }
            out.push('\n');
            out.push_str(&pad);
        }
        out.push('}');
    }
}

/// Depth per significant level, read from the children's stored depths
fn compute_depths(
    cell_type: CellType,
    level_mask: LevelMask,
    references: &[Arc<Cell>],
) -> Vec<u16> {
    if cell_type == CellType::PrunedBranch {
        return vec![0];
    }
    let child_shift = u8::from(cell_type.is_merkle());
    (0..=level_mask.level())
        .filter(|&level| level_mask.is_significant(level))
        .map(|level| {
            let child_level = (level + child_shift).min(MAX_CELL_LEVEL);
            references
                .iter()
                .map(|r| r.depth_at(child_level).saturating_add(1))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn resolve_level_mask(
    cell_type: CellType,
    data: &[u8],
    bit_len: usize,
    references: &[Arc<Cell>],
) -> Result<LevelMask> {
    let invalid = |msg: String| Err(CellError::InvalidArgument(msg));
    match cell_type {
        CellType::Ordinary => Ok(references
            .iter()
            .fold(LevelMask::default(), |mask, r| mask | r.level_mask)),
        CellType::PrunedBranch => {
            if !references.is_empty() {
                return invalid("pruned branch cannot have references".to_string());
            }
            if bit_len < 16 || data[1] == 0 || data[1] > 0b111 {
                return invalid("pruned branch has an invalid level mask".to_string());
            }
            let mask = LevelMask::new(data[1]);
            let expected = 16 + mask.hash_index() * (HASH_BYTES + DEPTH_BYTES) * 8;
            if bit_len != expected {
                return invalid(format!(
                    "pruned branch must hold {expected} bits, got {bit_len}"
                ));
            }
            Ok(mask)
        }
        CellType::Library => {
            if !references.is_empty() || bit_len != 8 + HASH_BYTES * 8 {
                return invalid("library cell must hold exactly a type byte and a hash".to_string());
            }
            Ok(LevelMask::default())
        }
        CellType::MerkleProof => {
            if references.len() != 1 || bit_len != (1 + HASH_BYTES + DEPTH_BYTES) * 8 {
                return invalid("malformed merkle proof cell".to_string());
            }
            check_commitment(data, 1, 1 + HASH_BYTES, &references[0])?;
            Ok(references[0].level_mask.shift_right())
        }
        CellType::MerkleUpdate => {
            if references.len() != 2 || bit_len != (1 + 2 * (HASH_BYTES + DEPTH_BYTES)) * 8 {
                return invalid("malformed merkle update cell".to_string());
            }
            let depths_at = 1 + 2 * HASH_BYTES;
            check_commitment(data, 1, depths_at, &references[0])?;
            check_commitment(data, 1 + HASH_BYTES, depths_at + DEPTH_BYTES, &references[1])?;
            Ok((references[0].level_mask | references[1].level_mask).shift_right())
        }
    }
}

/// Verifies a hash and depth embedded in `data` against the level-0 view of `child`
fn check_commitment(data: &[u8], hash_at: usize, depth_at: usize, child: &Cell) -> Result<()> {
    let embedded = &data[hash_at..hash_at + HASH_BYTES];
    let actual = child.hash_at(0);
    if embedded != actual {
        return Err(CellError::InvalidArgument(format!(
            "merkle commitment {} does not match child hash {}",
            hex::encode(embedded),
            hex::encode(actual)
        )));
    }
    let depth = u16::from_be_bytes([data[depth_at], data[depth_at + 1]]);
    if depth != child.depth_at(0) {
        return Err(CellError::InvalidArgument(format!(
            "merkle commitment depth {depth} does not match child depth {}",
            child.depth_at(0)
        )));
    }
    Ok(())
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.repr_hash() == other.repr_hash()
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.repr_hash());
    }
}
