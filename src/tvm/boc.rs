//! Bag of Cells (BoC) serialization and deserialization
//!
//! BoC is a serialization format that encodes cells into byte arrays.
//! Cells are deduplicated by representation hash and written parents first,
//! so every reference points to a larger index. Decoding accepts any
//! acyclic reference order.

use crate::crc::CRC32C;
use crate::tvm::cell::{Cell, HASH_BYTES, LevelMask, MAX_CELL_REFS};
use crate::tvm::error::{CellError, Result};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Arc;

/// BoC magic number for standard format
const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// BoC magic number for legacy indexed format
const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// BoC magic number for legacy indexed format with CRC32C
const BOC_INDEXED_CRC32C_MAGIC: u32 = 0xacc3a728;

const MAX_SIZE_BYTES: usize = 4;
const MAX_OFFSET_BYTES: usize = 8;
const DEPTH_BYTES: usize = 2;

/// Serialization flags of the generic BoC header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BocOptions {
    /// Write the table of cumulative cell offsets
    pub has_idx: bool,
    /// Append a CRC32C of the whole buffer
    pub has_crc32c: bool,
    /// Mark cells with more than one parent in the index (requires `has_idx`)
    pub has_cache_bits: bool,
}

/// Serializes a cell and its references into a Bag of Cells (BoC) format
pub fn serialize_boc(root: &Arc<Cell>, has_crc32: bool) -> Result<Vec<u8>> {
    let options = BocOptions {
        has_crc32c: has_crc32,
        ..BocOptions::default()
    };
    serialize_boc_with(std::slice::from_ref(root), options)
}

/// Serializes one or more roots with explicit header options
pub fn serialize_boc_with(roots: &[Arc<Cell>], options: BocOptions) -> Result<Vec<u8>> {
    if roots.is_empty() {
        return Err(CellError::InvalidArgument("BoC needs at least one root".to_string()));
    }
    if options.has_cache_bits && !options.has_idx {
        return Err(CellError::InvalidArgument(
            "cache bits require an index table".to_string(),
        ));
    }

    let (cells, index) = collect_cells(roots);
    let size_bytes = bytes_needed(cells.len());

    let mut records = Vec::with_capacity(cells.len());
    let mut offsets = Vec::with_capacity(cells.len());
    let mut cells_size = 0usize;
    for cell in &cells {
        let record = serialize_cell(cell, &index, size_bytes)?;
        cells_size += record.len();
        offsets.push(cells_size);
        records.push(record);
    }

    let offset_bytes = if options.has_cache_bits {
        bytes_needed(cells_size * 2 + 1)
    } else {
        bytes_needed(cells_size)
    };

    let mut result = Vec::with_capacity(32 + cells_size + cells.len() * offset_bytes);
    result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

    let flags = (u8::from(options.has_idx) << 7)
        | (u8::from(options.has_crc32c) << 6)
        | (u8::from(options.has_cache_bits) << 5);
    result.push(flags | size_bytes as u8);
    result.push(offset_bytes as u8);

    write_uint(&mut result, cells.len(), size_bytes);
    write_uint(&mut result, roots.len(), size_bytes);
    // absent cells are never produced
    write_uint(&mut result, 0, size_bytes);
    write_uint(&mut result, cells_size, offset_bytes);

    for root in roots {
        let root_index = index.get(&root.repr_hash()).copied().ok_or_else(|| {
            CellError::InvalidArgument("root cell missing from collected cells".to_string())
        })?;
        write_uint(&mut result, root_index, size_bytes);
    }

    if options.has_idx {
        let shared = if options.has_cache_bits {
            shared_cells(&cells, &index)
        } else {
            vec![false; cells.len()]
        };
        for (offset, is_shared) in offsets.iter().zip(shared) {
            let entry = if options.has_cache_bits {
                offset * 2 + usize::from(is_shared)
            } else {
                *offset
            };
            write_uint(&mut result, entry, offset_bytes);
        }
    }

    for record in records {
        result.extend_from_slice(&record);
    }

    if options.has_crc32c {
        let crc = CRC32C.checksum(&result);
        result.extend_from_slice(&crc.to_le_bytes());
    }

    log::debug!(
        "Serialized BoC: {} cells, {} roots, {} bytes",
        cells.len(),
        roots.len(),
        result.len()
    );
    Ok(result)
}

/// Deserializes a Bag of Cells (BoC) with exactly one root
pub fn deserialize_boc(data: &[u8]) -> Result<Arc<Cell>> {
    let mut roots = deserialize_boc_roots(data)?;
    if roots.len() != 1 {
        return Err(CellError::CorruptBoc(format!(
            "expected a single root, found {}",
            roots.len()
        )));
    }
    Ok(roots.remove(0))
}

/// Deserializes a Bag of Cells (BoC) and returns all of its roots
pub fn deserialize_boc_roots(data: &[u8]) -> Result<Vec<Arc<Cell>>> {
    let mut reader = Cursor::new(data);
    let header = parse_header(&mut reader)?;

    let cells_start = reader.position() as usize;
    let cells_end = cells_start + header.cells_size;
    let expected_len = cells_end + if header.has_crc32c { 4 } else { 0 };
    if data.len() != expected_len {
        return Err(CellError::CorruptBoc(format!(
            "declared size needs {expected_len} bytes, buffer holds {}",
            data.len()
        )));
    }

    if header.has_crc32c {
        let expected = u32::from_le_bytes([
            data[cells_end],
            data[cells_end + 1],
            data[cells_end + 2],
            data[cells_end + 3],
        ]);
        let actual = CRC32C.checksum(&data[..cells_end]);
        if expected != actual {
            log::warn!("BoC CRC32C mismatch: expected 0x{expected:08x}, got 0x{actual:08x}");
            return Err(CellError::ChecksumMismatch { expected, actual });
        }
    }

    let raw_cells = parse_cells(&data[cells_start..cells_end], &header)?;
    let cells = resolve_references(raw_cells)?;

    log::trace!(
        "Deserialized BoC: {} cells, {} roots",
        cells.len(),
        header.roots.len()
    );
    Ok(header.roots.iter().map(|&idx| cells[idx].clone()).collect())
}

struct BocHeader {
    has_crc32c: bool,
    size_bytes: usize,
    cells_count: usize,
    cells_size: usize,
    roots: Vec<usize>,
    /// Cumulative end offsets of each cell record
    index: Option<Vec<usize>>,
}

fn corrupt(msg: impl Into<String>) -> CellError {
    CellError::CorruptBoc(msg.into())
}

fn parse_header(reader: &mut Cursor<&[u8]>) -> Result<BocHeader> {
    let magic = reader
        .read_u32::<BigEndian>()
        .map_err(|_| corrupt("BoC data too short"))?;

    let (has_idx, has_crc32c, has_cache_bits, size_bytes, legacy) = match magic {
        BOC_GENERIC_MAGIC => {
            let flags = read_u8(reader)?;
            (
                flags & 0x80 != 0,
                flags & 0x40 != 0,
                flags & 0x20 != 0,
                (flags & 0x07) as usize,
                false,
            )
        }
        BOC_INDEXED_MAGIC => (true, false, false, read_u8(reader)? as usize, true),
        BOC_INDEXED_CRC32C_MAGIC => (true, true, false, read_u8(reader)? as usize, true),
        other => return Err(corrupt(format!("invalid BoC magic number: 0x{other:08x}"))),
    };

    if size_bytes == 0 || size_bytes > MAX_SIZE_BYTES {
        return Err(corrupt(format!("invalid size_bytes: {size_bytes}")));
    }
    if has_cache_bits && !has_idx {
        return Err(corrupt("cache bits set without an index"));
    }
    let offset_bytes = read_u8(reader)? as usize;
    if offset_bytes == 0 || offset_bytes > MAX_OFFSET_BYTES {
        return Err(corrupt(format!("invalid offset_bytes: {offset_bytes}")));
    }

    let cells_count = read_uint(reader, size_bytes)?;
    let roots_count = read_uint(reader, size_bytes)?;
    let absent_count = read_uint(reader, size_bytes)?;
    let cells_size = read_uint(reader, offset_bytes)?;

    // Bound every count by the bytes actually present before allocating
    let available = reader.get_ref().len() - reader.position() as usize;
    if cells_size > available {
        return Err(corrupt(format!(
            "declared cell data of {cells_size} bytes, only {available} available"
        )));
    }
    if cells_count == 0 || cells_count.saturating_mul(2) > cells_size {
        return Err(corrupt(format!(
            "{cells_count} cells cannot fit in {cells_size} bytes"
        )));
    }
    if roots_count == 0 || roots_count > cells_count {
        return Err(corrupt(format!("invalid root count {roots_count}")));
    }
    if absent_count > 0 {
        return Err(corrupt("absent cells are not supported"));
    }

    let roots = if legacy {
        (0..roots_count).collect()
    } else {
        let mut roots = Vec::with_capacity(roots_count);
        for _ in 0..roots_count {
            let root = read_uint(reader, size_bytes)?;
            if root >= cells_count {
                return Err(corrupt(format!("root index {root} out of range")));
            }
            roots.push(root);
        }
        roots
    };

    let index = if has_idx {
        let mut index = Vec::with_capacity(cells_count);
        for _ in 0..cells_count {
            let entry = read_uint(reader, offset_bytes)?;
            index.push(if has_cache_bits { entry >> 1 } else { entry });
        }
        Some(index)
    } else {
        None
    };

    Ok(BocHeader {
        has_crc32c,
        size_bytes,
        cells_count,
        cells_size,
        roots,
        index,
    })
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    exotic: bool,
    level_mask: LevelMask,
    refs: Vec<usize>,
}

fn parse_cells(data: &[u8], header: &BocHeader) -> Result<Vec<RawCell>> {
    let mut reader = Cursor::new(data);
    let mut cells = Vec::with_capacity(header.cells_count);

    for i in 0..header.cells_count {
        let d1 = read_u8(&mut reader)?;
        let d2 = read_u8(&mut reader)?;

        let ref_count = (d1 & 0x07) as usize;
        if ref_count > MAX_CELL_REFS {
            return Err(corrupt(format!("cell {i} declares {ref_count} references")));
        }
        let exotic = d1 & 0x08 != 0;
        let with_hashes = d1 & 0x10 != 0;
        let level_mask = LevelMask::new(d1 >> 5);

        if with_hashes {
            let skip = level_mask.hash_count() * (HASH_BYTES + DEPTH_BYTES);
            let position = reader.position() as usize + skip;
            if position > data.len() {
                return Err(corrupt(format!("cell {i} stored hashes are truncated")));
            }
            reader.set_position(position as u64);
        }

        let mut cell_data = vec![0u8; (d2 as usize).div_ceil(2)];
        reader
            .read_exact(&mut cell_data)
            .map_err(|_| corrupt(format!("cell {i} data is truncated")))?;
        let bit_len = decode_bit_len(&cell_data, d2)
            .ok_or_else(|| corrupt(format!("cell {i} has no completion tag")))?;

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let ref_idx = read_uint(&mut reader, header.size_bytes)?;
            if ref_idx >= header.cells_count {
                return Err(corrupt(format!(
                    "cell {i} references index {ref_idx} outside 0..{}",
                    header.cells_count
                )));
            }
            refs.push(ref_idx);
        }

        if let Some(index) = &header.index {
            if index[i] != reader.position() as usize {
                return Err(corrupt(format!(
                    "index entry {} for cell {i} does not match offset {}",
                    index[i],
                    reader.position()
                )));
            }
        }

        cells.push(RawCell {
            data: cell_data,
            bit_len,
            exotic,
            level_mask,
            refs,
        });
    }

    if reader.position() as usize != data.len() {
        return Err(corrupt(format!(
            "cell data has {} unused bytes",
            data.len() - reader.position() as usize
        )));
    }
    Ok(cells)
}

/// Recovers the bit length from `d2` and the completion tag of the last byte
fn decode_bit_len(data: &[u8], d2: u8) -> Option<usize> {
    if d2 % 2 == 0 {
        return Some(data.len() * 8);
    }
    let last = *data.last()?;
    if last == 0 {
        return None;
    }
    Some(data.len() * 8 - last.trailing_zeros() as usize - 1)
}

/// Builds live cells from parsed records, children before parents
fn resolve_references(mut raw: Vec<RawCell>) -> Result<Vec<Arc<Cell>>> {
    let count = raw.len();
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; count];
    let mut visiting = vec![false; count];

    for start in (0..count).rev() {
        let mut stack = vec![start];
        while let Some(&idx) = stack.last() {
            if built[idx].is_some() {
                stack.pop();
                continue;
            }
            visiting[idx] = true;

            let pending = raw[idx].refs.iter().copied().find(|&r| built[r].is_none());
            match pending {
                Some(child) if visiting[child] => {
                    return Err(corrupt(format!("reference cycle through cell {child}")));
                }
                Some(child) => stack.push(child),
                None => {
                    let refs = raw[idx]
                        .refs
                        .iter()
                        .map(|&r| built[r].clone().ok_or_else(|| corrupt("unresolved reference")))
                        .collect::<Result<Vec<_>>>()?;
                    let record = &mut raw[idx];
                    let cell = Cell::with_references(
                        std::mem::take(&mut record.data),
                        record.bit_len,
                        refs,
                        record.exotic,
                    )
                    .map_err(|e| corrupt(format!("cell {idx}: {e}")))?;
                    if cell.level_mask() != record.level_mask {
                        return Err(corrupt(format!(
                            "cell {idx} declares level mask {}, computed {}",
                            record.level_mask.mask(),
                            cell.level_mask().mask()
                        )));
                    }

                    // children are already hashed, so this never recurses deeply
                    cell.repr_hash();
                    built[idx] = Some(Arc::new(cell));
                    visiting[idx] = false;
                    stack.pop();
                }
            }
        }
    }

    built
        .into_iter()
        .map(|cell| cell.ok_or_else(|| corrupt("unresolved cell")))
        .collect()
}

fn serialize_cell(
    cell: &Arc<Cell>,
    index: &HashMap<[u8; 32], usize>,
    size_bytes: usize,
) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(2 + cell.data().len() + cell.reference_count() * size_bytes);
    result.extend_from_slice(&cell.descriptors());
    result.extend_from_slice(&cell.serialize_data());

    for reference in cell.references() {
        let ref_idx = index.get(&reference.repr_hash()).copied().ok_or_else(|| {
            CellError::InvalidArgument("reference not found in cell map".to_string())
        })?;
        write_uint(&mut result, ref_idx, size_bytes);
    }

    Ok(result)
}

/// Collects unique cells in topological order, roots first
fn collect_cells(roots: &[Arc<Cell>]) -> (Vec<Arc<Cell>>, HashMap<[u8; 32], usize>) {
    let mut visited = HashSet::new();
    let mut post_order = Vec::new();

    for root in roots.iter().rev() {
        if !visited.insert(root.repr_hash()) {
            continue;
        }
        let mut stack: Vec<(Arc<Cell>, usize)> = vec![(root.clone(), 0)];
        loop {
            let Some(top) = stack.last_mut() else {
                break;
            };
            let ref_count = top.0.reference_count();
            if top.1 < ref_count {
                // Walk children last-to-first so the final reversal keeps them in order
                let child = top.0.references()[ref_count - 1 - top.1].clone();
                top.1 += 1;
                if visited.insert(child.repr_hash()) {
                    stack.push((child, 0));
                }
            } else if let Some((cell, _)) = stack.pop() {
                post_order.push(cell);
            }
        }
    }

    post_order.reverse();
    let index = post_order
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.repr_hash(), i))
        .collect();
    (post_order, index)
}

fn shared_cells(cells: &[Arc<Cell>], index: &HashMap<[u8; 32], usize>) -> Vec<bool> {
    let mut parents = vec![0usize; cells.len()];
    for cell in cells {
        for reference in cell.references() {
            if let Some(&i) = index.get(&reference.repr_hash()) {
                parents[i] += 1;
            }
        }
    }
    parents.into_iter().map(|count| count > 1).collect()
}

fn bytes_needed(value: usize) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = (usize::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(8)
}

fn write_uint(buf: &mut Vec<u8>, value: usize, size: usize) {
    let mut bytes = [0u8; 8];
    BigEndian::write_uint(&mut bytes, value as u64, size);
    buf.extend_from_slice(&bytes[..size]);
}

fn read_u8(reader: &mut Cursor<&[u8]>) -> Result<u8> {
    reader
        .read_u8()
        .map_err(|_| corrupt("unexpected end of BoC data"))
}

fn read_uint(reader: &mut Cursor<&[u8]>, size: usize) -> Result<usize> {
    let value = reader
        .read_uint::<BigEndian>(size)
        .map_err(|_| corrupt("unexpected end of BoC data"))?;
    usize::try_from(value).map_err(|_| corrupt(format!("value {value} overflows usize")))
}

/// Converts a hex string to a BoC
pub fn hex_to_boc(hex: &str) -> Result<Arc<Cell>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes =
        hex::decode(&hex).map_err(|e| CellError::InvalidArgument(format!("bad hex: {e}")))?;
    deserialize_boc(&bytes)
}

/// Converts a BoC to a hex string
pub fn boc_to_hex(cell: &Arc<Cell>, has_crc32: bool) -> Result<String> {
    Ok(hex::encode(serialize_boc(cell, has_crc32)?))
}

/// Converts a BoC to base64
pub fn boc_to_base64(cell: &Arc<Cell>, has_crc32: bool) -> Result<String> {
    use base64::Engine;
    let bytes = serialize_boc(cell, has_crc32)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Converts a base64 string to a BoC
pub fn base64_to_boc(b64: &str) -> Result<Arc<Cell>> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| CellError::InvalidArgument(format!("bad base64: {e}")))?;
    deserialize_boc(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::builder::Builder;
    use crate::tvm::cell::MAX_CELL_DEPTH;

    fn leaf(value: u32) -> Arc<Cell> {
        let mut builder = Builder::new();
        builder.store_u32(value).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_serialize_deserialize_simple() {
        let cell = leaf(0x12345678);
        let boc = serialize_boc(&cell, false).unwrap();
        let deserialized = deserialize_boc(&boc).unwrap();
        assert_eq!(cell.repr_hash(), deserialized.repr_hash());
    }

    #[test]
    fn test_empty_cell_known_boc() {
        let empty = Builder::new().build().unwrap();
        assert_eq!(boc_to_base64(&empty, true).unwrap(), "te6cckEBAQEAAgAAAEysuc0=");
        assert_eq!(base64_to_boc("te6cckEBAQEAAgAAAEysuc0=").unwrap(), empty);
    }

    #[test]
    fn test_hex_conversion() {
        let cell = leaf(0xFF);
        let hex = boc_to_hex(&cell, false).unwrap();
        let decoded = hex_to_boc(&hex).unwrap();
        assert_eq!(cell.repr_hash(), decoded.repr_hash());
    }

    #[test]
    fn test_shared_child_is_deduplicated() {
        let shared = leaf(7);
        let mut left = Builder::new();
        left.store_ref(shared.clone()).unwrap();
        let left = left.build().unwrap();

        let mut root = Builder::new();
        root.store_ref(left).unwrap();
        root.store_ref(shared.clone()).unwrap();
        root.store_ref(leaf(7)).unwrap();
        let root = root.build().unwrap();

        let boc = serialize_boc(&root, true).unwrap();
        // root, left and one copy of the shared leaf
        assert_eq!(boc[6], 3);
        let decoded = deserialize_boc(&boc).unwrap();
        assert_eq!(decoded.repr_hash(), root.repr_hash());
        assert!(Arc::ptr_eq(
            decoded.reference(1).unwrap(),
            decoded.reference(2).unwrap()
        ));
    }

    #[test]
    fn test_reserialization_is_byte_identical() {
        let mut root = Builder::new();
        root.store_u8(1).unwrap();
        root.store_ref(leaf(1)).unwrap();
        root.store_ref(leaf(2)).unwrap();
        let root = root.build().unwrap();

        let options = BocOptions {
            has_idx: true,
            has_crc32c: true,
            has_cache_bits: true,
        };
        let first = serialize_boc_with(&[root], options).unwrap();
        let decoded = deserialize_boc(&first).unwrap();
        let second = serialize_boc_with(&[decoded], options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reference_index_out_of_range() {
        let bytes = [
            0xb5, 0xee, 0x9c, 0x72, // magic
            0x01, 0x01, // flags/size, offset bytes
            0x02, 0x01, 0x00, 0x05, // cells, roots, absent, data size
            0x00, // root index
            0x01, 0x00, 0x05, // cell 0: one ref to index 5
            0x00, 0x00, // cell 1: empty
        ];
        assert!(matches!(
            deserialize_boc(&bytes),
            Err(CellError::CorruptBoc(_))
        ));
    }

    #[test]
    fn test_reference_cycle() {
        let bytes = [
            0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x02, 0x01, 0x00, 0x06, 0x00, //
            0x01, 0x00, 0x01, // cell 0 -> cell 1
            0x01, 0x00, 0x00, // cell 1 -> cell 0
        ];
        assert!(matches!(
            deserialize_boc(&bytes),
            Err(CellError::CorruptBoc(_))
        ));
    }

    #[test]
    fn test_forward_and_backward_references() {
        // child stored before its parent
        let bytes = [
            0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x02, 0x01, 0x00, 0x06, 0x01, //
            0x00, 0x02, 0xAB, // cell 0: one byte
            0x01, 0x00, 0x00, // cell 1 (root) -> cell 0
        ];
        let root = deserialize_boc(&bytes).unwrap();
        assert_eq!(root.reference(0).unwrap().data(), &[0xAB]);

        let mut expected = Builder::new();
        let mut child = Builder::new();
        child.store_u8(0xAB).unwrap();
        expected.store_ref(child.build().unwrap()).unwrap();
        assert_eq!(root.repr_hash(), expected.build().unwrap().repr_hash());
    }

    /// A generic BoC holding a chain of `len` empty cells, root first
    fn chain_boc(len: usize) -> Vec<u8> {
        let data_size = (len - 1) * 4 + 2;
        let mut bytes = vec![0xb5, 0xee, 0x9c, 0x72, 0x02, 0x04];
        bytes.extend_from_slice(&(len as u16).to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
        bytes.extend_from_slice(&(data_size as u32).to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0x00]);
        for idx in 1..len {
            bytes.extend_from_slice(&[0x01, 0x00]);
            bytes.extend_from_slice(&(idx as u16).to_be_bytes());
        }
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes
    }

    #[test]
    fn test_deepest_chain_decodes() {
        let root = deserialize_boc(&chain_boc(MAX_CELL_DEPTH as usize + 1)).unwrap();
        assert_eq!(root.depth(), MAX_CELL_DEPTH);

        let mut expected = Arc::new(Cell::new());
        for _ in 0..MAX_CELL_DEPTH {
            expected = Arc::new(Cell::with_references(vec![], 0, vec![expected], false).unwrap());
            expected.repr_hash();
        }
        assert_eq!(root.repr_hash(), expected.repr_hash());
    }

    #[test]
    fn test_too_deep_chain_rejected() {
        for len in [MAX_CELL_DEPTH as usize + 2, 20_000] {
            assert!(
                matches!(deserialize_boc(&chain_boc(len)), Err(CellError::CorruptBoc(_))),
                "chain of {len} cells"
            );
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut boc = serialize_boc(&leaf(99), true).unwrap();
        let last = boc.len() - 1;
        boc[last] ^= 0xFF;
        assert!(matches!(
            deserialize_boc(&boc),
            Err(CellError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_input() {
        let boc = serialize_boc(&leaf(99), false).unwrap();
        for len in 0..boc.len() {
            assert!(
                matches!(deserialize_boc(&boc[..len]), Err(CellError::CorruptBoc(_))),
                "prefix of {len} bytes"
            );
        }
    }

    #[test]
    fn test_absurd_cell_count_rejected() {
        let bytes = [
            0xb5, 0xee, 0x9c, 0x72, 0x04, 0x01, //
            0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x02, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert!(matches!(
            deserialize_boc(&bytes),
            Err(CellError::CorruptBoc(_))
        ));
    }

    #[test]
    fn test_legacy_indexed_magic() {
        let mut bytes = vec![
            0xac, 0xc3, 0xa7, 0x28, // indexed with crc32c
            0x01, 0x01, 0x01, 0x01, 0x00, 0x03, // size, offsets, cells, roots, absent, data size
            0x03, // index
            0x00, 0x01, 0x80, // cell: one bit set
        ];
        let crc = CRC32C.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());

        let root = deserialize_boc(&bytes).unwrap();
        assert_eq!(root.bit_len(), 0);

        bytes[0..4].copy_from_slice(&BOC_INDEXED_MAGIC.to_be_bytes());
        bytes.truncate(bytes.len() - 4);
        assert_eq!(deserialize_boc(&bytes).unwrap(), root);
    }

    #[test]
    fn test_bad_index_entry() {
        let bytes = [
            0xb5, 0xee, 0x9c, 0x72, 0x81, 0x01, 0x01, 0x01, 0x00, 0x02, 0x00, //
            0x01, // index claims one byte
            0x00, 0x00,
        ];
        assert!(matches!(
            deserialize_boc(&bytes),
            Err(CellError::CorruptBoc(_))
        ));
    }

    #[test]
    fn test_multiple_roots() {
        let a = leaf(1);
        let b = leaf(2);
        let boc = serialize_boc_with(&[a.clone(), b.clone()], BocOptions::default()).unwrap();
        let roots = deserialize_boc_roots(&boc).unwrap();
        assert_eq!(roots, vec![a, b]);
        assert!(matches!(
            deserialize_boc(&boc),
            Err(CellError::CorruptBoc(_))
        ));
    }

    #[test]
    fn test_exotic_cells_round_trip() {
        let secret = leaf(42);
        let mut partial = Builder::new();
        partial.store_ref(leaf(1)).unwrap();
        partial.store_ref(Cell::pruned_branch(&secret, 1).unwrap()).unwrap();
        let proof = Cell::merkle_proof(partial.build().unwrap()).unwrap();

        let boc = serialize_boc(&proof, true).unwrap();
        let decoded = deserialize_boc(&boc).unwrap();
        assert_eq!(decoded.repr_hash(), proof.repr_hash());
        assert!(decoded.is_exotic());
    }
}
