//! Integration tests and additional test coverage for TVM modules

use crate::tvm::*;
use num_bigint::{BigInt, BigUint};
use num_traits::One;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Helper function to create a cell with specific data
fn create_test_cell(data: Vec<u8>, bit_len: usize) -> Arc<Cell> {
    Arc::new(Cell::with_data(data, bit_len).unwrap())
}

/// Builds a random DAG where every cell may point at any earlier cell
fn random_dag(rng: &mut StdRng, cells: usize) -> Arc<Cell> {
    let mut built: Vec<Arc<Cell>> = Vec::with_capacity(cells);
    for _ in 0..cells {
        let mut builder = Builder::new();
        let bits = rng.gen_range(0..=MAX_CELL_BITS);
        let data: Vec<u8> = (0..bits.div_ceil(8)).map(|_| rng.r#gen()).collect();
        builder.store_bits(&data, bits).unwrap();

        if !built.is_empty() {
            for _ in 0..rng.gen_range(0..=MAX_CELL_REFS) {
                let child = built[rng.gen_range(0..built.len())].clone();
                builder.store_ref(child).unwrap();
            }
        }
        built.push(builder.build().unwrap());
    }
    built.pop().unwrap()
}

#[test]
fn test_cell_operations() {
    let cell = create_test_cell(vec![0xFF, 0x00], 16);
    assert_eq!(cell.bit_len(), 16);
    assert_eq!(cell.data(), &[0xFF, 0x00]);
    assert_eq!(cell.repr_hash(), cell.repr_hash());
}

#[test]
fn test_builder_and_slice_integration() {
    let addr = Address::new(0, [1u8; 32]);
    let mut builder = Builder::new();
    builder.store_address(Some(&addr)).unwrap();
    builder.store_u32(42).unwrap();
    builder.store_bool(true).unwrap();
    builder.store_string("Hello").unwrap();
    let cell = builder.build().unwrap();

    let mut slice = Slice::new(cell);
    assert_eq!(slice.load_address().unwrap(), Some(addr));
    assert_eq!(slice.load_u32().unwrap(), 42);
    assert!(slice.load_bool().unwrap());
    assert_eq!(slice.load_bytes(5).unwrap(), b"Hello");
    slice.ensure_empty().unwrap();
}

#[test]
fn test_boc_with_references() {
    let mut ref_builder_1 = Builder::new();
    ref_builder_1.store_u32(111).unwrap();
    let mut ref_builder_2 = Builder::new();
    ref_builder_2.store_u32(222).unwrap();

    let mut root_builder = Builder::new();
    root_builder.store_u32(999).unwrap();
    root_builder.store_ref(ref_builder_1.build().unwrap()).unwrap();
    root_builder.store_ref(ref_builder_2.build().unwrap()).unwrap();
    let root = root_builder.build().unwrap();

    let boc = serialize_boc(&root, false).unwrap();
    let deserialized = deserialize_boc(&boc).unwrap();

    assert_eq!(deserialized.reference_count(), 2);
    assert_eq!(root.repr_hash(), deserialized.repr_hash());

    let mut slice = Slice::new(deserialized);
    assert_eq!(slice.load_u32().unwrap(), 999);
    assert_eq!(slice.load_ref().unwrap().load_u32().unwrap(), 111);
    assert_eq!(slice.load_ref().unwrap().load_u32().unwrap(), 222);
}

#[test]
fn test_address_builder_integration() {
    let mut addr = Address::new(-1, [0x12; 32]);
    addr.set_test_only(true);
    addr.set_bounceable(false);

    let mut builder = Builder::new();
    builder.store_address(Some(&addr)).unwrap();
    let cell = builder.build().unwrap();
    assert_eq!(cell.bit_len(), MsgAddress::STD_BITS);

    let mut builder2 = Builder::new();
    builder2.store_address(Some(&addr)).unwrap();
    assert_eq!(cell.repr_hash(), builder2.build().unwrap().repr_hash());

    // flags live only in the friendly form
    let loaded = Slice::new(cell).load_address().unwrap().unwrap();
    assert_eq!(loaded.workchain, -1);
    assert_eq!(loaded.hash_part, [0x12; 32]);
}

#[test]
fn test_var_uint_operations() {
    let mut builder = Builder::new();
    builder.store_var_uint(&BigUint::from(0x42u32), 4).unwrap();
    let cell = builder.build().unwrap();
    assert_eq!(cell.bit_len(), 4 + 8);

    let mut slice = Slice::new(cell);
    assert_eq!(slice.load_var_uint(4).unwrap(), BigUint::from(0x42u32));
}

#[test]
fn test_external_address_operations() {
    let ext_addr = ExternalAddress::from_hex("12345678abcdef00").unwrap();
    let mut builder = Builder::new();
    builder.store_external_address(&ext_addr).unwrap();
    let cell = builder.build().unwrap();
    assert_eq!(cell.bit_len(), 2 + 9 + 64);

    let loaded = Slice::new(cell).load_msg_address().unwrap();
    assert_eq!(loaded, MsgAddress::External(ext_addr));
}

#[test]
fn test_snake_string_integration() {
    let long_string = "This is a very long string that should be split across multiple cells when stored as a snake string. ".repeat(10);

    let mut builder = Builder::new();
    builder.store_snake_string(&long_string, true).unwrap();
    let cell = builder.build().unwrap();
    assert!(cell.reference_count() > 0);

    let boc = serialize_boc(&cell, true).unwrap();
    let mut slice = Slice::new(deserialize_boc(&boc).unwrap());
    assert_eq!(slice.load_u8().unwrap(), 0);
    assert_eq!(slice.load_snake_string().unwrap(), long_string);
}

#[test]
fn test_long_snake_chain() {
    let text = "0123456789abcdef".repeat(4096);
    let mut builder = Builder::new();
    builder.store_snake_string(&text, false).unwrap();
    let cell = builder.build().unwrap();
    assert!(cell.depth() > 500);
    assert_eq!(Slice::new(cell).load_snake_string().unwrap(), text);

    // deeper than any cell tree may be
    let too_long = vec![0x61u8; MAX_CELL_DEPTH as usize * 128];
    let mut builder = Builder::new();
    builder.store_u8(1).unwrap();
    assert!(matches!(
        builder.store_snake_bytes(&too_long),
        Err(CellError::CapacityExceeded(_))
    ));
    assert_eq!(builder.bit_len(), 8);
}

#[test]
fn test_hash_consistency() {
    let cell1 = create_test_cell(vec![0x11, 0x22, 0x33], 24);

    let mut builder = Builder::new();
    builder.store_byte(0x11).unwrap();
    builder.store_byte(0x22).unwrap();
    builder.store_byte(0x33).unwrap();
    let cell2 = builder.build().unwrap();

    let mut builder = Builder::new();
    builder.store_bytes(&[0x11, 0x22, 0x33]).unwrap();
    let cell3 = builder.build().unwrap();

    let mut builder = Builder::new();
    // 0x112233 split at bit 5
    builder.store_uint(0x02, 5).unwrap();
    builder.store_uint(0x12233, 19).unwrap();
    let cell4 = builder.build().unwrap();

    assert_eq!(cell1.repr_hash(), cell2.repr_hash());
    assert_eq!(cell2.repr_hash(), cell3.repr_hash());
    assert_eq!(cell3.repr_hash(), cell4.repr_hash());
}

#[test]
fn test_edge_cases() {
    let empty_cell = Cell::new();
    assert_eq!(empty_cell.bit_len(), 0);

    let max_data = vec![0xFF; MAX_CELL_BITS.div_ceil(8)];
    let max_cell = Cell::with_data(max_data, MAX_CELL_BITS).unwrap();
    assert_eq!(max_cell.bit_len(), MAX_CELL_BITS);

    let mut builder = Builder::new();
    builder.store_bit(true).unwrap();
    let mut slice = Slice::new(builder.build().unwrap());
    assert_eq!(slice.remaining_bits(), 1);
    assert!(slice.load_bit().unwrap());
    assert!(slice.is_empty());
    assert!(matches!(
        slice.load_bit(),
        Err(CellError::Underflow { requested: 1, available: 0 })
    ));
}

#[test]
fn test_capacity_limits() {
    let mut builder = Builder::new();
    builder.store_bits(&[0xFF; 128], MAX_CELL_BITS).unwrap();
    assert!(matches!(
        builder.store_bit(true),
        Err(CellError::CapacityExceeded(_))
    ));
    assert_eq!(builder.bit_len(), MAX_CELL_BITS);

    let mut builder = Builder::new();
    for i in 0..MAX_CELL_REFS {
        builder.store_ref(create_test_cell(vec![i as u8], 8)).unwrap();
    }
    assert!(matches!(
        builder.store_ref(create_test_cell(vec![0xFF], 8)),
        Err(CellError::CapacityExceeded(_))
    ));
    assert_eq!(builder.build().unwrap().reference_count(), MAX_CELL_REFS);
}

#[test]
fn test_boc_crc_options() {
    let mut builder = Builder::new();
    builder.store_u64(0xDEADBEEFCAFEBABE).unwrap();
    let cell = builder.build().unwrap();

    let boc_no_crc = serialize_boc(&cell, false).unwrap();
    let boc_with_crc = serialize_boc(&cell, true).unwrap();
    assert_eq!(boc_with_crc.len(), boc_no_crc.len() + 4);

    assert_eq!(cell.repr_hash(), deserialize_boc(&boc_no_crc).unwrap().repr_hash());
    assert_eq!(cell.repr_hash(), deserialize_boc(&boc_with_crc).unwrap().repr_hash());
}

#[test]
fn test_boc_conversions() {
    let mut builder = Builder::new();
    builder.store_u32(0xDEADBEEF).unwrap();
    let cell = builder.build().unwrap();

    let hex = boc_to_hex(&cell, false).unwrap();
    assert_eq!(cell.repr_hash(), hex_to_boc(&hex).unwrap().repr_hash());

    let b64 = boc_to_base64(&cell, false).unwrap();
    assert_eq!(cell.repr_hash(), base64_to_boc(&b64).unwrap().repr_hash());
}

#[test]
fn test_builder_chain_with_question_mark() -> anyhow::Result<()> {
    let mut child = Builder::new();
    child.store_snake_string("comment", true)?;

    let mut builder = Builder::new();
    builder
        .store_u32(0)?
        .store_coins(50_000_000)?
        .store_maybe_ref(Some(child.build()?))?;
    let boc = boc_to_base64(&builder.build()?, true)?;

    let mut slice = Slice::new(base64_to_boc(&boc)?);
    assert_eq!(slice.load_u32()?, 0);
    assert_eq!(slice.load_coins()?, 50_000_000);
    let comment = slice.load_maybe_ref()?.ok_or_else(|| anyhow::anyhow!("no comment"))?;
    let mut comment = Slice::new(comment);
    comment.skip_bits(8)?;
    assert_eq!(comment.load_snake_string()?, "comment");
    slice.ensure_empty()?;
    Ok(())
}

#[test]
fn test_random_dags_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let options = [
        BocOptions::default(),
        BocOptions {
            has_idx: true,
            has_crc32c: true,
            has_cache_bits: false,
        },
        BocOptions {
            has_idx: true,
            has_crc32c: false,
            has_cache_bits: true,
        },
    ];
    for round in 0..30 {
        let root = random_dag(&mut rng, 1 + round * 3);
        let opts = options[round % options.len()];
        let boc = serialize_boc_with(&[root.clone()], opts).unwrap();
        let decoded = deserialize_boc(&boc).unwrap();
        assert_eq!(decoded.repr_hash(), root.repr_hash(), "round {round}");
        assert_eq!(decoded.depth(), root.depth(), "round {round}");
        assert_eq!(serialize_boc_with(&[decoded], opts).unwrap(), boc);
    }
}

proptest! {
    #[test]
    fn prop_big_uint_round_trip(bits in 1usize..=256, bytes in proptest::collection::vec(any::<u8>(), 32)) {
        let mask = (BigUint::one() << bits) - BigUint::one();
        let value = BigUint::from_bytes_be(&bytes) & mask;

        let mut builder = Builder::new();
        builder.store_bit(true).unwrap();
        builder.store_big_uint(&value, bits).unwrap();
        let mut slice = Slice::new(builder.build().unwrap());

        prop_assert!(slice.load_bit().unwrap());
        prop_assert_eq!(slice.load_big_uint(bits).unwrap(), value);
        prop_assert!(slice.is_empty());
    }

    #[test]
    fn prop_int_round_trip(bits in 1usize..=64, raw in any::<i64>()) {
        let shift = 64 - bits;
        let value = (raw << shift) >> shift;

        let mut builder = Builder::new();
        builder.store_int(value, bits).unwrap();
        builder.store_big_int(&BigInt::from(value), bits).unwrap();
        let mut slice = Slice::new(builder.build().unwrap());

        prop_assert_eq!(slice.load_int(bits).unwrap(), value);
        prop_assert_eq!(slice.load_big_int(bits).unwrap(), BigInt::from(value));
    }

    #[test]
    fn prop_bit_capacity(bits in 0usize..=1100) {
        let mut builder = Builder::new();
        let result = builder.store_bits(&[0xA5; 138], bits);
        if bits <= MAX_CELL_BITS {
            prop_assert!(result.is_ok());
            prop_assert_eq!(builder.build().unwrap().bit_len(), bits);
        } else {
            prop_assert!(matches!(result, Err(CellError::CapacityExceeded(_))));
        }
    }
}
