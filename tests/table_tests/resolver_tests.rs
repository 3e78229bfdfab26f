//! Tests for the record offset resolver
//!
//! These tests verify:
//! - Record numbers map to packed slots after the block header
//! - Chains grow by exactly one right-sized block when needed
//! - Sequential reservation under the table head lock
//! - Additional tables in the same file

use std::ops::ControlFlow;
use std::path::PathBuf;

use recnodb::table::{full_record_size, record_capacity};
use recnodb::{Config, Handle, Header, LockOutcome, RecnoError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_db() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.rndb");
    (temp_dir, db_path)
}

/// Default layout: 4096-byte chunks, 50-byte records (51-byte slots)
fn create_default() -> (TempDir, Handle) {
    let (temp, path) = setup_temp_db();
    let handle = Handle::create(&path, &Config::default()).unwrap();
    (temp, handle)
}

fn chain_offsets(handle: &mut Handle, start: u64) -> Vec<u64> {
    let mut seen = Vec::new();
    handle
        .walk(start, |_, offset| {
            seen.push(offset);
            ControlFlow::Continue(())
        })
        .unwrap();
    seen
}

// =============================================================================
// Slot Arithmetic Tests
// =============================================================================

#[test]
fn test_slot_sizes() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();

    assert_eq!(full_record_size(&table).unwrap(), 51);
    // (4096 - 48) / 51
    assert_eq!(record_capacity(&table, &table.block).unwrap(), 79);
}

#[test]
fn test_first_record_follows_file_header() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();

    assert_eq!(handle.offset_for_record(0, &table, 1).unwrap(), 48);
    assert_eq!(handle.offset_for_record(0, &table, 2).unwrap(), 99);
    assert_eq!(handle.offset_for_record(0, &table, 79).unwrap(), 48 + 78 * 51);
    assert_eq!(handle.file_len().unwrap(), 4096);
}

#[test]
fn test_record_zero_is_invalid() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();

    assert!(matches!(
        handle.offset_for_record(0, &table, 0),
        Err(RecnoError::InvalidParameter(_))
    ));
}

#[test]
fn test_variable_length_table_is_unsupported() {
    let (_temp, mut handle) = create_default();
    let mut table = handle.table_header(0).unwrap();
    table.record_size = 0;

    assert!(matches!(
        handle.offset_for_record(0, &table, 1),
        Err(RecnoError::VariableLengthUnsupported)
    ));
    assert!(matches!(
        handle.create_table(0),
        Err(RecnoError::VariableLengthUnsupported)
    ));
}

// =============================================================================
// Growth Tests
// =============================================================================

#[test]
fn test_overflowing_head_appends_one_chunk() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();

    let offset = handle.offset_for_record(0, &table, 80).unwrap();
    assert_eq!(offset, 4096 + 32);
    assert_eq!(handle.file_len().unwrap(), 8192);

    let data = handle.read_block(4096).unwrap();
    assert!(matches!(data, Header::Block(_)));
    assert_eq!(data.block().first_recno, 80);
    assert_eq!(data.block().block_size, 4096);
    assert_eq!(chain_offsets(&mut handle, 0), vec![0, 4096]);

    // Resolving again reuses the block
    assert_eq!(handle.offset_for_record(0, &table, 80).unwrap(), 4096 + 32);
    assert_eq!(handle.file_len().unwrap(), 8192);
}

#[test]
fn test_growth_is_sized_to_target() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();

    // Records 80..=200 need 32 + 121 * 51 = 6203 bytes: two chunks
    let offset = handle.offset_for_record(0, &table, 200).unwrap();
    assert_eq!(offset, 4096 + 32 + 120 * 51);
    assert_eq!(handle.file_len().unwrap(), 4096 + 8192);

    let data = handle.read_block(4096).unwrap();
    assert_eq!(data.block().block_size, 8192);
    assert_eq!(data.block().first_recno, 80);
}

#[test]
fn test_growth_continues_from_chain_tail() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();

    handle.offset_for_record(0, &table, 80).unwrap();
    // Second data block holds 80 + 79 = 159 onwards
    let offset = handle.offset_for_record(0, &table, 159).unwrap();
    assert_eq!(offset, 8192 + 32);

    assert_eq!(chain_offsets(&mut handle, 0), vec![0, 4096, 8192]);
    assert_eq!(handle.read_block(8192).unwrap().block().first_recno, 159);
}

#[test]
fn test_mismatched_first_recno_is_corrupt() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();
    handle.offset_for_record(0, &table, 80).unwrap();

    let mut data = handle.read_block(4096).unwrap();
    data.block_mut().first_recno = 5;
    handle.write_header(4096, &data.to_bytes()).unwrap();

    assert!(matches!(
        handle.offset_for_record(0, &table, 80),
        Err(RecnoError::CorruptChain(_))
    ));
}

// =============================================================================
// Reservation Tests
// =============================================================================

#[test]
fn test_reserve_first_record() {
    let (_temp, mut handle) = create_default();

    let slot = handle.reserve_record(0).unwrap();
    assert_eq!(slot.recno, 1);
    assert_eq!(slot.offset, 48);
    assert_eq!(handle.table_header(0).unwrap().last_recno, 1);
}

#[test]
fn test_sequential_reserves_are_increasing() {
    let (_temp, mut handle) = create_default();

    let slots: Vec<_> = (0..4).map(|_| handle.reserve_record(0).unwrap()).collect();
    let recnos: Vec<u32> = slots.iter().map(|s| s.recno).collect();
    let offsets: Vec<u64> = slots.iter().map(|s| s.offset).collect();

    assert_eq!(recnos, vec![1, 2, 3, 4]);
    assert_eq!(offsets, vec![48, 99, 150, 201]);
}

#[test]
fn test_reserve_across_block_boundary() {
    let (_temp, mut handle) = create_default();

    let mut last = None;
    for _ in 0..80 {
        last = Some(handle.reserve_record(0).unwrap());
    }
    let last = last.unwrap();

    assert_eq!(last.recno, 80);
    assert_eq!(last.offset, 4096 + 32);

    // The head link written by growth survives the header write-back
    let head = handle.table_header(0).unwrap();
    assert_eq!(head.last_recno, 80);
    assert_eq!(head.block.next_block.map(|b| b.offset()), Some(4096));
    assert_eq!(handle.file_len().unwrap(), 8192);
}

#[test]
fn test_reserve_without_commit_leaves_table_unchanged() {
    let (_temp, mut handle) = create_default();

    for _ in 0..2 {
        let slot = handle
            .reserve_next_record(0, |_, _, slot| Ok(LockOutcome::Keep(slot)))
            .unwrap();
        assert_eq!(slot.recno, 1);
    }
    assert_eq!(handle.table_header(0).unwrap().last_recno, 0);
}

#[test]
fn test_reserve_body_can_write_record() {
    let (_temp, mut handle) = create_default();

    let slot = handle
        .reserve_next_record(0, |h, table, slot| {
            let mut record = vec![1u8];
            record.extend_from_slice(&[0x5Au8; 50]);
            h.write_header(slot.offset, &record)?;
            table.last_recno = slot.recno;
            Ok(LockOutcome::Commit(slot))
        })
        .unwrap();

    let bytes = handle.read_header(slot.offset, 51).unwrap();
    assert_eq!(bytes[0], 1);
    assert!(bytes[1..].iter().all(|b| *b == 0x5A));
}

#[test]
fn test_reserve_at_recno_limit_overflows() {
    let (_temp, mut handle) = create_default();

    let mut table = handle.table_header(0).unwrap();
    table.last_recno = i32::MAX as u32;
    handle.write_header(0, &table.to_bytes()).unwrap();

    assert!(matches!(
        handle.reserve_record(0),
        Err(RecnoError::RecnoOverflow(_))
    ));
}

#[test]
fn test_reserve_on_non_table_block_fails() {
    let (_temp, mut handle) = create_default();
    let table = handle.table_header(0).unwrap();
    handle.offset_for_record(0, &table, 80).unwrap();

    assert!(matches!(
        handle.reserve_record(4096),
        Err(RecnoError::CorruptHeader(_))
    ));
}

// =============================================================================
// Table Creation Tests
// =============================================================================

#[test]
fn test_create_table_appends_unlinked_head() {
    let (_temp, mut handle) = create_default();

    let block = handle.create_table(20).unwrap();
    assert_eq!(block.offset(), 4096);
    assert_eq!(block.size(), 4096);

    let table = handle.table_header(block.offset()).unwrap();
    assert_eq!(table.record_size, 20);
    assert_eq!(table.last_recno, 0);
    assert_eq!(table.block.first_recno, 1);
    assert!(table.block.is_tail());
    // Nothing links to the new table
    assert_eq!(chain_offsets(&mut handle, 0), vec![0]);
}

#[test]
fn test_create_table_rounds_up_to_chunks() {
    let (_temp, mut handle) = create_default();

    // 40 + 5001 bytes needs two chunks
    let block = handle.create_table(5000).unwrap();
    assert_eq!(block.size(), 8192);
    assert_eq!(handle.file_len().unwrap(), 4096 + 8192);
}

#[test]
fn test_new_table_records_follow_table_header() {
    let (_temp, mut handle) = create_default();
    let block = handle.create_table(20).unwrap();

    let first = handle.reserve_record(block.offset()).unwrap();
    let second = handle.reserve_record(block.offset()).unwrap();
    assert_eq!(first.recno, 1);
    assert_eq!(first.offset, 4096 + 40);
    assert_eq!(second.offset, 4096 + 40 + 21);
}

#[test]
fn test_tables_grow_independently() {
    let (_temp, mut handle) = create_default();
    let other = handle.create_table(50).unwrap();

    for _ in 0..80 {
        handle.reserve_record(0).unwrap();
    }
    // (4096 - 40) / 51 = 79 slots in the new table's head
    let mut last = None;
    for _ in 0..80 {
        last = Some(handle.reserve_record(other.offset()).unwrap());
    }

    assert_eq!(last.unwrap().offset, 12288 + 32);
    assert_eq!(chain_offsets(&mut handle, 0), vec![0, 8192]);
    assert_eq!(chain_offsets(&mut handle, other.offset()), vec![4096, 12288]);
    assert_eq!(handle.file_len().unwrap(), 16384);
}
