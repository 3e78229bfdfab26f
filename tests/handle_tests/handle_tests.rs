//! Tests for Handle
//!
//! These tests verify:
//! - Creating a file writes a valid file header
//! - Opening validates the file header
//! - Scoped open closes on success and failure
//! - File header refresh

use std::fs;
use std::path::PathBuf;

use recnodb::{Config, FileHeader, Handle, OpenMode, RecnoError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_db() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.rndb");
    (temp_dir, db_path)
}

fn small_config() -> Config {
    Config::builder().chunk_size(512).record_size(16).build()
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_writes_file_header() {
    let (_temp, path) = setup_temp_db();
    let handle = Handle::create(&path, &Config::default()).unwrap();

    assert_eq!(handle.chunk_size(), 4096);
    assert_eq!(handle.record_size(), 50);
    assert_eq!(handle.file_header().table.last_recno, 0);
    assert!(handle.last_os_error().is_none());
    handle.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 4096);
    assert_eq!(&bytes[40..44], b"RNDB");
    assert!(bytes[48..].iter().all(|b| *b == 0));
}

#[test]
fn test_create_rejects_variable_length_records() {
    let (_temp, path) = setup_temp_db();
    let config = Config::builder().record_size(0).build();

    assert!(matches!(
        Handle::create(&path, &config),
        Err(RecnoError::VariableLengthUnsupported)
    ));
}

#[test]
fn test_create_rejects_chunk_too_small_for_one_record() {
    let (_temp, path) = setup_temp_db();
    // 48-byte header + 1 + 50 does not fit in 64 bytes
    let config = Config::builder().chunk_size(64).record_size(50).build();

    assert!(matches!(
        Handle::create(&path, &config),
        Err(RecnoError::Config(_))
    ));
}

#[test]
fn test_create_truncates_existing_file() {
    let (_temp, path) = setup_temp_db();
    fs::write(&path, vec![0xAAu8; 20_000]).unwrap();

    let mut handle = Handle::create(&path, &small_config()).unwrap();
    assert_eq!(handle.file_len().unwrap(), 512);
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_reads_stored_layout() {
    let (_temp, path) = setup_temp_db();
    Handle::create(&path, &small_config()).unwrap().close().unwrap();

    // The stored chunk size wins over the config passed to open
    let handle = Handle::open(&path, &Config::default()).unwrap();
    assert_eq!(handle.chunk_size(), 512);
    assert_eq!(handle.record_size(), 16);
    assert_eq!(handle.path(), path.as_path());
}

#[test]
fn test_open_missing_file_is_system_error() {
    let (_temp, path) = setup_temp_db();

    let err = Handle::open(&path, &Config::default()).err().unwrap();
    assert!(matches!(err, RecnoError::System(_)));
    assert!(err.os_error().is_some());
}

#[test]
fn test_open_short_file_is_invalid() {
    let (_temp, path) = setup_temp_db();
    fs::write(&path, b"RNDB").unwrap();

    assert!(matches!(
        Handle::open(&path, &Config::default()),
        Err(RecnoError::InvalidHeadFile(_))
    ));
}

#[test]
fn test_open_without_magic_is_invalid() {
    let (_temp, path) = setup_temp_db();
    fs::write(&path, vec![0u8; 4096]).unwrap();

    assert!(matches!(
        Handle::open(&path, &Config::default()),
        Err(RecnoError::InvalidHeadFile(_))
    ));
}

#[test]
fn test_open_zero_chunk_size_is_invalid() {
    let (_temp, path) = setup_temp_db();
    let mut bytes = FileHeader::new(0, 50).to_bytes();
    bytes.resize(4096, 0);
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        Handle::open(&path, &Config::default()),
        Err(RecnoError::InvalidHeadFile(_))
    ));
}

#[test]
fn test_open_misaligned_head_block_is_invalid() {
    let (_temp, path) = setup_temp_db();
    let mut fhead = FileHeader::new(4096, 50);
    fhead.table.block.block_size = 5000;
    let mut bytes = fhead.to_bytes();
    bytes.resize(8192, 0);
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        Handle::open(&path, &Config::default()),
        Err(RecnoError::InvalidHeadFile(_))
    ));
}

// =============================================================================
// Scoped Open Tests
// =============================================================================

#[test]
fn test_with_open_returns_user_value() {
    let (_temp, path) = setup_temp_db();

    let chunk = Handle::with_open(&path, OpenMode::Create, &small_config(), |handle| {
        Ok(handle.chunk_size())
    })
    .unwrap();
    assert_eq!(chunk, 512);

    let len = Handle::with_open(&path, OpenMode::Open, &Config::default(), |handle| {
        handle.file_len()
    })
    .unwrap();
    assert_eq!(len, 512);
}

#[test]
fn test_with_open_propagates_user_error() {
    let (_temp, path) = setup_temp_db();

    let result: recnodb::Result<()> =
        Handle::with_open(&path, OpenMode::Create, &Config::default(), |_| {
            Err(RecnoError::InvalidParameter("user failure".to_string()))
        });
    assert!(matches!(result, Err(RecnoError::InvalidParameter(_))));

    // The file was still created and closed cleanly
    assert!(Handle::open(&path, &Config::default()).is_ok());
}

#[test]
fn test_with_open_reports_open_failure() {
    let (_temp, path) = setup_temp_db();
    let mut called = false;

    let result = Handle::with_open(&path, OpenMode::Open, &Config::default(), |_| {
        called = true;
        Ok(())
    });
    assert!(matches!(result, Err(RecnoError::System(_))));
    assert!(!called);
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[test]
fn test_refresh_file_header_sees_new_records() {
    let (_temp, path) = setup_temp_db();
    let mut handle = Handle::create(&path, &Config::default()).unwrap();

    handle.reserve_record(0).unwrap();
    handle.reserve_record(0).unwrap();
    assert_eq!(handle.file_header().table.last_recno, 0);

    let fhead = handle.refresh_file_header().unwrap();
    assert_eq!(fhead.table.last_recno, 2);
    assert_eq!(handle.file_header().table.last_recno, 2);
}

#[test]
fn test_refresh_after_growth_sees_head_link() {
    let (_temp, path) = setup_temp_db();
    let mut handle = Handle::create(&path, &Config::default()).unwrap();

    let table = handle.table_header(0).unwrap();
    handle.offset_for_record(0, &table, 80).unwrap();

    let fhead = handle.refresh_file_header().unwrap();
    assert_eq!(fhead.block().next_block.map(|b| b.offset()), Some(4096));
}
