//! Block Module
//!
//! Allocation and header I/O for the blocks that make up the data file.
//!
//! ## Responsibilities
//! - Grow the file in chunk-aligned steps
//! - Append blocks with freshly initialized headers
//! - Attach a new block to the tail of a chain without orphaning anything
//! - Bounded header reads and writes
//!
//! ## File Layout
//! ```text
//! offset 0          chunk_size         2*chunk_size
//! ┌─────────────────┬──────────────────┬────────────────────────┐
//! │ File head       │ Data block       │ Table head ...         │
//! │ (table, 48 B    │ (32 B header)    │ (40 B header)          │
//! │  header)        │                  │                        │
//! └────────┬────────┴──────────────────┴────────────────────────┘
//!          └── next_block ──▶ Data block
//! ```
//!
//! Nothing here takes locks: callers serialize appends and link updates
//! through the lock module.

mod store;

use crate::format::BlockType;

/// Parameters for a block to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDef {
    pub block_type: BlockType,
    /// Total size of the new block; a non-zero multiple of the chunk size
    pub block_size: u32,
    /// Fixed record size, used by table heads only
    pub record_size: u32,
    /// Lowest record number the block will hold; 0 leaves the type default
    pub first_recno: u64,
}

impl BlockDef {
    pub fn new(block_type: BlockType, block_size: u32) -> Self {
        Self {
            block_type,
            block_size,
            record_size: 0,
            first_recno: 0,
        }
    }

    /// A continuation block of a table chain
    pub fn data(block_size: u32, first_recno: u64) -> Self {
        Self {
            first_recno,
            ..Self::new(BlockType::Data, block_size)
        }
    }

    /// The head of a new table chain
    pub fn table(block_size: u32, record_size: u32) -> Self {
        Self {
            record_size,
            ..Self::new(BlockType::Table, block_size)
        }
    }
}
