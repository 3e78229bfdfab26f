//! Format Module
//!
//! Binary layout of the block headers shared by every component.
//!
//! ## Responsibilities
//! - Block type tags and the header size each implies
//! - Encode/decode of block, table and file headers
//! - `BlockRef`, the validated on-disk link between blocks
//!
//! ## Header Layout (little-endian)
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Block header (32 bytes, every block)                         │
//! │   Type: u16 (2) | HeaderSize: u16 (2) | BlockSize: u32 (4)   │
//! │   FirstRecno: u64 (8)                                        │
//! │   NextOffset: i64 (8) | NextSize: i64 (8)                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Table extension (+8 bytes, table heads)                      │
//! │   RecordSize: i32 (4) | LastRecno: i32 (4)                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ File extension (+8 bytes, block 0 only)                      │
//! │   Magic: "RNDB" (4) | ChunkSize: u32 (4)                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The leading two fields are enough to know how many bytes to parse:
//! `HeaderSize` is 32, 40 or 48. The file head is a table head
//! (`Type = Table`) whose `HeaderSize` is 48.

mod header;
mod location;

pub use header::{initialize_header, BlockHeader, FileHeader, Header, TableHeader};
pub use location::BlockRef;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a recnodb file
pub const MAGIC: &[u8; 4] = b"RNDB";

/// Block header: Type (2) + HeaderSize (2) + BlockSize (4) + FirstRecno (8)
/// + NextOffset (8) + NextSize (8) = 32 bytes
pub const BLOCK_HEADER_SIZE: u16 = 32;

/// Table header: block header + RecordSize (4) + LastRecno (4) = 40 bytes
pub const TABLE_HEADER_SIZE: u16 = 40;

/// File header: table header + Magic (4) + ChunkSize (4) = 48 bytes
pub const FILE_HEADER_SIZE: u16 = 48;

/// Bytes needed to learn a header's size: Type (2) + HeaderSize (2)
pub const HEADER_PREFIX_SIZE: usize = 4;

/// Offset of the `next_block` link inside any block header
pub const NEXT_BLOCK_FIELD: u64 = 16;

/// Offset and length of the file-specific region of the file header
pub const FILE_INFO_OFFSET: u64 = TABLE_HEADER_SIZE as u64;
pub const FILE_INFO_SIZE: u64 = (FILE_HEADER_SIZE - TABLE_HEADER_SIZE) as u64;

// =============================================================================
// Block Types
// =============================================================================

/// Kind of block, stored in the first two bytes of every header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BlockType {
    /// Unspecified block type
    Generic = 1,
    /// Block with free-form data (continuation of a table chain)
    Data = 2,
    /// Head of a chain of fixed-length records
    Table = 3,
    /// First block in the file
    File = 4,
}

impl BlockType {
    /// Parse a stored type tag
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(BlockType::Generic),
            2 => Some(BlockType::Data),
            3 => Some(BlockType::Table),
            4 => Some(BlockType::File),
            _ => None,
        }
    }

    /// Header size implied by this block type
    pub fn header_size(self) -> u16 {
        header_size_for(self)
    }

    /// Whether headers of this type carry the table extension
    pub fn is_table_head(self) -> bool {
        matches!(self, BlockType::Table | BlockType::File)
    }
}

/// Number of bytes from block start to payload for the given type
pub fn header_size_for(block_type: BlockType) -> u16 {
    match block_type {
        BlockType::Generic | BlockType::Data => BLOCK_HEADER_SIZE,
        BlockType::Table => TABLE_HEADER_SIZE,
        BlockType::File => FILE_HEADER_SIZE,
    }
}
