//! Header codec
//!
//! Block, table and file headers share a fixed-offset prefix: a table header
//! starts with a block header, a file header starts with a table header.

use bytes::{Buf, BufMut};

use crate::error::{RecnoError, Result};

use super::{
    header_size_for, BlockRef, BlockType, BLOCK_HEADER_SIZE, FILE_HEADER_SIZE,
    HEADER_PREFIX_SIZE, MAGIC, TABLE_HEADER_SIZE,
};

// =============================================================================
// Block Header
// =============================================================================

/// Header present at the start of every block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_type: BlockType,
    /// Bytes from block start to payload
    pub header_size: u16,
    /// Total block size, header included
    pub block_size: u32,
    /// Lowest record number stored in this block (0 outside table chains)
    pub first_recno: u64,
    /// Following block, `None` at the chain tail
    pub next_block: Option<BlockRef>,
}

impl BlockHeader {
    pub fn new(block_type: BlockType, block_size: u32) -> Self {
        Self {
            block_type,
            header_size: header_size_for(block_type),
            block_size,
            first_recno: 0,
            next_block: None,
        }
    }

    /// Bytes available after the header
    pub fn payload_size(&self) -> u32 {
        self.block_size.saturating_sub(u32::from(self.header_size))
    }

    pub fn is_tail(&self) -> bool {
        self.next_block.is_none()
    }

    /// Encode the 32-byte block prefix
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_HEADER_SIZE as usize);
        self.put(&mut out);
        out
    }

    /// Decode the block prefix from at least 32 bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, BLOCK_HEADER_SIZE)?;
        let mut src = bytes;

        let raw_type = src.get_u16_le();
        let block_type = BlockType::from_u16(raw_type)
            .ok_or_else(|| RecnoError::CorruptHeader(format!("unknown block type {}", raw_type)))?;
        let header_size = src.get_u16_le();
        let block_size = src.get_u32_le();
        let first_recno = src.get_u64_le();
        let next_offset = src.get_i64_le();
        let next_size = src.get_i64_le();

        Ok(Self {
            block_type,
            header_size,
            block_size,
            first_recno,
            next_block: BlockRef::from_disk(next_offset, next_size)?,
        })
    }

    fn put<B: BufMut>(&self, out: &mut B) {
        let (next_offset, next_size) = BlockRef::to_disk(self.next_block);
        out.put_u16_le(self.block_type as u16);
        out.put_u16_le(self.header_size);
        out.put_u32_le(self.block_size);
        out.put_u64_le(self.first_recno);
        out.put_i64_le(next_offset);
        out.put_i64_le(next_size);
    }
}

// =============================================================================
// Table Header
// =============================================================================

/// Header of the first block of a table chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub block: BlockHeader,
    /// Fixed record size, excluding the presence prefix
    pub record_size: u32,
    /// Record number of the last reserved record (0 when empty)
    pub last_recno: u32,
}

impl TableHeader {
    /// Encode the 40-byte table prefix
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TABLE_HEADER_SIZE as usize);
        self.put(&mut out);
        out
    }

    /// Decode the table prefix from at least 40 bytes.
    ///
    /// Works for both plain table heads and the file head, whose first 40
    /// bytes are a table header.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, TABLE_HEADER_SIZE)?;
        let block = BlockHeader::decode(bytes)?;
        if !block.block_type.is_table_head() {
            return Err(RecnoError::CorruptHeader(format!(
                "{:?} block does not carry a table header",
                block.block_type
            )));
        }

        let mut src = &bytes[BLOCK_HEADER_SIZE as usize..];
        let record_size = non_negative(src.get_i32_le(), "record_size")?;
        let last_recno = non_negative(src.get_i32_le(), "last_recno")?;

        Ok(Self {
            block,
            record_size,
            last_recno,
        })
    }

    fn put<B: BufMut>(&self, out: &mut B) {
        self.block.put(out);
        // Values above i32::MAX are rejected before they reach a header.
        out.put_u32_le(self.record_size);
        out.put_u32_le(self.last_recno);
    }
}

// =============================================================================
// File Header
// =============================================================================

/// Header of block 0: a table header plus the file-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub table: TableHeader,
    /// Allocation granularity for every block in the file
    pub chunk_size: u32,
}

impl FileHeader {
    /// Header written when a file is created: a table head of one chunk.
    pub fn new(chunk_size: u32, record_size: u32) -> Self {
        let mut block = BlockHeader::new(BlockType::Table, chunk_size);
        block.header_size = FILE_HEADER_SIZE;
        block.first_recno = 1;
        Self {
            table: TableHeader {
                block,
                record_size,
                last_recno: 0,
            },
            chunk_size,
        }
    }

    pub fn block(&self) -> &BlockHeader {
        &self.table.block
    }

    /// Encode all 48 bytes, magic included
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_HEADER_SIZE as usize);
        self.table.put(&mut out);
        out.put_slice(MAGIC);
        out.put_u32_le(self.chunk_size);
        out
    }

    /// Decode from at least 48 bytes, checking the magic
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, FILE_HEADER_SIZE)?;
        let table = TableHeader::decode(bytes)?;

        let mut src = &bytes[TABLE_HEADER_SIZE as usize..];
        let mut magic = [0u8; 4];
        src.copy_to_slice(&mut magic);
        if &magic != MAGIC {
            return Err(RecnoError::CorruptHeader(format!(
                "bad magic: expected RNDB, got {:?}",
                magic
            )));
        }
        let chunk_size = src.get_u32_le();

        Ok(Self { table, chunk_size })
    }
}

// =============================================================================
// Any Header
// =============================================================================

/// A decoded header of any layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Block(BlockHeader),
    Table(TableHeader),
    File(FileHeader),
}

impl Header {
    /// Build a freshly initialized header for a new block.
    ///
    /// `record_size` applies to table heads, `chunk_size` to file heads;
    /// both are ignored otherwise. Table heads start at record 1.
    pub fn new(block_type: BlockType, block_size: u32, record_size: u32, chunk_size: u32) -> Self {
        let mut block = BlockHeader::new(block_type, block_size);
        if !block_type.is_table_head() {
            return Header::Block(block);
        }

        block.first_recno = 1;
        let table = TableHeader {
            block,
            record_size,
            last_recno: 0,
        };
        match block_type {
            BlockType::File => Header::File(FileHeader { table, chunk_size }),
            _ => Header::Table(table),
        }
    }

    /// Read `header_size` from the leading two fields
    pub fn peek_size(prefix: &[u8]) -> Result<u16> {
        if prefix.len() < HEADER_PREFIX_SIZE {
            return Err(RecnoError::CorruptHeader(format!(
                "header prefix needs {} bytes, got {}",
                HEADER_PREFIX_SIZE,
                prefix.len()
            )));
        }
        let mut src = prefix;
        let raw_type = src.get_u16_le();
        let header_size = src.get_u16_le();

        let block_type = BlockType::from_u16(raw_type)
            .ok_or_else(|| RecnoError::CorruptHeader(format!("unknown block type {}", raw_type)))?;
        let consistent = match block_type {
            BlockType::Generic | BlockType::Data => header_size == BLOCK_HEADER_SIZE,
            BlockType::Table => {
                header_size == TABLE_HEADER_SIZE || header_size == FILE_HEADER_SIZE
            }
            BlockType::File => header_size == FILE_HEADER_SIZE,
        };
        if !consistent {
            return Err(RecnoError::CorruptHeader(format!(
                "{:?} block cannot have a {}-byte header",
                block_type, header_size
            )));
        }
        Ok(header_size)
    }

    /// Decode whichever layout the prefix announces
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match Self::peek_size(bytes)? {
            BLOCK_HEADER_SIZE => Ok(Header::Block(BlockHeader::decode(bytes)?)),
            TABLE_HEADER_SIZE => Ok(Header::Table(TableHeader::decode(bytes)?)),
            _ => Ok(Header::File(FileHeader::decode(bytes)?)),
        }
    }

    /// Encode exactly `header_size` bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Header::Block(b) => b.to_bytes(),
            Header::Table(t) => t.to_bytes(),
            Header::File(f) => f.to_bytes(),
        }
    }

    pub fn block(&self) -> &BlockHeader {
        match self {
            Header::Block(b) => b,
            Header::Table(t) => &t.block,
            Header::File(f) => &f.table.block,
        }
    }

    pub fn block_mut(&mut self) -> &mut BlockHeader {
        match self {
            Header::Block(b) => b,
            Header::Table(t) => &mut t.block,
            Header::File(f) => &mut f.table.block,
        }
    }

    /// Table part of a table or file head
    pub fn table(&self) -> Option<&TableHeader> {
        match self {
            Header::Block(_) => None,
            Header::Table(t) => Some(t),
            Header::File(f) => Some(&f.table),
        }
    }

    pub fn into_table(self) -> Option<TableHeader> {
        match self {
            Header::Block(_) => None,
            Header::Table(t) => Some(t),
            Header::File(f) => Some(f.table),
        }
    }

    pub fn header_size(&self) -> u16 {
        self.block().header_size
    }

    pub fn next_block(&self) -> Option<BlockRef> {
        self.block().next_block
    }
}

/// Zero-fill `buffer` up to the header size of `block_type` and write a
/// fresh header into it.
///
/// # Panics
/// Panics if `buffer` is shorter than `header_size_for(block_type)`; size
/// the buffer with that function first.
pub fn initialize_header(
    buffer: &mut [u8],
    block_type: BlockType,
    block_size: u32,
    record_size: u32,
    chunk_size: u32,
) {
    let header_size = header_size_for(block_type) as usize;
    assert!(
        buffer.len() >= header_size,
        "header buffer of {} bytes cannot hold a {:?} header ({} bytes)",
        buffer.len(),
        block_type,
        header_size
    );

    let bytes = Header::new(block_type, block_size, record_size, chunk_size).to_bytes();
    let region = &mut buffer[..header_size];
    region.fill(0);
    region.copy_from_slice(&bytes);
}

// =============================================================================
// Private Helpers
// =============================================================================

fn ensure_len(bytes: &[u8], needed: u16) -> Result<()> {
    if bytes.len() < needed as usize {
        return Err(RecnoError::CorruptHeader(format!(
            "header needs {} bytes, got {}",
            needed,
            bytes.len()
        )));
    }
    Ok(())
}

fn non_negative(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RecnoError::CorruptHeader(format!("negative {}: {}", field, value)))
}
