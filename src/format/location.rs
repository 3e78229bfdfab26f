//! Block references
//!
//! Offsets into the data file are only meaningful when they land on a block
//! boundary, so they travel as `BlockRef` rather than bare integers.

use std::fmt;

use crate::error::{RecnoError, Result};

/// Location and size of a block in the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    offset: u64,
    size: u64,
}

impl BlockRef {
    /// Create a reference to a block, validating chunk alignment
    pub fn new(offset: u64, size: u64, chunk_size: u32) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RecnoError::Config("chunk size must be non-zero".to_string()));
        }
        if offset % u64::from(chunk_size) != 0 {
            return Err(RecnoError::InvalidBlockLocation { offset, chunk_size });
        }
        if size == 0 {
            return Err(RecnoError::InvalidParameter(format!(
                "block at {} has zero size",
                offset
            )));
        }
        Ok(Self { offset, size })
    }

    /// Decode a stored `next_block` pair. Offset zero marks the chain tail.
    pub(crate) fn from_disk(offset: i64, size: i64) -> Result<Option<Self>> {
        if offset < 0 || size < 0 {
            return Err(RecnoError::CorruptHeader(format!(
                "negative block link ({}, {})",
                offset, size
            )));
        }
        if offset == 0 {
            return Ok(None);
        }
        Ok(Some(Self {
            offset: offset as u64,
            size: size as u64,
        }))
    }

    /// Encode a link for storage; `None` is written as zero/zero
    pub(crate) fn to_disk(link: Option<BlockRef>) -> (i64, i64) {
        match link {
            Some(r) => (r.offset as i64, r.size as i64),
            None => (0, 0),
        }
    }

    /// Byte offset of the block's header
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total block size, header included
    pub fn size(&self) -> u64 {
        self.size
    }

    /// First byte past the block
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{}", self.offset, self.size)
    }
}
