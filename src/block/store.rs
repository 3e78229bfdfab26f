//! Block store
//!
//! File extension, block append and chain extension on an open handle.

use std::io::Write;

use tracing::{debug, warn};

use crate::error::{RecnoError, Result};
use crate::format::{BlockRef, Header, HEADER_PREFIX_SIZE};
use crate::handle::Handle;

use super::BlockDef;

impl Handle {
    /// Whether `offset` falls on a chunk boundary
    pub fn is_chunk_aligned(&self, offset: u64) -> bool {
        offset % u64::from(self.chunk_size()) == 0
    }

    pub fn ensure_chunk_aligned(&self, offset: u64) -> Result<()> {
        if self.is_chunk_aligned(offset) {
            Ok(())
        } else {
            Err(RecnoError::InvalidBlockLocation {
                offset,
                chunk_size: self.chunk_size(),
            })
        }
    }

    /// Grow the file by `bytes_to_add` bytes and return the old end of file
    ///
    /// The old end of file must be chunk-aligned. Growth is sparse: only the
    /// final byte is written, so the new bytes are unspecified. The stream
    /// is left at the returned offset.
    ///
    /// No locking happens here; the caller serializes file growth.
    pub fn extend_file(&mut self, bytes_to_add: u64) -> Result<u64> {
        if bytes_to_add == 0 {
            return Err(RecnoError::InvalidParameter(
                "cannot extend the file by zero bytes".to_string(),
            ));
        }

        let new_block_location = self.seek_end()?;
        self.ensure_chunk_aligned(new_block_location)?;

        let last_byte = new_block_location
            .checked_add(bytes_to_add - 1)
            .ok_or_else(|| {
                RecnoError::InvalidParameter(format!(
                    "extending {} bytes past offset {} overflows",
                    bytes_to_add, new_block_location
                ))
            })?;
        self.seek_to(last_byte)?;
        let written = match self.file.write(&[0u8]) {
            Ok(n) => n,
            Err(e) => return Err(self.system(e)),
        };
        if written != 1 {
            return Err(RecnoError::IncompleteWrite {
                offset: last_byte,
                expected: 1,
                actual: written,
            });
        }

        self.seek_to(new_block_location)?;
        Ok(new_block_location)
    }

    /// Append a block at the end of the file and write its header
    ///
    /// The stream position is the same after the call as before it, on
    /// success and failure alike. The new block is not linked into any
    /// chain.
    pub fn append_block(&mut self, def: &BlockDef) -> Result<BlockRef> {
        self.validate_block_def(def)?;

        let saved = self.stream_position()?;
        let result = self.append_at_end(def);
        let restored = self.seek_to(saved);
        result.and_then(|block| restored.map(|_| block))
    }

    /// Append a block and link it after `chain_tail`
    ///
    /// Fails with `AttemptToOrphanBlock`, before anything is written, if the
    /// tail already links to another block. Assumes the caller holds the
    /// lock that serializes growth of this chain.
    pub fn extend_chain(&mut self, chain_tail: u64, def: &BlockDef) -> Result<BlockRef> {
        let tail = self.read_block(chain_tail)?;
        if let Some(existing) = tail.next_block() {
            warn!(parent = chain_tail, existing = %existing, "refusing to extend chain from a linked block");
            return Err(RecnoError::AttemptToOrphanBlock {
                parent: chain_tail,
                existing: existing.offset(),
            });
        }

        let block = self.append_block(def)?;
        self.add_link(chain_tail, block)?;
        debug!(parent = chain_tail, block = %block, "chain extended");
        Ok(block)
    }

    /// Read exactly `max_len` bytes of header at `offset`
    pub fn read_header(&mut self, offset: u64, max_len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; max_len];
        self.read_exact_at(offset, &mut bytes)?;
        Ok(bytes)
    }

    /// Write an encoded header (or header prefix) at `offset`
    pub fn write_header(&mut self, offset: u64, header: &[u8]) -> Result<()> {
        self.write_all_at(offset, header)
    }

    /// Read and decode the header at `offset`
    ///
    /// Reads the type and size fields first, then exactly as many bytes as
    /// that header declares.
    pub fn read_block(&mut self, offset: u64) -> Result<Header> {
        let mut prefix = [0u8; HEADER_PREFIX_SIZE];
        let read = self.read_up_to(offset, &mut prefix)?;
        if read < prefix.len() {
            return Err(RecnoError::IncompleteRead {
                offset,
                expected: prefix.len(),
                actual: read,
            });
        }

        let header_size = usize::from(Header::peek_size(&prefix)?);
        let mut bytes = vec![0u8; header_size];
        let read = self.read_up_to(offset, &mut bytes)?;
        if read < header_size {
            return Err(RecnoError::IncompleteRead {
                offset,
                expected: header_size,
                actual: read,
            });
        }

        Header::decode(&bytes)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn append_at_end(&mut self, def: &BlockDef) -> Result<BlockRef> {
        let offset = self.extend_file(u64::from(def.block_size))?;

        let mut header = Header::new(
            def.block_type,
            def.block_size,
            def.record_size,
            self.chunk_size(),
        );
        if def.first_recno != 0 {
            header.block_mut().first_recno = def.first_recno;
        }
        self.write_header(offset, &header.to_bytes())?;

        let block = BlockRef::new(offset, u64::from(def.block_size), self.chunk_size())?;
        debug!(block = %block, block_type = ?def.block_type, "block appended");
        Ok(block)
    }

    fn validate_block_def(&self, def: &BlockDef) -> Result<()> {
        let chunk_size = self.chunk_size();
        if def.block_size == 0 || def.block_size % chunk_size != 0 {
            return Err(RecnoError::InvalidParameter(format!(
                "block size {} is not a non-zero multiple of chunk size {}",
                def.block_size, chunk_size
            )));
        }
        if def.block_size < u32::from(def.block_type.header_size()) {
            return Err(RecnoError::InvalidParameter(format!(
                "block size {} cannot hold a {:?} header",
                def.block_size, def.block_type
            )));
        }
        if def.record_size > i32::MAX as u32 {
            return Err(RecnoError::InvalidParameter(format!(
                "record size {} exceeds {}",
                def.record_size,
                i32::MAX
            )));
        }
        Ok(())
    }
}
