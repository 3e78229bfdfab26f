//! Chain walker
//!
//! Follows `next_block` links from a starting block.

use std::ops::ControlFlow;

use tracing::warn;

use crate::error::{RecnoError, Result};
use crate::format::{BlockHeader, BlockRef, Header, BLOCK_HEADER_SIZE};
use crate::handle::Handle;

/// How a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The visitor asked to stop at the block at this offset
    Stopped(u64),
    /// The block at this offset is the chain tail
    Tail(u64),
}

impl WalkEnd {
    /// Offset of the last block visited
    pub fn offset(&self) -> u64 {
        match self {
            WalkEnd::Stopped(offset) | WalkEnd::Tail(offset) => *offset,
        }
    }
}

impl Handle {
    /// Visit the chain starting at `start`
    ///
    /// `visitor` sees each header with its offset and returns
    /// `ControlFlow::Break(())` to stop early. Every step reads the header
    /// from disk, so a walk always sees the current links.
    pub fn walk<F>(&mut self, start: u64, mut visitor: F) -> Result<WalkEnd>
    where
        F: FnMut(&Header, u64) -> ControlFlow<()>,
    {
        let mut file_len = self.file_len()?;
        let mut offset = start;
        let mut steps: u64 = 0;

        loop {
            let header = self.read_block(offset)?;
            if visitor(&header, offset).is_break() {
                return Ok(WalkEnd::Stopped(offset));
            }

            let next = match header.next_block() {
                Some(next) => next,
                None => return Ok(WalkEnd::Tail(offset)),
            };

            // The file may have grown since the walk began.
            if next.end() > file_len {
                file_len = self.file_len()?;
            }
            self.check_link(offset, next, file_len)?;

            // Each block spans at least one chunk, so a longer walk must loop.
            steps += 1;
            if steps > file_len / u64::from(self.chunk_size()) {
                warn!(start, offset, steps, "chain walk exceeded block count");
                return Err(RecnoError::CorruptChain(format!(
                    "chain from {} has more links than the file has chunks",
                    start
                )));
            }
            offset = next.offset();
        }
    }

    /// Find the tail of the chain starting at `start`
    pub fn last_link(&mut self, start: u64) -> Result<(Header, u64)> {
        let mut last = None;
        self.walk(start, |header, offset| {
            if header.block().is_tail() {
                last = Some((header.clone(), offset));
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        last.ok_or_else(|| {
            RecnoError::CorruptChain(format!("chain from {} has no tail", start))
        })
    }

    /// Link `new_link` after the block at `parent`
    ///
    /// Fails with `AttemptToOrphanBlock`, without writing, if the parent
    /// already links to a block.
    pub fn add_link(&mut self, parent: u64, new_link: BlockRef) -> Result<()> {
        let bytes = self.read_header(parent, BLOCK_HEADER_SIZE as usize)?;
        let mut header = BlockHeader::decode(&bytes)?;

        if let Some(existing) = header.next_block {
            warn!(parent, existing = %existing, new = %new_link, "refusing to overwrite block link");
            return Err(RecnoError::AttemptToOrphanBlock {
                parent,
                existing: existing.offset(),
            });
        }

        header.next_block = Some(new_link);
        self.write_header(parent, &header.to_bytes())
    }

    fn check_link(&self, parent: u64, next: BlockRef, file_len: u64) -> Result<()> {
        if !self.is_chunk_aligned(next.offset()) {
            return Err(RecnoError::CorruptChain(format!(
                "block at {} links to misaligned offset {}",
                parent,
                next.offset()
            )));
        }
        if next.end() > file_len {
            return Err(RecnoError::CorruptChain(format!(
                "block at {} links to {} past end of file ({})",
                parent, next, file_len
            )));
        }
        Ok(())
    }
}
