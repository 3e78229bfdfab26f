//! Record offset resolver
//!
//! Walks a table chain to find the block holding a record number, appending
//! a data block when the chain runs out.

use std::ops::ControlFlow;

use tracing::{debug, info, warn};

use crate::block::BlockDef;
use crate::chain::WalkEnd;
use crate::error::{RecnoError, Result};
use crate::format::{
    BlockHeader, BlockRef, TableHeader, BLOCK_HEADER_SIZE, FILE_INFO_OFFSET, FILE_INFO_SIZE,
    TABLE_HEADER_SIZE,
};
use crate::handle::Handle;
use crate::lock::LockOutcome;

use super::PRESENCE_PREFIX_SIZE;

/// A reserved record number and the offset of its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSlot {
    pub recno: u32,
    /// Offset of the slot's presence byte
    pub offset: u64,
}

/// Record size plus the presence prefix
pub fn full_record_size(table: &TableHeader) -> Result<u64> {
    if table.record_size == 0 {
        return Err(RecnoError::VariableLengthUnsupported);
    }
    Ok(u64::from(table.record_size) + u64::from(PRESENCE_PREFIX_SIZE))
}

/// Number of whole record slots that fit in `block`
pub fn record_capacity(table: &TableHeader, block: &BlockHeader) -> Result<u64> {
    Ok(u64::from(block.payload_size()) / full_record_size(table)?)
}

impl Handle {
    /// Offset of the slot for `target_recno` in the chain at `chain_start`
    ///
    /// If the chain is too short, one data block is appended to its tail,
    /// sized to the smallest chunk multiple that reaches `target_recno`.
    /// The caller should hold the table head lock; `reserve_next_record`
    /// does.
    pub fn offset_for_record(
        &mut self,
        chain_start: u64,
        table: &TableHeader,
        target_recno: u32,
    ) -> Result<u64> {
        let full = full_record_size(table)?;
        if target_recno == 0 {
            return Err(RecnoError::InvalidParameter(
                "record numbers start at 1".to_string(),
            ));
        }
        let target = u64::from(target_recno);

        let mut start_rec: u64 = 1;
        let mut cursor = chain_start;

        loop {
            let mut found = None;
            let mut mismatch = None;

            let end = self.walk(cursor, |header, offset| {
                let block = header.block();
                if block.first_recno != 0 && block.first_recno != start_rec {
                    mismatch = Some((offset, block.first_recno, start_rec));
                    return ControlFlow::Break(());
                }

                let capacity = u64::from(block.payload_size()) / full;
                let index = target - start_rec;
                if index < capacity {
                    found = Some(offset + u64::from(block.header_size) + index * full);
                    return ControlFlow::Break(());
                }

                start_rec += capacity;
                ControlFlow::Continue(())
            })?;

            if let Some((offset, stored, expected)) = mismatch {
                warn!(chain_start, offset, stored, expected, "record range mismatch in chain");
                return Err(RecnoError::CorruptChain(format!(
                    "block at {} starts at record {}, expected {}",
                    offset, stored, expected
                )));
            }
            if let Some(record_offset) = found {
                return Ok(record_offset);
            }

            let tail = match end {
                WalkEnd::Tail(offset) => offset,
                WalkEnd::Stopped(offset) => {
                    return Err(RecnoError::CorruptChain(format!(
                        "walk stopped at {} without resolving record {}",
                        offset, target
                    )))
                }
            };

            let block_size = growth_size(target - start_rec + 1, full, self.chunk_size())?;
            let block = self.grow_chain(tail, &BlockDef::data(block_size, start_rec))?;
            debug!(tail, block = %block, first_recno = start_rec, target, "table chain grown");
            cursor = block.offset();
        }
    }

    /// Reserve the next record number of the table headed at `table_head`
    ///
    /// Under a lock on the table header: computes `last_recno + 1`, resolves
    /// (and if needed allocates) its slot, then calls `body` with the fresh
    /// table header and the slot. If `body` returns `LockOutcome::Commit`,
    /// the table header it was given is written back before the lock is
    /// released. Writing the record itself is left to the caller.
    pub fn reserve_next_record<T, F>(&mut self, table_head: u64, body: F) -> Result<T>
    where
        F: FnOnce(&mut Handle, &mut TableHeader, RecordSlot) -> Result<LockOutcome<T>>,
    {
        let len = u64::from(TABLE_HEADER_SIZE);
        self.with_locked_region(table_head, len, true, |handle, buffer| {
            let buffer = buffer.ok_or(RecnoError::LockReadFailed {
                offset: table_head,
                len,
            })?;
            let table = TableHeader::decode(buffer)?;

            let recno = table
                .last_recno
                .checked_add(1)
                .filter(|next| *next <= i32::MAX as u32)
                .ok_or(RecnoError::RecnoOverflow(u64::from(table.last_recno) + 1))?;
            let offset = handle.offset_for_record(table_head, &table, recno)?;

            // Growth may have linked a block to the head itself.
            let mut fresh = handle.table_header(table_head)?;
            let outcome = body(handle, &mut fresh, RecordSlot { recno, offset })?;
            if outcome.is_commit() {
                buffer.copy_from_slice(&fresh.to_bytes());
            }
            Ok(outcome)
        })
    }

    /// Reserve the next record number and advance `last_recno` to it
    pub fn reserve_record(&mut self, table_head: u64) -> Result<RecordSlot> {
        self.reserve_next_record(table_head, |_, table, slot| {
            table.last_recno = slot.recno;
            Ok(LockOutcome::Commit(slot))
        })
    }

    /// Append the head block of a new, empty table
    ///
    /// The returned location is the only reference to the new table; no
    /// other block links to it.
    pub fn create_table(&mut self, record_size: u32) -> Result<BlockRef> {
        if record_size == 0 {
            return Err(RecnoError::VariableLengthUnsupported);
        }
        let full = u64::from(record_size) + u64::from(PRESENCE_PREFIX_SIZE);
        let chunk = u64::from(self.chunk_size());
        let block_size = (u64::from(TABLE_HEADER_SIZE) + full).div_ceil(chunk) * chunk;
        let block_size = u32::try_from(block_size).map_err(|_| {
            RecnoError::InvalidParameter(format!("record size {} is too large", record_size))
        })?;

        let def = BlockDef::table(block_size, record_size);
        let block = self.with_growth_lock(|handle| handle.append_block(&def))?;
        info!(table = %block, record_size, "table created");
        Ok(block)
    }

    /// Read the table header at `offset`
    pub fn table_header(&mut self, offset: u64) -> Result<TableHeader> {
        self.read_block(offset)?.into_table().ok_or_else(|| {
            RecnoError::CorruptHeader(format!("block at {} is not a table head", offset))
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn grow_chain(&mut self, tail: u64, def: &BlockDef) -> Result<BlockRef> {
        self.with_growth_lock(|handle| handle.extend_chain(tail, def))
    }

    /// Run `op` holding the file-info lock that serializes end-of-file growth
    fn with_growth_lock<T, F>(&mut self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut Handle) -> Result<T>,
    {
        self.with_locked_region_retry(FILE_INFO_OFFSET, FILE_INFO_SIZE, false, |handle, _| {
            op(handle).map(LockOutcome::Keep)
        })
    }
}

/// Smallest chunk multiple holding a data header and `records` slots
fn growth_size(records: u64, full: u64, chunk_size: u32) -> Result<u32> {
    let chunk = u64::from(chunk_size);
    let bytes = records
        .checked_mul(full)
        .and_then(|payload| payload.checked_add(u64::from(BLOCK_HEADER_SIZE)))
        .ok_or(RecnoError::RecnoOverflow(records))?;
    let rounded = bytes.div_ceil(chunk) * chunk;
    u32::try_from(rounded).map_err(|_| RecnoError::RecnoOverflow(records))
}
