//! Table Module
//!
//! Fixed-size records addressed by record number (recno, 1-based).
//!
//! ## Responsibilities
//! - Map a recno to the file offset of its slot
//! - Grow a table's chain just far enough to hold a requested recno
//! - Reserve the next recno atomically with respect to `last_recno`
//! - Create additional tables in the same file
//!
//! ## Record Slot Layout
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ Presence (1) │ Record (record_size)      │
//! └──────────────┴───────────────────────────┘
//! ```
//! Slots are packed from the end of each block header; any remainder of
//! the block smaller than one slot is unused.

mod resolver;

pub use resolver::{full_record_size, record_capacity, RecordSlot};

/// Bytes reserved in front of every record as a presence/tombstone marker
pub const PRESENCE_PREFIX_SIZE: u32 = 1;
