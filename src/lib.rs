//! # recnodb
//!
//! An embedded storage engine for fixed-size records addressed by record
//! number, with:
//! - Chunk-aligned blocks linked into singly-linked chains
//! - Tables that grow on demand, one data block at a time
//! - Advisory byte-range locks around every header update
//! - Several handles (and processes) sharing one data file
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Handle                               │
//! │        (create / open / with_open / close, last OS error)    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Table (record resolver)                      │
//! │      recno -> offset, reserve next record, create table      │
//! └──────────┬──────────────────────┬───────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │      Chain      │    │      Lock       │
//!   │ (walk, link)    │    │ (fcntl regions) │
//!   └────────┬────────┘    └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │      Block      │───▶│     Format      │
//!   │ (append, I/O)   │    │ (header codec)  │
//!   └─────────────────┘    └─────────────────┘
//! ```
//!
//! Only Unix targets are supported; locking is built on `fcntl`.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod block;
pub mod chain;
pub mod format;
pub mod handle;
pub mod lock;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use block::BlockDef;
pub use chain::WalkEnd;
pub use config::Config;
pub use error::{ErrorCode, RecnoError, Result};
pub use format::{BlockHeader, BlockRef, BlockType, FileHeader, Header, TableHeader};
pub use handle::{Handle, OpenMode};
pub use lock::{LockOutcome, RegionLock, RetryPolicy};
pub use table::RecordSlot;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of recnodb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
