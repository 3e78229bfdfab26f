//! Lock Module
//!
//! Advisory byte-range locking around header read-modify-write cycles.
//!
//! ## Responsibilities
//! - Lock exactly the header region being mutated, never the whole file
//! - Optionally hand the locked bytes to the caller and write them back
//! - Release the lock on every exit path
//! - Retry contended locks with backoff (caller-level policy)
//!
//! ## Protocol
//! ```text
//!   acquire [offset, offset+len)  ──fail──▶ LockFailed / System
//!          │
//!          ▼
//!   read len bytes (optional)     ──short─▶ LockReadFailed ─┐
//!          │                                                │
//!          ▼                                                │
//!   body(handle, buffer)                                    │
//!     Ok(Keep)   ─────────────────────────────┐             │
//!     Ok(Commit) ─▶ write buffer back ─short─▶│ UnlockWrite │
//!     Err(e)     ─────────────────────────────┤   Failed    │
//!                                             ▼             ▼
//!                              release lock, restore stream position
//! ```
//!
//! Locks are non-blocking. On Linux they are open-file-description locks,
//! so two handles on the same file contend even inside one process.
//!
//! Each handle tracks the regions it holds. A nested request that overlaps
//! one of them fails with `RegionAlreadyHeld` before touching the OS lock.

mod region;
mod retry;

pub use region::{LockOutcome, RegionLock};
pub use retry::RetryPolicy;
