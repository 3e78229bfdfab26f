//! Region locks
//!
//! `RegionLock` owns one fcntl byte-range lock and releases it when dropped.
//! `Handle::with_locked_region` runs a caller body under such a lock.

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use tracing::{debug, warn};

use crate::error::{RecnoError, Result};
use crate::handle::Handle;

#[cfg(target_os = "linux")]
const SET_LOCK: libc::c_int = libc::F_OFD_SETLK;

#[cfg(all(unix, not(target_os = "linux")))]
const SET_LOCK: libc::c_int = libc::F_SETLK;

/// What the body of a locked region wants done with the locked bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// Release without writing anything back
    Keep(T),
    /// Write the (possibly modified) buffer back, then release
    Commit(T),
}

impl<T> LockOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            LockOutcome::Keep(value) | LockOutcome::Commit(value) => value,
        }
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, LockOutcome::Commit(_))
    }
}

/// An exclusive advisory lock on `[offset, offset + len)` of one file
///
/// Dropping the guard releases the lock; `release` does the same but
/// reports failure.
#[derive(Debug)]
pub struct RegionLock {
    fd: RawFd,
    offset: u64,
    len: u64,
    held: bool,
}

impl RegionLock {
    /// Try once to lock the region; never blocks
    pub fn acquire(file: &File, offset: u64, len: u64) -> Result<Self> {
        let fd = file.as_raw_fd();
        match set_lock(fd, libc::F_WRLCK as libc::c_short, offset, len) {
            Ok(()) => {
                debug!(offset, len, "region locked");
                Ok(Self {
                    fd,
                    offset,
                    len,
                    held: true,
                })
            }
            Err(e) if is_contention(&e) => Err(RecnoError::LockFailed { offset, len }),
            Err(e) => Err(RecnoError::System(e)),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.len
    }

    /// Unlock now, reporting any OS error
    pub fn release(mut self) -> Result<()> {
        self.held = false;
        set_lock(self.fd, libc::F_UNLCK as libc::c_short, self.offset, self.len)?;
        debug!(offset = self.offset, len = self.len, "region unlocked");
        Ok(())
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = set_lock(self.fd, libc::F_UNLCK as libc::c_short, self.offset, self.len)
            {
                warn!(offset = self.offset, len = self.len, error = %e, "failed to unlock region");
            }
        }
    }
}

impl Handle {
    /// Run `body` while holding an exclusive lock on `[offset, offset + len)`
    ///
    /// With `retrieve_data`, the locked bytes are read and passed to `body`,
    /// and written back if it returns `LockOutcome::Commit`. Without it,
    /// `body` receives `None` and only mutual exclusion is provided.
    ///
    /// The stream position is restored and the lock released on every path.
    ///
    /// A request overlapping a region this handle already holds fails with
    /// `RegionAlreadyHeld`: fcntl locks from one handle merge, so unlocking
    /// the inner region would also unlock part of the outer one.
    pub fn with_locked_region<T, F>(
        &mut self,
        offset: u64,
        len: u64,
        retrieve_data: bool,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut Handle, Option<&mut [u8]>) -> Result<LockOutcome<T>>,
    {
        if len == 0 {
            return Err(RecnoError::InvalidParameter(
                "cannot lock an empty region".to_string(),
            ));
        }

        if let Some(&(held_offset, held_len)) = self
            .held_regions
            .iter()
            .find(|(held_offset, held_len)| overlaps(*held_offset, *held_len, offset, len))
        {
            warn!(offset, len, held_offset, held_len, "nested lock overlaps a held region");
            return Err(RecnoError::RegionAlreadyHeld { offset, len });
        }

        let lock = RegionLock::acquire(&self.file, offset, len).map_err(|e| match e {
            RecnoError::System(io) => self.system(io),
            other => other,
        })?;
        self.held_regions.push((offset, len));

        let result = if retrieve_data {
            self.run_with_buffer(offset, len, body)
        } else {
            body(self, None).map(LockOutcome::into_inner)
        };

        if let Some(index) = self.held_regions.iter().position(|r| *r == (offset, len)) {
            self.held_regions.swap_remove(index);
        }
        let released = lock.release().map_err(|e| match e {
            RecnoError::System(io) => self.system(io),
            other => other,
        });
        result.and_then(|value| released.map(|_| value))
    }

    /// `with_locked_region`, retrying contention with the configured policy
    pub fn with_locked_region_retry<T, F>(
        &mut self,
        offset: u64,
        len: u64,
        retrieve_data: bool,
        mut body: F,
    ) -> Result<T>
    where
        F: FnMut(&mut Handle, Option<&mut [u8]>) -> Result<LockOutcome<T>>,
    {
        let policy = self.config().lock_retry;
        policy.run(|| self.with_locked_region(offset, len, retrieve_data, &mut body))
    }

    fn run_with_buffer<T, F>(&mut self, offset: u64, len: u64, body: F) -> Result<T>
    where
        F: FnOnce(&mut Handle, Option<&mut [u8]>) -> Result<LockOutcome<T>>,
    {
        let saved = self.stream_position()?;
        let result = self.read_modify_write(offset, len, body);
        let restored = self.seek_to(saved);
        result.and_then(|value| restored.map(|_| value))
    }

    fn read_modify_write<T, F>(&mut self, offset: u64, len: u64, body: F) -> Result<T>
    where
        F: FnOnce(&mut Handle, Option<&mut [u8]>) -> Result<LockOutcome<T>>,
    {
        let size = usize::try_from(len)
            .map_err(|_| RecnoError::InvalidParameter(format!("lock length {} too large", len)))?;
        let mut buffer = vec![0u8; size];

        let read = self.read_up_to(offset, &mut buffer)?;
        if read < size {
            return Err(RecnoError::LockReadFailed { offset, len });
        }

        let outcome = body(self, Some(buffer.as_mut_slice()))?;
        if outcome.is_commit() {
            if let Err(e) = self.write_all_at(offset, &buffer) {
                warn!(offset, len, error = %e, "write-back of locked region failed");
                return Err(RecnoError::UnlockWriteFailed { offset, len });
            }
        }
        Ok(outcome.into_inner())
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn set_lock(fd: RawFd, lock_type: libc::c_short, offset: u64, len: u64) -> io::Result<()> {
    let start = libc::off_t::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "lock offset out of range"))?;
    let length = libc::off_t::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "lock length out of range"))?;

    // SAFETY: flock is plain old data; all-zero is a valid value and l_pid
    // must stay zero for open-file-description locks.
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = lock_type;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = start;
    fl.l_len = length;

    // SAFETY: fd is a valid descriptor borrowed from a live File and fl
    // outlives the call.
    let rc = unsafe { libc::fcntl(fd, SET_LOCK, &fl as *const libc::flock) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Whether `[a, a + a_len)` and `[b, b + b_len)` share a byte
fn overlaps(a: u64, a_len: u64, b: u64, b_len: u64) -> bool {
    a < b.saturating_add(b_len) && b < a.saturating_add(a_len)
}

fn is_contention(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EAGAIN || code == libc::EACCES)
}
