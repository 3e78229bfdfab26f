//! Handle Module
//!
//! An open recnodb file and the state that travels with it.
//!
//! ## Responsibilities
//! - Create a new file with its file header, or open and validate one
//! - Cache the file header read at open time
//! - Keep the last OS error seen by any operation on this handle
//! - Close cleanly, including on the error paths of a scoped open
//!
//! A `Handle` is owned by one thread at a time. Block, chain, lock and table
//! operations are implemented as further `impl Handle` blocks in their
//! own modules.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RecnoError, Result};
use crate::format::{FileHeader, FILE_HEADER_SIZE, MAGIC, TABLE_HEADER_SIZE};
use crate::table::PRESENCE_PREFIX_SIZE;

/// How to open the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create (or truncate) the file and write a fresh file header
    Create,
    /// Open an existing file and validate its file header
    Open,
}

/// An open recnodb data file
pub struct Handle {
    /// Underlying file stream
    pub(crate) file: File,
    /// Path the file was opened from
    path: PathBuf,
    /// File header as read (or written) at open time
    fhead: FileHeader,
    /// Configuration the handle was opened with
    config: Config,
    /// errno of the most recent system error
    last_os_error: Option<i32>,
    /// Regions locked through `with_locked_region` and not yet released
    pub(crate) held_regions: Vec<(u64, u64)>,
}

impl Handle {
    /// Create a new data file, replacing any existing file at `path`
    ///
    /// Writes:
    /// 1. One zero-filled chunk
    /// 2. The file header at offset 0: a table head spanning that chunk
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        validate_create_config(config)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let fhead = FileHeader::new(config.chunk_size, config.record_size);
        file.set_len(u64::from(config.chunk_size))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&fhead.to_bytes())?;
        file.seek(SeekFrom::Start(0))?;

        info!(
            path = %path.display(),
            chunk_size = config.chunk_size,
            record_size = config.record_size,
            "created recnodb file"
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            fhead,
            config: config.clone(),
            last_os_error: None,
            held_regions: Vec::new(),
        })
    }

    /// Open an existing data file
    ///
    /// The file header must carry the magic and non-zero chunk size,
    /// header size and block size; otherwise `InvalidHeadFile` is returned
    /// and the file is closed again.
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let fhead = read_file_header(&mut file)?;

        info!(
            path = %path.display(),
            chunk_size = fhead.chunk_size,
            record_size = fhead.table.record_size,
            last_recno = fhead.table.last_recno,
            "opened recnodb file"
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            fhead,
            config: config.clone(),
            last_os_error: None,
            held_regions: Vec::new(),
        })
    }

    /// Open or create depending on `mode`
    pub fn open_with_mode(path: &Path, mode: OpenMode, config: &Config) -> Result<Self> {
        match mode {
            OpenMode::Create => Self::create(path, config),
            OpenMode::Open => Self::open(path, config),
        }
    }

    /// Open a handle, run `user` with it, then close it
    ///
    /// The handle is closed whether or not `user` succeeds; an error from
    /// `user` takes precedence over an error from closing.
    pub fn with_open<T, F>(path: &Path, mode: OpenMode, config: &Config, user: F) -> Result<T>
    where
        F: FnOnce(&mut Handle) -> Result<T>,
    {
        let mut handle = Self::open_with_mode(path, mode, config)?;
        let result = user(&mut handle);
        let closed = handle.close();
        result.and_then(|value| closed.map(|_| value))
    }

    /// Flush to disk and close the file
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        debug!(path = %self.path.display(), "closed recnodb file");
        Ok(())
    }

    /// Re-read the file header from disk into the cache
    pub fn refresh_file_header(&mut self) -> Result<&FileHeader> {
        let saved = self.stream_position()?;
        let fresh = read_file_header(&mut self.file);
        self.seek_to(saved)?;
        self.fhead = fresh?;
        Ok(&self.fhead)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// File header cached at open time (see `refresh_file_header`)
    pub fn file_header(&self) -> &FileHeader {
        &self.fhead
    }

    /// Allocation granularity of this file
    pub fn chunk_size(&self) -> u32 {
        self.fhead.chunk_size
    }

    /// Record size of the table in the file head
    pub fn record_size(&self) -> u32 {
        self.fhead.table.record_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying file, for callers that write record payloads
    pub fn file(&self) -> &File {
        &self.file
    }

    /// errno of the most recent system error on this handle
    pub fn last_os_error(&self) -> Option<i32> {
        self.last_os_error
    }

    /// Current file length in bytes
    pub fn file_len(&mut self) -> Result<u64> {
        match self.file.metadata() {
            Ok(meta) => Ok(meta.len()),
            Err(e) => Err(self.system(e)),
        }
    }

    // =========================================================================
    // Stream Helpers (crate-internal)
    // =========================================================================

    /// Record `err` as the last OS error and wrap it
    pub(crate) fn system(&mut self, err: io::Error) -> RecnoError {
        self.last_os_error = err.raw_os_error();
        RecnoError::System(err)
    }

    pub(crate) fn stream_position(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(|e| self.system(e))
    }

    pub(crate) fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(|e| self.system(e))
    }

    pub(crate) fn seek_end(&mut self) -> Result<u64> {
        self.file.seek(SeekFrom::End(0)).map_err(|e| self.system(e))
    }

    /// Read as many bytes as the file holds at `offset`, up to `buf.len()`
    pub(crate) fn read_up_to(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek_to(offset)?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.system(e)),
            }
        }
        Ok(filled)
    }

    pub(crate) fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek_to(offset)?;
        self.file.read_exact(buf).map_err(|e| self.system(e))
    }

    pub(crate) fn write_all_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.seek_to(offset)?;
        self.file.write_all(bytes).map_err(|e| self.system(e))
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn validate_create_config(config: &Config) -> Result<()> {
    if config.record_size == 0 {
        return Err(RecnoError::VariableLengthUnsupported);
    }
    if config.record_size > i32::MAX as u32 {
        return Err(RecnoError::Config(format!(
            "record size {} exceeds {}",
            config.record_size,
            i32::MAX
        )));
    }

    let minimum = u64::from(FILE_HEADER_SIZE)
        + u64::from(config.record_size)
        + u64::from(PRESENCE_PREFIX_SIZE);
    if u64::from(config.chunk_size) < minimum {
        return Err(RecnoError::Config(format!(
            "chunk size {} cannot hold a file header and one {}-byte record",
            config.chunk_size, config.record_size
        )));
    }
    Ok(())
}

/// Read and validate the file header at offset 0, leaving the stream there
fn read_file_header(file: &mut File) -> Result<FileHeader> {
    let mut bytes = [0u8; FILE_HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(0))?;
    if let Err(e) = file.read_exact(&mut bytes) {
        return match e.kind() {
            io::ErrorKind::UnexpectedEof => Err(RecnoError::InvalidHeadFile(
                "file is shorter than a file header".to_string(),
            )),
            _ => Err(e.into()),
        };
    }
    file.seek(SeekFrom::Start(0))?;

    let magic = &bytes[TABLE_HEADER_SIZE as usize..TABLE_HEADER_SIZE as usize + 4];
    if magic != MAGIC {
        return Err(RecnoError::InvalidHeadFile(format!(
            "bad magic: expected RNDB, got {:?}",
            magic
        )));
    }

    let fhead =
        FileHeader::decode(&bytes).map_err(|e| RecnoError::InvalidHeadFile(e.to_string()))?;
    let block = fhead.block();

    if fhead.chunk_size == 0 {
        return Err(RecnoError::InvalidHeadFile("chunk size is zero".to_string()));
    }
    if block.header_size == 0 || block.block_size == 0 {
        return Err(RecnoError::InvalidHeadFile(
            "file head has a zero header or block size".to_string(),
        ));
    }
    if block.block_size % fhead.chunk_size != 0 {
        return Err(RecnoError::InvalidHeadFile(format!(
            "file head block size {} is not a multiple of chunk size {}",
            block.block_size, fhead.chunk_size
        )));
    }

    Ok(fhead)
}
