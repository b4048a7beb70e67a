//! Text Blob Store
//!
//! Append-only byte store for large text values. Values are addressed by a
//! `BlobRef` (offset, length) that callers keep inside ordinary records,
//! usually in a Json column.
//!
//! ## File Layout
//! ```text
//! ┌───────────────┬────┬───────────────┬────┬──────────────────┬────┐
//! │ text A        │\n\n│ text B        │\n\n│ (blanked region) │\n\n│ ...
//! └───────────────┴────┴───────────────┴────┴──────────────────┴────┘
//! ```
//!
//! Updates that fit are written in place and the rest of the old region is
//! blanked with spaces. Updates that do not fit blank the old region and
//! append. Deletes blank. Nothing is ever reclaimed, so repeated
//! create/update/delete cycles grow the file monotonically.
//!
//! ## Locking
//! Every write holds an in-process mutex plus an exclusive advisory lock
//! on the file for the duration of write + flush, so two creators never
//! compute the same end-of-file offset. Reads take no lock: a read racing
//! an append can observe a partially written blob.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::TableConfig;
use crate::error::{CsvDbError, Result};

/// Written after every appended blob
pub const BLOB_SEPARATOR: &[u8] = b"\n\n";

/// Byte used to blank logically deleted regions
pub const BLANK: u8 = b' ';

// =============================================================================
// Blob Reference
// =============================================================================

/// Location of one blob inside its backing file.
///
/// Serializes as the two-element array `[offset, length]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)", into = "(u64, u64)")]
pub struct BlobRef {
    offset: u64,
    length: u64,
}

impl BlobRef {
    /// Checked constructor: `length` must be positive and the range must
    /// not overflow.
    pub fn new(offset: u64, length: u64) -> Result<Self> {
        if length == 0 || offset.checked_add(length).is_none() {
            return Err(invalid_ref(offset, length));
        }
        Ok(Self { offset, length })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// One past the last byte of the blob
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!([self.offset, self.length])
    }

    /// Parse `[offset, length]`, rejecting negative or empty references
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let pair = value
            .as_array()
            .filter(|items| items.len() == 2)
            .and_then(|items| Some((items[0].as_i64()?, items[1].as_i64()?)))
            .ok_or_else(|| {
                CsvDbError::InvalidInput(format!("not a blob reference: {}", value))
            })?;
        Self::try_from(pair)
    }
}

impl TryFrom<(i64, i64)> for BlobRef {
    type Error = CsvDbError;

    fn try_from((offset, length): (i64, i64)) -> Result<Self> {
        if offset < 0 || length <= 0 {
            return Err(CsvDbError::InvalidBlobRef { offset, length });
        }
        Self::new(offset as u64, length as u64)
    }
}

impl From<BlobRef> for (u64, u64) {
    fn from(blob: BlobRef) -> Self {
        (blob.offset, blob.length)
    }
}

fn invalid_ref(offset: u64, length: u64) -> CsvDbError {
    CsvDbError::InvalidBlobRef {
        offset: i64::try_from(offset).unwrap_or(i64::MAX),
        length: i64::try_from(length).unwrap_or(i64::MAX),
    }
}

// =============================================================================
// Write Lock
// =============================================================================

/// Exclusive advisory lock, released on drop
struct WriteLock<'a> {
    file: &'a File,
}

impl<'a> WriteLock<'a> {
    fn acquire(file: &'a File) -> Result<Self> {
        FileExt::lock_exclusive(file)?;
        Ok(Self { file })
    }
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}

// =============================================================================
// Text Blob Store
// =============================================================================

/// Append-only text store backed by one file
#[derive(Debug)]
pub struct TextBlobStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TextBlobStore {
    /// Use an explicit backing file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Shared backing file of a column: `{data_dir}/{stem}_{column}.text`
    pub fn for_column(config: &TableConfig, column: &str) -> Self {
        Self::open(config.text_path(column))
    }

    /// Backing file owned by one record's Text column.
    ///
    /// This is the file a hard delete of `r_id` removes.
    pub fn for_record(config: &TableConfig, column: &str, r_id: u64) -> Self {
        Self::open(config.record_text_path(column, r_id))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the backing file (0 when missing)
    pub fn size(&self) -> Result<u64> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `text` and return its reference
    pub fn create(&self, text: &str) -> Result<BlobRef> {
        if text.is_empty() {
            return Err(CsvDbError::InvalidInput("cannot store empty text".to_string()));
        }

        let _guard = self.write_lock.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let _lock = WriteLock::acquire(&file)?;
        // Sampled under the lock: other handles may have appended.
        let offset = file.metadata()?.len();
        (&file).write_all(text.as_bytes())?;
        (&file).write_all(BLOB_SEPARATOR)?;
        (&file).flush()?;

        let blob = BlobRef::new(offset, text.len() as u64)?;
        debug!(
            path = %self.path.display(),
            offset = blob.offset(),
            length = blob.length(),
            "appended text blob"
        );
        Ok(blob)
    }

    /// Read a blob as text, optionally only its first `length_override` bytes
    pub fn read(&self, blob: &BlobRef, length_override: Option<u64>) -> Result<String> {
        let bytes = self.read_bytes(blob, length_override)?;
        String::from_utf8(bytes)
            .map_err(|e| CsvDbError::Corrupt(format!("text blob is not valid UTF-8: {}", e)))
    }

    /// Read a blob's raw bytes
    pub fn read_bytes(&self, blob: &BlobRef, length_override: Option<u64>) -> Result<Vec<u8>> {
        let length = length_override.unwrap_or(blob.length());
        let range = BlobRef::new(blob.offset(), length)?;

        let mut file = File::open(&self.path)?;
        self.check_bounds(&file, &range)?;

        let mut bytes = vec![0u8; range.length() as usize];
        file.seek(SeekFrom::Start(range.offset()))?;
        file.read_exact(&mut bytes)?;

        trace!(
            path = %self.path.display(),
            offset = range.offset(),
            length = range.length(),
            "read text blob"
        );
        Ok(bytes)
    }

    /// Replace a blob's text.
    ///
    /// Fits: written in place, remainder blanked, same offset returned.
    /// Does not fit: old region blanked and the text appended.
    pub fn update(&self, blob: &BlobRef, text: &str) -> Result<BlobRef> {
        if text.is_empty() {
            return Err(CsvDbError::InvalidInput("cannot store empty text".to_string()));
        }

        let new_len = text.len() as u64;
        if new_len > blob.length() {
            self.delete(blob)?;
            return self.create(text);
        }

        let mut bytes = Vec::with_capacity(blob.length() as usize);
        bytes.extend_from_slice(text.as_bytes());
        bytes.resize(blob.length() as usize, BLANK);
        self.overwrite(blob, &bytes)?;

        debug!(
            path = %self.path.display(),
            offset = blob.offset(),
            length = new_len,
            "updated text blob in place"
        );
        BlobRef::new(blob.offset(), new_len)
    }

    /// Blank a blob's region. The file never shrinks.
    pub fn delete(&self, blob: &BlobRef) -> Result<()> {
        let blanks = vec![BLANK; blob.length() as usize];
        self.overwrite(blob, &blanks)?;

        debug!(
            path = %self.path.display(),
            offset = blob.offset(),
            length = blob.length(),
            "blanked text blob"
        );
        Ok(())
    }

    /// Remove the whole backing file. Returns `false` if it did not exist.
    pub fn remove(&self) -> Result<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed text blob file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn overwrite(&self, blob: &BlobRef, bytes: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let file = OpenOptions::new().write(true).open(&self.path)?;

        let _lock = WriteLock::acquire(&file)?;
        self.check_bounds(&file, blob)?;
        (&file).seek(SeekFrom::Start(blob.offset()))?;
        (&file).write_all(bytes)?;
        (&file).flush()?;
        Ok(())
    }

    fn check_bounds(&self, file: &File, blob: &BlobRef) -> Result<()> {
        if blob.end() > file.metadata()?.len() {
            return Err(invalid_ref(blob.offset(), blob.length()));
        }
        Ok(())
    }
}
