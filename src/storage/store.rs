//! Record Store
//!
//! Offset-addressed CRUD over one fixed-width table file.
//!
//! ## Responsibilities
//! - Map `r_id` → byte offset with no stored index
//! - Append, read, overwrite and tombstone slots
//! - Pagination by forward scan
//! - Run validation/transformation hooks around writes and reads
//!
//! Every operation opens the file, does its seek/read/write and closes it
//! again. No locks are taken: callers that share a table across processes
//! serialize writers themselves.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, trace, warn};

use crate::codec::{self, RecordFlag, Value};
use crate::config::TableConfig;
use crate::error::{CsvDbError, DeleteKind, Result};

use super::{Record, ReadOutcome, TextBlobStore, Values};

/// CRUD handle for one table file
#[derive(Debug, Clone)]
pub struct RecordStore {
    config: TableConfig,
    path: PathBuf,
}

impl RecordStore {
    pub fn new(config: TableConfig) -> Self {
        let path = config.table_path();
        Self { config, path }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the data directory, the cache directory and an empty table.
    ///
    /// Returns `false` when the table file already exists.
    pub fn create_table(&self) -> Result<bool> {
        fs::create_dir_all(self.config.data_dir())?;
        fs::create_dir_all(self.config.cache_dir())?;

        let created = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => false,
            Err(e) => return Err(e.into()),
        };

        if created {
            info!(table = self.config.table_name(), "created table");
        }
        Ok(created)
    }

    // =========================================================================
    // Addressing
    // =========================================================================

    /// Byte offset of a record: `(r_id - 1) * (max_record_width + 1)`
    pub fn address(&self, r_id: u64) -> Result<u64> {
        if r_id == 0 {
            return Err(CsvDbError::InvalidInput("r_id starts at 1".to_string()));
        }
        (r_id - 1)
            .checked_mul(self.config.slot_width())
            .ok_or_else(|| CsvDbError::InvalidInput(format!("r_id {} out of range", r_id)))
    }

    /// Number of slots in the table, tombstones included
    pub fn len(&self) -> Result<u64> {
        match fs::metadata(&self.path) {
            Ok(metadata) => self.slot_count(metadata.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Highest assigned `r_id` (0 for an empty table)
    pub fn last_id(&self) -> Result<u64> {
        self.len()
    }

    fn slot_count(&self, file_len: u64) -> Result<u64> {
        let width = self.config.slot_width();
        if file_len % width != 0 {
            return Err(CsvDbError::Corrupt(format!(
                "{} is {} bytes, not a multiple of the {}-byte slot",
                self.path.display(),
                file_len,
                width
            )));
        }
        Ok(file_len / width)
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Append a new record and return its `r_id`
    pub fn create(&self, values: impl Into<Values>) -> Result<u64> {
        let proposed = values.into().resolve(&self.config, false)?;
        self.check_validation(None, &proposed)?;

        let row: Vec<Value> = proposed.into_iter().map(|(_, value)| value).collect();
        let mut fields = codec::stringify(&row, self.config.columns());
        if self.config.auto_timestamps() {
            let now = now_millis();
            fields.push(now.to_string());
            fields.push(now.to_string());
        }

        let line = self.encode_line(&fields, RecordFlag::Live)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let r_id = self.slot_count(file.metadata()?.len())? + 1;
        file.write_all(&line)?;

        debug!(table = self.config.table_name(), r_id, "created record");
        Ok(r_id)
    }

    /// Read one record, distinguishing live, deleted and never-written slots
    pub fn read(&self, r_id: u64) -> Result<ReadOutcome> {
        let Some(mut file) = self.open_for_read()? else {
            return Ok(ReadOutcome::NotFound);
        };
        let outcome = self.read_at(&mut file, r_id)?;

        trace!(table = self.config.table_name(), r_id, live = outcome.is_live(), "read record");
        Ok(outcome)
    }

    /// Read one record restricted to the named fields
    pub fn read_columns(&self, r_id: u64, columns: &[&str]) -> Result<ReadOutcome> {
        Ok(match self.read(r_id)? {
            ReadOutcome::Live(record) => ReadOutcome::Live(record.select(columns)),
            other => other,
        })
    }

    /// Overwrite a live record in place.
    ///
    /// With `partial`, only the supplied named columns change. `created_at`
    /// is kept and `updated_at` moves strictly forward.
    pub fn update(&self, r_id: u64, values: impl Into<Values>, partial: bool) -> Result<()> {
        let proposed = values.into().resolve(&self.config, partial)?;
        self.check_validation(Some(r_id), &proposed)?;

        let address = self.address(r_id)?;
        let mut file = self.open_for_write(r_id)?;
        let mut fields = self.live_fields(&mut file, r_id)?;
        let inline_count = self.config.inline_columns().count();

        if partial {
            for (name, value) in &proposed {
                let column = self
                    .config
                    .inline_columns()
                    .enumerate()
                    .find(|(_, (column, _))| column == name);
                if let Some((index, (_, ty))) = column {
                    fields[index] = codec::stringify_value(*ty, value);
                }
            }
        } else {
            let row: Vec<Value> = proposed.into_iter().map(|(_, value)| value).collect();
            let mut rewritten = codec::stringify(&row, self.config.columns());
            rewritten.extend(fields.drain(inline_count..));
            fields = rewritten;
        }

        if self.config.auto_timestamps() {
            let previous = fields[inline_count + 1].parse::<u64>().ok();
            fields[inline_count + 1] = next_timestamp(previous).to_string();
        }

        let line = self.encode_line(&fields, RecordFlag::Live)?;
        file.seek(SeekFrom::Start(address))?;
        file.write_all(&line)?;

        debug!(table = self.config.table_name(), r_id, partial, "updated record");
        Ok(())
    }

    /// Tombstone a record.
    ///
    /// Soft: flips the flag byte, content untouched. Hard: blanks every
    /// field, flags the slot and removes the record's text blob files.
    pub fn delete(&self, r_id: u64, hard: bool) -> Result<()> {
        let address = self.address(r_id)?;
        let mut file = self.open_for_write(r_id)?;
        let slot = self
            .read_slot(&mut file, r_id)?
            .ok_or(CsvDbError::RecordNotFound { r_id })?;
        let (_, flag) = codec::decode(&slot, self.config.max_record_width())?;

        if !hard {
            match flag {
                RecordFlag::HardDeleted => {
                    return Err(CsvDbError::RecordDeleted {
                        r_id,
                        kind: DeleteKind::Hard,
                    })
                }
                RecordFlag::SoftDeleted => {}
                RecordFlag::Live => {
                    let flag_offset = address + self.config.max_record_width() as u64 - 1;
                    file.seek(SeekFrom::Start(flag_offset))?;
                    file.write_all(&[RecordFlag::SoftDeleted.byte()])?;
                }
            }

            debug!(table = self.config.table_name(), r_id, "soft deleted record");
            return Ok(());
        }

        let blank = vec![String::new(); self.config.inline_field_count()];
        let line = self.encode_line(&blank, RecordFlag::HardDeleted)?;
        file.seek(SeekFrom::Start(address))?;
        file.write_all(&line)?;
        drop(file);

        for column in self.config.text_columns() {
            TextBlobStore::for_record(&self.config, column, r_id).remove()?;
        }

        debug!(table = self.config.table_name(), r_id, "hard deleted record");
        Ok(())
    }

    /// One page of live records.
    ///
    /// Page `p` covers r_ids `(p-1)*limit+1 ..= p*limit`; `None` lists
    /// everything from r_id 1. Tombstones are skipped and the scan ends at
    /// the first never-written slot.
    pub fn list(&self, page: u64, limit: Option<u64>) -> Result<Vec<Record>> {
        if page == 0 {
            return Err(CsvDbError::InvalidInput("page starts at 1".to_string()));
        }

        let first = match limit {
            None => 1,
            Some(limit) => (page - 1)
                .checked_mul(limit)
                .and_then(|skipped| skipped.checked_add(1))
                .ok_or_else(|| CsvDbError::InvalidInput(format!("page {} out of range", page)))?,
        };

        let records = self.scan(first, limit)?;
        debug!(
            table = self.config.table_name(),
            page,
            limit = ?limit,
            returned = records.len(),
            "listed records"
        );
        Ok(records)
    }

    /// Live records for the given r_ids, in input order
    pub fn fetch(&self, r_ids: &[u64]) -> Result<Vec<Record>> {
        let Some(mut file) = self.open_for_read()? else {
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(r_ids.len());
        for &r_id in r_ids {
            // Unaddressable ids have no record, like any other non-live slot
            if self.address(r_id).is_err() {
                continue;
            }
            if let ReadOutcome::Live(record) = self.read_at(&mut file, r_id)? {
                records.push(record);
            }
        }

        trace!(
            table = self.config.table_name(),
            requested = r_ids.len(),
            found = records.len(),
            "fetched records"
        );
        Ok(records)
    }

    /// Live records from `first` over a window of `window` slots
    pub(crate) fn scan(&self, first: u64, window: Option<u64>) -> Result<Vec<Record>> {
        let Some(mut file) = self.open_for_read()? else {
            return Ok(Vec::new());
        };

        let end = window.map(|w| first.saturating_add(w));
        let mut records = Vec::new();
        let mut r_id = first;

        while end.map_or(true, |end| r_id < end) {
            match self.read_at(&mut file, r_id)? {
                ReadOutcome::Live(record) => records.push(record),
                ReadOutcome::SoftDeleted | ReadOutcome::HardDeleted => {}
                ReadOutcome::NotFound => break,
            }
            r_id += 1;
        }

        Ok(records)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn check_validation(&self, r_id: Option<u64>, proposed: &[(String, Value)]) -> Result<()> {
        if let Some(validator) = self.config.validator() {
            if !validator.validate(r_id, proposed, &self.config) {
                warn!(table = self.config.table_name(), r_id = ?r_id, "write rejected by validation hook");
                return Err(CsvDbError::ValidationRejected);
            }
        }
        Ok(())
    }

    fn encode_line(&self, fields: &[String], flag: RecordFlag) -> Result<Vec<u8>> {
        codec::encode(fields, self.config.max_record_width(), flag).map_err(|e| {
            warn!(table = self.config.table_name(), error = %e, "record does not fit");
            e
        })
    }

    /// `None` when the table file does not exist yet
    fn open_for_read(&self) -> Result<Option<File>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn open_for_write(&self, r_id: u64) -> Result<File> {
        match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CsvDbError::RecordNotFound { r_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Raw slot bytes, or `None` past end-of-file
    fn read_slot(&self, file: &mut File, r_id: u64) -> Result<Option<Vec<u8>>> {
        let address = self.address(r_id)?;
        let width = self.config.slot_width();
        let file_len = file.metadata()?.len();

        if address >= file_len {
            return Ok(None);
        }
        if address + width > file_len {
            return Err(CsvDbError::Corrupt(format!(
                "record {} is truncated at end of {}",
                r_id,
                self.path.display()
            )));
        }

        let mut slot = vec![0u8; width as usize];
        file.seek(SeekFrom::Start(address))?;
        file.read_exact(&mut slot)?;
        Ok(Some(slot))
    }

    /// Fields of a slot that must be live (filler excluded)
    fn live_fields(&self, file: &mut File, r_id: u64) -> Result<Vec<String>> {
        let slot = self
            .read_slot(file, r_id)?
            .ok_or(CsvDbError::RecordNotFound { r_id })?;
        let (fields, flag) = codec::decode(&slot, self.config.max_record_width())?;

        match flag {
            RecordFlag::Live => {}
            RecordFlag::SoftDeleted => {
                return Err(CsvDbError::RecordDeleted {
                    r_id,
                    kind: DeleteKind::Soft,
                })
            }
            RecordFlag::HardDeleted => {
                return Err(CsvDbError::RecordDeleted {
                    r_id,
                    kind: DeleteKind::Hard,
                })
            }
        }

        self.check_field_count(r_id, &fields)?;
        Ok(fields)
    }

    fn check_field_count(&self, r_id: u64, fields: &[String]) -> Result<()> {
        let expected = self.config.inline_field_count();
        if fields.len() != expected {
            return Err(CsvDbError::Corrupt(format!(
                "record {} has {} fields, expected {}",
                r_id,
                fields.len(),
                expected
            )));
        }
        Ok(())
    }

    fn read_at(&self, file: &mut File, r_id: u64) -> Result<ReadOutcome> {
        let Some(slot) = self.read_slot(file, r_id)? else {
            return Ok(ReadOutcome::NotFound);
        };
        let (fields, flag) = codec::decode(&slot, self.config.max_record_width())?;

        match flag {
            RecordFlag::SoftDeleted => return Ok(ReadOutcome::SoftDeleted),
            RecordFlag::HardDeleted => return Ok(ReadOutcome::HardDeleted),
            RecordFlag::Live => {}
        }

        self.check_field_count(r_id, &fields)?;
        let values = codec::typecast(&fields, self.config.columns())?;
        let mut record = Record::new(r_id, values);

        if self.config.auto_timestamps() {
            let inline_count = self.config.inline_columns().count();
            record.created_at = fields[inline_count].parse().ok();
            record.updated_at = fields[inline_count + 1].parse().ok();
        }

        if let Some(transformer) = self.config.transformer() {
            for (name, value) in transformer.transform(&record, &self.config) {
                record.set(name, value);
            }
        }

        Ok(ReadOutcome::Live(record))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current time, bumped past `previous` so updates always move forward
fn next_timestamp(previous: Option<u64>) -> u64 {
    let now = now_millis();
    match previous {
        Some(previous) if now <= previous => previous + 1,
        _ => now,
    }
}
