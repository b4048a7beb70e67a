//! Search Cache
//!
//! Materializes a filtered/projected view of a table into a second
//! fixed-width table under `{data_dir}/__csvdb_cache/{stem}_{key}.csv`.
//!
//! ## Cache File Format
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ column,column,...,____                    │  header (r_id 1)
//! ├───────────────────────────────────────────┤
//! │ value,value,...,______                    │  result row 1 (r_id 2)
//! │ ... one fixed-width line per result ...   │
//! └───────────────────────────────────────────┘
//! ```
//!
//! The line width is the widest encoded header/result plus two bytes
//! (separator and flag), so it is learned back from the header line.
//!
//! Building costs one full scan of the source table; reads after that cost
//! one page. Nothing tracks staleness: callers `invalidate` when the source
//! changes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::{self, RecordFlag, Value, TERMINATOR};
use crate::config::{ColumnType, TableConfig};
use crate::error::{CsvDbError, Result};

use super::{Record, RecordStore};

/// One filtered/projected result: column name → value
pub type ResultRow = Vec<(String, Value)>;

/// Lazily built, explicitly invalidated result tables for one source table
#[derive(Debug, Clone)]
pub struct SearchCache {
    source: RecordStore,
}

impl SearchCache {
    pub fn new(source: RecordStore) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &RecordStore {
        &self.source
    }

    /// Path of the cache table for `cache_key`
    pub fn cache_path(&self, cache_key: &str) -> Result<PathBuf> {
        check_cache_key(cache_key)?;
        Ok(self.source.config().cache_path(cache_key))
    }

    pub fn is_cached(&self, cache_key: &str) -> Result<bool> {
        Ok(self.cache_path(cache_key)?.is_file())
    }

    /// Return one page of cached results, building the cache first if needed.
    ///
    /// `filter_fn` receives every live record of the source table and
    /// returns the result rows; it only runs when the cache is missing.
    /// Returned records carry their 1-based position in the result set as
    /// `r_id` and String values.
    pub fn get_or_build<F>(
        &self,
        cache_key: &str,
        filter_fn: F,
        page: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Record>>
    where
        F: FnOnce(Vec<Record>) -> Vec<ResultRow>,
    {
        if page == 0 {
            return Err(CsvDbError::InvalidInput("page starts at 1".to_string()));
        }

        let path = self.cache_path(cache_key)?;
        if !path.is_file() {
            self.build(cache_key, &path, filter_fn)?;
        }

        self.read_page(cache_key, &path, page, limit)
    }

    /// Delete the cache table. Returns `false` when there was none.
    pub fn invalidate(&self, cache_key: &str) -> Result<bool> {
        let path = self.cache_path(cache_key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(
                    table = self.source.config().table_name(),
                    cache_key,
                    "invalidated search cache"
                );
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn build<F>(&self, cache_key: &str, path: &Path, filter_fn: F) -> Result<()>
    where
        F: FnOnce(Vec<Record>) -> Vec<ResultRow>,
    {
        let records = self.source.list(1, None)?;
        let scanned = records.len();
        let results = filter_fn(records);

        // Encode everything before touching the file
        let lines = encode_results(&results)?;

        // Staged beside the cache, renamed into place once synced
        fs::create_dir_all(self.source.config().cache_dir())?;
        let staging = staging_path(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&staging)?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writer.write_all(line)?;
        }
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| CsvDbError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, path)?;

        info!(
            table = self.source.config().table_name(),
            cache_key,
            scanned,
            results = results.len(),
            "built search cache"
        );
        Ok(())
    }

    fn read_page(
        &self,
        cache_key: &str,
        path: &Path,
        page: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Record>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = Vec::new();
        reader.read_until(TERMINATOR, &mut header)?;

        if header.is_empty() {
            return Ok(Vec::new());
        }
        if header.last() != Some(&TERMINATOR) {
            return Err(CsvDbError::Corrupt(format!(
                "cache header of {} is not terminated",
                path.display()
            )));
        }

        let width = header.len() - 1;
        let (columns, _) = codec::decode(&header, width)?;

        let source = self.source.config();
        let config = TableConfig::builder()
            .data_dir(source.cache_dir())
            .table_name(source.cache_table_name(cache_key))
            .max_record_width(width)
            .columns(columns.into_iter().map(|name| (name, ColumnType::String)))
            .build()?;

        // r_id 1 is the header, results start at r_id 2
        let first = match limit {
            None => 2,
            Some(limit) => (page - 1)
                .checked_mul(limit)
                .and_then(|skipped| skipped.checked_add(2))
                .ok_or_else(|| CsvDbError::InvalidInput(format!("page {} out of range", page)))?,
        };

        let mut rows = RecordStore::new(config).scan(first, limit)?;
        for row in &mut rows {
            row.r_id -= 1;
        }

        debug!(
            table = source.table_name(),
            cache_key,
            page,
            returned = rows.len(),
            "read search cache"
        );
        Ok(rows)
    }
}

/// Fixed-width lines for the header and every result row
fn encode_results(results: &[ResultRow]) -> Result<Vec<Vec<u8>>> {
    let Some(first) = results.first() else {
        return Ok(Vec::new());
    };

    let header: Vec<String> = first.iter().map(|(name, _)| name.clone()).collect();
    if header.is_empty() {
        return Err(CsvDbError::InvalidInput(
            "search results have no columns".to_string(),
        ));
    }
    for (i, name) in header.iter().enumerate() {
        if name.is_empty() {
            return Err(CsvDbError::InvalidInput(
                "search result column without a name".to_string(),
            ));
        }
        // The header width is learned by reading up to the first line break
        if name.contains(|c: char| c == '\r' || c == '\n') {
            return Err(CsvDbError::InvalidInput(format!(
                "search result column {:?} contains a line break",
                name
            )));
        }
        if header[..i].contains(name) {
            return Err(CsvDbError::InvalidInput(format!(
                "duplicate result column '{}'",
                name
            )));
        }
    }

    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|column| {
                    row.iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, value)| codec::stringify_value(ColumnType::String, value))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let widest = rows
        .iter()
        .map(|row| codec::measure(row))
        .chain(std::iter::once(codec::measure(&header)))
        .max()
        .unwrap_or(0);
    let width = widest + 2;

    std::iter::once(&header)
        .chain(rows.iter())
        .map(|fields| codec::encode(fields, width, RecordFlag::Live))
        .collect()
}

/// "people_k.csv" → "people_k.csv.tmp"
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Cache keys become part of a file name
fn check_cache_key(cache_key: &str) -> Result<()> {
    let valid = !cache_key.is_empty()
        && cache_key != "."
        && cache_key != ".."
        && !cache_key.contains(|c: char| c == '/' || c == '\\' || c == '\0');

    if !valid {
        return Err(CsvDbError::InvalidInput(format!(
            "invalid cache key '{}'",
            cache_key
        )));
    }
    Ok(())
}
