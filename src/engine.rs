//! Engine Module
//!
//! Ties the storage components of one table together.
//!
//! ## Responsibilities
//! - Bootstrap the data and cache directories and the table file
//! - Hand out the record store, the search cache and text blob stores
//!   bound to the same configuration

use tracing::info;

use crate::config::{ColumnType, TableConfig};
use crate::error::{CsvDbError, Result};
use crate::storage::{RecordStore, SearchCache, TextBlobStore};

/// An opened table
#[derive(Debug, Clone)]
pub struct Table {
    store: RecordStore,
    cache: SearchCache,
}

impl Table {
    /// Open or create the table described by `config`
    ///
    /// On open:
    /// 1. Create the data directory and the cache directory
    /// 2. Create an empty table file if none exists
    pub fn open(config: TableConfig) -> Result<Self> {
        let store = RecordStore::new(config);
        let created = store.create_table()?;

        info!(
            table = store.config().table_name(),
            created,
            rows = store.len()?,
            "opened table"
        );

        let cache = SearchCache::new(store.clone());
        Ok(Self { store, cache })
    }

    pub fn config(&self) -> &TableConfig {
        self.store.config()
    }

    /// Record CRUD
    pub fn records(&self) -> &RecordStore {
        &self.store
    }

    /// Search result caches of this table
    pub fn search(&self) -> &SearchCache {
        &self.cache
    }

    /// Shared blob file for references kept in a Json column
    pub fn text_blobs(&self, column: &str) -> Result<TextBlobStore> {
        if column.is_empty() || column.contains(|c: char| c == '/' || c == '\\') {
            return Err(CsvDbError::InvalidInput(format!(
                "invalid text column name '{}'",
                column
            )));
        }
        Ok(TextBlobStore::for_column(self.config(), column))
    }

    /// Blob file of a Text column for one record (removed on hard delete)
    pub fn record_text(&self, column: &str, r_id: u64) -> Result<TextBlobStore> {
        match self.config().column_type(column) {
            Some(ColumnType::Text) => {}
            _ => {
                return Err(CsvDbError::InvalidInput(format!(
                    "'{}' is not a text column",
                    column
                )))
            }
        }
        if r_id == 0 {
            return Err(CsvDbError::InvalidInput("r_id starts at 1".to_string()));
        }
        Ok(TextBlobStore::for_record(self.config(), column, r_id))
    }
}
