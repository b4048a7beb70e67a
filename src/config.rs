//! Configuration for csvdb
//!
//! A `TableConfig` describes one table file: where it lives, how wide each
//! slot is, which columns it carries and which hooks run around reads and
//! writes. It is plain data and is passed explicitly to every component.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::codec::Value;
use crate::error::{CsvDbError, Result};
use crate::storage::Record;

/// Column names written after the user columns when `auto_timestamps` is on
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Directory (under `data_dir`) holding search cache tables
pub const CACHE_DIR_NAME: &str = "__csvdb_cache";

const TIMESTAMP_COLUMNS: [&str; 2] = [CREATED_AT, UPDATED_AT];

// =============================================================================
// Column Types
// =============================================================================

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int,
    Float,
    Bool,
    Json,
    /// Stored out of line in a text blob file, never inside the record
    Text,
}

impl ColumnType {
    /// Whether values of this type live inside the fixed-width line
    pub fn is_inline(self) -> bool {
        !matches!(self, ColumnType::Text)
    }
}

impl FromStr for ColumnType {
    type Err = CsvDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(ColumnType::String),
            "int" => Ok(ColumnType::Int),
            "float" => Ok(ColumnType::Float),
            "bool" => Ok(ColumnType::Bool),
            "json" => Ok(ColumnType::Json),
            "text" => Ok(ColumnType::Text),
            other => Err(CsvDbError::InvalidConfig(format!(
                "unknown column type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::Json => "json",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Gates every create/update before any byte is written.
///
/// `r_id` is `None` for creates. Returning `false` rejects the write with
/// `CsvDbError::ValidationRejected`.
pub trait Validator: Send + Sync {
    fn validate(&self, r_id: Option<u64>, proposed: &[(String, Value)], config: &TableConfig)
        -> bool;
}

impl<F> Validator for F
where
    F: Fn(Option<u64>, &[(String, Value)], &TableConfig) -> bool + Send + Sync,
{
    fn validate(
        &self,
        r_id: Option<u64>,
        proposed: &[(String, Value)],
        config: &TableConfig,
    ) -> bool {
        self(r_id, proposed, config)
    }
}

/// Computes extra, non-persisted fields for every live record read.
pub trait Transformer: Send + Sync {
    fn transform(&self, record: &Record, config: &TableConfig) -> Vec<(String, Value)>;
}

impl<F> Transformer for F
where
    F: Fn(&Record, &TableConfig) -> Vec<(String, Value)> + Send + Sync,
{
    fn transform(&self, record: &Record, config: &TableConfig) -> Vec<(String, Value)> {
        self(record, config)
    }
}

// =============================================================================
// Table Configuration
// =============================================================================

/// Configuration of a single table
#[derive(Clone)]
pub struct TableConfig {
    /// Root directory for the table file, its text blobs and its caches
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {table_name}                  (fixed-width records)
    ///     ├── {stem}_{column}.text          (text blobs per column)
    ///     ├── {stem}_{column}_{r_id}.text   (text blobs per record)
    ///     └── __csvdb_cache/{stem}_{key}.csv
    data_dir: PathBuf,

    /// File name of the table inside `data_dir`
    table_name: String,

    /// Content bytes per record line, excluding the terminator
    max_record_width: usize,

    /// Ordered column name → type mapping
    columns: Vec<(String, ColumnType)>,

    /// Stamp `created_at`/`updated_at` (unix millis) on every write
    auto_timestamps: bool,

    validator: Option<Arc<dyn Validator>>,
    transformer: Option<Arc<dyn Transformer>>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./csvdb_data"),
            table_name: String::new(),
            max_record_width: 0,
            columns: Vec::new(),
            auto_timestamps: false,
            validator: None,
            transformer: None,
        }
    }
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("data_dir", &self.data_dir)
            .field("table_name", &self.table_name)
            .field("max_record_width", &self.max_record_width)
            .field("columns", &self.columns)
            .field("auto_timestamps", &self.auto_timestamps)
            .field("validator", &self.validator.is_some())
            .field("transformer", &self.transformer.is_some())
            .finish()
    }
}

impl TableConfig {
    /// Create a new config builder
    pub fn builder() -> TableConfigBuilder {
        TableConfigBuilder::default()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Table name without its extension ("users.csv" → "users")
    pub fn table_stem(&self) -> &str {
        Path::new(&self.table_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.table_name)
    }

    pub fn max_record_width(&self) -> usize {
        self.max_record_width
    }

    /// Bytes occupied by one slot on disk (content + terminator)
    pub fn slot_width(&self) -> u64 {
        self.max_record_width as u64 + 1
    }

    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, ty)| *ty)
    }

    /// Columns stored inside the record line, in declaration order
    pub fn inline_columns(&self) -> impl Iterator<Item = &(String, ColumnType)> {
        self.columns.iter().filter(|(_, ty)| ty.is_inline())
    }

    /// Columns stored in text blob files
    pub fn text_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, ty)| !ty.is_inline())
            .map(|(name, _)| name.as_str())
    }

    /// Number of fields in a line before the filler field
    pub fn inline_field_count(&self) -> usize {
        let timestamps = if self.auto_timestamps { 2 } else { 0 };
        self.inline_columns().count() + timestamps
    }

    pub fn auto_timestamps(&self) -> bool {
        self.auto_timestamps
    }

    pub fn validator(&self) -> Option<&dyn Validator> {
        self.validator.as_deref()
    }

    pub fn transformer(&self) -> Option<&dyn Transformer> {
        self.transformer.as_deref()
    }

    // -------------------------------------------------------------------------
    // Derived paths
    // -------------------------------------------------------------------------

    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(&self.table_name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(CACHE_DIR_NAME)
    }

    /// "__csvdb_cache/users_by-name.csv"
    pub fn cache_path(&self, cache_key: &str) -> PathBuf {
        self.cache_dir().join(self.cache_table_name(cache_key))
    }

    pub(crate) fn cache_table_name(&self, cache_key: &str) -> String {
        format!("{}_{}.csv", self.table_stem(), cache_key)
    }

    /// Shared blob file of a column: "users_notes.text"
    pub fn text_path(&self, column: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.text", self.table_stem(), column))
    }

    /// Blob file owned by one record: "users_notes_42.text"
    pub fn record_text_path(&self, column: &str, r_id: u64) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}_{}.text", self.table_stem(), column, r_id))
    }

    fn validate(&self) -> Result<()> {
        if self.table_name.is_empty() {
            return Err(CsvDbError::InvalidConfig("missing table name".to_string()));
        }
        if self.table_name.contains(|c: char| c == '/' || c == '\\') {
            return Err(CsvDbError::InvalidConfig(format!(
                "table name '{}' must be a plain file name",
                self.table_name
            )));
        }
        if self.max_record_width == 0 {
            return Err(CsvDbError::InvalidConfig(
                "missing max_record_width".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(CsvDbError::InvalidConfig("missing column mapping".to_string()));
        }

        for (i, (name, _)) in self.columns.iter().enumerate() {
            if name.is_empty() {
                return Err(CsvDbError::InvalidConfig("empty column name".to_string()));
            }
            if self.auto_timestamps && TIMESTAMP_COLUMNS.contains(&name.as_str()) {
                return Err(CsvDbError::InvalidConfig(format!(
                    "column name '{}' is reserved",
                    name
                )));
            }
            if self.columns[..i].iter().any(|(other, _)| other == name) {
                return Err(CsvDbError::InvalidConfig(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Builder for TableConfig
#[derive(Default)]
pub struct TableConfigBuilder {
    config: TableConfig,
}

impl TableConfigBuilder {
    /// Set the data directory (root for the table and its companions)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the table file name
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    /// Set the per-record content width in bytes
    pub fn max_record_width(mut self, width: usize) -> Self {
        self.config.max_record_width = width;
        self
    }

    /// Append a column
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.config.columns.push((name.into(), ty));
        self
    }

    /// Replace all columns
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        self.config.columns = columns
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .collect();
        self
    }

    /// Enable or disable `created_at`/`updated_at` stamping
    pub fn auto_timestamps(mut self, enabled: bool) -> Self {
        self.config.auto_timestamps = enabled;
        self
    }

    /// Install a validation hook
    pub fn validator<F>(self, hook: F) -> Self
    where
        F: Fn(Option<u64>, &[(String, Value)], &TableConfig) -> bool + Send + Sync + 'static,
    {
        self.validator_hook(Arc::new(hook))
    }

    /// Install a shared validation hook object
    pub fn validator_hook(mut self, hook: Arc<dyn Validator>) -> Self {
        self.config.validator = Some(hook);
        self
    }

    /// Install a transformation hook
    pub fn transformer<F>(self, hook: F) -> Self
    where
        F: Fn(&Record, &TableConfig) -> Vec<(String, Value)> + Send + Sync + 'static,
    {
        self.transformer_hook(Arc::new(hook))
    }

    /// Install a shared transformation hook object
    pub fn transformer_hook(mut self, hook: Arc<dyn Transformer>) -> Self {
        self.config.transformer = Some(hook);
        self
    }

    pub fn build(self) -> Result<TableConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
