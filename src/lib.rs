//! # csvdb
//!
//! Fixed-width record storage over plain delimited text files:
//! - Records addressed directly by number through byte-offset arithmetic
//! - Live / soft-deleted / hard-deleted slots, never reused
//! - Pagination by forward scan
//! - Materialized search result caches
//! - Append-only text blobs referenced by (offset, length)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Table                               │
//! │               (bootstrap + component access)                 │
//! └──────────┬──────────────────────┬───────────────────┬───────┘
//!            │                      │                   │
//!            ▼                      ▼                   ▼
//!   ┌─────────────────┐    ┌─────────────────┐  ┌───────────────┐
//!   │   SearchCache   │───▶│   RecordStore   │  │ TextBlobStore │
//!   │ (derived table) │    │ (offset CRUD)   │  │ (append-only) │
//!   └─────────────────┘    └────────┬────────┘  └───────────────┘
//!                                   │
//!                                   ▼
//!                          ┌─────────────────┐
//!                          │   RecordCodec   │
//!                          │ (fixed-width    │
//!                          │  line format)   │
//!                          └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::Value;
pub use config::{ColumnType, TableConfig};
pub use engine::Table;
pub use error::{CsvDbError, DeleteKind, Result};
pub use storage::{
    BlobRef, ReadOutcome, Record, RecordStore, ResultRow, SearchCache, TextBlobStore, Values,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of csvdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
