//! Storage Module
//!
//! Persistent storage layer over plain fixed-width text files.
//!
//! ## Responsibilities
//! - Offset-addressed record CRUD (`RecordStore`)
//! - Derived, explicitly invalidated search result tables (`SearchCache`)
//! - Append-only storage for large text values (`TextBlobStore`)
//!
//! ## Table File Format
//! ```text
//! offset 0            ┌──────────────────────────────────────┬────┐
//!                     │ record 1 (max_record_width bytes)    │ \n │
//! offset w+1          ├──────────────────────────────────────┼────┤
//!                     │ record 2                             │ \n │
//! offset (r_id-1)*(w+1)├─────────────────────────────────────┼────┤
//!                     │ ...                                  │    │
//!                     └──────────────────────────────────────┴────┘
//! ```
//! There is no header and no index: a record's offset is a pure function
//! of its `r_id` and the configured width.

mod record;
mod search_cache;
mod store;
mod text_blob;

pub use record::{ReadOutcome, Record, Values};
pub use search_cache::{ResultRow, SearchCache};
pub use store::RecordStore;
pub use text_blob::{BlobRef, TextBlobStore, BLANK, BLOB_SEPARATOR};
