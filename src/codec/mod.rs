//! Record Codec Module
//!
//! Converts typed column values to and from one fixed-width delimited line.
//! Pure functions only; no file I/O happens here.
//!
//! ## Line Format
//! ```text
//! ┌──────────────────────────────────────────────┬───────────┬────┐
//! │ field,field,...,created_at,updated_at,       │ ____...F  │ \n │
//! └──────────────────────────────────────────────┴───────────┴────┘
//!  <───────────────── max_record_width bytes ─────────────────>
//! ```
//!
//! - Fields are comma separated. A field containing `,` `"` `\r` or `\n` is
//!   enclosed in quotes and embedded quotes are doubled.
//! - The last field is filler (`_`) padding the line to exactly
//!   `max_record_width` bytes. It is never shorter than one byte.
//! - The last content byte `F` is the record state flag:
//!   - `_`: live
//!   - `x`: soft-deleted
//!   - `X`: hard-deleted

mod record;
mod value;

pub use record::{
    decode, encode, measure, split_fields, stringify, stringify_value, typecast,
    typecast_field, RecordFlag,
};
pub use value::Value;

/// Byte used to pad every line up to `max_record_width`
pub const FILLER: u8 = b'_';

/// Flag byte of a soft-deleted record
pub const SOFT_DELETE_FLAG: u8 = b'x';

/// Flag byte of a hard-deleted record
pub const HARD_DELETE_FLAG: u8 = b'X';

/// Field delimiter
pub const DELIMITER: u8 = b',';

/// Field enclosure
pub const QUOTE: u8 = b'"';

/// Line terminator
pub const TERMINATOR: u8 = b'\n';
