//! Record line codec
//!
//! Encoding and decoding functions for one fixed-width record line.

use crate::config::ColumnType;
use crate::error::{CsvDbError, Result};

use super::{Value, DELIMITER, FILLER, HARD_DELETE_FLAG, QUOTE, SOFT_DELETE_FLAG, TERMINATOR};

/// State carried by the last content byte of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFlag {
    Live,
    SoftDeleted,
    HardDeleted,
}

impl RecordFlag {
    pub fn byte(self) -> u8 {
        match self {
            RecordFlag::Live => FILLER,
            RecordFlag::SoftDeleted => SOFT_DELETE_FLAG,
            RecordFlag::HardDeleted => HARD_DELETE_FLAG,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FILLER => Some(RecordFlag::Live),
            SOFT_DELETE_FLAG => Some(RecordFlag::SoftDeleted),
            HARD_DELETE_FLAG => Some(RecordFlag::HardDeleted),
            _ => None,
        }
    }
}

// =============================================================================
// Value ⇄ Field Coercion
// =============================================================================

/// Coerce one value to the text stored for a column of type `ty`
pub fn stringify_value(ty: ColumnType, value: &Value) -> String {
    match ty {
        ColumnType::Bool => {
            if value.is_truthy() {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        ColumnType::Int => match value {
            Value::Int(i) => i.to_string(),
            _ => String::new(),
        },
        ColumnType::Float => match value {
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Int(i) => i.to_string(),
            _ => String::new(),
        },
        ColumnType::Json => match value {
            Value::Json(json) if json.is_object() || json.is_array() => json.to_string(),
            _ => String::new(),
        },
        ColumnType::String | ColumnType::Text => match value {
            Value::Null => String::new(),
            Value::String(s) | Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Json(json) => match json {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        },
    }
}

/// Coerce positional values to the inline fields of a line.
///
/// `values[i]` belongs to `columns[i]`; missing values become empty fields,
/// values past the declared columns are dropped and Text columns produce no
/// field at all.
pub fn stringify(values: &[Value], columns: &[(String, ColumnType)]) -> Vec<String> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, (_, ty))| ty.is_inline())
        .map(|(i, (_, ty))| stringify_value(*ty, values.get(i).unwrap_or(&Value::Null)))
        .collect()
}

/// Parse one stored field back into a value of type `ty`
pub fn typecast_field(ty: ColumnType, field: &str) -> Result<Value> {
    let value = match ty {
        ColumnType::Bool => Value::Bool(field == "1"),
        ColumnType::Int => field.parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnType::Float => field.parse().map(Value::Float).unwrap_or(Value::Null),
        ColumnType::Json => {
            if field.is_empty() {
                Value::Null
            } else {
                Value::Json(serde_json::from_str(field)?)
            }
        }
        ColumnType::String => Value::String(field.to_string()),
        ColumnType::Text => Value::Text(field.to_string()),
    };
    Ok(value)
}

/// Inverse of `stringify`: pair each inline column with its parsed field
pub fn typecast(fields: &[String], columns: &[(String, ColumnType)]) -> Result<Vec<(String, Value)>> {
    columns
        .iter()
        .filter(|(_, ty)| ty.is_inline())
        .zip(fields)
        .map(|((name, ty), field)| Ok((name.clone(), typecast_field(*ty, field)?)))
        .collect()
}

// =============================================================================
// Line Encoding/Decoding
// =============================================================================

fn needs_quoting(field: &str) -> bool {
    field
        .bytes()
        .any(|b| b == DELIMITER || b == QUOTE || b == b'\r' || b == b'\n')
}

fn field_length(field: &str) -> usize {
    if needs_quoting(field) {
        let quotes = field.bytes().filter(|&b| b == QUOTE).count();
        field.len() + quotes + 2
    } else {
        field.len()
    }
}

/// Exact byte length of the fields once quote-escaped and comma-joined
pub fn measure<S: AsRef<str>>(fields: &[S]) -> usize {
    let content: usize = fields.iter().map(|f| field_length(f.as_ref())).sum();
    content + fields.len().saturating_sub(1)
}

fn write_field(line: &mut Vec<u8>, field: &str) {
    if !needs_quoting(field) {
        line.extend_from_slice(field.as_bytes());
        return;
    }

    line.push(QUOTE);
    for &b in field.as_bytes() {
        if b == QUOTE {
            line.push(QUOTE);
        }
        line.push(b);
    }
    line.push(QUOTE);
}

/// Encode fields into one slot of exactly `max_width + 1` bytes.
///
/// The filler field takes whatever is left after the fields and their
/// separator; it must be at least one byte so it can carry `flag`.
/// Nothing is truncated: a line that cannot fit is `RecordTooWide`.
pub fn encode<S: AsRef<str>>(fields: &[S], max_width: usize, flag: RecordFlag) -> Result<Vec<u8>> {
    let separator = usize::from(!fields.is_empty());
    let used = measure(fields) + separator;
    let needed = used + 1;

    if needed > max_width {
        return Err(CsvDbError::RecordTooWide {
            needed,
            max: max_width,
        });
    }

    let filler_len = max_width - used;
    let mut line = Vec::with_capacity(max_width + 1);

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        write_field(&mut line, field.as_ref());
    }
    if separator == 1 {
        line.push(DELIMITER);
    }

    line.resize(line.len() + filler_len - 1, FILLER);
    line.push(flag.byte());
    line.push(TERMINATOR);

    debug_assert_eq!(line.len(), max_width + 1);
    Ok(line)
}

/// Split comma-delimited, quote-escaped content into fields
pub fn split_fields(content: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut field));
                at_field_start = true;
                continue;
            }
            '"' if at_field_start => in_quotes = true,
            other => field.push(other),
        }
        at_field_start = false;
    }

    if in_quotes {
        return Err(CsvDbError::Corrupt("unterminated quoted field".to_string()));
    }

    fields.push(field);
    Ok(fields)
}

/// Decode one slot (content + terminator) into its fields and state flag.
///
/// The returned fields exclude the trailing filler field.
pub fn decode(slot: &[u8], max_width: usize) -> Result<(Vec<String>, RecordFlag)> {
    if max_width == 0 || slot.len() != max_width + 1 || slot[max_width] != TERMINATOR {
        return Err(CsvDbError::Corrupt(format!(
            "slot is not a {}-byte line",
            max_width + 1
        )));
    }

    let content = &slot[..max_width];
    let flag_byte = content[max_width - 1];
    let flag = RecordFlag::from_byte(flag_byte).ok_or_else(|| {
        CsvDbError::Corrupt(format!("unknown record flag 0x{:02x}", flag_byte))
    })?;

    let content = std::str::from_utf8(content)
        .map_err(|e| CsvDbError::Corrupt(format!("record is not valid UTF-8: {}", e)))?;

    let mut fields = split_fields(content)?;
    fields.pop();

    Ok((fields, flag))
}
