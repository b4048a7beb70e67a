//! Record types
//!
//! What callers hand to the store (`Values`) and what they get back
//! (`Record`, `ReadOutcome`).

use crate::codec::Value;
use crate::config::{TableConfig, CREATED_AT, UPDATED_AT};
use crate::error::{CsvDbError, DeleteKind, Result};

/// A live record as returned by reads
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based record number
    pub r_id: u64,

    /// Unix millis of the first write (tables with `auto_timestamps`)
    pub created_at: Option<u64>,

    /// Unix millis of the latest write (tables with `auto_timestamps`)
    pub updated_at: Option<u64>,

    /// Column values in declaration order, followed by computed fields
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(r_id: u64, fields: Vec<(String, Value)>) -> Self {
        Self {
            r_id,
            created_at: None,
            updated_at: None,
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Convenience for String columns
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }

    /// Insert a field, replacing an existing one with the same name
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Keep only the named fields, in the order requested
    pub fn select(&self, names: &[&str]) -> Record {
        let fields = names
            .iter()
            .filter_map(|name| self.get(name).map(|v| (name.to_string(), v.clone())))
            .collect();

        Record {
            r_id: self.r_id,
            created_at: names.contains(&CREATED_AT).then_some(self.created_at).flatten(),
            updated_at: names.contains(&UPDATED_AT).then_some(self.updated_at).flatten(),
            fields,
        }
    }

    /// JSON object with `r_id`, every field and the timestamps when present
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert("r_id".to_string(), self.r_id.into());
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        if let Some(created_at) = self.created_at {
            object.insert(CREATED_AT.to_string(), created_at.into());
        }
        if let Some(updated_at) = self.updated_at {
            object.insert(UPDATED_AT.to_string(), updated_at.into());
        }
        serde_json::Value::Object(object)
    }
}

/// Result of reading one slot.
///
/// "Never written" and "deleted" stay distinguishable.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Live(Record),
    SoftDeleted,
    HardDeleted,
    /// The slot lies past the end of the table
    NotFound,
}

impl ReadOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, ReadOutcome::Live(_))
    }

    pub fn into_live(self) -> Option<Record> {
        match self {
            ReadOutcome::Live(record) => Some(record),
            _ => None,
        }
    }

    /// Turn non-live outcomes into the matching error
    pub fn into_record(self, r_id: u64) -> Result<Record> {
        match self {
            ReadOutcome::Live(record) => Ok(record),
            ReadOutcome::SoftDeleted => Err(CsvDbError::RecordDeleted {
                r_id,
                kind: DeleteKind::Soft,
            }),
            ReadOutcome::HardDeleted => Err(CsvDbError::RecordDeleted {
                r_id,
                kind: DeleteKind::Hard,
            }),
            ReadOutcome::NotFound => Err(CsvDbError::RecordNotFound { r_id }),
        }
    }
}

/// Values proposed for a create or update
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// One value per declared column, in declaration order
    Positional(Vec<Value>),
    /// Column name → value; unknown names are dropped
    Named(Vec<(String, Value)>),
}

impl Values {
    /// Resolve against the table's columns.
    ///
    /// Full writes yield every declared column in order (missing ones as
    /// `Null`). Partial writes yield only the supplied known columns and
    /// require named values.
    pub fn resolve(self, config: &TableConfig, partial: bool) -> Result<Vec<(String, Value)>> {
        let columns = config.columns();

        match self {
            Values::Positional(_) if partial => Err(CsvDbError::InvalidInput(
                "partial updates need named values".to_string(),
            )),
            Values::Positional(values) => {
                let mut values = values.into_iter();
                Ok(columns
                    .iter()
                    .map(|(name, _)| (name.clone(), values.next().unwrap_or(Value::Null)))
                    .collect())
            }
            Values::Named(named) if partial => {
                let mut resolved: Vec<(String, Value)> = Vec::new();
                for (name, value) in named {
                    if config.column_type(&name).is_none() {
                        continue;
                    }
                    match resolved.iter_mut().find(|(existing, _)| *existing == name) {
                        Some((_, slot)) => *slot = value,
                        None => resolved.push((name, value)),
                    }
                }
                Ok(resolved)
            }
            Values::Named(named) => Ok(columns
                .iter()
                .map(|(name, _)| {
                    let value = named
                        .iter()
                        .rev()
                        .find(|(field, _)| field == name)
                        .map(|(_, value)| value.clone())
                        .unwrap_or(Value::Null);
                    (name.clone(), value)
                })
                .collect()),
        }
    }
}

impl From<Vec<Value>> for Values {
    fn from(values: Vec<Value>) -> Self {
        Values::Positional(values)
    }
}

impl From<Vec<(String, Value)>> for Values {
    fn from(named: Vec<(String, Value)>) -> Self {
        Values::Named(named)
    }
}

impl From<Vec<(&str, Value)>> for Values {
    fn from(named: Vec<(&str, Value)>) -> Self {
        Values::Named(
            named
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }
}
