//! Typed field values.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to a large binary blob stored out-of-band on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    path: PathBuf,
}

impl Asset {
    /// Reference the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the blob on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the blob contents.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// The type of a field value, used to enforce homogeneous lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Double,
    Date,
    Bytes,
    Asset,
    Location,
    List,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Int => "int",
            FieldKind::Double => "double",
            FieldKind::Date => "date",
            FieldKind::Bytes => "bytes",
            FieldKind::Asset => "asset",
            FieldKind::Location => "location",
            FieldKind::List => "list",
        };
        f.write_str(name)
    }
}

/// A single typed field value.
///
/// Lists must be homogeneous and cannot nest; [`Record::set`](super::Record::set)
/// enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    String(String),
    Int(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    Asset(Asset),
    Location(Location),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// The kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Bytes(_) => FieldKind::Bytes,
            FieldValue::Asset(_) => FieldKind::Asset,
            FieldValue::Location(_) => FieldKind::Location,
            FieldValue::List(_) => FieldKind::List,
        }
    }

    /// Order two values for sorting.
    ///
    /// Returns `None` for values that have no meaningful order (assets,
    /// locations, lists) or whose kinds differ. Ints and doubles compare
    /// numerically.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.partial_cmp(b),
            (FieldValue::Int(a), FieldValue::Double(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Double(a), FieldValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let FieldValue::List(items) = self else {
            return Ok(());
        };

        let Some(first) = items.first() else {
            return Ok(());
        };

        let kind = first.kind();
        if kind == FieldKind::List {
            return Err("lists cannot contain lists".to_string());
        }

        if let Some(other) = items.iter().find(|v| v.kind() != kind) {
            return Err(format!(
                "list mixes {} and {} values",
                kind,
                other.kind()
            ));
        }

        Ok(())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Asset> for FieldValue {
    fn from(value: Asset) -> Self {
        FieldValue::Asset(value)
    }
}

impl From<Location> for FieldValue {
    fn from(value: Location) -> Self {
        FieldValue::Location(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_numbers_compare() {
        assert_eq!(
            FieldValue::Int(2).compare(&FieldValue::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(FieldValue::Int(1).compare(&FieldValue::from("1")), None);
    }

    #[test]
    fn heterogeneous_list_is_rejected() {
        let list = FieldValue::List(vec![FieldValue::Int(1), FieldValue::from("two")]);
        assert!(list.validate().is_err());

        let nested = FieldValue::List(vec![FieldValue::List(vec![])]);
        assert!(nested.validate().is_err());

        let ok = FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn tagged_json_shape() {
        let json = serde_json::to_value(FieldValue::Int(7)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "int", "value": 7}));
    }
}
