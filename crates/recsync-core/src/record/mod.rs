//! The record data model.
//!
//! A [`Record`] is a named bag of typed fields with a stable identity.
//! Server metadata is only present after a successful round trip to the
//! remote service; records created locally and not yet uploaded have none.

mod value;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidInputError};
use crate::types::RecordId;

pub use value::{Asset, FieldKind, FieldValue, Location};

/// Maximum length of a field key.
const MAX_KEY_LEN: usize = 128;

/// Metadata assigned by the remote service on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// When the service first stored the record.
    pub created_at: DateTime<Utc>,
    /// When the service last stored the record.
    pub modified_at: DateTime<Utc>,
    /// Opaque tag that changes on every stored modification.
    pub change_tag: String,
}

/// A record: identity, type and typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", rename_all = "camelCase")]
pub struct Record {
    id: RecordId,
    record_type: String,
    fields: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<RecordMetadata>,
}

impl Record {
    /// Create an empty record of `record_type` with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record type is not a valid name.
    pub fn new(record_type: impl Into<String>) -> Result<Self, Error> {
        Self::with_id(RecordId::generate(), record_type)
    }

    /// Create an empty record with a known id.
    pub fn with_id(id: RecordId, record_type: impl Into<String>) -> Result<Self, Error> {
        let record_type = record_type.into();
        validate_record_type(&record_type)?;
        Ok(Self {
            id,
            record_type,
            fields: BTreeMap::new(),
            metadata: None,
        })
    }

    /// The record identity.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// The record type name.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Server metadata, absent until the record has been stored remotely.
    pub fn metadata(&self) -> Option<&RecordMetadata> {
        self.metadata.as_ref()
    }

    /// Replace the server metadata. Used by service implementations.
    pub fn set_metadata(&mut self, metadata: Option<RecordMetadata>) {
        self.metadata = metadata;
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Set a field value, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid or the value is a
    /// heterogeneous or nested list.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Result<(), Error> {
        let key = key.into();
        let value = value.into();
        validate_field_key(&key)?;
        value.validate().map_err(|reason| InvalidInputError::FieldValue {
            key: key.clone(),
            reason,
        })?;
        self.fields.insert(key, value);
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Result<Self, Error> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    /// Iterate fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate every asset referenced by the record.
    ///
    /// Yields the field key, the list index for assets held in a list, and
    /// the asset itself.
    pub fn assets(&self) -> impl Iterator<Item = (&str, Option<usize>, &Asset)> {
        self.fields.iter().flat_map(|(key, value)| {
            let items: Vec<(Option<usize>, &Asset)> = match value {
                FieldValue::Asset(asset) => vec![(None, asset)],
                FieldValue::List(items) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| match v {
                        FieldValue::Asset(asset) => Some((Some(i), asset)),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            items
                .into_iter()
                .map(move |(index, asset)| (key.as_str(), index, asset))
        })
    }

    /// Rewrite every asset reference in place.
    ///
    /// `f` receives the same `(key, index, asset)` triple that
    /// [`assets`](Self::assets) yields and returns the replacement.
    pub fn map_assets<E, F>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&str, Option<usize>, &Asset) -> Result<Asset, E>,
    {
        for (key, value) in self.fields.iter_mut() {
            match value {
                FieldValue::Asset(asset) => *asset = f(key, None, asset)?,
                FieldValue::List(items) => {
                    for (i, item) in items.iter_mut().enumerate() {
                        if let FieldValue::Asset(asset) = item {
                            *asset = f(key, Some(i), asset)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Check a record type name. Types double as directory names.
fn validate_record_type(s: &str) -> Result<(), Error> {
    let valid = !s.is_empty()
        && s.len() <= MAX_KEY_LEN
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(InvalidInputError::Other {
            message: format!("invalid record type '{}'", s),
        }
        .into())
    }
}

/// Check a field key. Keys appear in asset blob file names.
fn validate_field_key(s: &str) -> Result<(), Error> {
    if s.is_empty() || s.len() > MAX_KEY_LEN {
        return Err(InvalidInputError::FieldKey {
            value: s.to_string(),
            reason: format!("must be 1-{} characters", MAX_KEY_LEN),
        }
        .into());
    }

    if let Some(c) = s
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
    {
        return Err(InvalidInputError::FieldKey {
            value: s.to_string(),
            reason: format!("contains invalid character '{}'", c),
        }
        .into());
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    id: RecordId,
    record_type: String,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    metadata: Option<RecordMetadata>,
}

impl TryFrom<RawRecord> for Record {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let mut record = Record::with_id(raw.id, raw.record_type)?;
        for (key, value) in raw.fields {
            record.set(key, value)?;
        }
        record.metadata = raw.metadata;
        Ok(record)
    }
}
