//! Query descriptors and sort criteria.
//!
//! A [`Query`] is what a caller hands to a record service to start a paged
//! fetch. The predicate vocabulary is deliberately tiny; services with a
//! richer query language translate from it.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::record::{FieldValue, Record};

/// Which records a query selects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Predicate {
    /// Every record of the query's type.
    #[default]
    All,
    /// Records whose `field` equals `value`.
    Equals { field: String, value: FieldValue },
}

impl Predicate {
    /// Evaluate the predicate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals { field, value } => record.get(field) == Some(value),
        }
    }
}

/// What a sort descriptor orders by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "camelCase")]
pub enum SortKey {
    /// A record field.
    Field(String),
    /// Server creation time.
    CreatedAt,
    /// Server modification time.
    ModifiedAt,
}

/// One ordering criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub key: SortKey,
    pub ascending: bool,
}

impl SortDescriptor {
    /// Ascending order on `key`.
    pub fn ascending(key: SortKey) -> Self {
        Self {
            key,
            ascending: true,
        }
    }

    /// Descending order on `key`.
    pub fn descending(key: SortKey) -> Self {
        Self {
            key,
            ascending: false,
        }
    }

    /// Compare two records under this criterion.
    ///
    /// A record that lacks the key sorts after one that has it, whatever
    /// the direction. Records missing server metadata (never uploaded) are
    /// ordered by the keys they do have.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = match &self.key {
            SortKey::Field(field) => present_first(a.get(field), b.get(field), |x, y| {
                x.compare(y).unwrap_or(Ordering::Equal)
            }),
            SortKey::CreatedAt => present_first(
                a.metadata().map(|m| m.created_at),
                b.metadata().map(|m| m.created_at),
                |x, y| x.cmp(&y),
            ),
            SortKey::ModifiedAt => present_first(
                a.metadata().map(|m| m.modified_at),
                b.metadata().map(|m| m.modified_at),
                |x, y| x.cmp(&y),
            ),
        };

        match ordering {
            KeyOrdering::Present(o) if !self.ascending => o.reverse(),
            KeyOrdering::Present(o) | KeyOrdering::Missing(o) => o,
        }
    }
}

/// Comparison outcome, split by whether both sides had a value.
enum KeyOrdering {
    Present(Ordering),
    Missing(Ordering),
}

fn present_first<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> KeyOrdering {
    match (a, b) {
        (Some(x), Some(y)) => KeyOrdering::Present(cmp(x, y)),
        (Some(_), None) => KeyOrdering::Missing(Ordering::Less),
        (None, Some(_)) => KeyOrdering::Missing(Ordering::Greater),
        (None, None) => KeyOrdering::Missing(Ordering::Equal),
    }
}

/// Stable-sort records by a list of criteria, first criterion first.
pub fn sort_records(records: &mut [Record], sort: &[SortDescriptor]) {
    if sort.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        sort.iter()
            .map(|d| d.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// A query: record type, predicate and sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub record_type: String,
    #[serde(default)]
    pub predicate: Predicate,
    #[serde(default)]
    pub sort: Vec<SortDescriptor>,
}

impl Query {
    /// Select every record of `record_type`, unsorted.
    pub fn all(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: Predicate::All,
            sort: Vec::new(),
        }
    }

    /// Replace the predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Append a sort criterion.
    pub fn sort_by(mut self, descriptor: SortDescriptor) -> Self {
        self.sort.push(descriptor);
        self
    }

    /// Returns true if `record` belongs to this query's result set.
    pub fn matches(&self, record: &Record) -> bool {
        record.record_type() == self.record_type && self.predicate.matches(record)
    }
}
