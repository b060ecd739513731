//! Record identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, InvalidInputError};

/// Longest accepted id, in bytes. Ids name files and directories in the
/// record and blob stores; this leaves room for suffixes within one file
/// name.
pub const MAX_RECORD_ID_LEN: usize = 200;

/// Stable identity of a record.
///
/// Every valid id is a safe single path component: ASCII letters, digits
/// and `-_.~`, not starting with a dot.
///
/// ```
/// use recsync_core::RecordId;
///
/// let id = RecordId::new("note-3jui7kd54zh2y").unwrap();
/// assert_eq!(id.as_str(), "note-3jui7kd54zh2y");
/// assert!(RecordId::new("../escape").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

impl RecordId {
    /// Validate and wrap `s`.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        let reason = if s.is_empty() {
            Some("cannot be empty".to_string())
        } else if s.len() > MAX_RECORD_ID_LEN {
            Some(format!("longer than {} bytes", MAX_RECORD_ID_LEN))
        } else if s.starts_with('.') {
            Some("cannot start with '.'".to_string())
        } else {
            s.chars()
                .find(|c| !is_id_char(*c))
                .map(|c| format!("contains invalid character '{}'", c))
        };

        match reason {
            Some(reason) => Err(InvalidInputError::RecordId { value: s, reason }.into()),
            None => Ok(Self(s)),
        }
    }

    /// A fresh client-side identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}
