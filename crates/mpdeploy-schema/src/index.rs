//! The remote package index document (`/{name}/package.json`).
//!
//! The index is kept as a raw JSON object so that fields written by other
//! tools survive a round trip. Only `name`, `latest` and `versions` are
//! managed here.

use crate::pubspec::PublishedEntry;
use crate::release::DEV_VERSION;
use serde_json::{Map, Value};
use thiserror::Error;

const NAME: &str = "name";
const LATEST: &str = "latest";
const VERSIONS: &str = "versions";

/// Errors raised while reading or writing an index document.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The bytes are not valid JSON, or an entry failed to serialise.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but its top level is not an object.
    #[error("Index is not a JSON object (found {0})")]
    NotAnObject(&'static str),
}

/// Outcome of inserting an entry into `versions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// An entry with the same version existed and was overwritten in place.
    Replaced {
        /// Index of the overwritten entry.
        position: usize,
    },
    /// No entry matched; the new one was pushed to the end.
    Appended {
        /// Index of the new entry.
        position: usize,
    },
}

/// A package index document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageIndex {
    doc: Map<String, Value>,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl PackageIndex {
    /// An empty index (`{}`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an index document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Json`] for malformed JSON and
    /// [`IndexError::NotAnObject`] when the top level is not an object.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IndexError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(doc) => Ok(Self { doc }),
            other => Err(IndexError::NotAnObject(kind(&other))),
        }
    }

    /// Record a publish of `entry` for package `name`.
    ///
    /// Sets `name`, points `latest` at the entry unless it is the dev
    /// sentinel, and replaces the first `versions` element with the same
    /// version or appends a new one.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Json`] if the entry cannot be serialised.
    pub fn publish(&mut self, name: &str, entry: &PublishedEntry) -> Result<Upsert, IndexError> {
        let value = serde_json::to_value(entry)?;

        self.doc.insert(NAME.to_string(), Value::String(name.to_string()));
        if entry.version != DEV_VERSION {
            self.doc.insert(LATEST.to_string(), value.clone());
        }

        Ok(self.upsert_version(&entry.version, value))
    }

    fn upsert_version(&mut self, version: &str, value: Value) -> Upsert {
        let slot = self.doc.entry(VERSIONS).or_insert(Value::Null);
        // Anything but an array is dropped
        let mut versions = match std::mem::take(slot) {
            Value::Array(versions) => versions,
            _ => Vec::new(),
        };

        let outcome = if let Some(position) = versions
            .iter()
            .position(|v| v.get("version").and_then(Value::as_str) == Some(version))
        {
            versions[position] = value;
            Upsert::Replaced { position }
        } else {
            versions.push(value);
            Upsert::Appended {
                position: versions.len() - 1,
            }
        };

        *slot = Value::Array(versions);
        outcome
    }

    /// The `name` field, if set.
    pub fn name(&self) -> Option<&str> {
        self.doc.get(NAME).and_then(Value::as_str)
    }

    /// The `latest` entry, if set.
    pub fn latest(&self) -> Option<&Value> {
        self.doc.get(LATEST)
    }

    /// All published entries (empty when `versions` is missing or malformed).
    pub fn versions(&self) -> &[Value] {
        self.doc
            .get(VERSIONS)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up a field that is not managed by this type.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Serialise as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Json`] if serialisation fails.
    pub fn to_vec(&self) -> Result<Vec<u8>, IndexError> {
        Ok(serde_json::to_vec(&self.doc)?)
    }
}
